use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Writes every answered question to its own text file for later inspection.
pub struct AnswerArchiver {
    dir: PathBuf,
    backend_id: String,
}

impl AnswerArchiver {
    pub fn new(dir: impl Into<PathBuf>, backend_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            backend_id: backend_id.into(),
        }
    }

    pub async fn archive(&self, question: &str, answer: &str) -> Result<PathBuf> {
        self.archive_at(question, answer, Local::now().naive_local())
            .await
    }

    /// Archive with an explicit timestamp. Same-second writes for the same
    /// backend get a `_<n>` suffix instead of replacing the earlier file.
    pub async fn archive_at(
        &self,
        question: &str,
        answer: &str,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create archive dir: {}", self.dir.display()))?;

        let stem = format!(
            "answer_{}_{}",
            timestamp.format("%Y%m%d_%H%M%S"),
            self.backend_id
        );
        let content = format!("Question:\n{}\n\nAnswer:\n{}\n", question, answer);

        let mut attempt = 1;
        loop {
            let file_name = if attempt == 1 {
                format!("{stem}.txt")
            } else {
                format!("{stem}_{attempt}.txt")
            };
            let path = self.dir.join(file_name);

            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write answer: {}", path.display()))?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create answer file: {}", path.display()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 14)
            .unwrap()
            .and_hms_opt(9, 3, 7)
            .unwrap()
    }

    #[tokio::test]
    async fn test_archive_file_name_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = AnswerArchiver::new(dir.path().join("ans"), "study_rules");

        let path = archiver
            .archive_at("How to graduate?", "Pass the exam.", timestamp())
            .await
            .unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "answer_20250514_090307_study_rules.txt"
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Question:\nHow to graduate?\n\nAnswer:\nPass the exam.\n"
        );
    }

    #[tokio::test]
    async fn test_same_second_writes_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let archiver = AnswerArchiver::new(dir.path(), "graphrag");

        let first = archiver.archive_at("Q1", "A1", timestamp()).await.unwrap();
        let second = archiver.archive_at("Q2", "A2", timestamp()).await.unwrap();

        assert_ne!(first, second);
        assert!(second.to_str().unwrap().ends_with("answer_20250514_090307_graphrag_2.txt"));
        assert!(std::fs::read_to_string(&first).unwrap().contains("A1"));
        assert!(std::fs::read_to_string(&second).unwrap().contains("A2"));
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Questions, reference answers and generated answers, stored as three
/// index-aligned columns. An empty `answer` means "not answered yet".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestSet {
    pub question: Vec<String>,
    pub ground_truth: Vec<String>,
    pub answer: Vec<String>,
}

/// One row of a [`TestSet`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QAPair<'a> {
    pub index: usize,
    pub question: &'a str,
    pub ground_truth: &'a str,
    pub answer: &'a str,
}

impl TestSet {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let (question, ground_truth): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let answer = vec![String::new(); question.len()];
        Self {
            question,
            ground_truth,
            answer,
        }
    }

    /// Same questions and ground truths with every answer cleared.
    pub fn blank_from(source: &TestSet) -> Self {
        Self {
            question: source.question.clone(),
            ground_truth: source.ground_truth.clone(),
            answer: vec![String::new(); source.question.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.question.len()
    }

    pub fn is_empty(&self) -> bool {
        self.question.is_empty()
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.answer
            .get(index)
            .is_some_and(|a| !a.trim().is_empty())
    }

    pub fn answered_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_answered(i)).count()
    }

    pub fn records(&self) -> impl Iterator<Item = QAPair<'_>> {
        self.question
            .iter()
            .zip(&self.ground_truth)
            .zip(&self.answer)
            .enumerate()
            .map(|(index, ((question, ground_truth), answer))| QAPair {
                index,
                question,
                ground_truth,
                answer,
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.question.len() != self.ground_truth.len() || self.question.len() != self.answer.len()
        {
            anyhow::bail!(
                "Test set columns are not aligned: {} questions, {} ground truths, {} answers",
                self.question.len(),
                self.ground_truth.len(),
                self.answer.len()
            );
        }
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read test set from {}", path.display()))?;

        let test_set: TestSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse test set from {}", path.display()))?;

        test_set
            .validate()
            .with_context(|| format!("Invalid test set in {}", path.display()))?;
        Ok(test_set)
    }

    /// Write pretty JSON through a sibling temp file so the target is never
    /// left half-written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = temp_path(path);
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parse a question file made of `=== Q` / `=== A` blocks.
///
/// Lines after a marker accumulate into that section. A pair is kept only if
/// both its question and answer are non-empty.
pub fn parse_questions(text: &str) -> TestSet {
    enum Section {
        Question,
        Answer,
    }

    let mut pairs = Vec::new();
    let mut current_q = String::new();
    let mut current_a = String::new();
    let mut section = None;

    let mut flush = |q: &mut String, a: &mut String| {
        if !q.is_empty() && !a.is_empty() {
            pairs.push((q.trim().to_string(), a.trim().to_string()));
            q.clear();
            a.clear();
        }
    };

    for line in text.split_inclusive('\n') {
        let stripped = line.trim();

        if stripped.starts_with("=== Q") {
            flush(&mut current_q, &mut current_a);
            section = Some(Section::Question);
            continue;
        }
        if stripped.starts_with("=== A") {
            section = Some(Section::Answer);
            continue;
        }

        match section {
            Some(Section::Question) => current_q.push_str(line),
            Some(Section::Answer) => current_a.push_str(line),
            None => {}
        }
    }
    flush(&mut current_q, &mut current_a);

    TestSet::from_pairs(pairs)
}

/// Build `output` from the question file at `input`. Returns `false` without
/// touching anything when `output` already exists.
pub async fn init_from_questions(input: &Path, output: &Path) -> Result<bool> {
    if fs::try_exists(output).await? {
        return Ok(false);
    }

    let text = fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read questions from {}", input.display()))?;

    let test_set = parse_questions(&text);
    test_set.save(output).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions() {
        let text = "=== Q1\nHow is the average\ncalculated?\n=== A1\nBy ECTS weights.\n\n=== Q2\nWho signs the diploma?\n=== A2\nThe dean.\n";
        let set = parse_questions(text);

        assert_eq!(
            set.question,
            vec!["How is the average\ncalculated?", "Who signs the diploma?"]
        );
        assert_eq!(set.ground_truth, vec!["By ECTS weights.", "The dean."]);
        assert_eq!(set.answer, vec!["", ""]);
    }

    #[test]
    fn test_parse_questions_drops_unanswered_block() {
        let text = "preamble\n=== Q1\nOrphan question\n=== Q2\nReal?\n=== A2\nYes\n";
        let set = parse_questions(text);
        // The orphan question has no answer, so its text carries into the next pair.
        assert_eq!(set.len(), 1);
        assert_eq!(set.question[0], "Orphan question\nReal?");
        assert_eq!(set.ground_truth[0], "Yes");
    }

    #[test]
    fn test_validate_rejects_misaligned_columns() {
        let set = TestSet {
            question: vec!["Q1".into(), "Q2".into()],
            ground_truth: vec!["G1".into(), "G2".into()],
            answer: vec!["".into()],
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn test_is_answered_trims() {
        let set = TestSet {
            question: vec!["Q1".into(), "Q2".into()],
            ground_truth: vec!["G1".into(), "G2".into()],
            answer: vec!["  \n".into(), "A2 ".into()],
        };
        assert!(!set.is_answered(0));
        assert!(set.is_answered(1));
        assert_eq!(set.answered_count(), 1);
    }

    #[tokio::test]
    async fn test_save_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test_set.json");
        let set = TestSet::from_pairs(vec![("Gdańsk?".into(), "Tak".into())]);

        set.save(&path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "{\n  \"question\": [\n    \"Gdańsk?\"\n  ],\n  \"ground_truth\": [\n    \"Tak\"\n  ],\n  \"answer\": [\n    \"\"\n  ]\n}"
        );
        assert!(!path.with_file_name("test_set.json.tmp").exists());
        assert_eq!(TestSet::load(&path).await.unwrap(), set);
    }

    #[tokio::test]
    async fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("questions.txt");
        let output = dir.path().join("test_set.json");
        std::fs::write(&input, "=== Q1\nQ\n=== A1\nA\n").unwrap();

        assert!(init_from_questions(&input, &output).await.unwrap());
        std::fs::write(&output, "sentinel").unwrap();
        assert!(!init_from_questions(&input, &output).await.unwrap());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "sentinel");
    }
}

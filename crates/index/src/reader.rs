use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Reads source documents for insertion into the LightRAG index.
pub struct DocumentReader;

impl DocumentReader {
    fn is_supported(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("txt") | Some("md")
        )
    }

    pub async fn read_file(path: &Path) -> Result<String> {
        if !Self::is_supported(path) {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            anyhow::bail!("Unsupported file format: {}", extension);
        }

        fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))
    }

    /// Read every `.txt`/`.md` file directly inside `dir`, sorted by path.
    pub async fn read_directory(dir: &Path) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if entry.file_type().await?.is_file() && Self::is_supported(&path) {
                let content = Self::read_file(&path).await?;
                files.push((path.to_string_lossy().to_string(), content));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// A file yields itself; a directory yields its supported files.
    pub async fn read_path(path: &Path) -> Result<Vec<(String, String)>> {
        let metadata = fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read path: {}", path.display()))?;

        if metadata.is_dir() {
            Self::read_directory(path).await
        } else {
            let content = Self::read_file(path).await?;
            Ok(vec![(path.to_string_lossy().to_string(), content)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_directory_skips_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# rules").unwrap();
        std::fs::write(dir.path().join("a.txt"), "plain").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "binary").unwrap();

        let files = DocumentReader::read_directory(dir.path()).await.unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].0.ends_with("a.txt"));
        assert_eq!(files[1].1, "# rules");
    }

    #[tokio::test]
    async fn test_read_file_rejects_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, "binary").unwrap();

        assert!(DocumentReader::read_path(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_read_path_dispatches_on_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub.md")).unwrap();
        std::fs::write(dir.path().join("rules.txt"), "plain").unwrap();

        // A directory named like a document is not read as one.
        let files = DocumentReader::read_path(dir.path()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].0.ends_with("rules.txt"));

        let single = DocumentReader::read_path(&dir.path().join("rules.txt")).await.unwrap();
        assert_eq!(single[0].1, "plain");

        assert!(DocumentReader::read_path(&dir.path().join("absent.txt")).await.is_err());
    }
}

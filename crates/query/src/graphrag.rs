use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::backend::{QueryBackend, QueryMode, QueryParams};
use crate::cleaner::clean_cli_output;
use crate::error::QueryError;

/// Answers questions by invoking the GraphRAG command-line tool.
pub struct GraphRagCli {
    program: PathBuf,
    root: PathBuf,
    name: String,
}

impl GraphRagCli {
    pub fn new(program: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .canonicalize()
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .or_else(|| root.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "graphrag".to_string());

        Self {
            program: program.into(),
            root,
            name,
        }
    }

    fn supports(mode: QueryMode) -> bool {
        matches!(
            mode,
            QueryMode::Local | QueryMode::Global | QueryMode::Drift | QueryMode::Basic
        )
    }

    fn command_line(&self) -> String {
        format!("{} query", self.program.display())
    }
}

#[async_trait]
impl QueryBackend for GraphRagCli {
    fn name(&self) -> &str {
        &self.name
    }

    /// `top_k` is ignored; the CLI has no option for it.
    async fn query(
        &self,
        question: &str,
        params: &QueryParams,
    ) -> Result<Option<String>, QueryError> {
        if !Self::supports(params.mode) {
            return Err(QueryError::UnsupportedMode {
                backend: self.name.clone(),
                mode: params.mode,
            });
        }

        let output = Command::new(&self.program)
            .arg("query")
            .arg("--root")
            .arg(&self.root)
            .arg("--method")
            .arg(params.mode.as_str())
            .arg("--query")
            .arg(question)
            .output()
            .await
            .map_err(|source| QueryError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if !output.status.success() {
            return Err(QueryError::Process {
                command: self.command_line(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let answer = clean_cli_output(&stdout);
        debug!(
            backend = %self.name,
            raw_bytes = output.stdout.len(),
            answer_bytes = answer.len(),
            "Cleaned GraphRAG output"
        );

        Ok(if answer.is_empty() { None } else { Some(answer) })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable stand-in for the `graphrag` binary.
    fn fake_cli(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("graphrag");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn params(mode: QueryMode) -> QueryParams {
        QueryParams { mode, top_k: 10 }
    }

    #[tokio::test]
    async fn test_query_cleans_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(
            dir.path(),
            r#"echo 'INFO: Vector Store Args: {'
echo '  "type": "lancedb"'
echo '}'
echo 'SUCCESS: DRIFT Search Response:'
echo "method=$5 question=$7""#,
        );

        let cli = GraphRagCli::new(program, dir.path());
        let answer = cli
            .query("How to graduate?", &params(QueryMode::Drift))
            .await
            .unwrap();

        assert_eq!(answer.as_deref(), Some("method=drift question=How to graduate?"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(dir.path(), "echo 'partial answer'\necho 'index missing' >&2\nexit 3");

        let err = GraphRagCli::new(program, dir.path())
            .query("Q", &params(QueryMode::Local))
            .await
            .unwrap_err();

        match err {
            QueryError::Process { stderr, .. } => assert_eq!(stderr, "index missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_only_log_output_is_no_answer() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_cli(dir.path(), "echo 'INFO: nothing found'\necho 'SUCCESS: done'");

        let answer = GraphRagCli::new(program, dir.path())
            .query("Q", &params(QueryMode::Global))
            .await
            .unwrap();
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GraphRagCli::new(dir.path().join("absent"), dir.path())
            .query("Q", &params(QueryMode::Drift))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_hybrid_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = GraphRagCli::new("graphrag", dir.path())
            .query("Q", &params(QueryMode::Hybrid))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedMode { .. }));
    }
}

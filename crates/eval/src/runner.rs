use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

use query::{AnswerArchiver, QueryBackend, QueryParams};

use crate::test_set::TestSet;

/// What to do when the backend raises an error for one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Treat the error as systemic and stop the batch.
    #[default]
    FailFast,
    /// Leave the question unanswered and move on.
    SkipAndContinue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub answered: usize,
    pub skipped: usize,
    pub unanswered: usize,
    pub failed: usize,
}

/// Load the output test set to resume from, or start a fresh one from `input`.
pub async fn prepare_output(input: &Path, output: &Path) -> Result<TestSet> {
    if !fs::try_exists(input).await? {
        anyhow::bail!("Input file not found at {}", input.display());
    }
    let input_set = TestSet::load(input).await?;

    if fs::try_exists(output).await? {
        info!(path = %output.display(), "Found existing output file, resuming");
        let existing = TestSet::load(output).await?;
        if existing.question != input_set.question {
            warn!(
                path = %output.display(),
                "Output questions differ from input, resuming with the output's questions"
            );
        }
        Ok(existing)
    } else {
        info!(path = %output.display(), "Creating new output file");
        Ok(TestSet::blank_from(&input_set))
    }
}

/// Answers every unanswered question of a test set, persisting after each one.
pub struct BatchRunner<'a> {
    backend: &'a dyn QueryBackend,
    params: QueryParams,
    output: PathBuf,
    archiver: Option<AnswerArchiver>,
    policy: FailurePolicy,
}

impl<'a> BatchRunner<'a> {
    pub fn new(backend: &'a dyn QueryBackend, params: QueryParams, output: PathBuf) -> Self {
        Self {
            backend,
            params,
            output,
            archiver: None,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_archiver(mut self, archiver: AnswerArchiver) -> Self {
        self.archiver = Some(archiver);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn run(&self, test_set: &mut TestSet) -> Result<RunSummary> {
        test_set.validate()?;

        let mut summary = RunSummary {
            total: test_set.len(),
            ..Default::default()
        };

        for index in 0..test_set.len() {
            let number = index + 1;

            if test_set.is_answered(index) {
                info!(question = number, "Skipped, already answered");
                summary.skipped += 1;
                continue;
            }

            info!(question = number, backend = self.backend.name(), "Sending query");
            let question = test_set.question[index].clone();

            let answer = match self.backend.query(&question, &self.params).await {
                Ok(Some(answer)) => answer,
                Ok(None) => {
                    warn!(question = number, "Query returned no answer");
                    summary.unanswered += 1;
                    continue;
                }
                Err(e) => {
                    error!(question = number, error = %e, "Query failed");
                    summary.failed += 1;
                    match self.policy {
                        FailurePolicy::FailFast => {
                            log_summary(&summary);
                            return Err(e).with_context(|| {
                                format!("Query {} failed, stopping batch", number)
                            });
                        }
                        FailurePolicy::SkipAndContinue => continue,
                    }
                }
            };

            let answer = answer.trim().to_string();
            test_set.answer[index] = answer.clone();
            test_set.save(&self.output).await?;
            summary.answered += 1;
            info!(question = number, path = %self.output.display(), "Answer saved");

            if let Some(archiver) = &self.archiver {
                let path = archiver.archive(&question, &answer).await?;
                info!(question = number, path = %path.display(), "Answer archived");
            }
        }

        log_summary(&summary);
        Ok(summary)
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        total = summary.total,
        answered = summary.answered,
        skipped = summary.skipped,
        unanswered = summary.unanswered,
        failed = summary.failed,
        "Batch finished"
    );
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::metrics::{ItemScore, Scorer};
use crate::test_set::TestSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub label: String,
    pub total: usize,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
    pub answer_correctness: MetricSummary,
    pub answer_relevancy: MetricSummary,
    pub items: Vec<ItemScore>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricSummary {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let std_dev = if values.len() > 1 {
            statistical::standard_deviation(values, None)
        } else {
            0.0
        };

        Self {
            mean: statistical::mean(values),
            median: statistical::median(values),
            std_dev,
        }
    }
}

pub struct Evaluator<'a> {
    scorer: Scorer<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(scorer: Scorer<'a>) -> Self {
        Self { scorer }
    }

    /// Score every answered item. Unanswered items are skipped; items the
    /// judge cannot grade are logged and counted as failed.
    pub async fn evaluate(&self, test_set: &TestSet, label: &str) -> Result<EvaluationReport> {
        test_set.validate()?;
        info!(label, questions = test_set.len(), "Evaluating test set");

        let mut items = Vec::new();
        let mut skipped = 0;
        let mut failed = 0;

        for pair in test_set.records() {
            if pair.answer.trim().is_empty() {
                skipped += 1;
                continue;
            }

            match self
                .scorer
                .score(pair.index, pair.question, pair.answer.trim(), pair.ground_truth)
                .await
            {
                Ok(score) => {
                    info!(
                        label,
                        question = pair.index + 1,
                        correctness = score.answer_correctness,
                        relevancy = score.answer_relevancy,
                        "Scored answer"
                    );
                    items.push(score);
                }
                Err(e) => {
                    warn!(label, question = pair.index + 1, error = %e, "Failed to score answer");
                    failed += 1;
                }
            }
        }

        let correctness: Vec<f64> = items.iter().map(|i| i.answer_correctness).collect();
        let relevancy: Vec<f64> = items.iter().map(|i| i.answer_relevancy).collect();

        Ok(EvaluationReport {
            label: label.to_string(),
            total: test_set.len(),
            scored: items.len(),
            skipped,
            failed,
            answer_correctness: MetricSummary::from_values(&correctness),
            answer_relevancy: MetricSummary::from_values(&relevancy),
            items,
        })
    }
}

/// Label for a test set file: its file stem.
pub fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "test_set".to_string())
}

pub async fn save_report(report: &EvaluationReport, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("{}_metrics.json", report.label));
    tokio::fs::write(&path, serde_json::to_string_pretty(report)?).await?;
    Ok(path)
}

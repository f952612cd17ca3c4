use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use index::EmbeddingClient;
use index::embeddings::cosine_similarity;
use query::ChatClient;

/// Weight of the factual F1 term in answer correctness; the rest goes to
/// semantic similarity.
const FACTUALITY_WEIGHT: f64 = 0.75;
const SIMILARITY_WEIGHT: f64 = 0.25;
/// Questions generated per answer for answer relevancy.
const GENERATED_QUESTIONS: usize = 3;

/// LLM used to grade answers.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
impl Judge for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        EmbeddingClient::embed_batch(self, texts).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemScore {
    pub index: usize,
    pub question: String,
    pub answer_correctness: f64,
    pub answer_relevancy: f64,
}

#[derive(Debug, Default, Deserialize)]
struct StatementClassification {
    #[serde(rename = "TP", default)]
    true_positives: Vec<String>,
    #[serde(rename = "FP", default)]
    false_positives: Vec<String>,
    #[serde(rename = "FN", default)]
    false_negatives: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i != 0,
        }
    }
}

#[derive(Deserialize)]
struct GeneratedQuestions {
    questions: Vec<String>,
    noncommittal: Option<Flag>,
}

fn correctness_prompt(question: &str, answer: &str, ground_truth: &str) -> String {
    format!(
        r#"You grade answers against a reference.

Break the ANSWER and the GROUND TRUTH into short factual statements, then classify them:
- "TP": statements in the answer that are supported by the ground truth
- "FP": statements in the answer that are not supported by the ground truth
- "FN": statements in the ground truth that are missing from the answer

QUESTION: {}

ANSWER: {}

GROUND TRUTH: {}

Output ONLY a JSON object: {{"TP": [...], "FP": [...], "FN": [...]}}"#,
        question, answer, ground_truth
    )
}

fn relevancy_prompt(answer: &str) -> String {
    format!(
        r#"Write {} different questions that the following answer responds to.
Also decide whether the answer is noncommittal (evasive, vague or "I don't know"): 1 if it is, 0 otherwise.

ANSWER: {}

Output ONLY a JSON object: {{"questions": ["..."], "noncommittal": 0}}"#,
        GENERATED_QUESTIONS, answer
    )
}

/// Parse a JSON object out of an LLM reply, tolerating code fences and prose
/// around it.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let start = reply.find('{').context("No JSON object in judge reply")?;
    let end = reply.rfind('}').context("No JSON object in judge reply")?;
    if end < start {
        anyhow::bail!("Malformed JSON object in judge reply");
    }
    serde_json::from_str(&reply[start..=end]).context("Failed to parse judge reply")
}

/// TP / (TP + 0.5 * (FP + FN)); zero when nothing was classified.
pub fn factual_f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    let denominator = tp as f64 + 0.5 * (fp + fn_) as f64;
    if denominator == 0.0 {
        0.0
    } else {
        tp as f64 / denominator
    }
}

pub struct Scorer<'a> {
    judge: &'a dyn Judge,
    embedder: &'a dyn Embedder,
}

impl<'a> Scorer<'a> {
    pub fn new(judge: &'a dyn Judge, embedder: &'a dyn Embedder) -> Self {
        Self { judge, embedder }
    }

    pub async fn answer_correctness(
        &self,
        question: &str,
        answer: &str,
        ground_truth: &str,
    ) -> Result<f64> {
        let reply = self
            .judge
            .complete(&correctness_prompt(question, answer, ground_truth))
            .await?;
        let classes: StatementClassification = parse_json_reply(&reply)?;
        let f1 = factual_f1(
            classes.true_positives.len(),
            classes.false_positives.len(),
            classes.false_negatives.len(),
        );

        let vectors = self.embedder.embed_batch(&[answer, ground_truth]).await?;
        let similarity = match vectors.as_slice() {
            [a, b] => cosine_similarity(a, b) as f64,
            _ => anyhow::bail!("Expected 2 embeddings, got {}", vectors.len()),
        };

        Ok(FACTUALITY_WEIGHT * f1 + SIMILARITY_WEIGHT * similarity)
    }

    pub async fn answer_relevancy(&self, question: &str, answer: &str) -> Result<f64> {
        let reply = self.judge.complete(&relevancy_prompt(answer)).await?;
        let generated: GeneratedQuestions = parse_json_reply(&reply)?;

        if generated.noncommittal.as_ref().is_some_and(Flag::is_set) {
            return Ok(0.0);
        }
        if generated.questions.is_empty() {
            anyhow::bail!("Judge generated no questions");
        }

        let mut texts: Vec<&str> = vec![question];
        texts.extend(generated.questions.iter().map(String::as_str));
        let vectors = self.embedder.embed_batch(&texts).await?;

        let (original, rest) = vectors
            .split_first()
            .context("Embedding response was empty")?;
        let total: f64 = rest
            .iter()
            .map(|v| cosine_similarity(original, v) as f64)
            .sum();
        Ok(total / rest.len() as f64)
    }

    pub async fn score(
        &self,
        index: usize,
        question: &str,
        answer: &str,
        ground_truth: &str,
    ) -> Result<ItemScore> {
        Ok(ItemScore {
            index,
            question: question.to_string(),
            answer_correctness: self.answer_correctness(question, answer, ground_truth).await?,
            answer_relevancy: self.answer_relevancy(question, answer).await?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Replies by prompt kind: correctness prompts mention "GROUND TRUTH".
    pub(crate) struct StubJudge {
        pub correctness: String,
        pub relevancy: String,
    }

    #[async_trait]
    impl Judge for StubJudge {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("GROUND TRUTH") {
                Ok(self.correctness.clone())
            } else {
                Ok(self.relevancy.clone())
            }
        }
    }

    /// Fixed vectors per text, falling back to a unit vector.
    pub(crate) struct StubEmbedder {
        pub vectors: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(*t).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
                .collect())
        }
    }

    fn embedder(pairs: &[(&str, Vec<f32>)]) -> StubEmbedder {
        StubEmbedder {
            vectors: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_factual_f1() {
        assert_eq!(factual_f1(0, 0, 0), 0.0);
        assert_eq!(factual_f1(2, 0, 0), 1.0);
        assert!((factual_f1(1, 1, 1) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_json_reply_strips_fences() {
        let reply = "Sure!\n```json\n{\"questions\": [\"a\"], \"noncommittal\": true}\n```";
        let parsed: GeneratedQuestions = parse_json_reply(reply).unwrap();
        assert_eq!(parsed.questions, vec!["a"]);
        assert!(parsed.noncommittal.unwrap().is_set());
        assert!(parse_json_reply::<GeneratedQuestions>("no json here").is_err());
    }

    #[tokio::test]
    async fn test_answer_correctness_combines_f1_and_similarity() {
        let judge = StubJudge {
            correctness: r#"{"TP": ["a"], "FP": ["b"], "FN": ["c"]}"#.to_string(),
            relevancy: String::new(),
        };
        let embedder = embedder(&[("answer", vec![1.0, 0.0]), ("truth", vec![0.0, 1.0])]);

        let score = Scorer::new(&judge, &embedder)
            .answer_correctness("q", "answer", "truth")
            .await
            .unwrap();

        // 0.75 * 0.5 + 0.25 * 0.0
        assert!((score - 0.375).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_answer_relevancy_averages_similarity() {
        let judge = StubJudge {
            correctness: String::new(),
            relevancy: r#"{"questions": ["same", "orthogonal"], "noncommittal": 0}"#.to_string(),
        };
        let embedder = embedder(&[
            ("question", vec![1.0, 0.0]),
            ("same", vec![2.0, 0.0]),
            ("orthogonal", vec![0.0, 1.0]),
        ]);

        let score = Scorer::new(&judge, &embedder)
            .answer_relevancy("question", "answer")
            .await
            .unwrap();

        assert!((score - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_noncommittal_answer_scores_zero() {
        let judge = StubJudge {
            correctness: String::new(),
            relevancy: r#"{"questions": ["q"], "noncommittal": 1}"#.to_string(),
        };
        let embedder = embedder(&[]);

        let score = Scorer::new(&judge, &embedder)
            .answer_relevancy("q", "I don't know")
            .await
            .unwrap();
        assert_eq!(score, 0.0);
    }
}

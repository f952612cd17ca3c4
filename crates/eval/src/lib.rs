pub mod benchmark;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod plots;
pub mod runner;
pub mod test_set;

pub use benchmark::{EvaluationReport, Evaluator, MetricSummary};
pub use config::{Settings, LoggingConfig};
pub use metrics::Scorer;
pub use plots::generate_plots;
pub use runner::{BatchRunner, FailurePolicy, RunSummary, prepare_output};
pub use test_set::{QAPair, TestSet, init_from_questions, parse_questions};

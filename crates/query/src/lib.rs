pub mod archive;
pub mod backend;
pub mod cleaner;
pub mod error;
pub mod graphrag;
pub mod lightrag;
pub mod llm;

pub use archive::AnswerArchiver;
pub use backend::{QueryBackend, QueryMode, QueryParams};
pub use cleaner::clean_cli_output;
pub use error::QueryError;
pub use graphrag::GraphRagCli;
pub use lightrag::LightRagClient;
pub use llm::ChatClient;

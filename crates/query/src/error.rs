use thiserror::Error;

use crate::backend::QueryMode;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("request to {backend} failed: {source}")]
    Http {
        backend: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} returned {status}: {body}")]
    Status {
        backend: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Process {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("mode `{mode}` is not supported by {backend}")]
    UnsupportedMode { backend: String, mode: QueryMode },
}

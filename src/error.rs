use crate::model::MessageId;
use crate::service::ServiceError;
use std::path::PathBuf;

/// Failures of the export pipeline. Everything except [`Authentication`]
/// is scoped to a single conversation and does not stop the run.
///
/// [`Authentication`]: ExportError::Authentication
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] ServiceError),

    #[error("fetching history of {conversation:?} failed: {source}")]
    Fetch {
        conversation: String,
        #[source]
        source: ServiceError,
    },

    #[error("pagination of {conversation:?} stalled at cursor {cursor}")]
    CursorStalled {
        conversation: String,
        cursor: MessageId,
    },

    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Pipeline stage the failure happened in, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Authentication(_) => "auth",
            ExportError::Fetch { .. } | ExportError::CursorStalled { .. } => "fetch",
            ExportError::Write { .. } => "write",
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;

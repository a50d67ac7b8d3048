//! The messaging back-end the exporter reads from.
//!
//! The exporter only ever talks to a [`ConversationService`]; the concrete
//! session object is constructed in `main` and handed in, so tests can swap
//! in a scripted fake.
pub mod bridge;
pub mod store;

use crate::model::{Conversation, MessageId, PageQuery, RawMessage};
use async_trait::async_trait;

/// Outcome of [`ConversationService::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// Session is usable right away.
    Ready,
    /// The operator has to complete a login out of band (e.g. scan the code
    /// with a phone) before [`ConversationService::await_ready`] resolves.
    NeedsInteraction { login_code: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("message store error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("unknown pagination cursor {0}")]
    UnknownCursor(MessageId),

    #[error("login was rejected: {0}")]
    LoginRejected(String),

    #[error("login not completed within {0:?}")]
    LoginTimeout(std::time::Duration),

    #[error("session is not authenticated")]
    NotAuthenticated,
}

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Establish a session, reusing persisted state where possible.
    async fn authenticate(&self) -> Result<AuthSignal, ServiceError>;

    /// Resolve once a pending interactive login has completed.
    async fn await_ready(&self) -> Result<(), ServiceError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ServiceError>;

    /// At most `query.limit` messages strictly older than `query.before`
    /// (or the newest ones when it is `None`), newest first.
    async fn fetch_messages(
        &self,
        conversation: &Conversation,
        query: PageQuery,
    ) -> Result<Vec<RawMessage>, ServiceError>;
}

//! # chat-history-export
//!
//! A CLI tool that exports the full message history of every chat conversation
//! an account takes part in to one CSV file per conversation.
//!
//! ## What it does
//!
//! After establishing a session with the messaging back-end (a local SQLite
//! message archive, or a bridge that may ask you to scan a login code), the
//! tool enumerates all conversations and walks each one's history from newest
//! to oldest in pages of 1000 messages. The pages are stitched back together
//! in chronological order and written as `<conversation title>.csv` with the
//! columns `Chat, Date, Time, Name, Message`.
//!
//! Artifacts are always fully rewritten, so re-running the export against an
//! unchanged account produces identical files. A conversation that fails to
//! fetch or write is reported and skipped; the rest of the run continues.
//!
//! ## Usage
//!
//! ```sh
//! # Export from a local message archive into ./exports
//! chat-history-export --store ~/backups/messages.db
//!
//! # Export through a bridge into a custom directory, all chats in one file
//! chat-history-export ~/chats --service-url http://localhost:8080/api/ --single-file
//! ```
//!
//! Preferences can be persisted in `~/.config/chat-history-export/config.toml`.
pub mod error;
pub mod exporter;
pub mod model;
pub mod process;
pub mod records;
pub mod service;
pub mod utils;
pub mod walker;

pub use error::ExportError;
pub use process::{ExportSummary, Exporter, connect};
pub use utils::ExportConfig;

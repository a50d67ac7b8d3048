//! Newest-to-oldest pagination over one conversation's history.
use crate::error::{ExportError, Result};
use crate::model::{Conversation, MessageId, PageQuery, RawMessage};
use crate::service::ConversationService;
use indicatif::ProgressBar;
use tracing::{debug, warn};

/// Messages requested per fetch.
pub const PAGE_SIZE: usize = 1000;

/// The "fetch older than" bound for the next page of one conversation.
#[derive(Debug, Default)]
pub struct PageCursor {
    cursor: Option<MessageId>,
}

impl PageCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first non-empty page; means "start from the newest".
    pub fn current(&self) -> Option<&MessageId> {
        self.cursor.as_ref()
    }

    /// Move past a newest-first page: the cursor becomes the id of the
    /// page's oldest message, i.e. its last element. Returns whether the
    /// cursor changed.
    pub fn advance(&mut self, page: &[RawMessage]) -> bool {
        let Some(oldest) = page.last() else {
            return false;
        };
        if self.cursor.as_ref() == Some(&oldest.id) {
            return false;
        }
        self.cursor = Some(oldest.id.clone());
        true
    }
}

/// Result of walking one conversation.
#[derive(Debug)]
pub struct History {
    /// Oldest first.
    pub messages: Vec<RawMessage>,
    /// Number of fetch calls issued.
    pub fetches: usize,
}

pub struct HistoryWalker<'a> {
    service: &'a dyn ConversationService,
    page_size: usize,
}

impl<'a> HistoryWalker<'a> {
    pub fn new(service: &'a dyn ConversationService) -> Self {
        Self {
            service,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetch the whole history of `conversation`, oldest message first.
    ///
    /// Stops on an empty page, or right after a page shorter than the page
    /// size (its messages are kept). Fetch errors are returned as-is,
    /// without retrying.
    pub async fn walk(&self, conversation: &Conversation, pb: &ProgressBar) -> Result<History> {
        let title = conversation.display_title();
        let mut cursor = PageCursor::new();
        // Pages in fetch order; each one is older than everything before it.
        let mut pages: Vec<Vec<RawMessage>> = Vec::new();
        let mut fetches = 0usize;
        let mut total = 0usize;

        loop {
            let query = PageQuery {
                limit: self.page_size,
                before: cursor.current().cloned(),
            };
            debug!(
                conversation = %conversation.id,
                limit = query.limit,
                before = query.before.as_ref().map(MessageId::as_str).unwrap_or("start"),
                "Fetching page"
            );

            let page = self
                .service
                .fetch_messages(conversation, query)
                .await
                .map_err(|source| ExportError::Fetch {
                    conversation: title.clone(),
                    source,
                })?;
            fetches += 1;

            let len = page.len();
            debug!(conversation = %conversation.id, retrieved = len, "Page received");
            if len == 0 {
                break;
            }
            if len > self.page_size {
                warn!(
                    conversation = %conversation.id,
                    retrieved = len,
                    limit = self.page_size,
                    "Service returned more messages than requested"
                );
            }

            total += len;
            pb.set_message(format!("{}: {} messages", title, total));

            let moved = cursor.advance(&page);
            pages.push(page);

            if len < self.page_size {
                break;
            }
            if !moved {
                return Err(ExportError::CursorStalled {
                    conversation: title,
                    cursor: cursor.current().cloned().unwrap_or_else(|| MessageId::new("")),
                });
            }
        }

        let messages = pages
            .into_iter()
            .rev()
            .flat_map(|page| page.into_iter().rev())
            .collect();

        Ok(History { messages, fetches })
    }
}

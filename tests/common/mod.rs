//! Shared test utilities for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chat_history_export::ExportConfig;
use chat_history_export::model::{
    Conversation, ConversationId, ConversationKind, MessageId, PageQuery, RawMessage,
};
use chat_history_export::records::TimestampStyle;
use chat_history_export::service::{AuthSignal, ConversationService, ServiceError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// First message timestamp used by generated histories (2023-11-14T22:13:20Z).
pub const BASE_TS: i64 = 1_700_000_000;

/// In-memory conversation service with scripted histories.
pub struct FakeService {
    conversations: Vec<Conversation>,
    /// Oldest first.
    histories: HashMap<ConversationId, Vec<RawMessage>>,
    failing: HashSet<ConversationId>,
    ignore_cursor: bool,
    auth: Result<AuthSignal, String>,
    ready_calls: AtomicUsize,
    /// Sizes of the pages returned, per conversation, in call order.
    fetches: Mutex<HashMap<ConversationId, Vec<usize>>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            histories: HashMap::new(),
            failing: HashSet::new(),
            ignore_cursor: false,
            auth: Ok(AuthSignal::Ready),
            ready_calls: AtomicUsize::new(0),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Add a group conversation named `name` with `count` generated messages,
    /// one minute apart.
    pub fn with_conversation(self, id: &str, name: &str, count: usize) -> Self {
        let messages = (0..count)
            .map(|i| RawMessage {
                id: MessageId::new(format!("{}-{}", id, i)),
                timestamp: BASE_TS + i as i64 * 60,
                author: if i % 2 == 0 {
                    Some(format!("49170{}@c.us", i % 7))
                } else {
                    None
                },
                from_me: i % 2 == 1,
                body: format!("message {} of {}", i, name),
            })
            .collect();
        self.with_history(id, Some(name), messages)
    }

    pub fn with_history(
        mut self,
        id: &str,
        name: Option<&str>,
        messages: Vec<RawMessage>,
    ) -> Self {
        let conversation = Conversation {
            id: ConversationId::new(id),
            name: name.map(str::to_string),
            formatted_title: None,
            kind: ConversationKind::Group,
        };
        self.histories.insert(conversation.id.clone(), messages);
        self.conversations.push(conversation);
        self
    }

    /// Make every fetch for this conversation fail.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(ConversationId::new(id));
        self
    }

    /// Simulate a broken service that always returns the newest page.
    pub fn ignoring_cursor(mut self) -> Self {
        self.ignore_cursor = true;
        self
    }

    pub fn with_auth(mut self, auth: Result<AuthSignal, String>) -> Self {
        self.auth = auth;
        self
    }

    pub fn conversation(&self, id: &str) -> Conversation {
        self.conversations
            .iter()
            .find(|c| c.id.as_str() == id)
            .cloned()
            .expect("unknown conversation")
    }

    pub fn history(&self, id: &str) -> &[RawMessage] {
        &self.histories[&ConversationId::new(id)]
    }

    pub fn page_sizes(&self, id: &str) -> Vec<usize> {
        self.fetches
            .lock()
            .unwrap()
            .get(&ConversationId::new(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationService for FakeService {
    async fn authenticate(&self) -> Result<AuthSignal, ServiceError> {
        self.auth.clone().map_err(ServiceError::LoginRejected)
    }

    async fn await_ready(&self) -> Result<(), ServiceError> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ServiceError> {
        Ok(self.conversations.clone())
    }

    async fn fetch_messages(
        &self,
        conversation: &Conversation,
        query: PageQuery,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        if self.failing.contains(&conversation.id) {
            return Err(ServiceError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let history = &self.histories[&conversation.id];
        let end = match (&query.before, self.ignore_cursor) {
            (Some(before), false) => history
                .iter()
                .position(|m| &m.id == before)
                .ok_or_else(|| ServiceError::UnknownCursor(before.clone()))?,
            _ => history.len(),
        };
        let start = end.saturating_sub(query.limit);
        let page: Vec<RawMessage> = history[start..end].iter().rev().cloned().collect();

        self.fetches
            .lock()
            .unwrap()
            .entry(conversation.id.clone())
            .or_default()
            .push(page.len());
        Ok(page)
    }
}

/// Quiet config rendering timestamps in UTC so artifacts are deterministic.
pub fn test_config(target_dir: &Path) -> ExportConfig {
    let mut config = ExportConfig::new(target_dir);
    config.quiet = true;
    config.timestamps = TimestampStyle {
        utc: true,
        ..TimestampStyle::default()
    };
    config
}

/// Data rows of a written artifact (header excluded).
pub fn read_rows(path: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(path).expect("artifact missing");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("Chat,Date,Time,Name,Message"));
    lines.map(str::to_string).collect()
}

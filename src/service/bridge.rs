//! [`ConversationService`] over a messaging bridge speaking JSON over HTTP.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Method | Path                    | Response                          |
//! |--------|-------------------------|-----------------------------------|
//! | POST   | `session`               | `{status, session, login_code?}`  |
//! | GET    | `session/{token}`       | same                              |
//! | GET    | `chats`                 | `[{id, name?, formatted_title?, is_group}]` |
//! | GET    | `chats/{id}/messages`   | `[{id, timestamp, author?, from_me, body}]`, newest first |
//!
//! `messages` takes `limit` and an optional `before` query parameter.
//! Authenticated requests carry the session token in `x-session`. Once a
//! session is ready its token is stored in `session.json` and offered back
//! on the next run, so the operator only logs in once.
use super::{AuthSignal, ConversationService, ServiceError};
use crate::model::{Conversation, ConversationId, ConversationKind, PageQuery, RawMessage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const SESSION_HEADER: &str = "x-session";
const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub base_url: Url,
    /// Directory holding the persisted session token.
    pub session_dir: PathBuf,
    pub poll_interval: Duration,
    pub login_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(base_url: Url, session_dir: PathBuf) -> Self {
        Self {
            base_url,
            session_dir,
            poll_interval: Duration::from_secs(2),
            login_timeout: Duration::from_secs(180),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SessionStatus {
    Ready,
    Pending,
    Failed,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    status: SessionStatus,
    session: String,
    #[serde(default)]
    login_code: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    session: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_title: Option<String>,
    #[serde(default)]
    is_group: bool,
}

impl From<ChatDto> for Conversation {
    fn from(dto: ChatDto) -> Self {
        Conversation {
            id: ConversationId::new(dto.id),
            name: dto.name,
            formatted_title: dto.formatted_title,
            kind: if dto.is_group {
                ConversationKind::Group
            } else {
                ConversationKind::Direct
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    session: String,
}

// ── Service ───────────────────────────────────────────────────────────────────

pub struct BridgeService {
    http: reqwest::Client,
    config: BridgeConfig,
    session: Mutex<Option<String>>,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            http,
            config,
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::Protocol(format!(
                    "service URL cannot be a base: {}",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn token(&self) -> Result<String, ServiceError> {
        self.session
            .lock()
            .map_err(|_| ServiceError::Protocol("session lock poisoned".to_string()))?
            .clone()
            .ok_or(ServiceError::NotAuthenticated)
    }

    fn set_token(&self, token: &str) -> Result<(), ServiceError> {
        *self
            .session
            .lock()
            .map_err(|_| ServiceError::Protocol("session lock poisoned".to_string()))? =
            Some(token.to_string());
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.config.session_dir.join(SESSION_FILE)
    }

    /// Token persisted by a previous run. Unreadable state is ignored; the
    /// bridge will simply ask for a fresh login.
    fn load_session(&self) -> Option<String> {
        let path = self.session_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StoredSession>(&content) {
            Ok(stored) => Some(stored.session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn save_session(&self, token: &str) -> Result<(), ServiceError> {
        fs::create_dir_all(&self.config.session_dir)?;
        let json = serde_json::to_string(&StoredSession {
            session: token.to_string(),
        })
        .map_err(|e| ServiceError::Protocol(e.to_string()))?;
        fs::write(self.session_path(), json)?;
        debug!(path = %self.session_path().display(), "Session persisted");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let token = self.token()?;
        let resp = self
            .http
            .get(url)
            .header(SESSION_HEADER, token)
            .query(query)
            .send()
            .await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json::<T>().await?)
}

#[async_trait]
impl ConversationService for BridgeService {
    async fn authenticate(&self) -> Result<AuthSignal, ServiceError> {
        let stored = self.load_session();
        debug!(reusing = stored.is_some(), "Opening bridge session");

        let resp = self
            .http
            .post(self.endpoint(&["session"])?)
            .json(&SessionRequest {
                session: stored.as_deref(),
            })
            .send()
            .await?;
        let session: SessionResponse = decode(resp).await?;
        self.set_token(&session.session)?;

        match session.status {
            SessionStatus::Ready => {
                self.save_session(&session.session)?;
                Ok(AuthSignal::Ready)
            }
            SessionStatus::Pending => {
                let login_code = session.login_code.ok_or_else(|| {
                    ServiceError::Protocol("pending session without a login code".to_string())
                })?;
                Ok(AuthSignal::NeedsInteraction { login_code })
            }
            SessionStatus::Failed => Err(ServiceError::LoginRejected(
                session.reason.unwrap_or_else(|| "no reason given".to_string()),
            )),
        }
    }

    async fn await_ready(&self) -> Result<(), ServiceError> {
        let token = self.token()?;
        let url = self.endpoint(&["session", &token])?;
        let deadline = Instant::now() + self.config.login_timeout;

        loop {
            let resp = self.http.get(url.clone()).send().await?;
            let session: SessionResponse = decode(resp).await?;
            match session.status {
                SessionStatus::Ready => {
                    info!("Login completed");
                    self.set_token(&session.session)?;
                    self.save_session(&session.session)?;
                    return Ok(());
                }
                SessionStatus::Failed => {
                    return Err(ServiceError::LoginRejected(
                        session.reason.unwrap_or_else(|| "no reason given".to_string()),
                    ));
                }
                SessionStatus::Pending => {
                    if Instant::now() >= deadline {
                        return Err(ServiceError::LoginTimeout(self.config.login_timeout));
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ServiceError> {
        let chats: Vec<ChatDto> = self.get_json(self.endpoint(&["chats"])?, &[]).await?;
        Ok(chats.into_iter().map(Conversation::from).collect())
    }

    async fn fetch_messages(
        &self,
        conversation: &Conversation,
        query: PageQuery,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let url = self.endpoint(&["chats", conversation.id.as_str(), "messages"])?;
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(before) = &query.before {
            params.push(("before", before.as_str().to_string()));
        }
        self.get_json(url, &params).await
    }
}

//! Flattening of raw messages into exported rows.
use crate::model::{FlatRecord, RawMessage};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Label used for messages sent by the account owner.
pub const SELF_LABEL: &str = "Me";

/// How message timestamps are rendered into the Date and Time columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampStyle {
    pub date_format: String,
    pub time_format: String,
    /// Render in UTC instead of the local time zone.
    pub utc: bool,
}

impl Default for TimestampStyle {
    fn default() -> Self {
        Self {
            date_format: "%-m/%-d/%Y".to_string(),
            time_format: "%-I:%M:%S %p".to_string(),
            utc: false,
        }
    }
}

impl TimestampStyle {
    /// Reject strftime patterns chrono cannot render; formatting an invalid
    /// pattern panics at write time otherwise.
    pub fn validate(&self) -> Result<(), String> {
        for pattern in [&self.date_format, &self.time_format] {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(format!("invalid date/time format: {:?}", pattern));
            }
        }
        Ok(())
    }

    /// Date and time cells for a Unix timestamp in seconds. Timestamps chrono
    /// cannot represent render as empty cells.
    pub fn render(&self, timestamp: i64) -> (String, String) {
        let Some(utc) = DateTime::from_timestamp(timestamp, 0) else {
            return (String::new(), String::new());
        };
        if self.utc {
            self.format(&utc)
        } else {
            self.format(&utc.with_timezone(&Local))
        }
    }

    fn format<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> (String, String)
    where
        Tz::Offset: Display,
    {
        (
            dt.format(&self.date_format).to_string(),
            dt.format(&self.time_format).to_string(),
        )
    }
}

/// Author column: the author's user part, else `Me` for own messages, else
/// the conversation title (one-to-one chats carry no author).
pub fn author_label(message: &RawMessage, conversation_title: &str) -> String {
    message
        .author
        .as_deref()
        .and_then(|a| a.split('@').next())
        .filter(|user| !user.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if message.from_me {
                SELF_LABEL.to_string()
            } else {
                conversation_title.to_string()
            }
        })
}

/// Collapse every run of `\r`/`\n` characters into a single space.
pub fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_break = false;
    for c in body.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            in_break = false;
            out.push(c);
        }
    }
    out
}

/// Map an oldest-first message sequence to rows, preserving order.
pub fn flatten(
    conversation_title: &str,
    messages: &[RawMessage],
    style: &TimestampStyle,
) -> Vec<FlatRecord> {
    messages
        .iter()
        .map(|msg| {
            let (date, time) = style.render(msg.timestamp);
            FlatRecord {
                conversation: conversation_title.to_string(),
                date,
                time,
                author: author_label(msg, conversation_title),
                body: normalize_body(&msg.body),
            }
        })
        .collect()
}

//! Entity types shared across slices
//!
//! These mirror the Mastodon REST entities closely enough to deserialize API
//! responses directly. Only the fields the client reads are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identity and display semantics used by pagination and list reconciliation.
pub trait Entity: Clone {
    /// Stable identity key.
    fn id(&self) -> &str;

    /// Whether a rendered row for `self` can be kept as-is for `other`.
    ///
    /// Defaults to identity equality.
    fn display_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
}

impl Entity for Account {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.display_name == other.display_name
            && self.note == other.note
            && self.followers_count == other.followers_count
            && self.following_count == other.following_count
            && self.statuses_count == other.statuses_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub account: Account,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub reblog: Option<Box<Status>>,
    #[serde(default)]
    pub favourited: Option<bool>,
    #[serde(default)]
    pub reblogged: Option<bool>,
    #[serde(default)]
    pub favourites_count: u64,
    #[serde(default)]
    pub reblogs_count: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Status {
    /// The status whose content is shown: the boosted one for reblogs.
    pub fn display_status(&self) -> &Status {
        self.reblog.as_deref().unwrap_or(self)
    }

    pub fn is_favourited(&self) -> bool {
        self.favourited.unwrap_or(false)
    }

    pub fn is_reblogged(&self) -> bool {
        self.reblogged.unwrap_or(false)
    }

    /// Content warning text, if the author set one.
    pub fn warning(&self) -> Option<&str> {
        let text = self.display_status().spoiler_text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Replace this status, or the status it boosts, when the ids match.
    ///
    /// Returns `None` when neither matches.
    pub fn with_replaced(&self, updated: &Status) -> Option<Status> {
        if self.id == updated.id {
            return Some(updated.clone());
        }
        match &self.reblog {
            Some(inner) if inner.id == updated.id => Some(Status {
                reblog: Some(Box::new(updated.clone())),
                ..self.clone()
            }),
            _ => None,
        }
    }
}

impl Entity for Status {
    fn id(&self) -> &str {
        &self.id
    }

    /// Equal when the flags and the text a row shows are the same.
    fn display_eq(&self, other: &Self) -> bool {
        let shown = |s: &Status| {
            (
                s.favourited,
                s.reblogged,
                s.content.clone(),
                s.spoiler_text.clone(),
            )
        };
        self.id == other.id
            && shown(self) == shown(other)
            && self.reblog.as_deref().map(shown) == other.reblog.as_deref().map(shown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Reblog,
    Favourite,
    Follow,
    FollowRequest,
    Poll,
    Status,
    Update,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub account: Account,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Entity for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_eq(&self, other: &Self) -> bool {
        self.id == other.id
            && match (&self.status, &other.status) {
                (Some(a), Some(b)) => a.display_eq(b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// Order two Mastodon ids.
///
/// Ids are decimal snowflakes of varying length, so a longer id is newer.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

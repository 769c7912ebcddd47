//! Cursor pagination shared by every paged list
//!
//! A paged list is a [`PaginatingData`] value owned by a slice. The reducer
//! asks it to [`begin`](PaginatingData::begin) a fetch, which yields the
//! request descriptor handed to the remote collaborator, and later folds the
//! response in with [`complete`](PaginatingData::complete) or
//! [`fail`](PaginatingData::fail). Every transition returns a new value.
//!
//! Merge rules per direction:
//!
//! - `Reload` replaces the collection and both cursors.
//! - `Older` appends unseen items and updates only `next`.
//! - `Newer` prepends unseen items and updates only `previous`.
//!
//! A missing cursor means the list is exhausted in that direction. Fetching an
//! exhausted direction issues no request until a reload brings a cursor back.
//!
//! Every request carries a [`RequestId`] allocated by the caller. Responses
//! and failures are folded in only when they answer the request currently in
//! flight, so a late answer to a superseded request never lands.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::Entity;

pub const DEFAULT_STATUS_PAGE_SIZE: usize = 40;
pub const DEFAULT_ACCOUNT_PAGE_SIZE: usize = 80;
pub const DEFAULT_NOTIFICATION_PAGE_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Reload,
    Older,
    Newer,
}

/// Opaque page tokens for both directions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageCursor {
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl PageCursor {
    pub fn new(next: Option<&str>, previous: Option<&str>) -> Self {
        Self {
            next: next.map(str::to_string),
            previous: previous.map(str::to_string),
        }
    }

    /// Token to use for `direction`, `None` for reloads and exhausted sides.
    pub fn token_for(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Reload => None,
            Direction::Older => self.next.as_deref(),
            Direction::Newer => self.previous.as_deref(),
        }
    }
}

/// Page sizes per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSizes {
    pub statuses: usize,
    pub accounts: usize,
    pub notifications: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            statuses: DEFAULT_STATUS_PAGE_SIZE,
            accounts: DEFAULT_ACCOUNT_PAGE_SIZE,
            notifications: DEFAULT_NOTIFICATION_PAGE_SIZE,
        }
    }
}

/// Identifies one page request. Unique for the lifetime of a store.
pub type RequestId = u64;

/// Request descriptor for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub id: RequestId,
    pub direction: Direction,
    /// `next` token for older pages, `previous` token for newer pages
    pub cursor: Option<String>,
    pub limit: usize,
}

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: PageCursor,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: PageCursor) -> Self {
        Self { items, cursor }
    }
}

/// Cursor to send for `direction`: `Some(None)` for a reload, `None` when
/// there is nothing to fetch.
pub fn plan(direction: Direction, cursor: &PageCursor) -> Option<Option<String>> {
    match direction {
        Direction::Reload => Some(None),
        Direction::Older | Direction::Newer => cursor
            .token_for(direction)
            .map(|token| Some(token.to_string())),
    }
}

/// Combine a fetched page with the existing collection.
///
/// Items keep their first-seen position; an id already present is skipped.
pub fn merge<T: Entity>(direction: Direction, existing: Vec<T>, fetched: Vec<T>) -> Vec<T> {
    match direction {
        Direction::Reload => dedup(fetched),
        Direction::Older => union(existing, fetched),
        Direction::Newer => {
            let seen: HashSet<String> = existing.iter().map(|e| e.id().to_string()).collect();
            let mut merged: Vec<T> = dedup(fetched)
                .into_iter()
                .filter(|item| !seen.contains(item.id()))
                .collect();
            merged.extend(existing);
            merged
        }
    }
}

fn union<T: Entity>(existing: Vec<T>, fetched: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<String> = existing.iter().map(|e| e.id().to_string()).collect();
    let mut merged = existing;
    for item in fetched {
        if seen.insert(item.id().to_string()) {
            merged.push(item);
        }
    }
    merged
}

fn dedup<T: Entity>(items: Vec<T>) -> Vec<T> {
    union(Vec::new(), items)
}

/// Apply the direction-scoped cursor policy.
pub fn update_cursor(direction: Direction, current: &PageCursor, received: &PageCursor) -> PageCursor {
    match direction {
        Direction::Reload => received.clone(),
        Direction::Older => PageCursor {
            next: received.next.clone(),
            previous: current.previous.clone(),
        },
        Direction::Newer => PageCursor {
            next: current.next.clone(),
            previous: received.previous.clone(),
        },
    }
}

/// The request a list is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub id: RequestId,
    pub direction: Direction,
}

/// A paged collection with its cursors and in-flight marker.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatingData<T> {
    pub items: Vec<T>,
    pub cursor: PageCursor,
    pub in_flight: Option<InFlight>,
}

impl<T> Default for PaginatingData<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: PageCursor::default(),
            in_flight: None,
        }
    }
}

impl<T: Entity> PaginatingData<T> {
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a fetch in `direction` would issue a request right now.
    pub fn can_fetch(&self, direction: Direction) -> bool {
        self.in_flight.is_none() && plan(direction, &self.cursor).is_some()
    }

    /// Whether `request` is the one this list is waiting for.
    pub fn awaits(&self, request: RequestId) -> bool {
        self.in_flight.is_some_and(|current| current.id == request)
    }

    /// Start a fetch.
    ///
    /// Returns the unchanged state and no request when another fetch for this
    /// list is in flight or when `direction` is exhausted. `allocate` is only
    /// called when a request is actually issued.
    pub fn begin(
        self,
        direction: Direction,
        limit: usize,
        allocate: impl FnOnce() -> RequestId,
    ) -> (Self, Option<PageRequest>) {
        if let Some(current) = self.in_flight {
            tracing::debug!(?direction, ?current, "fetch rejected, request already in flight");
            return (self, None);
        }
        let Some(cursor) = plan(direction, &self.cursor) else {
            tracing::debug!(?direction, "fetch skipped, no cursor in that direction");
            return (self, None);
        };
        let id = allocate();
        (
            Self {
                in_flight: Some(InFlight { id, direction }),
                ..self
            },
            Some(PageRequest {
                id,
                direction,
                cursor,
                limit,
            }),
        )
    }

    /// Fold in the response to `request`.
    ///
    /// Dropped unless `request` is the one in flight.
    pub fn complete(self, request: RequestId, page: Page<T>) -> Self {
        let Some(current) = self.in_flight.filter(|current| current.id == request) else {
            tracing::debug!(
                request,
                in_flight = ?self.in_flight,
                "dropping completion without a matching request"
            );
            return self;
        };
        let direction = current.direction;
        Self {
            cursor: update_cursor(direction, &self.cursor, &page.cursor),
            items: merge(direction, self.items, page.items),
            in_flight: None,
        }
    }

    /// Record that `request` failed; items and cursors stay as they were.
    pub fn fail(self, request: RequestId) -> Self {
        if !self.awaits(request) {
            tracing::debug!(request, "ignoring failure of a superseded request");
            return self;
        }
        Self {
            in_flight: None,
            ..self
        }
    }

    pub fn retain(self, keep: impl Fn(&T) -> bool) -> Self {
        Self {
            items: self.items.into_iter().filter(|item| keep(item)).collect(),
            ..self
        }
    }

    /// Map every item, e.g. to swap in an updated entity.
    pub fn map_items(self, f: impl Fn(T) -> T) -> Self {
        Self {
            items: self.items.into_iter().map(f).collect(),
            ..self
        }
    }

    /// Swap in `item` wherever an item with the same id sits.
    pub fn replace_item(self, item: &T) -> Self {
        self.map_items(|existing| {
            if existing.id() == item.id() {
                item.clone()
            } else {
                existing
            }
        })
    }
}

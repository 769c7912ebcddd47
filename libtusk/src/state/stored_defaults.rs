//! Display preferences kept for the session
//!
//! Seeded from configuration at startup and never written back.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::actions::{Action, Feed, StoredDefaultsAction};
use crate::config::Config;
use crate::pagination::PageSizes;
use crate::types::{compare_ids, Status};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDefaults {
    pub hide_content_warnings: bool,
    /// Statuses whose content warning the user opened
    pub revealed: BTreeSet<String>,
    pub last_seen: BTreeMap<Feed, String>,
    pub page_sizes: PageSizes,
}

impl Default for StoredDefaults {
    fn default() -> Self {
        Self {
            hide_content_warnings: true,
            revealed: BTreeSet::new(),
            last_seen: BTreeMap::new(),
            page_sizes: PageSizes::default(),
        }
    }
}

impl StoredDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hide_content_warnings: config.display.hide_content_warnings,
            page_sizes: config.paging,
            ..Self::default()
        }
    }

    /// Whether the content of `status` stays behind its warning.
    pub fn is_suppressed(&self, status: &Status) -> bool {
        let shown = status.display_status();
        self.hide_content_warnings && shown.warning().is_some() && !self.revealed.contains(&shown.id)
    }

    pub fn last_seen(&self, feed: Feed) -> Option<&str> {
        self.last_seen.get(&feed).map(String::as_str)
    }
}

pub fn reduce(mut state: StoredDefaults, action: &Action) -> StoredDefaults {
    let Action::StoredDefaults(action) = action else {
        return state;
    };
    match action {
        StoredDefaultsAction::SetHideContentWarnings(hide) => state.hide_content_warnings = *hide,
        StoredDefaultsAction::Reveal(id) => {
            state.revealed.insert(id.clone());
        }
        StoredDefaultsAction::Conceal(id) => {
            state.revealed.remove(id);
        }
        StoredDefaultsAction::MarkSeen { feed, status_id } => {
            let newer = state
                .last_seen(*feed)
                .map_or(true, |seen| compare_ids(status_id, seen) == Ordering::Greater);
            if newer {
                state.last_seen.insert(*feed, status_id.clone());
            }
        }
    }
    state
}

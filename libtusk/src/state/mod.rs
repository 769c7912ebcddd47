//! Root state and the fold
//!
//! [`RootState`] is an immutable aggregate of slices. [`RootState::reduce`]
//! runs every slice reducer in a fixed order; each one receives the action,
//! its own previous slice and a [`Context`] giving read access to the whole
//! previous root plus a sink for effects. Reducers are total: an action a
//! slice does not care about returns the slice unchanged.

use crate::actions::Action;
use crate::config::Config;
use crate::effects::Effect;
use crate::pagination::{PageSizes, PaginatingData, RequestId};
use crate::remote::Session;
use crate::types::{Notification, Status};

pub mod account;
pub mod auth;
pub mod errors;
pub mod feeds;
pub mod notifications;
mod paged;
pub mod status_update;
pub mod stored_defaults;

pub use account::{AccountState, AccountsState};
pub use auth::{AuthPhase, AuthState};
pub use errors::ErrorsState;
pub use status_update::{PendingUpdate, StatusUpdateState};
pub use stored_defaults::StoredDefaults;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootState {
    pub auth: AuthState,
    pub accounts: AccountsState,
    /// Home timeline
    pub timeline: PaginatingData<Status>,
    pub favourites: PaginatingData<Status>,
    pub notifications: PaginatingData<Notification>,
    pub status_update: StatusUpdateState,
    pub stored_defaults: StoredDefaults,
    pub errors: ErrorsState,
    /// Last page request id handed out. Survives `ResetRoot`, so answers to
    /// requests issued before a reset can never match a request issued after.
    pub last_request: RequestId,
}

impl RootState {
    /// Initial state with preferences seeded from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            stored_defaults: StoredDefaults::from_config(config),
            ..Self::default()
        }
    }

    /// Fold `action` into a new root, pushing scheduled effects into `effects`.
    pub fn reduce(&self, action: &Action, effects: &mut Vec<Effect>) -> RootState {
        if let Action::ResetRoot = action {
            tracing::debug!("rebuilding content slices");
            return RootState {
                auth: self.auth.clone(),
                stored_defaults: self.stored_defaults.clone(),
                errors: self.errors.clone(),
                last_request: self.last_request,
                ..RootState::default()
            };
        }

        let mut ctx = Context::new(self, effects);
        let auth = auth::reduce(self.auth.clone(), action, &mut ctx);
        let accounts = account::reduce(self.accounts.clone(), action, &mut ctx);
        let timeline = feeds::reduce_timeline(self.timeline.clone(), action, &mut ctx);
        let favourites = feeds::reduce_favourites(self.favourites.clone(), action, &mut ctx);
        let notifications = notifications::reduce(self.notifications.clone(), action, &mut ctx);
        let status_update = status_update::reduce(self.status_update.clone(), action, &mut ctx);
        let stored_defaults = stored_defaults::reduce(self.stored_defaults.clone(), action);
        let errors = errors::reduce(self.errors.clone(), action);
        let last_request = ctx.last_request;

        RootState {
            auth,
            accounts,
            timeline,
            favourites,
            notifications,
            status_update,
            stored_defaults,
            errors,
            last_request,
        }
    }
}

/// What a reducer may see and do besides computing its slice.
pub struct Context<'a> {
    root: &'a RootState,
    effects: &'a mut Vec<Effect>,
    last_request: RequestId,
}

impl<'a> Context<'a> {
    pub fn new(root: &'a RootState, effects: &'a mut Vec<Effect>) -> Self {
        Self {
            root,
            effects,
            last_request: root.last_request,
        }
    }

    /// The root as it was before this fold.
    pub fn previous(&self) -> &RootState {
        self.root
    }

    pub fn session(&self) -> Option<Session> {
        self.root.auth.session()
    }

    pub fn page_sizes(&self) -> PageSizes {
        self.root.stored_defaults.page_sizes
    }

    /// A fresh page request id.
    pub fn allocate_request(&mut self) -> RequestId {
        self.last_request += 1;
        self.last_request
    }

    pub fn schedule(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Queue `action` to fold after the current one.
    pub fn dispatch(&mut self, action: Action) {
        self.schedule(Effect::Dispatch(action));
    }
}

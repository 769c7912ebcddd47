//! Client facade
//!
//! [`TuskClient`] wires a [`Store`] to the production effect runner and offers
//! request/response style operations on top of it, for front ends that do
//! not want to drive the store themselves. Each operation dispatches one
//! action, folds until the store is idle and reports the failures that
//! concern it.
//!
//! # Example
//!
//! ```no_run
//! use libtusk::client::TuskClient;
//! use libtusk::pagination::Direction;
//!
//! # async fn example() -> libtusk::Result<()> {
//! let mut client = TuskClient::new()?;
//! if client.restore(None).await? {
//!     client.fetch_timeline(Direction::Older).await?;
//!     for status in &client.state().timeline.items {
//!         println!("{}: {}", status.account.acct, status.display_status().content);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::actions::{
    AccountAction, AccountContext, Action, AuthAction, ErrorKind, ErrorReport, Origin, PageAction,
    PageTarget, StatusUpdateAction,
};
use crate::config::Config;
use crate::credentials::AccountVault;
use crate::effects::EffectRunner;
use crate::error::{RemoteError, Result, TuskError};
use crate::pagination::Direction;
use crate::remote::http::MastodonClient;
use crate::remote::RemoteClient;
use crate::state::RootState;
use crate::store::Store;
use crate::types::Status;

pub struct TuskClient {
    config: Config,
    store: Store,
}

impl TuskClient {
    /// Client for the configuration at the default location.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Client talking to Mastodon over HTTP with credentials from the
    /// configured backend.
    pub fn from_config(config: Config) -> Result<Self> {
        let remote = MastodonClient::new(&config.instance)?;
        let vault = AccountVault::from_config(&config.credentials);
        tracing::debug!(backend = vault.backend_name(), "credential storage ready");
        Ok(Self::with_remote(config, Arc::new(remote), vault))
    }

    pub fn with_remote(config: Config, remote: Arc<dyn RemoteClient>, vault: AccountVault) -> Self {
        let store = Store::with_effects(
            RootState::from_config(&config),
            EffectRunner::new(remote, vault),
        );
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &RootState {
        self.store.state()
    }

    /// Direct access for subscriptions and custom actions.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Dispatch `action`, fold until idle and return the errors it caused.
    pub async fn run(&mut self, action: Action) -> Vec<ErrorReport> {
        let before = self.state().errors.reported;
        self.store.dispatch(action);
        self.store.run_until_idle().await;
        self.state().errors.since(before).to_vec()
    }

    /// Log in with a stored account.
    ///
    /// Returns `false` when no account is stored. Feed failures during the
    /// initial load are logged, not returned.
    pub async fn restore(&mut self, account_key: Option<String>) -> Result<bool> {
        let reports = self
            .run(Action::Auth(AuthAction::LoadStored { account_key }))
            .await;
        first_failure(&reports, |r| {
            matches!(r.origin, Origin::Auth | Origin::Credentials) || is_fatal(r)
        })?;
        Ok(self.state().auth.is_logged_in())
    }

    /// Register with `instance` and return the URL the user must open.
    pub async fn begin_login(&mut self, instance: &str) -> Result<String> {
        if instance.trim().is_empty() {
            return Err(TuskError::InvalidInput("Instance host must not be empty".to_string()));
        }
        let reports = self
            .run(Action::Auth(AuthAction::ChooseInstance(instance.to_string())))
            .await;
        first_failure(&reports, |r| r.origin == Origin::Auth)?;
        self.state()
            .auth
            .authorization_url()
            .map(str::to_string)
            .ok_or_else(|| TuskError::InvalidInput(format!("Cannot log in to {} right now", instance)))
    }

    /// Exchange the code the user got after authorizing.
    pub async fn complete_login(&mut self, code: &str) -> Result<()> {
        let reports = self
            .run(Action::Auth(AuthAction::AuthorizationCode(code.to_string())))
            .await;
        first_failure(&reports, |r| {
            matches!(r.origin, Origin::Auth | Origin::Credentials) || is_fatal(r)
        })?;
        if self.state().auth.is_logged_in() {
            Ok(())
        } else {
            Err(TuskError::InvalidInput("No login in progress".to_string()))
        }
    }

    /// Clear the session and every stored credential.
    pub async fn logout(&mut self) -> Result<()> {
        let reports = self.run(Action::Auth(AuthAction::ClearAuth)).await;
        first_failure(&reports, |r| r.origin == Origin::Credentials)
    }

    pub async fn fetch_timeline(&mut self, direction: Direction) -> Result<()> {
        self.fetch(PageTarget::Timeline, direction).await
    }

    pub async fn fetch_favourites(&mut self, direction: Direction) -> Result<()> {
        self.fetch(PageTarget::Favourites, direction).await
    }

    pub async fn fetch_notifications(&mut self, direction: Direction) -> Result<()> {
        self.fetch(PageTarget::Notifications, direction).await
    }

    /// Page any list.
    ///
    /// Account lists must belong to a loaded account, see [`Self::open_profile`].
    pub async fn fetch(&mut self, target: PageTarget, direction: Direction) -> Result<()> {
        let fetch = PageAction::Fetch(direction);
        let action = match &target {
            PageTarget::Timeline => Action::Timeline(fetch),
            PageTarget::Favourites => Action::Favourites(fetch),
            PageTarget::Notifications => Action::Notifications(PageAction::Fetch(direction)),
            PageTarget::AccountStatuses(context) => account(context, AccountAction::Statuses(fetch)),
            PageTarget::Followers(context) => {
                account(context, AccountAction::Followers(PageAction::Fetch(direction)))
            }
            PageTarget::Following(context) => {
                account(context, AccountAction::Following(PageAction::Fetch(direction)))
            }
        };
        let reports = self.run(action).await;
        first_failure(&reports, |r| r.is_for(&target) || is_fatal(r))
    }

    /// Load a profile and its lists; `None` loads the logged-in account.
    pub async fn open_profile(&mut self, account_id: Option<&str>) -> Result<AccountContext> {
        let context = match account_id {
            Some(id) => AccountContext::Profile(id.to_string()),
            None => AccountContext::Active,
        };
        let reports = self.run(account(&context, AccountAction::Poll)).await;
        first_failure(&reports, |r| r.origin == Origin::Account(context.clone()) || is_fatal(r))?;

        let bound = self
            .state()
            .accounts
            .get(&context)
            .is_some_and(|entry| entry.account.is_some());
        if bound {
            Ok(context)
        } else {
            Err(TuskError::InvalidInput("Not logged in".to_string()))
        }
    }

    /// Find a loaded status by id, in any list.
    pub fn find_status(&self, status_id: &str) -> Option<Status> {
        let state = self.state();
        let accounts = state
            .accounts
            .contexts
            .values()
            .flat_map(|entry| entry.statuses.items.iter().chain(entry.pinned.iter()));
        state
            .timeline
            .items
            .iter()
            .chain(state.favourites.items.iter())
            .chain(state.notifications.items.iter().filter_map(|n| n.status.as_ref()))
            .chain(accounts)
            .find(|status| status.id == status_id || status.display_status().id == status_id)
            .cloned()
    }

    /// Flip the favourite flag of a loaded status and return the result.
    pub async fn toggle_favourite(&mut self, status_id: &str) -> Result<Status> {
        let status = self.loaded_status(status_id)?;
        self.update(StatusUpdateAction::ToggleFavourite(status), status_id).await
    }

    /// Flip the boost flag of a loaded status and return the result.
    pub async fn toggle_reblog(&mut self, status_id: &str) -> Result<Status> {
        let status = self.loaded_status(status_id)?;
        self.update(StatusUpdateAction::ToggleReblog(status), status_id).await
    }

    fn loaded_status(&self, status_id: &str) -> Result<Status> {
        self.find_status(status_id)
            .ok_or_else(|| TuskError::InvalidInput(format!("Status {} is not loaded", status_id)))
    }

    async fn update(&mut self, action: StatusUpdateAction, status_id: &str) -> Result<Status> {
        let reports = self.run(Action::StatusUpdate(action)).await;
        first_failure(&reports, |r| matches!(r.origin, Origin::StatusUpdate(_)) || is_fatal(r))?;
        self.loaded_status(status_id)
    }
}

fn account(context: &AccountContext, action: AccountAction) -> Action {
    Action::Account {
        context: context.clone(),
        action,
    }
}

fn is_fatal(report: &ErrorReport) -> bool {
    report.kind == ErrorKind::Authentication
}

/// Fail with the first report `relevant` accepts; log the rest.
fn first_failure(reports: &[ErrorReport], relevant: impl Fn(&ErrorReport) -> bool) -> Result<()> {
    let mut failure = None;
    for report in reports {
        if failure.is_none() && relevant(report) {
            failure = Some(report);
        } else {
            tracing::warn!(origin = ?report.origin, "{}", report.message);
        }
    }
    match failure {
        Some(report) => Err(report_error(report)),
        None => Ok(()),
    }
}

/// Turn a folded error report back into a returnable error.
pub fn report_error(report: &ErrorReport) -> TuskError {
    let message = report.message.clone();
    match report.kind {
        ErrorKind::Authentication => TuskError::Remote(RemoteError::Authentication(message)),
        ErrorKind::Network => TuskError::Remote(RemoteError::Network(message)),
        ErrorKind::Rejected => TuskError::Remote(RemoteError::Validation(message)),
        ErrorKind::Storage => TuskError::Storage(message),
    }
}

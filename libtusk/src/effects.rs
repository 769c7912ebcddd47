//! Side effects scheduled by reducers
//!
//! Reducers never perform I/O. They push [`Effect`] values into the fold
//! context; once the fold is complete and subscribers have been notified, the
//! store hands every effect to its [`EffectHandler`]. [`EffectRunner`] is the
//! production handler: remote calls run as tokio tasks and finish by
//! dispatching a result action (or an [`Action::Error`]) through the store's
//! [`Dispatcher`], so their outcome is folded like any other action.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::actions::{
    AccountAction, AccountContext, Action, AuthAction, ErrorKind, ErrorReport, Origin, PageAction,
    PageTarget, StatusUpdateAction,
};
use crate::credentials::AccountVault;
use crate::error::CredentialError;
use crate::pagination::{Page, PageRequest, RequestId};
use crate::remote::{
    AccountSource, AppRegistration, RemoteClient, Session, StatusChange, StatusSource,
};
use crate::store::Dispatcher;
use crate::types::{Account, Status};

/// Where a fetched page of statuses lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTarget {
    Timeline,
    Favourites,
    Account(AccountContext),
}

impl StatusTarget {
    pub fn page_target(&self) -> PageTarget {
        match self {
            StatusTarget::Timeline => PageTarget::Timeline,
            StatusTarget::Favourites => PageTarget::Favourites,
            StatusTarget::Account(context) => PageTarget::AccountStatuses(context.clone()),
        }
    }

    fn loaded(self, request: RequestId, page: Page<Status>) -> Action {
        let page = PageAction::Loaded { request, page };
        match self {
            StatusTarget::Timeline => Action::Timeline(page),
            StatusTarget::Favourites => Action::Favourites(page),
            StatusTarget::Account(context) => Action::Account {
                context,
                action: AccountAction::Statuses(page),
            },
        }
    }
}

/// Where a fetched page of accounts lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountListTarget {
    Followers(AccountContext),
    Following(AccountContext),
}

impl AccountListTarget {
    pub fn page_target(&self) -> PageTarget {
        match self {
            AccountListTarget::Followers(context) => PageTarget::Followers(context.clone()),
            AccountListTarget::Following(context) => PageTarget::Following(context.clone()),
        }
    }

    fn loaded(self, request: RequestId, page: Page<Account>) -> Action {
        let page = PageAction::Loaded { request, page };
        match self {
            AccountListTarget::Followers(context) => Action::Account {
                context,
                action: AccountAction::Followers(page),
            },
            AccountListTarget::Following(context) => Action::Account {
                context,
                action: AccountAction::Following(page),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Queue a follow-up action; it folds after the current fold.
    Dispatch(Action),
    RegisterApp {
        instance: String,
    },
    BuildAuthorizationUrl {
        instance: String,
        app: AppRegistration,
    },
    ExchangeCode {
        instance: String,
        app: AppRegistration,
        code: String,
    },
    PersistCredentials {
        token: String,
        instance: String,
    },
    PurgeCredentials,
    LoadCredentials {
        account_key: Option<String>,
    },
    FetchStatuses {
        session: Session,
        source: StatusSource,
        request: PageRequest,
        target: StatusTarget,
    },
    FetchAccounts {
        session: Session,
        source: AccountSource,
        request: PageRequest,
        target: AccountListTarget,
    },
    FetchNotifications {
        session: Session,
        request: PageRequest,
    },
    FetchAccount {
        session: Session,
        context: AccountContext,
    },
    FetchPinned {
        session: Session,
        context: AccountContext,
        account_id: String,
        limit: usize,
    },
    UpdateStatus {
        session: Session,
        update_id: u64,
        status_id: String,
        change: StatusChange,
    },
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Dispatch(_) => "dispatch",
            Effect::RegisterApp { .. } => "register_app",
            Effect::BuildAuthorizationUrl { .. } => "build_authorization_url",
            Effect::ExchangeCode { .. } => "exchange_code",
            Effect::PersistCredentials { .. } => "persist_credentials",
            Effect::PurgeCredentials => "purge_credentials",
            Effect::LoadCredentials { .. } => "load_credentials",
            Effect::FetchStatuses { .. } => "fetch_statuses",
            Effect::FetchAccounts { .. } => "fetch_accounts",
            Effect::FetchNotifications { .. } => "fetch_notifications",
            Effect::FetchAccount { .. } => "fetch_account",
            Effect::FetchPinned { .. } => "fetch_pinned",
            Effect::UpdateStatus { .. } => "update_status",
        }
    }
}

/// Executes effects on behalf of the store.
///
/// `Effect::Dispatch` never reaches a handler; the store queues those itself.
pub trait EffectHandler {
    fn handle(&mut self, effect: Effect, dispatcher: &Dispatcher);
}

/// Handler that logs and discards every effect.
#[derive(Debug, Default)]
pub struct NoEffects;

impl EffectHandler for NoEffects {
    fn handle(&mut self, effect: Effect, _dispatcher: &Dispatcher) {
        tracing::debug!(effect = effect.kind(), "effect discarded");
    }
}

/// Production handler backed by a remote client and the credential vault.
pub struct EffectRunner {
    remote: Arc<dyn RemoteClient>,
    vault: AccountVault,
}

impl EffectRunner {
    pub fn new(remote: Arc<dyn RemoteClient>, vault: AccountVault) -> Self {
        Self { remote, vault }
    }

    /// Run `task` in the background and dispatch the action it yields.
    ///
    /// The task counts as in flight on the dispatcher until its action has
    /// been queued.
    fn spawn<F>(&self, dispatcher: &Dispatcher, origin: Origin, task: F)
    where
        F: Future<Output = Action> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            tracing::error!(?origin, "no tokio runtime, remote call dropped");
            dispatcher.dispatch(Action::Error(ErrorReport {
                kind: ErrorKind::Network,
                message: "No async runtime available for remote call".to_string(),
                origin,
            }));
            return;
        };

        let guard = dispatcher.track();
        let dispatcher = dispatcher.clone();
        handle.spawn(async move {
            let action = task.await;
            dispatcher.dispatch(action);
            drop(guard);
        });
    }

    fn load_credentials(&self, account_key: Option<String>) -> Result<Option<Action>, CredentialError> {
        let account_key = match account_key {
            Some(key) => key,
            None => match self.vault.accounts()?.into_iter().next() {
                Some(key) => key,
                None => {
                    tracing::info!("No stored accounts");
                    return Ok(None);
                }
            },
        };

        match self.vault.get(&account_key)?.complete() {
            Some((token, instance)) => Ok(Some(Action::Auth(AuthAction::Restored {
                account_key,
                token,
                instance,
            }))),
            None => Err(CredentialError::NotFound(format!("{}.token", account_key))),
        }
    }
}

fn remote_failure(error: &crate::error::RemoteError, origin: Origin) -> Action {
    tracing::warn!(?origin, "{}", error);
    Action::Error(ErrorReport::remote(error, origin))
}

fn storage_failure(error: &CredentialError) -> Action {
    tracing::warn!("Credential storage: {}", error);
    Action::Error(ErrorReport::storage(error))
}

impl EffectHandler for EffectRunner {
    fn handle(&mut self, effect: Effect, dispatcher: &Dispatcher) {
        tracing::debug!(effect = effect.kind(), "running effect");
        let remote = Arc::clone(&self.remote);

        match effect {
            Effect::Dispatch(action) => dispatcher.dispatch(action),

            Effect::RegisterApp { instance } => self.spawn(dispatcher, Origin::Auth, async move {
                match remote.register_app(&instance).await {
                    Ok(app) => Action::Auth(AuthAction::AppRegistered { instance, app }),
                    Err(e) => remote_failure(&e, Origin::Auth),
                }
            }),

            Effect::BuildAuthorizationUrl { instance, app } => {
                let action = match remote.authorization_url(&instance, &app) {
                    Ok(url) => Action::Auth(AuthAction::AuthorizationUrlReady(url)),
                    Err(e) => remote_failure(&e, Origin::Auth),
                };
                dispatcher.dispatch(action);
            }

            Effect::ExchangeCode {
                instance,
                app,
                code,
            } => self.spawn(dispatcher, Origin::Auth, async move {
                match remote.exchange_code(&instance, &app, &code).await {
                    Ok(token) => Action::Auth(AuthAction::TokenObtained { token }),
                    Err(e) => remote_failure(&e, Origin::Auth),
                }
            }),

            Effect::PersistCredentials { token, instance } => {
                let action = match self.vault.add(&token, &instance) {
                    Ok(account_key) => Action::Auth(AuthAction::CredentialsStored { account_key }),
                    Err(e) => storage_failure(&e),
                };
                dispatcher.dispatch(action);
            }

            Effect::PurgeCredentials => {
                if let Err(e) = self.vault.remove_all() {
                    dispatcher.dispatch(storage_failure(&e));
                }
            }

            Effect::LoadCredentials { account_key } => match self.load_credentials(account_key) {
                Ok(Some(action)) => dispatcher.dispatch(action),
                Ok(None) => {}
                Err(e) => dispatcher.dispatch(storage_failure(&e)),
            },

            Effect::FetchStatuses {
                session,
                source,
                request,
                target,
            } => {
                let origin = Origin::Page {
                    target: target.page_target(),
                    request: request.id,
                };
                self.spawn(dispatcher, origin.clone(), async move {
                    match remote.fetch_statuses(&session, &source, &request).await {
                        Ok(page) => target.loaded(request.id, page),
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }

            Effect::FetchAccounts {
                session,
                source,
                request,
                target,
            } => {
                let origin = Origin::Page {
                    target: target.page_target(),
                    request: request.id,
                };
                self.spawn(dispatcher, origin.clone(), async move {
                    match remote.fetch_accounts(&session, &source, &request).await {
                        Ok(page) => target.loaded(request.id, page),
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }

            Effect::FetchNotifications { session, request } => {
                let origin = Origin::Page {
                    target: PageTarget::Notifications,
                    request: request.id,
                };
                self.spawn(dispatcher, origin.clone(), async move {
                    match remote.fetch_notifications(&session, &request).await {
                        Ok(page) => Action::Notifications(PageAction::Loaded {
                            request: request.id,
                            page,
                        }),
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }

            Effect::FetchAccount { session, context } => {
                let origin = Origin::Account(context.clone());
                self.spawn(dispatcher, origin.clone(), async move {
                    let result = match &context {
                        AccountContext::Active => remote.verify_credentials(&session).await,
                        AccountContext::Profile(id) => remote.fetch_account(&session, id).await,
                    };
                    match result {
                        Ok(account) => Action::Account {
                            context,
                            action: AccountAction::Loaded(account),
                        },
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }

            Effect::FetchPinned {
                session,
                context,
                account_id,
                limit,
            } => {
                let origin = Origin::Account(context.clone());
                self.spawn(dispatcher, origin.clone(), async move {
                    match remote.fetch_pinned(&session, &account_id, limit).await {
                        Ok(statuses) => Action::Account {
                            context,
                            action: AccountAction::PinnedLoaded(statuses),
                        },
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }

            Effect::UpdateStatus {
                session,
                update_id,
                status_id,
                change,
            } => {
                let origin = Origin::StatusUpdate(update_id);
                self.spawn(dispatcher, origin.clone(), async move {
                    match remote.update_status(&session, &status_id, change).await {
                        Ok(status) => {
                            Action::StatusUpdate(StatusUpdateAction::Applied { update_id, status })
                        }
                        Err(e) => remote_failure(&e, origin),
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryStore;
    use crate::error::RemoteError;
    use crate::pagination::{Direction, PageCursor};
    use crate::remote::mock::{status, MockRemote};
    use crate::store::Store;
    use crate::state::RootState;

    fn session() -> Session {
        Session::new("example.social", "token")
    }

    fn runner(remote: Arc<MockRemote>) -> (EffectRunner, AccountVault) {
        let vault = AccountVault::new(Arc::new(MemoryStore::new()));
        (EffectRunner::new(remote, vault.clone()), vault)
    }

    /// Run one effect and collect what it dispatched.
    async fn run(runner: &mut EffectRunner, effect: Effect) -> Vec<Action> {
        let mut store = Store::new(RootState::default());
        let dispatcher = store.dispatcher();
        runner.handle(effect, &dispatcher);
        store.wait_for_tasks().await;
        store.take_queued()
    }

    #[tokio::test]
    async fn test_fetch_statuses_dispatches_loaded_page() {
        let remote = Arc::new(MockRemote::new());
        remote.push_statuses(
            StatusSource::Home,
            Ok(Page::new(vec![status("1")], PageCursor::new(Some("c1"), None))),
        );
        let (mut runner, _) = runner(remote.clone());

        let request = PageRequest {
            id: 5,
            direction: Direction::Reload,
            cursor: None,
            limit: 40,
        };
        let actions = run(
            &mut runner,
            Effect::FetchStatuses {
                session: session(),
                source: StatusSource::Home,
                request,
                target: StatusTarget::Timeline,
            },
        )
        .await;

        assert_eq!(actions.len(), 1);
        match &actions[0] {
            Action::Timeline(PageAction::Loaded { request, page }) => {
                assert_eq!(*request, 5);
                assert_eq!(page.items.len(), 1);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_origin() {
        let remote = Arc::new(MockRemote::failing(RemoteError::Network("down".to_string())));
        let (mut runner, _) = runner(remote);

        let actions = run(
            &mut runner,
            Effect::FetchAccounts {
                session: session(),
                source: AccountSource::Followers("7".to_string()),
                request: PageRequest {
                    id: 9,
                    direction: Direction::Reload,
                    cursor: None,
                    limit: 80,
                },
                target: AccountListTarget::Followers(AccountContext::Active),
            },
        )
        .await;

        match &actions[..] {
            [Action::Error(report)] => {
                assert_eq!(report.kind, ErrorKind::Network);
                assert_eq!(
                    report.failed_request(&PageTarget::Followers(AccountContext::Active)),
                    Some(9)
                );
            }
            other => panic!("unexpected actions {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_persist_then_load_credentials() {
        let remote = Arc::new(MockRemote::new());
        let (mut runner, vault) = runner(remote);

        let actions = run(
            &mut runner,
            Effect::PersistCredentials {
                token: "secret".to_string(),
                instance: "example.social".to_string(),
            },
        )
        .await;
        let key = match &actions[..] {
            [Action::Auth(AuthAction::CredentialsStored { account_key })] => account_key.clone(),
            other => panic!("unexpected actions {:?}", other),
        };
        assert_eq!(vault.accounts().unwrap(), vec![key.clone()]);

        let actions = run(&mut runner, Effect::LoadCredentials { account_key: None }).await;
        assert_eq!(
            actions,
            vec![Action::Auth(AuthAction::Restored {
                account_key: key,
                token: "secret".to_string(),
                instance: "example.social".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_load_without_accounts_is_silent() {
        let (mut runner, _) = runner(Arc::new(MockRemote::new()));
        let actions = run(&mut runner, Effect::LoadCredentials { account_key: None }).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_load_unknown_account_reports_storage_error() {
        let (mut runner, _) = runner(Arc::new(MockRemote::new()));
        let actions = run(
            &mut runner,
            Effect::LoadCredentials {
                account_key: Some("missing".to_string()),
            },
        )
        .await;
        match &actions[..] {
            [Action::Error(report)] => assert_eq!(report.kind, ErrorKind::Storage),
            other => panic!("unexpected actions {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_status_returns_applied() {
        let remote = Arc::new(MockRemote::new());
        let (mut runner, _) = runner(remote.clone());

        let actions = run(
            &mut runner,
            Effect::UpdateStatus {
                session: session(),
                update_id: 3,
                status_id: "42".to_string(),
                change: StatusChange::Reblog(true),
            },
        )
        .await;

        match &actions[..] {
            [Action::StatusUpdate(StatusUpdateAction::Applied { update_id, status })] => {
                assert_eq!(*update_id, 3);
                assert!(status.is_reblogged());
            }
            other => panic!("unexpected actions {:?}", other),
        }
    }

    #[test]
    fn test_spawn_without_runtime_reports_error() {
        let (mut runner, _) = runner(Arc::new(MockRemote::new()));
        let mut store = Store::new(RootState::default());
        let dispatcher = store.dispatcher();

        runner.handle(
            Effect::RegisterApp {
                instance: "example.social".to_string(),
            },
            &dispatcher,
        );

        match &store.take_queued()[..] {
            [Action::Error(report)] => assert_eq!(report.origin, Origin::Auth),
            other => panic!("unexpected actions {:?}", other),
        }
        assert_eq!(dispatcher.in_flight(), 0);
    }
}

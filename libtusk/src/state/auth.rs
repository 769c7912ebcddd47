//! Authentication state machine
//!
//! ```text
//! LoggedOut -> InstanceChosen -> AppRegistered -> AwaitingUserAuthorization -> LoggedIn
//! ```
//!
//! `ClearAuth` returns to `LoggedOut` from any phase, purges stored
//! credentials and rebuilds the content slices. A failure reported for any
//! auth step clears auth as well, and so does an authentication error from
//! any request while logged in.

use crate::actions::{
    AccountAction, AccountContext, Action, AuthAction, ErrorKind, ErrorReport, Origin, PageAction,
};
use crate::effects::Effect;
use crate::pagination::Direction;
use crate::remote::{AppRegistration, Session};

use super::Context;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthPhase {
    #[default]
    LoggedOut,
    InstanceChosen {
        instance: String,
    },
    AppRegistered {
        instance: String,
        app: AppRegistration,
    },
    AwaitingUserAuthorization {
        instance: String,
        app: AppRegistration,
        authorization_url: String,
    },
    LoggedIn {
        session: Session,
        /// Key in the credential store, once persisted
        account_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthState {
    pub phase: AuthPhase,
}

impl AuthState {
    pub fn session(&self) -> Option<Session> {
        match &self.phase {
            AuthPhase::LoggedIn { session, .. } => Some(session.clone()),
            _ => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.phase, AuthPhase::LoggedIn { .. })
    }

    pub fn authorization_url(&self) -> Option<&str> {
        match &self.phase {
            AuthPhase::AwaitingUserAuthorization {
                authorization_url, ..
            } => Some(authorization_url),
            _ => None,
        }
    }

    pub fn account_key(&self) -> Option<&str> {
        match &self.phase {
            AuthPhase::LoggedIn { account_key, .. } => account_key.as_deref(),
            _ => None,
        }
    }

    fn with_phase(phase: AuthPhase) -> Self {
        Self { phase }
    }
}

pub fn reduce(state: AuthState, action: &Action, ctx: &mut Context) -> AuthState {
    match action {
        Action::Auth(auth) => reduce_auth(state, auth, ctx),
        Action::Error(report) => {
            let fail_closed = match (&report.origin, &state.phase) {
                (_, AuthPhase::LoggedOut) => false,
                (Origin::Auth, _) => true,
                (_, AuthPhase::LoggedIn { .. }) => report.kind == ErrorKind::Authentication,
                _ => false,
            };
            if fail_closed {
                tracing::warn!(origin = ?report.origin, "{}; clearing auth", report.message);
                ctx.dispatch(Action::Auth(AuthAction::ClearAuth));
            }
            state
        }
        _ => state,
    }
}

fn reduce_auth(state: AuthState, action: &AuthAction, ctx: &mut Context) -> AuthState {
    match (action, &state.phase) {
        (AuthAction::ClearAuth, _) => {
            tracing::info!("Clearing authentication");
            ctx.schedule(Effect::PurgeCredentials);
            ctx.dispatch(Action::ResetRoot);
            AuthState::default()
        }

        (AuthAction::ChooseInstance(_), AuthPhase::LoggedIn { .. }) => {
            tracing::warn!("Already logged in; clear auth before choosing another instance");
            state
        }
        (AuthAction::ChooseInstance(instance), _) => {
            let instance = instance.trim().to_string();
            if instance.is_empty() {
                tracing::warn!("Ignoring empty instance host");
                ctx.dispatch(Action::Error(ErrorReport {
                    kind: ErrorKind::Rejected,
                    message: "Instance host must not be empty".to_string(),
                    origin: Origin::Auth,
                }));
                return state;
            }
            ctx.schedule(Effect::RegisterApp {
                instance: instance.clone(),
            });
            AuthState::with_phase(AuthPhase::InstanceChosen { instance })
        }

        (AuthAction::AppRegistered { instance, app }, AuthPhase::InstanceChosen { instance: chosen })
            if instance == chosen =>
        {
            ctx.dispatch(Action::Auth(AuthAction::BuildAuthorizationUrl));
            AuthState::with_phase(AuthPhase::AppRegistered {
                instance: instance.clone(),
                app: app.clone(),
            })
        }

        (AuthAction::BuildAuthorizationUrl, AuthPhase::AppRegistered { instance, app }) => {
            ctx.schedule(Effect::BuildAuthorizationUrl {
                instance: instance.clone(),
                app: app.clone(),
            });
            state
        }

        (AuthAction::AuthorizationUrlReady(url), AuthPhase::AppRegistered { instance, app }) => {
            AuthState::with_phase(AuthPhase::AwaitingUserAuthorization {
                instance: instance.clone(),
                app: app.clone(),
                authorization_url: url.clone(),
            })
        }

        (
            AuthAction::AuthorizationCode(code),
            AuthPhase::AwaitingUserAuthorization { instance, app, .. },
        ) => {
            ctx.schedule(Effect::ExchangeCode {
                instance: instance.clone(),
                app: app.clone(),
                code: code.trim().to_string(),
            });
            state
        }

        (AuthAction::TokenObtained { token }, AuthPhase::AwaitingUserAuthorization { instance, .. }) => {
            tracing::info!(instance = %instance, "Logged in");
            ctx.schedule(Effect::PersistCredentials {
                token: token.clone(),
                instance: instance.clone(),
            });
            poll_everything(ctx);
            AuthState::with_phase(AuthPhase::LoggedIn {
                session: Session::new(instance.clone(), token.clone()),
                account_key: None,
            })
        }

        (AuthAction::CredentialsStored { account_key }, AuthPhase::LoggedIn { session, .. }) => {
            AuthState::with_phase(AuthPhase::LoggedIn {
                session: session.clone(),
                account_key: Some(account_key.clone()),
            })
        }

        (AuthAction::LoadStored { account_key }, _) => {
            ctx.schedule(Effect::LoadCredentials {
                account_key: account_key.clone(),
            });
            state
        }

        (
            AuthAction::Restored {
                account_key,
                token,
                instance,
            },
            phase,
        ) => {
            let switching = match phase {
                AuthPhase::LoggedIn {
                    account_key: current,
                    ..
                } => current.as_deref() != Some(account_key.as_str()),
                _ => false,
            };
            if switching {
                ctx.dispatch(Action::ResetRoot);
            }
            tracing::info!(instance = %instance, "Restored stored account");
            poll_everything(ctx);
            AuthState::with_phase(AuthPhase::LoggedIn {
                session: Session::new(instance.clone(), token.clone()),
                account_key: Some(account_key.clone()),
            })
        }

        (action, phase) => {
            tracing::warn!(action = ?action, phase = ?phase_name(phase), "Ignoring out-of-phase auth action");
            state
        }
    }
}

/// Initial data load after logging in.
fn poll_everything(ctx: &mut Context) {
    ctx.dispatch(Action::Timeline(PageAction::Fetch(Direction::Reload)));
    ctx.dispatch(Action::Favourites(PageAction::Fetch(Direction::Reload)));
    ctx.dispatch(Action::Notifications(PageAction::Fetch(Direction::Reload)));
    ctx.dispatch(Action::Account {
        context: AccountContext::Active,
        action: AccountAction::Poll,
    });
}

fn phase_name(phase: &AuthPhase) -> &'static str {
    match phase {
        AuthPhase::LoggedOut => "logged_out",
        AuthPhase::InstanceChosen { .. } => "instance_chosen",
        AuthPhase::AppRegistered { .. } => "app_registered",
        AuthPhase::AwaitingUserAuthorization { .. } => "awaiting_user_authorization",
        AuthPhase::LoggedIn { .. } => "logged_in",
    }
}

//! Actions folded by the store
//!
//! One closed enum per action family, wrapped by [`Action`]. Reducers match
//! them exhaustively, so adding a variant forces every slice to decide what to
//! do with it.

use crate::error::{CredentialError, RemoteError};
use crate::pagination::{Direction, Page, RequestId};
use crate::remote::AppRegistration;
use crate::types::{Account, Notification, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Auth(AuthAction),
    Account {
        context: AccountContext,
        action: AccountAction,
    },
    Timeline(PageAction<Status>),
    Favourites(PageAction<Status>),
    Notifications(PageAction<Notification>),
    StatusUpdate(StatusUpdateAction),
    StoredDefaults(StoredDefaultsAction),
    Errors(ErrorsAction),
    /// A failure from a remote call or the credential store.
    Error(ErrorReport),
    /// Rebuild every content slice from scratch.
    ResetRoot,
}

impl Action {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Auth(action) => match action {
                AuthAction::ChooseInstance(_) => "auth.choose_instance",
                AuthAction::AppRegistered { .. } => "auth.app_registered",
                AuthAction::BuildAuthorizationUrl => "auth.build_authorization_url",
                AuthAction::AuthorizationUrlReady(_) => "auth.authorization_url_ready",
                AuthAction::AuthorizationCode(_) => "auth.authorization_code",
                AuthAction::TokenObtained { .. } => "auth.token_obtained",
                AuthAction::CredentialsStored { .. } => "auth.credentials_stored",
                AuthAction::LoadStored { .. } => "auth.load_stored",
                AuthAction::Restored { .. } => "auth.restored",
                AuthAction::ClearAuth => "auth.clear",
            },
            Action::Account { action, .. } => match action {
                AccountAction::Poll => "account.poll",
                AccountAction::Loaded(_) => "account.loaded",
                AccountAction::PinnedLoaded(_) => "account.pinned_loaded",
                AccountAction::Statuses(PageAction::Fetch(_)) => "account.statuses.fetch",
                AccountAction::Statuses(PageAction::Loaded { .. }) => "account.statuses.loaded",
                AccountAction::Followers(PageAction::Fetch(_)) => "account.followers.fetch",
                AccountAction::Followers(PageAction::Loaded { .. }) => "account.followers.loaded",
                AccountAction::Following(PageAction::Fetch(_)) => "account.following.fetch",
                AccountAction::Following(PageAction::Loaded { .. }) => "account.following.loaded",
            },
            Action::Timeline(PageAction::Fetch(_)) => "timeline.fetch",
            Action::Timeline(PageAction::Loaded { .. }) => "timeline.loaded",
            Action::Favourites(PageAction::Fetch(_)) => "favourites.fetch",
            Action::Favourites(PageAction::Loaded { .. }) => "favourites.loaded",
            Action::Notifications(PageAction::Fetch(_)) => "notifications.fetch",
            Action::Notifications(PageAction::Loaded { .. }) => "notifications.loaded",
            Action::StatusUpdate(action) => match action {
                StatusUpdateAction::ToggleFavourite(_) => "status.toggle_favourite",
                StatusUpdateAction::ToggleReblog(_) => "status.toggle_reblog",
                StatusUpdateAction::Applied { .. } => "status.applied",
            },
            Action::StoredDefaults(_) => "stored_defaults",
            Action::Errors(_) => "errors",
            Action::Error(_) => "error",
            Action::ResetRoot => "reset_root",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    ChooseInstance(String),
    AppRegistered {
        instance: String,
        app: AppRegistration,
    },
    BuildAuthorizationUrl,
    /// The URL the user must open to grant access.
    AuthorizationUrlReady(String),
    AuthorizationCode(String),
    TokenObtained {
        token: String,
    },
    CredentialsStored {
        account_key: String,
    },
    /// Restore a stored account; `None` picks the first one in the index.
    LoadStored {
        account_key: Option<String>,
    },
    Restored {
        account_key: String,
        token: String,
        instance: String,
    },
    ClearAuth,
}

/// Paging actions shared by every paged list.
#[derive(Debug, Clone, PartialEq)]
pub enum PageAction<T> {
    Fetch(Direction),
    /// The response to the request with id `request`.
    Loaded { request: RequestId, page: Page<T> },
}

/// Which account a profile slice is about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountContext {
    /// The logged-in user
    Active,
    /// Any other profile, by account id
    Profile(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountAction {
    /// Start over for this context and fetch the account.
    Poll,
    Loaded(Account),
    PinnedLoaded(Vec<Status>),
    Statuses(PageAction<Status>),
    Followers(PageAction<Account>),
    Following(PageAction<Account>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdateAction {
    ToggleFavourite(Status),
    ToggleReblog(Status),
    Applied { update_id: u64, status: Status },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feed {
    Home,
    Favourites,
    Notifications,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoredDefaultsAction {
    SetHideContentWarnings(bool),
    Reveal(String),
    Conceal(String),
    MarkSeen { feed: Feed, status_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorsAction {
    Dismiss(usize),
    Clear,
}

/// A list that can be paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTarget {
    Timeline,
    Favourites,
    Notifications,
    AccountStatuses(AccountContext),
    Followers(AccountContext),
    Following(AccountContext),
}

/// What a failed request was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Page {
        target: PageTarget,
        request: RequestId,
    },
    Account(AccountContext),
    StatusUpdate(u64),
    Auth,
    Credentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Authentication,
    Storage,
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub origin: Origin,
}

impl ErrorReport {
    pub fn remote(error: &RemoteError, origin: Origin) -> Self {
        let kind = match error {
            RemoteError::Authentication(_) => ErrorKind::Authentication,
            RemoteError::Validation(_) => ErrorKind::Rejected,
            RemoteError::Network(_) | RemoteError::RateLimit(_) | RemoteError::Parse(_) => {
                ErrorKind::Network
            }
        };
        Self {
            kind,
            message: error.to_string(),
            origin,
        }
    }

    pub fn storage(error: &CredentialError) -> Self {
        Self {
            kind: ErrorKind::Storage,
            message: error.to_string(),
            origin: Origin::Credentials,
        }
    }

    pub fn is_for(&self, target: &PageTarget) -> bool {
        matches!(&self.origin, Origin::Page { target: t, .. } if t == target)
    }

    /// The request that failed, when this report is about a page of `target`.
    pub fn failed_request(&self, target: &PageTarget) -> Option<RequestId> {
        match &self.origin {
            Origin::Page { target: t, request } if t == target => Some(*request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(Action::ResetRoot.kind(), "reset_root");
        assert_eq!(Action::Timeline(PageAction::Fetch(Direction::Older)).kind(), "timeline.fetch");
        assert_eq!(
            Action::Account {
                context: AccountContext::Active,
                action: AccountAction::Followers(PageAction::Fetch(Direction::Reload)),
            }
            .kind(),
            "account.followers.fetch"
        );
        assert_eq!(
            Action::Account {
                context: AccountContext::Active,
                action: AccountAction::Statuses(PageAction::Loaded {
                    request: 3,
                    page: Page::new(Vec::new(), Default::default()),
                }),
            }
            .kind(),
            "account.statuses.loaded"
        );
        assert_eq!(Action::Auth(AuthAction::ClearAuth).kind(), "auth.clear");
    }

    #[test]
    fn test_error_report_kinds() {
        let report = ErrorReport::remote(
            &RemoteError::Authentication("The access token is invalid".to_string()),
            Origin::Page {
                target: PageTarget::Timeline,
                request: 1,
            },
        );
        assert_eq!(report.kind, ErrorKind::Authentication);
        assert!(report.is_for(&PageTarget::Timeline));
        assert!(!report.is_for(&PageTarget::Favourites));

        let report = ErrorReport::remote(&RemoteError::RateLimit("slow down".to_string()), Origin::Auth);
        assert_eq!(report.kind, ErrorKind::Network);

        let report = ErrorReport::storage(&CredentialError::Keyring("locked".to_string()));
        assert_eq!(report.kind, ErrorKind::Storage);
        assert_eq!(report.origin, Origin::Credentials);
    }
}

//! Account profiles
//!
//! One [`AccountState`] per [`AccountContext`]: the logged-in account and any
//! profile the user opened. A context is created by `Poll` and becomes bound
//! once its account has loaded; only bound contexts page their lists.

use std::collections::BTreeMap;

use crate::actions::{
    AccountAction, AccountContext, Action, Origin, PageAction, PageTarget, StatusUpdateAction,
};
use crate::effects::{AccountListTarget, Effect, StatusTarget};
use crate::pagination::{Direction, PageRequest, PaginatingData, RequestId};
use crate::remote::{AccountSource, Session, StatusSource};
use crate::types::{Account, Entity, Status};

use super::feeds::replace_status;
use super::paged;
use super::Context;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountState {
    /// Bound once loaded
    pub account: Option<Account>,
    pub is_active: bool,
    pub pinned: Vec<Status>,
    pub statuses: PaginatingData<Status>,
    pub followers: PaginatingData<Account>,
    pub following: PaginatingData<Account>,
}

impl AccountState {
    fn polled(context: &AccountContext) -> Self {
        Self {
            is_active: *context == AccountContext::Active,
            ..Self::default()
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account.as_ref().map(|a| a.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountsState {
    pub contexts: BTreeMap<AccountContext, AccountState>,
}

impl AccountsState {
    pub fn get(&self, context: &AccountContext) -> Option<&AccountState> {
        self.contexts.get(context)
    }

    pub fn active(&self) -> Option<&AccountState> {
        self.get(&AccountContext::Active)
    }
}

pub fn reduce(state: AccountsState, action: &Action, ctx: &mut Context) -> AccountsState {
    match action {
        Action::Account { context, action } => reduce_account(state, context, action, ctx),
        Action::StatusUpdate(StatusUpdateAction::Applied { status, .. }) => {
            let contexts = state
                .contexts
                .into_iter()
                .map(|(context, entry)| {
                    let pinned = entry
                        .pinned
                        .into_iter()
                        .map(|s| s.with_replaced(status).unwrap_or(s))
                        .collect();
                    let entry = AccountState {
                        statuses: replace_status(entry.statuses, status),
                        pinned,
                        ..entry
                    };
                    (context, entry)
                })
                .collect();
            AccountsState { contexts }
        }
        Action::Error(report) => match &report.origin {
            Origin::Page { target, request } => fail_list(state, target, *request),
            _ => state,
        },
        _ => state,
    }
}

fn reduce_account(
    mut state: AccountsState,
    context: &AccountContext,
    action: &AccountAction,
    ctx: &mut Context,
) -> AccountsState {
    match action {
        AccountAction::Poll => {
            let Some(session) = ctx.session() else {
                tracing::debug!(?context, "account poll ignored, not logged in");
                return state;
            };
            ctx.schedule(Effect::FetchAccount {
                session,
                context: context.clone(),
            });
            state
                .contexts
                .insert(context.clone(), AccountState::polled(context));
            state
        }

        AccountAction::Loaded(account) => {
            let Some(entry) = state.contexts.remove(context) else {
                tracing::debug!(?context, "account loaded for a context nobody polled");
                return state;
            };
            let entry = match context {
                AccountContext::Profile(id) if *id != account.id => {
                    tracing::warn!(expected = %id, got = %account.id, "ignoring mismatched account");
                    entry
                }
                _ => load_lists(
                    AccountState {
                        account: Some(account.clone()),
                        ..entry
                    },
                    context,
                    ctx,
                ),
            };
            state.contexts.insert(context.clone(), entry);
            state
        }

        AccountAction::PinnedLoaded(pinned) => {
            match state.contexts.get_mut(context) {
                Some(entry) if entry.account.is_some() => entry.pinned = pinned.clone(),
                _ => tracing::debug!(?context, "dropping pinned statuses for an unbound account"),
            }
            state
        }

        AccountAction::Statuses(page) => {
            let limit = ctx.page_sizes().statuses;
            page_list(state, context, page, limit, ctx, statuses, statuses_request)
        }
        AccountAction::Followers(page) => {
            let limit = ctx.page_sizes().accounts;
            page_list(state, context, page, limit, ctx, followers, followers_request)
        }
        AccountAction::Following(page) => {
            let limit = ctx.page_sizes().accounts;
            page_list(state, context, page, limit, ctx, following, following_request)
        }
    }
}

/// Fetch pinned statuses and reload every list of a freshly bound context.
fn load_lists(mut entry: AccountState, context: &AccountContext, ctx: &mut Context) -> AccountState {
    let (Some(session), Some(account_id)) =
        (ctx.session(), entry.account_id().map(str::to_string))
    else {
        return entry;
    };
    let sizes = ctx.page_sizes();

    ctx.schedule(Effect::FetchPinned {
        session,
        context: context.clone(),
        account_id: account_id.clone(),
        limit: sizes.statuses,
    });
    entry.statuses = paged::fetch(entry.statuses, Direction::Reload, sizes.statuses, ctx, |s, r| {
        statuses_request(context, &account_id, s, r)
    });
    entry.followers = paged::fetch(entry.followers, Direction::Reload, sizes.accounts, ctx, |s, r| {
        followers_request(context, &account_id, s, r)
    });
    entry.following = paged::fetch(entry.following, Direction::Reload, sizes.accounts, ctx, |s, r| {
        following_request(context, &account_id, s, r)
    });
    entry
}

type ListOf<T> = fn(&mut AccountState) -> &mut PaginatingData<T>;
type RequestFor = fn(&AccountContext, &str, Session, PageRequest) -> Effect;

fn statuses(entry: &mut AccountState) -> &mut PaginatingData<Status> {
    &mut entry.statuses
}

fn followers(entry: &mut AccountState) -> &mut PaginatingData<Account> {
    &mut entry.followers
}

fn following(entry: &mut AccountState) -> &mut PaginatingData<Account> {
    &mut entry.following
}

fn statuses_request(context: &AccountContext, id: &str, session: Session, request: PageRequest) -> Effect {
    Effect::FetchStatuses {
        session,
        source: StatusSource::Account(id.to_string()),
        request,
        target: StatusTarget::Account(context.clone()),
    }
}

fn followers_request(context: &AccountContext, id: &str, session: Session, request: PageRequest) -> Effect {
    Effect::FetchAccounts {
        session,
        source: AccountSource::Followers(id.to_string()),
        request,
        target: AccountListTarget::Followers(context.clone()),
    }
}

fn following_request(context: &AccountContext, id: &str, session: Session, request: PageRequest) -> Effect {
    Effect::FetchAccounts {
        session,
        source: AccountSource::Following(id.to_string()),
        request,
        target: AccountListTarget::Following(context.clone()),
    }
}

/// Page one list of a bound context.
///
/// # Panics
///
/// When a fetch targets a context whose account has not loaded. The account
/// id is part of every list request, so there is nothing sensible to ask for.
fn page_list<T: Entity>(
    mut state: AccountsState,
    context: &AccountContext,
    page: &PageAction<T>,
    limit: usize,
    ctx: &mut Context,
    list: ListOf<T>,
    request_for: RequestFor,
) -> AccountsState {
    let bound = state
        .contexts
        .get(context)
        .and_then(|entry| entry.account_id().map(str::to_string));

    match page {
        PageAction::Fetch(direction) => {
            if ctx.session().is_none() {
                tracing::debug!(?context, "account list fetch ignored, not logged in");
                return state;
            }
            let Some(account_id) = bound else {
                panic!("paging a list of {:?} before its account has loaded", context);
            };
            if let Some(entry) = state.contexts.get_mut(context) {
                let data = std::mem::take(list(entry));
                *list(entry) = paged::fetch(data, *direction, limit, ctx, |s, r| {
                    request_for(context, &account_id, s, r)
                });
            }
        }
        PageAction::Loaded { request, page } => match state.contexts.get_mut(context) {
            Some(entry) if bound.is_some() => {
                let data = std::mem::take(list(entry));
                *list(entry) = data.complete(*request, page.clone());
            }
            _ => tracing::debug!(?context, "dropping page for an unbound account"),
        },
    }
    state
}

fn fail_list(mut state: AccountsState, target: &PageTarget, request: RequestId) -> AccountsState {
    let context = match target {
        PageTarget::AccountStatuses(c) | PageTarget::Followers(c) | PageTarget::Following(c) => c,
        _ => return state,
    };
    if let Some(entry) = state.contexts.get_mut(context) {
        match target {
            PageTarget::AccountStatuses(_) => {
                entry.statuses = std::mem::take(&mut entry.statuses).fail(request)
            }
            PageTarget::Followers(_) => {
                entry.followers = std::mem::take(&mut entry.followers).fail(request)
            }
            _ => entry.following = std::mem::take(&mut entry.following).fail(request),
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ErrorKind, ErrorReport};
    use crate::pagination::{Page, PageCursor};
    use crate::remote::mock::{account, status};
    use crate::state::testing::{awaited, dispatched, fold, logged_in};
    use crate::state::RootState;

    fn act(context: AccountContext, action: AccountAction) -> Action {
        Action::Account { context, action }
    }

    fn profile(id: &str) -> AccountContext {
        AccountContext::Profile(id.to_string())
    }

    /// Poll and load `context` bound to account `id`, ignoring the effects.
    fn bound(context: AccountContext, id: &str) -> RootState {
        let (root, _) = fold(&logged_in(), act(context.clone(), AccountAction::Poll));
        let (root, _) = fold(&root, act(context, AccountAction::Loaded(account(id))));
        root
    }

    #[test]
    fn test_poll_creates_unbound_context() {
        let (root, effects) = fold(&logged_in(), act(AccountContext::Active, AccountAction::Poll));
        let entry = root.accounts.active().unwrap();
        assert!(entry.is_active);
        assert!(entry.account.is_none());
        assert_eq!(
            effects,
            vec![Effect::FetchAccount {
                session: Session::new("example.social", "token"),
                context: AccountContext::Active,
            }]
        );
    }

    #[test]
    fn test_poll_without_session_is_ignored() {
        let (root, effects) = fold(&RootState::default(), act(AccountContext::Active, AccountAction::Poll));
        assert!(root.accounts.contexts.is_empty());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_loaded_binds_and_fans_out() {
        let (root, _) = fold(&logged_in(), act(profile("7"), AccountAction::Poll));
        let (root, effects) = fold(&root, act(profile("7"), AccountAction::Loaded(account("7"))));

        let entry = root.accounts.get(&profile("7")).unwrap();
        assert_eq!(entry.account_id(), Some("7"));
        assert!(!entry.is_active);
        assert!(entry.statuses.is_fetching());
        assert!(entry.followers.is_fetching());
        assert!(entry.following.is_fetching());
        assert!(dispatched(&effects).is_empty());

        let kinds: Vec<&str> = effects.iter().map(Effect::kind).collect();
        assert_eq!(kinds, vec!["fetch_pinned", "fetch_statuses", "fetch_accounts", "fetch_accounts"]);
        match &effects[1] {
            Effect::FetchStatuses { source, request, .. } => {
                assert_eq!(*source, StatusSource::Account("7".to_string()));
                assert_eq!(request.limit, 40);
            }
            other => panic!("unexpected effect {:?}", other),
        }
        match &effects[2] {
            Effect::FetchAccounts { source, request, target, .. } => {
                assert_eq!(*source, AccountSource::Followers("7".to_string()));
                assert_eq!(*target, AccountListTarget::Followers(profile("7")));
                assert_eq!(request.limit, 80);
            }
            other => panic!("unexpected effect {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_profile_is_ignored() {
        let (root, _) = fold(&logged_in(), act(profile("7"), AccountAction::Poll));
        let (next, effects) = fold(&root, act(profile("7"), AccountAction::Loaded(account("8"))));
        assert_eq!(next.accounts, root.accounts);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_loaded_without_poll_is_ignored() {
        let (root, effects) = fold(&logged_in(), act(AccountContext::Active, AccountAction::Loaded(account("1"))));
        assert!(root.accounts.contexts.is_empty());
        assert!(effects.is_empty());
    }

    #[test]
    fn test_statuses_page_merges_into_context() {
        let root = bound(AccountContext::Active, "1");
        let (root, _) = fold(
            &root,
            act(
                AccountContext::Active,
                AccountAction::Statuses(PageAction::Loaded {
                    request: awaited(&root.accounts.active().unwrap().statuses),
                    page: Page::new(vec![status("s1"), status("s2")], PageCursor::new(Some("s2"), None)),
                }),
            ),
        );
        let entry = root.accounts.active().unwrap();
        assert_eq!(entry.statuses.items.len(), 2);
        assert!(entry.statuses.can_fetch(Direction::Older));

        let (_, effects) = fold(
            &root,
            act(AccountContext::Active, AccountAction::Statuses(PageAction::Fetch(Direction::Older))),
        );
        match &effects[..] {
            [Effect::FetchStatuses { request, target, .. }] => {
                assert_eq!(request.cursor.as_deref(), Some("s2"));
                assert_eq!(*target, StatusTarget::Account(AccountContext::Active));
            }
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "before its account has loaded")]
    fn test_paging_unbound_context_panics() {
        let (root, _) = fold(&logged_in(), act(profile("7"), AccountAction::Poll));
        fold(&root, act(profile("7"), AccountAction::Followers(PageAction::Fetch(Direction::Reload))));
    }

    #[test]
    fn test_page_for_unbound_context_is_dropped() {
        let (root, _) = fold(&logged_in(), act(profile("7"), AccountAction::Poll));
        let (next, _) = fold(
            &root,
            act(
                profile("7"),
                AccountAction::Following(PageAction::Loaded {
                    request: 1,
                    page: Page::new(vec![account("3")], PageCursor::default()),
                }),
            ),
        );
        assert_eq!(next.accounts, root.accounts);
    }

    #[test]
    fn test_pinned_and_statuses_receive_updates() {
        let root = bound(AccountContext::Active, "1");
        let (root, _) = fold(
            &root,
            act(AccountContext::Active, AccountAction::PinnedLoaded(vec![status("p1")])),
        );

        let mut updated = status("p1");
        updated.favourited = Some(true);
        let (root, _) = fold(
            &root,
            Action::StatusUpdate(StatusUpdateAction::Applied {
                update_id: 1,
                status: updated,
            }),
        );
        assert!(root.accounts.active().unwrap().pinned[0].is_favourited());
    }

    #[test]
    fn test_failed_list_clears_in_flight() {
        let root = bound(profile("7"), "7");
        let report = ErrorReport {
            kind: ErrorKind::Network,
            message: "timeout".to_string(),
            origin: Origin::Page {
                target: PageTarget::Followers(profile("7")),
                request: awaited(&root.accounts.get(&profile("7")).unwrap().followers),
            },
        };
        let (root, _) = fold(&root, Action::Error(report));
        let entry = root.accounts.get(&profile("7")).unwrap();
        assert!(!entry.followers.is_fetching());
        assert!(entry.following.is_fetching());
        assert!(entry.statuses.is_fetching());
    }

    #[test]
    fn test_repoll_starts_over() {
        let root = bound(AccountContext::Active, "1");
        let (root, _) = fold(&root, act(AccountContext::Active, AccountAction::Poll));
        let entry = root.accounts.active().unwrap();
        assert!(entry.account.is_none());
        assert!(!entry.statuses.is_fetching());
    }

    #[test]
    fn test_page_from_before_repoll_is_dropped() {
        let root = bound(AccountContext::Active, "1");
        let stale = awaited(&root.accounts.active().unwrap().statuses);

        let (root, _) = fold(&root, act(AccountContext::Active, AccountAction::Poll));
        let (root, _) = fold(&root, act(AccountContext::Active, AccountAction::Loaded(account("1"))));
        let current = awaited(&root.accounts.active().unwrap().statuses);
        assert!(current > stale);

        let (root, _) = fold(
            &root,
            act(
                AccountContext::Active,
                AccountAction::Statuses(PageAction::Loaded {
                    request: stale,
                    page: Page::new(vec![status("old")], PageCursor::default()),
                }),
            ),
        );
        let entry = root.accounts.active().unwrap();
        assert!(entry.statuses.items.is_empty());
        assert!(entry.statuses.awaits(current));
    }
}

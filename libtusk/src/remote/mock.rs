//! Scripted remote for testing
//!
//! [`MockRemote`] serves queued responses per collection and records every
//! call so tests can assert on what the store asked for. Unscripted page
//! requests answer with an empty, exhausted page. The fixture builders
//! [`status`] and [`account`] produce minimal entities.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use super::{
    AccountSource, AppRegistration, RemoteClient, RemoteResult, Session, StatusChange,
    StatusSource,
};
use crate::error::RemoteError;
use crate::pagination::{Page, PageRequest};
use crate::types::{Account, Notification, Status, Visibility};

/// Minimal account with the given id.
pub fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        username: format!("user{}", id),
        acct: format!("user{}@example.social", id),
        display_name: format!("User {}", id),
        note: String::new(),
        avatar: None,
        url: None,
        followers_count: 0,
        following_count: 0,
        statuses_count: 0,
    }
}

/// Minimal public status with the given id, authored by account "1".
pub fn status(id: &str) -> Status {
    Status {
        id: id.to_string(),
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        account: account("1"),
        content: format!("<p>status {}</p>", id),
        visibility: Visibility::Public,
        sensitive: false,
        spoiler_text: String::new(),
        in_reply_to_id: None,
        reblog: None,
        favourited: Some(false),
        reblogged: Some(false),
        favourites_count: 0,
        reblogs_count: 0,
        url: None,
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RegisterApp(String),
    ExchangeCode(String),
    VerifyCredentials,
    FetchAccount(String),
    Statuses(StatusSource, PageRequest),
    Accounts(AccountSource, PageRequest),
    Notifications(PageRequest),
    Pinned(String),
    UpdateStatus(String, StatusChange),
}

type Queue<T> = VecDeque<RemoteResult<T>>;

#[derive(Default)]
struct Script {
    registration: Option<RemoteResult<AppRegistration>>,
    token: Option<RemoteResult<String>>,
    me: Option<RemoteResult<Account>>,
    profiles: HashMap<String, Account>,
    statuses: HashMap<StatusSource, Queue<Page<Status>>>,
    accounts: HashMap<AccountSource, Queue<Page<Account>>>,
    notifications: Queue<Page<Notification>>,
    pinned: HashMap<String, Vec<Status>>,
    update_error: Option<RemoteError>,
    /// Statuses served so far, by id, so updates can echo them back
    seen: HashMap<String, Status>,
    /// When set, every call fails with this error
    fail_all: Option<RemoteError>,
}

/// Remote collaborator with scripted answers.
#[derive(Default)]
pub struct MockRemote {
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
    delay: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every async answer, to keep requests in flight for a while.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// A remote where every call fails with `error`.
    pub fn failing(error: RemoteError) -> Self {
        let remote = Self::default();
        lock(&remote.script).fail_all = Some(error);
        remote
    }

    pub fn set_registration(&self, result: RemoteResult<AppRegistration>) -> &Self {
        lock(&self.script).registration = Some(result);
        self
    }

    pub fn set_token(&self, result: RemoteResult<String>) -> &Self {
        lock(&self.script).token = Some(result);
        self
    }

    /// Account returned by `verify_credentials`.
    pub fn set_me(&self, result: RemoteResult<Account>) -> &Self {
        lock(&self.script).me = Some(result);
        self
    }

    pub fn add_profile(&self, account: Account) -> &Self {
        lock(&self.script).profiles.insert(account.id.clone(), account);
        self
    }

    pub fn push_statuses(&self, source: StatusSource, result: RemoteResult<Page<Status>>) -> &Self {
        lock(&self.script).statuses.entry(source).or_default().push_back(result);
        self
    }

    pub fn push_accounts(&self, source: AccountSource, result: RemoteResult<Page<Account>>) -> &Self {
        lock(&self.script).accounts.entry(source).or_default().push_back(result);
        self
    }

    pub fn push_notifications(&self, result: RemoteResult<Page<Notification>>) -> &Self {
        lock(&self.script).notifications.push_back(result);
        self
    }

    pub fn set_pinned(&self, account_id: &str, statuses: Vec<Status>) -> &Self {
        lock(&self.script).pinned.insert(account_id.to_string(), statuses);
        self
    }

    pub fn fail_updates(&self, error: RemoteError) -> &Self {
        lock(&self.script).update_error = Some(error);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| predicate(call)).count()
    }

    /// Page requests issued for `source`.
    pub fn status_requests(&self, source: &StatusSource) -> Vec<PageRequest> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                Call::Statuses(s, request) if s == source => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    async fn enter(&self, call: Call) -> RemoteResult<()> {
        lock(&self.calls).push(call);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        match &lock(&self.script).fail_all {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn remember(&self, statuses: &[Status]) {
        let mut script = lock(&self.script);
        for status in statuses {
            script.seen.insert(status.id.clone(), status.clone());
            if let Some(inner) = &status.reblog {
                script.seen.insert(inner.id.clone(), (**inner).clone());
            }
        }
    }
}

fn next_page<T>(queue: Option<&mut Queue<Page<T>>>) -> RemoteResult<Page<T>> {
    queue
        .and_then(|q| q.pop_front())
        .unwrap_or_else(|| Ok(Page::new(Vec::new(), Default::default())))
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn register_app(&self, instance: &str) -> RemoteResult<AppRegistration> {
        self.enter(Call::RegisterApp(instance.to_string())).await?;
        lock(&self.script).registration.clone().unwrap_or_else(|| {
            Ok(AppRegistration {
                client_id: "mock-client".to_string(),
                client_secret: "mock-secret".to_string(),
            })
        })
    }

    fn authorization_url(&self, instance: &str, app: &AppRegistration) -> RemoteResult<String> {
        if instance.trim().is_empty() {
            return Err(RemoteError::Validation("Instance host is empty".to_string()));
        }
        Ok(format!(
            "https://{}/oauth/authorize?client_id={}&response_type=code",
            instance, app.client_id
        ))
    }

    async fn exchange_code(
        &self,
        _instance: &str,
        _app: &AppRegistration,
        code: &str,
    ) -> RemoteResult<String> {
        self.enter(Call::ExchangeCode(code.to_string())).await?;
        lock(&self.script)
            .token
            .clone()
            .unwrap_or_else(|| Ok(format!("token-for-{}", code)))
    }

    async fn verify_credentials(&self, _session: &Session) -> RemoteResult<Account> {
        self.enter(Call::VerifyCredentials).await?;
        lock(&self.script).me.clone().unwrap_or_else(|| Ok(account("1")))
    }

    async fn fetch_account(&self, _session: &Session, account_id: &str) -> RemoteResult<Account> {
        self.enter(Call::FetchAccount(account_id.to_string())).await?;
        Ok(lock(&self.script)
            .profiles
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| account(account_id)))
    }

    async fn fetch_statuses(
        &self,
        _session: &Session,
        source: &StatusSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Status>> {
        self.enter(Call::Statuses(source.clone(), request.clone())).await?;
        let page = next_page(lock(&self.script).statuses.get_mut(source))?;
        self.remember(&page.items);
        Ok(page)
    }

    async fn fetch_accounts(
        &self,
        _session: &Session,
        source: &AccountSource,
        request: &PageRequest,
    ) -> RemoteResult<Page<Account>> {
        self.enter(Call::Accounts(source.clone(), request.clone())).await?;
        next_page(lock(&self.script).accounts.get_mut(source))
    }

    async fn fetch_notifications(
        &self,
        _session: &Session,
        request: &PageRequest,
    ) -> RemoteResult<Page<Notification>> {
        self.enter(Call::Notifications(request.clone())).await?;
        next_page(Some(&mut lock(&self.script).notifications))
    }

    async fn fetch_pinned(
        &self,
        _session: &Session,
        account_id: &str,
        _limit: usize,
    ) -> RemoteResult<Vec<Status>> {
        self.enter(Call::Pinned(account_id.to_string())).await?;
        let pinned = lock(&self.script).pinned.get(account_id).cloned().unwrap_or_default();
        self.remember(&pinned);
        Ok(pinned)
    }

    async fn update_status(
        &self,
        _session: &Session,
        status_id: &str,
        change: StatusChange,
    ) -> RemoteResult<Status> {
        self.enter(Call::UpdateStatus(status_id.to_string(), change)).await?;
        let mut script = lock(&self.script);
        if let Some(error) = &script.update_error {
            return Err(error.clone());
        }

        let current = script.seen.get(status_id).cloned().unwrap_or_else(|| status(status_id));
        let updated = match change {
            StatusChange::Favourite(on) => Status {
                favourited: Some(on),
                favourites_count: if on {
                    current.favourites_count + 1
                } else {
                    current.favourites_count.saturating_sub(1)
                },
                ..current
            },
            StatusChange::Reblog(on) => Status {
                reblogged: Some(on),
                reblogs_count: if on {
                    current.reblogs_count + 1
                } else {
                    current.reblogs_count.saturating_sub(1)
                },
                ..current
            },
        };
        script.seen.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }
}

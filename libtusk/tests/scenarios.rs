//! End-to-end scenarios through the store, the effect runner and a scripted
//! remote: paging a feed, an exhausted direction, a favourite toggle feeding
//! the list reconciler, and clearing auth mid-login.

use anyhow::Result;
use libtusk::actions::{Action, AuthAction, PageAction, StatusUpdateAction};
use libtusk::credentials::{AccountVault, FileStore, MemoryStore};
use libtusk::effects::EffectRunner;
use libtusk::pagination::{Direction, Page, PageCursor};
use libtusk::reconcile::{apply, Edit, ListReconciler};
use libtusk::remote::mock::{status, Call, MockRemote};
use libtusk::remote::{AppRegistration, Session, StatusChange, StatusSource};
use libtusk::state::{AuthPhase, AuthState, RootState};
use libtusk::store::Store;
use libtusk::types::Status;
use std::sync::Arc;
use tempfile::TempDir;

fn logged_in() -> RootState {
    RootState {
        auth: AuthState {
            phase: AuthPhase::LoggedIn {
                session: Session::new("example.social", "token"),
                account_key: Some("k1".to_string()),
            },
        },
        ..RootState::default()
    }
}

fn store_with(remote: &Arc<MockRemote>, vault: AccountVault, initial: RootState) -> Store {
    Store::with_effects(initial, EffectRunner::new(remote.clone(), vault))
}

fn memory_vault() -> AccountVault {
    AccountVault::new(Arc::new(MemoryStore::new()))
}

fn statuses(ids: &[&str]) -> Vec<Status> {
    ids.iter().map(|id| status(id)).collect()
}

fn ids(items: &[Status]) -> Vec<&str> {
    items.iter().map(|s| s.id.as_str()).collect()
}

#[tokio::test]
async fn test_reload_then_older_merges_pages() -> Result<()> {
    let remote = Arc::new(MockRemote::new());
    remote
        .push_statuses(
            StatusSource::Home,
            Ok(Page::new(statuses(&["s1", "s2", "s3"]), PageCursor::new(Some("c1"), None))),
        )
        .push_statuses(
            StatusSource::Home,
            Ok(Page::new(statuses(&["s3", "s4"]), PageCursor::new(Some("c2"), None))),
        );
    let mut store = store_with(&remote, memory_vault(), logged_in());

    store.dispatch(Action::Timeline(PageAction::Fetch(Direction::Reload)));
    store.run_until_idle().await;
    store.dispatch(Action::Timeline(PageAction::Fetch(Direction::Older)));
    store.run_until_idle().await;

    let timeline = &store.state().timeline;
    assert_eq!(ids(&timeline.items), vec!["s1", "s2", "s3", "s4"]);
    assert_eq!(timeline.cursor.next.as_deref(), Some("c2"));
    assert_eq!(timeline.cursor.previous, None);
    assert!(!timeline.is_fetching());

    let requests = remote.status_requests(&StatusSource::Home);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[1].cursor.as_deref(), Some("c1"));
    assert_eq!(requests[1].limit, 40);
    Ok(())
}

#[tokio::test]
async fn test_newer_without_previous_cursor_sends_nothing() -> Result<()> {
    let remote = Arc::new(MockRemote::new());
    remote.push_statuses(
        StatusSource::Home,
        Ok(Page::new(statuses(&["s1", "s2"]), PageCursor::new(Some("c1"), None))),
    );
    let mut store = store_with(&remote, memory_vault(), logged_in());
    store.dispatch(Action::Timeline(PageAction::Fetch(Direction::Reload)));
    store.run_until_idle().await;

    let before = store.state().clone();
    let calls_before = remote.calls().len();

    store.dispatch(Action::Timeline(PageAction::Fetch(Direction::Newer)));
    store.run_until_idle().await;

    assert_eq!(*store.state(), before);
    assert_eq!(remote.calls().len(), calls_before);
    Ok(())
}

#[tokio::test]
async fn test_favourite_toggle_reconciles_to_one_update() -> Result<()> {
    let remote = Arc::new(MockRemote::new());
    remote.push_statuses(
        StatusSource::Home,
        Ok(Page::new(statuses(&["s1", "s2", "s3"]), PageCursor::default())),
    );
    let mut store = store_with(&remote, memory_vault(), logged_in());
    store.dispatch(Action::Timeline(PageAction::Fetch(Direction::Reload)));
    store.run_until_idle().await;

    let old = store.state().timeline.items.clone();
    store.dispatch(Action::StatusUpdate(StatusUpdateAction::ToggleFavourite(old[1].clone())));
    store.run_until_idle().await;
    let new = store.state().timeline.items.clone();

    assert_eq!(
        remote.count(|call| *call == Call::UpdateStatus("s2".to_string(), StatusChange::Favourite(true))),
        1
    );

    let edits = ListReconciler::for_entities().reconcile(&old, &new);
    assert_eq!(
        edits,
        vec![Edit::Update {
            at: 1,
            item: new[1].clone(),
        }]
    );
    assert!(new[1].is_favourited());
    assert_eq!(apply(&old, &edits), new);
    assert!(store.state().status_update.pending.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_clear_auth_while_awaiting_purges_credentials() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = Arc::new(FileStore::new(temp_dir.path().join("credentials.toml")));
    let vault = AccountVault::new(file);
    vault.put("k1", "old-token", "example.social")?;
    vault.put("k2", "other-token", "other.social")?;

    let awaiting = RootState {
        auth: AuthState {
            phase: AuthPhase::AwaitingUserAuthorization {
                instance: "example.social".to_string(),
                app: AppRegistration {
                    client_id: "id".to_string(),
                    client_secret: "secret".to_string(),
                },
                authorization_url: "https://example.social/oauth/authorize".to_string(),
            },
        },
        ..RootState::default()
    };
    let remote = Arc::new(MockRemote::new());
    let mut store = store_with(&remote, vault.clone(), awaiting);

    store.dispatch(Action::Auth(AuthAction::ClearAuth));
    store.run_until_idle().await;

    assert_eq!(store.state().auth, AuthState::default());
    assert!(vault.accounts()?.is_empty());
    assert!(vault.get("k1")?.complete().is_none());
    assert!(vault.get("k2")?.complete().is_none());
    assert!(remote.calls().is_empty());
    Ok(())
}

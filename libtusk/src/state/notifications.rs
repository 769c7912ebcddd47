use crate::actions::{Action, PageTarget, StatusUpdateAction};
use crate::effects::Effect;
use crate::pagination::PaginatingData;
use crate::types::Notification;

use super::paged::reduce_page;
use super::Context;

pub fn reduce(
    state: PaginatingData<Notification>,
    action: &Action,
    ctx: &mut Context,
) -> PaginatingData<Notification> {
    match action {
        Action::Notifications(page) => {
            let limit = ctx.page_sizes().notifications;
            reduce_page(state, page, limit, ctx, |session, request| {
                Effect::FetchNotifications { session, request }
            })
        }
        Action::StatusUpdate(StatusUpdateAction::Applied { status: updated, .. }) => {
            state.map_items(|notification| {
                let replaced = notification
                    .status
                    .as_ref()
                    .and_then(|status| status.with_replaced(updated));
                match replaced {
                    Some(status) => Notification {
                        status: Some(status),
                        ..notification
                    },
                    None => notification,
                }
            })
        }
        Action::Error(report) => match report.failed_request(&PageTarget::Notifications) {
            Some(request) => state.fail(request),
            None => state,
        },
        _ => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::PageAction;
    use crate::pagination::{Direction, Page, PageCursor};
    use crate::remote::mock::{account, status};
    use crate::state::testing::{awaited, fold, logged_in};
    use crate::types::NotificationKind;

    fn notification(id: &str, status_id: Option<&str>) -> Notification {
        Notification {
            id: id.to_string(),
            kind: if status_id.is_some() {
                NotificationKind::Favourite
            } else {
                NotificationKind::Follow
            },
            created_at: Default::default(),
            account: account("2"),
            status: status_id.map(status),
        }
    }

    #[test]
    fn test_notifications_page_with_configured_limit() {
        let mut root = logged_in();
        root.stored_defaults.page_sizes.notifications = 15;

        let (root, effects) = fold(&root, Action::Notifications(PageAction::Fetch(Direction::Reload)));
        match &effects[..] {
            [Effect::FetchNotifications { request, .. }] => assert_eq!(request.limit, 15),
            other => panic!("unexpected effects {:?}", other),
        }

        let (root, _) = fold(
            &root,
            Action::Notifications(PageAction::Loaded {
                request: awaited(&root.notifications),
                page: Page::new(
                    vec![notification("n2", Some("s1")), notification("n1", None)],
                    PageCursor::new(Some("n1"), Some("n2")),
                ),
            }),
        );
        assert_eq!(root.notifications.items.len(), 2);
        assert!(root.notifications.can_fetch(Direction::Newer));
    }

    #[test]
    fn test_applied_update_reaches_embedded_status() {
        let root = logged_in();
        let (root, _) = fold(&root, Action::Notifications(PageAction::Fetch(Direction::Reload)));
        let (root, _) = fold(
            &root,
            Action::Notifications(PageAction::Loaded {
                request: awaited(&root.notifications),
                page: Page::new(
                    vec![notification("n2", Some("s1")), notification("n1", None)],
                    PageCursor::default(),
                ),
            }),
        );

        let mut updated = status("s1");
        updated.reblogged = Some(true);
        let (root, _) = fold(
            &root,
            Action::StatusUpdate(StatusUpdateAction::Applied {
                update_id: 1,
                status: updated,
            }),
        );

        let embedded = root.notifications.items[0].status.as_ref().unwrap();
        assert!(embedded.is_reblogged());
        assert!(root.notifications.items[1].status.is_none());
    }
}

//! Home timeline and favourites
//!
//! Both are plain paged status lists. The home timeline additionally drops
//! direct messages after every merge.

use crate::actions::{Action, PageAction, PageTarget, StatusUpdateAction};
use crate::effects::{Effect, StatusTarget};
use crate::pagination::PaginatingData;
use crate::remote::StatusSource;
use crate::types::{Status, Visibility};

use super::paged::reduce_page;
use super::Context;

pub fn reduce_timeline(
    state: PaginatingData<Status>,
    action: &Action,
    ctx: &mut Context,
) -> PaginatingData<Status> {
    match action {
        Action::Timeline(page) => {
            let loaded = matches!(page, PageAction::Loaded { .. });
            let state = reduce_feed(state, page, StatusTarget::Timeline, StatusSource::Home, ctx);
            if loaded {
                state.retain(shown_on_home)
            } else {
                state
            }
        }
        other => reduce_common(state, other, &PageTarget::Timeline),
    }
}

pub fn reduce_favourites(
    state: PaginatingData<Status>,
    action: &Action,
    ctx: &mut Context,
) -> PaginatingData<Status> {
    match action {
        Action::Favourites(page) => reduce_feed(
            state,
            page,
            StatusTarget::Favourites,
            StatusSource::Favourites,
            ctx,
        ),
        other => reduce_common(state, other, &PageTarget::Favourites),
    }
}

/// Direct messages never show on the home timeline.
pub fn shown_on_home(status: &Status) -> bool {
    status.visibility != Visibility::Direct
}

fn reduce_feed(
    state: PaginatingData<Status>,
    page: &PageAction<Status>,
    target: StatusTarget,
    source: StatusSource,
    ctx: &mut Context,
) -> PaginatingData<Status> {
    let limit = ctx.page_sizes().statuses;
    reduce_page(state, page, limit, ctx, |session, request| Effect::FetchStatuses {
        session,
        source,
        request,
        target,
    })
}

/// Reactions shared by every status list: updated statuses and failures.
pub(super) fn reduce_common(
    state: PaginatingData<Status>,
    action: &Action,
    target: &PageTarget,
) -> PaginatingData<Status> {
    match action {
        Action::StatusUpdate(StatusUpdateAction::Applied { status, .. }) => {
            replace_status(state, status)
        }
        Action::Error(report) => match report.failed_request(target) {
            Some(request) => state.fail(request),
            None => state,
        },
        _ => state,
    }
}

pub(super) fn replace_status(state: PaginatingData<Status>, updated: &Status) -> PaginatingData<Status> {
    state.map_items(|status| status.with_replaced(updated).unwrap_or(status))
}

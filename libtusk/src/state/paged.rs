use crate::actions::PageAction;
use crate::effects::Effect;
use crate::pagination::{Direction, PageRequest, PaginatingData};
use crate::remote::Session;
use crate::types::Entity;

use super::Context;

/// Fold a paging action into `data`.
///
/// A fetch plans a request and hands it to `request`, which builds the effect
/// that performs it. Fetching while logged out does nothing.
pub(super) fn reduce_page<T: Entity>(
    data: PaginatingData<T>,
    action: &PageAction<T>,
    limit: usize,
    ctx: &mut Context,
    request: impl FnOnce(Session, PageRequest) -> Effect,
) -> PaginatingData<T> {
    match action {
        PageAction::Fetch(direction) => fetch(data, *direction, limit, ctx, request),
        PageAction::Loaded { request, page } => data.complete(*request, page.clone()),
    }
}

pub(super) fn fetch<T: Entity>(
    data: PaginatingData<T>,
    direction: Direction,
    limit: usize,
    ctx: &mut Context,
    request: impl FnOnce(Session, PageRequest) -> Effect,
) -> PaginatingData<T> {
    let Some(session) = ctx.session() else {
        tracing::debug!(?direction, "fetch ignored, not logged in");
        return data;
    };

    let (data, planned) = data.begin(direction, limit, || ctx.allocate_request());
    if let Some(planned) = planned {
        tracing::debug!(?direction, request = planned.id, cursor = ?planned.cursor, limit, "fetch planned");
        ctx.schedule(request(session, planned));
    }
    data
}

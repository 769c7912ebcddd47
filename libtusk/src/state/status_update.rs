use std::collections::BTreeMap;

use crate::actions::{Action, Origin, StatusUpdateAction};
use crate::effects::Effect;
use crate::remote::StatusChange;
use crate::types::Status;

use super::Context;

/// A favourite or boost toggle waiting for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub status_id: String,
    pub change: StatusChange,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusUpdateState {
    /// Last allocated update id; ids start at 1
    pub last_update_id: u64,
    pub pending: BTreeMap<u64, PendingUpdate>,
}

impl StatusUpdateState {
    /// Whether a toggle of the same kind is already pending for `status_id`.
    pub fn is_pending(&self, status_id: &str, change: StatusChange) -> bool {
        self.pending.values().any(|p| {
            p.status_id == status_id
                && std::mem::discriminant(&p.change) == std::mem::discriminant(&change)
        })
    }
}

pub fn reduce(state: StatusUpdateState, action: &Action, ctx: &mut Context) -> StatusUpdateState {
    match action {
        Action::StatusUpdate(StatusUpdateAction::ToggleFavourite(status)) => {
            let target = status.display_status();
            toggle(state, target, StatusChange::Favourite(!target.is_favourited()), ctx)
        }
        Action::StatusUpdate(StatusUpdateAction::ToggleReblog(status)) => {
            let target = status.display_status();
            toggle(state, target, StatusChange::Reblog(!target.is_reblogged()), ctx)
        }
        Action::StatusUpdate(StatusUpdateAction::Applied { update_id, .. }) => {
            settle(state, *update_id)
        }
        Action::Error(report) => match report.origin {
            Origin::StatusUpdate(update_id) => settle(state, update_id),
            _ => state,
        },
        _ => state,
    }
}

fn toggle(
    mut state: StatusUpdateState,
    target: &Status,
    change: StatusChange,
    ctx: &mut Context,
) -> StatusUpdateState {
    let Some(session) = ctx.session() else {
        tracing::debug!(status = %target.id, "status update ignored, not logged in");
        return state;
    };
    if state.is_pending(&target.id, change) {
        tracing::debug!(status = %target.id, ?change, "update already pending");
        return state;
    }

    let update_id = state.last_update_id + 1;
    state.last_update_id = update_id;
    state.pending.insert(
        update_id,
        PendingUpdate {
            status_id: target.id.clone(),
            change,
        },
    );
    ctx.schedule(Effect::UpdateStatus {
        session,
        update_id,
        status_id: target.id.clone(),
        change,
    });
    state
}

fn settle(mut state: StatusUpdateState, update_id: u64) -> StatusUpdateState {
    if state.pending.remove(&update_id).is_none() {
        tracing::debug!(update_id, "no pending update to settle");
    }
    state
}

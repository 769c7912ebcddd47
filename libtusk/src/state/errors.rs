use crate::actions::{Action, ErrorReport, ErrorsAction};

/// Most recent errors kept for display.
pub const MAX_ERRORS: usize = 20;

/// Reported failures, oldest first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorsState {
    pub records: Vec<ErrorReport>,
    /// Errors reported so far, including dropped and dismissed ones
    pub reported: u64,
}

impl ErrorsState {
    pub fn latest(&self) -> Option<&ErrorReport> {
        self.records.last()
    }

    /// Records reported after the counter read `reported`, if still kept.
    pub fn since(&self, reported: u64) -> &[ErrorReport] {
        let newer = usize::try_from(self.reported.saturating_sub(reported)).unwrap_or(usize::MAX);
        &self.records[self.records.len().saturating_sub(newer)..]
    }
}

pub fn reduce(mut state: ErrorsState, action: &Action) -> ErrorsState {
    match action {
        Action::Error(report) => {
            state.records.push(report.clone());
            state.reported += 1;
            if state.records.len() > MAX_ERRORS {
                let excess = state.records.len() - MAX_ERRORS;
                state.records.drain(..excess);
            }
        }
        Action::Errors(ErrorsAction::Dismiss(index)) if *index < state.records.len() => {
            state.records.remove(*index);
        }
        Action::Errors(ErrorsAction::Clear) => state.records.clear(),
        _ => {}
    }
    state
}

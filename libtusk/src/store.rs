//! The store: single source of truth
//!
//! A [`Store`] owns the current [`RootState`], an inbox of queued actions and
//! the live subscriptions. Every action goes through the inbox, so folds
//! happen one at a time and in a single global order, whether the action came
//! from the caller, from a subscriber or from a finished effect.
//!
//! Per fold the store:
//!
//! 1. folds the action through every slice reducer, collecting effects;
//! 2. replaces the root wholesale;
//! 3. notifies each subscription whose projection changed;
//! 4. queues `Effect::Dispatch` follow-ups and hands every other effect to
//!    the [`EffectHandler`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

use crate::actions::Action;
use crate::effects::{Effect, EffectHandler, NoEffects};
use crate::state::RootState;

/// Cloneable handle for queueing actions into a store.
#[derive(Clone)]
pub struct Dispatcher {
    sender: UnboundedSender<Action>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Dispatcher {
    /// Queue `action`; it folds on the store's next drain.
    pub fn dispatch(&self, action: Action) {
        let kind = action.kind();
        if self.sender.send(action).is_err() {
            tracing::debug!(action = kind, "store gone, action discarded");
        }
    }

    /// Background tasks that may still dispatch.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mark a background task as running until the guard drops.
    pub fn track(&self) -> TaskGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        TaskGuard {
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        }
    }
}

/// Keeps a background task counted as in flight.
pub struct TaskGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_one();
    }
}

trait Observer {
    fn observe(&mut self, state: &RootState);
}

struct Subscription<P, S, F> {
    selector: S,
    callback: F,
    /// Always equals the selector applied to the root before the fold
    last_delivered: P,
}

impl<P, S, F> Observer for Subscription<P, S, F>
where
    P: PartialEq,
    S: Fn(&RootState) -> P,
    F: FnMut(&P),
{
    fn observe(&mut self, state: &RootState) {
        let current = (self.selector)(state);
        if current != self.last_delivered {
            (self.callback)(&current);
            self.last_delivered = current;
        }
    }
}

pub struct Store {
    state: RootState,
    inbox: UnboundedReceiver<Action>,
    dispatcher: Dispatcher,
    subscriptions: Vec<(String, Box<dyn Observer>)>,
    effects: Box<dyn EffectHandler>,
}

impl Store {
    /// A store whose effects are logged and dropped.
    pub fn new(initial: RootState) -> Self {
        Self::with_effects(initial, NoEffects)
    }

    pub fn with_effects(initial: RootState, effects: impl EffectHandler + 'static) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Self {
            state: initial,
            inbox,
            dispatcher: Dispatcher {
                sender,
                in_flight: Arc::new(AtomicUsize::new(0)),
                idle: Arc::new(Notify::new()),
            },
            subscriptions: Vec::new(),
            effects: Box::new(effects),
        }
    }

    pub fn state(&self) -> &RootState {
        &self.state
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Queue `action` and fold everything queued, in order.
    ///
    /// Follow-up actions queued by the fold are folded before this returns;
    /// results of background effects are not waited for.
    pub fn dispatch(&mut self, action: Action) {
        self.dispatcher.dispatch(action);
        self.drain();
    }

    /// Observe a projection of the root.
    ///
    /// `callback` receives the current projection immediately, then once per
    /// fold that changes it. Subscribing again with the same `id` replaces the
    /// previous subscription.
    pub fn subscribe<P, S, F>(&mut self, id: impl Into<String>, selector: S, mut callback: F)
    where
        P: PartialEq + 'static,
        S: Fn(&RootState) -> P + 'static,
        F: FnMut(&P) + 'static,
    {
        let id = id.into();
        let initial = selector(&self.state);
        callback(&initial);

        let observer: Box<dyn Observer> = Box::new(Subscription {
            selector,
            callback,
            last_delivered: initial,
        });
        match self.subscriptions.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = observer,
            None => self.subscriptions.push((id, observer)),
        }
    }

    /// Returns whether a subscription with `id` existed.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(existing, _)| existing != id);
        self.subscriptions.len() != before
    }

    /// Fold every queued action without waiting; returns how many folded.
    pub fn drain(&mut self) -> usize {
        let mut folded = 0;
        while let Ok(action) = self.inbox.try_recv() {
            self.fold(action);
            folded += 1;
        }
        folded
    }

    /// Fold until the inbox is empty and no background effect is running.
    pub async fn run_until_idle(&mut self) {
        loop {
            self.drain();
            if self.dispatcher.in_flight() == 0 {
                // finished tasks queue their action before leaving the count
                if self.drain() == 0 {
                    break;
                }
                continue;
            }
            let next = tokio::select! {
                action = self.inbox.recv() => action,
                _ = self.dispatcher.idle.notified() => None,
            };
            if let Some(action) = next {
                self.fold(action);
            }
        }
    }

    fn fold(&mut self, action: Action) {
        tracing::debug!(action = action.kind(), "fold");
        let mut effects = Vec::new();
        let next = self.state.reduce(&action, &mut effects);
        self.state = next;

        for (_, observer) in self.subscriptions.iter_mut() {
            observer.observe(&self.state);
        }

        for effect in effects {
            match effect {
                Effect::Dispatch(follow_up) => self.dispatcher.dispatch(follow_up),
                other => self.effects.handle(other, &self.dispatcher),
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn wait_for_tasks(&self) {
        while self.dispatcher.in_flight() > 0 {
            self.dispatcher.idle.notified().await;
        }
    }

    /// Take queued actions without folding them.
    #[cfg(test)]
    pub(crate) fn take_queued(&mut self) -> Vec<Action> {
        let mut queued = Vec::new();
        while let Ok(action) = self.inbox.try_recv() {
            queued.push(action);
        }
        queued
    }
}

#![forbid(unsafe_code)]

//! The state container: a single value, a paired reducer, and
//! synchronous change notification.
//!
//! # Architecture
//!
//! `Store<S, I>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Subscribers are stored in registration order; every
//! notification pass works off a snapshot taken at its start, and the
//! live list is not borrowed while callbacks run, so a callback may
//! subscribe, unsubscribe, read, or dispatch re-entrantly.
//!
//! # Invariants
//!
//! 1. State is replaced wholesale per accepted dispatch, never mutated
//!    in place.
//! 2. A dispatch whose reducer output equals the current state is a
//!    no-op: no version bump, no notifications.
//! 3. A failed reducer leaves the state untouched and notifies nobody.
//! 4. Subscribers are notified in registration order, synchronously,
//!    after the state has settled, exactly once per accepted dispatch.
//! 5. Subscribing or unsubscribing during a notification pass never
//!    changes which callbacks that pass invokes.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::error::ReducerError;

type Callback = Rc<dyn Fn()>;

#[derive(Default)]
struct SubscriberList {
    entries: Vec<(u64, Callback)>,
    next_id: u64,
}

struct StoreInner<S, I> {
    state: RefCell<S>,
    #[allow(clippy::type_complexity)]
    reducer: Box<dyn Fn(&S, &I) -> Result<S, ReducerError>>,
    subscribers: Rc<RefCell<SubscriberList>>,
    /// Bumps exactly once per accepted (state-changing) dispatch.
    version: Cell<u64>,
}

/// A reducer-driven state container.
///
/// Cloning a `Store` creates a new handle to the **same** state.
pub struct Store<S, I> {
    inner: Rc<StoreInner<S, I>>,
}

impl<S, I> Clone for Store<S, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: std::fmt::Debug, I> std::fmt::Debug for Store<S, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.borrow())
            .field("version", &self.inner.version.get())
            .field(
                "subscribers",
                &self.inner.subscribers.borrow().entries.len(),
            )
            .finish()
    }
}

impl<S, I> Store<S, I>
where
    S: Clone + PartialEq + 'static,
{
    /// Create a store holding `initial`, permanently paired with
    /// `reducer`.
    pub fn new(
        initial: S,
        reducer: impl Fn(&S, &I) -> Result<S, ReducerError> + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(initial),
                reducer: Box::new(reducer),
                subscribers: Rc::new(RefCell::new(SubscriberList::default())),
                version: Cell::new(0),
            }),
        }
    }

    /// Run the reducer on the current state and `intent`.
    ///
    /// On success the held state is replaced with the result; if the
    /// result differs from the previous state, every subscriber in the
    /// start-of-pass snapshot is invoked, in registration order, before
    /// this returns. On failure the state is untouched, nobody is
    /// notified, and the error propagates.
    pub fn dispatch(&self, intent: I) -> Result<(), ReducerError> {
        let next = {
            let state = self.inner.state.borrow();
            (self.inner.reducer)(&state, &intent)?
        };
        let changed = {
            let mut state = self.inner.state.borrow_mut();
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        };
        if changed {
            self.inner.version.set(self.inner.version.get() + 1);
            tracing::debug!(version = self.inner.version.get(), "state replaced");
            // Snapshot, then release the borrow before running callbacks.
            let snapshot: Vec<Callback> = self
                .inner
                .subscribers
                .borrow()
                .entries
                .iter()
                .map(|(_, callback)| Rc::clone(callback))
                .collect();
            for callback in snapshot {
                callback();
            }
        } else {
            tracing::trace!("dispatch produced an equal state, no notification");
        }
        Ok(())
    }

    /// Current state, by clone.
    #[must_use]
    pub fn get(&self) -> S {
        self.inner.state.borrow().clone()
    }

    /// Access the current state by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure dispatches on the same store (re-entrant
    /// borrow); read-only access from subscribers is fine.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Register `callback` to run after every accepted dispatch.
    ///
    /// The returned guard removes the callback when dropped or
    /// explicitly via [`Subscription::unsubscribe`]; call
    /// [`Subscription::detach`] to keep the callback registered for the
    /// store's lifetime instead.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let mut list = self.inner.subscribers.borrow_mut();
        let id = list.next_id;
        list.next_id += 1;
        list.entries.push((id, Rc::new(callback)));
        Subscription {
            list: Rc::downgrade(&self.inner.subscribers),
            id,
            detached: false,
        }
    }

    /// How many accepted dispatches have replaced the state so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().entries.len()
    }
}

/// RAII guard for a registered subscriber callback.
///
/// Removal takes effect immediately on the live list; a notification
/// pass already in flight still works off its snapshot.
pub struct Subscription {
    list: Weak<RefCell<SubscriberList>>,
    id: u64,
    detached: bool,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(mut self) {
        self.remove();
        self.detached = true;
    }

    /// Leave the callback registered for the store's lifetime.
    pub fn detach(mut self) {
        self.detached = true;
    }

    fn remove(&self) {
        if let Some(list) = self.list.upgrade() {
            list.borrow_mut().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Intent {
        Add(i64),
        Clamp(i64),
        Fail,
    }

    fn counter() -> Store<i64, Intent> {
        Store::new(0, |state, intent| match intent {
            Intent::Add(n) => Ok(state + n),
            Intent::Clamp(max) => Ok((*state).min(*max)),
            Intent::Fail => Err("refused".into()),
        })
    }

    #[test]
    fn dispatch_round_trips_through_the_reducer() {
        let store = counter();
        store.dispatch(Intent::Add(5)).unwrap();
        assert_eq!(store.get(), 5);
        store.dispatch(Intent::Add(-2)).unwrap();
        assert_eq!(store.get(), 3);
    }

    #[test]
    fn subscribers_see_the_settled_state() {
        let store = counter();
        let seen = Rc::new(Cell::new(-1));
        let seen_clone = Rc::clone(&seen);
        let reader = store.clone();
        store
            .subscribe(move || seen_clone.set(reader.get()))
            .detach();

        store.dispatch(Intent::Add(7)).unwrap();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn one_notification_per_subscriber_per_change() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        store
            .subscribe(move || calls_clone.set(calls_clone.get() + 1))
            .detach();

        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(calls.get(), 1);
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn equal_state_means_no_notification() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        store
            .subscribe(move || calls_clone.set(calls_clone.get() + 1))
            .detach();

        // 0.min(10) == 0: the reducer returns an equal value.
        store.dispatch(Intent::Clamp(10)).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let store = counter();
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_a = Rc::clone(&order);
        store.subscribe(move || order_a.borrow_mut().push("a")).detach();
        let order_b = Rc::clone(&order);
        store.subscribe(move || order_b.borrow_mut().push("b")).detach();
        let order_c = Rc::clone(&order);
        store.subscribe(move || order_c.borrow_mut().push("c")).detach();

        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(*order.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn reducer_failure_leaves_state_and_subscribers_untouched() {
        let store = counter();
        store.dispatch(Intent::Add(4)).unwrap();

        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        store
            .subscribe(move || calls_clone.set(calls_clone.get() + 1))
            .detach();

        let err = store.dispatch(Intent::Fail).unwrap_err();
        assert_eq!(err.message(), "refused");
        assert_eq!(store.get(), 4);
        assert_eq!(calls.get(), 0);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn unsubscribed_callback_is_not_invoked() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let subscription = store.subscribe(move || calls_clone.set(calls_clone.get() + 1));

        subscription.unsubscribe();
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        {
            let _subscription =
                store.subscribe(move || calls_clone.set(calls_clone.get() + 1));
        }
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn removal_during_notification_spares_the_current_snapshot() {
        let store = counter();
        let b_calls = Rc::new(Cell::new(0u32));

        // A unsubscribes B from inside the first notification pass.
        let b_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot_for_a = Rc::clone(&b_slot);
        store
            .subscribe(move || {
                if let Some(sub) = slot_for_a.borrow_mut().take() {
                    sub.unsubscribe();
                }
            })
            .detach();

        let b_calls_clone = Rc::clone(&b_calls);
        let b = store.subscribe(move || b_calls_clone.set(b_calls_clone.get() + 1));
        *b_slot.borrow_mut() = Some(b);

        // First dispatch: B was in the snapshot, so it still runs once.
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(b_calls.get(), 1);

        // Removed before this dispatch: never invoked again.
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(b_calls.get(), 1);
    }

    #[test]
    fn subscribing_during_notification_waits_for_the_next_pass() {
        let store = counter();
        let late_calls = Rc::new(Cell::new(0u32));

        let store_for_a = store.clone();
        let late_calls_clone = Rc::clone(&late_calls);
        let armed = Cell::new(true);
        store
            .subscribe(move || {
                if armed.get() {
                    armed.set(false);
                    let late_calls_inner = Rc::clone(&late_calls_clone);
                    store_for_a
                        .subscribe(move || late_calls_inner.set(late_calls_inner.get() + 1))
                        .detach();
                }
            })
            .detach();

        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(late_calls.get(), 0);

        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn reentrant_dispatch_snapshots_the_updated_list() {
        let store = counter();
        let b_calls = Rc::new(Cell::new(0u32));

        // During the first pass, A unsubscribes B and dispatches again.
        // B was only in the first snapshot, so it runs exactly once.
        let b_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot_for_a = Rc::clone(&b_slot);
        let store_for_a = store.clone();
        store
            .subscribe(move || {
                if let Some(sub) = slot_for_a.borrow_mut().take() {
                    sub.unsubscribe();
                    store_for_a.dispatch(Intent::Add(10)).unwrap();
                }
            })
            .detach();

        let b_calls_clone = Rc::clone(&b_calls);
        let b = store.subscribe(move || b_calls_clone.set(b_calls_clone.get() + 1));
        *b_slot.borrow_mut() = Some(b);

        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(b_calls.get(), 1);
        assert_eq!(store.get(), 11);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn version_counts_accepted_changes_only() {
        let store = counter();
        assert_eq!(store.version(), 0);
        store.dispatch(Intent::Add(1)).unwrap();
        store.dispatch(Intent::Clamp(50)).unwrap(); // equal state
        let _ = store.dispatch(Intent::Fail);
        store.dispatch(Intent::Add(1)).unwrap();
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn with_borrows_without_cloning() {
        let store: Store<Vec<i64>, i64> = Store::new(vec![1, 2, 3], |state, intent| {
            let mut next = state.clone();
            next.push(*intent);
            Ok(next)
        });
        let sum = store.with(|v| v.iter().sum::<i64>());
        assert_eq!(sum, 6);

        store.dispatch(4).unwrap();
        assert_eq!(store.with(Vec::len), 4);
    }

    #[test]
    fn clone_shares_state() {
        let store = counter();
        let other = store.clone();
        store.dispatch(Intent::Add(9)).unwrap();
        assert_eq!(other.get(), 9);
    }
}

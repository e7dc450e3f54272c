#![forbid(unsafe_code)]

//! Lazy, memoized projections of store state.
//!
//! # Design
//!
//! [`Derived<T>`] wraps a projection function and its cached result. A
//! store subscription marks the cache dirty on every accepted dispatch;
//! the next [`get()`](Derived::get) recomputes and caches. The
//! projection runs at most once per accepted state change.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value stale with respect to the store.
//! 2. The projection runs only when dirty and only on access.
//! 3. An equal-state dispatch does not dirty the cache (the store does
//!    not notify).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::store::{Store, Subscription};

struct DerivedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
}

/// A memoized value projected from a store's state.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
    /// Keeps the dirty-marking callback registered.
    _subscription: Subscription,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived")
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

impl<T: Clone + 'static> Derived<T> {
    /// Create a projection of `store`'s state.
    pub fn new<S, I>(store: &Store<S, I>, map: impl Fn(&S) -> T + 'static) -> Self
    where
        S: Clone + PartialEq + 'static,
        I: 'static,
    {
        let reader = store.clone();
        let inner = Rc::new(DerivedInner {
            compute: Box::new(move || reader.with(|state| map(state))),
            cached: RefCell::new(None),
            dirty: Cell::new(true), // Dirty initially, computes on first get().
        });
        let weak = Rc::downgrade(&inner);
        let subscription = store.subscribe(move || {
            if let Some(strong) = weak.upgrade() {
                strong.dirty.set(true);
            }
        });
        Self {
            inner,
            _subscription: subscription,
        }
    }

    /// Current projection, recomputing if the store changed since the
    /// last access.
    #[must_use]
    pub fn get(&self) -> T {
        self.refresh();
        self.inner
            .cached
            .borrow()
            .as_ref()
            .expect("cached is always Some after refresh")
            .clone()
    }

    /// Access the projection by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        f(self
            .inner
            .cached
            .borrow()
            .as_ref()
            .expect("cached is always Some after refresh"))
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    fn refresh(&self) {
        if self.inner.dirty.get() || self.inner.cached.borrow().is_none() {
            let value = (self.inner.compute)();
            *self.inner.cached.borrow_mut() = Some(value);
            self.inner.dirty.set(false);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

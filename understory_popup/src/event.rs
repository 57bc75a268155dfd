// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed, synchronous listener lists.
//!
//! An [`Event`] runs its listeners in registration order against a mutable
//! payload. Later listeners observe what earlier listeners wrote, which is how
//! cancellable phases work: any listener may set `cancel`, and the emitter
//! inspects the payload once [`Event::emit`] returns.
//!
//! ```
//! use understory_popup::Event;
//!
//! #[derive(Default)]
//! struct Closing {
//!     cancel: bool,
//! }
//!
//! let closing: Event<Closing> = Event::new();
//! closing.subscribe(|e| e.cancel = true);
//!
//! let mut args = Closing::default();
//! closing.emit(&mut args);
//! assert!(args.cancel);
//! ```
//!
//! ## Re-entrancy
//!
//! Emission works on a snapshot of the listener list. Listeners may subscribe,
//! unsubscribe, or emit the same event again from inside a callback. Changes
//! to the list take effect at the next emission.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// Handle returned by [`Event::subscribe`], used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

type Listener<A> = Rc<dyn Fn(&mut A)>;

/// A list of listeners for payloads of type `A`.
pub struct Event<A> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(ListenerId, Listener<A>)>>,
}

impl<A> Event<A> {
    /// Create an event with no listeners.
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener. It runs after every listener registered before it.
    pub fn subscribe(&self, listener: impl Fn(&mut A) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(l, _)| *l != id);
        listeners.len() != before
    }

    /// Run every listener against `args`, in registration order.
    pub fn emit(&self, args: &mut A) {
        let snapshot: SmallVec<[Listener<A>; 4]> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener(args);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

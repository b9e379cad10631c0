/*!
Generic event primitives shared by every stateful entity in the crate (`Device`, `Service`,
`GenaSubscription`): a typed broadcast [`Emitter`] and a [`StateCell`] that tracks a small state
enum and emits a transition only when the state actually changes.
*/

use std::fmt::Debug;
use std::sync::Mutex;
use tokio::sync::broadcast;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A typed publish/subscribe channel. Each event kind in the crate (device lifecycle, service
/// lifecycle, subscription updates) defines its own payload enum and wraps one of these rather
/// than multiplexing on a string event name.
///
/// Subscribing late means missing earlier events; this mirrors `tokio::sync::broadcast` directly,
/// which is the right trade-off here since callers are expected to subscribe before the producer
/// starts running.
#[derive(Debug)]
pub struct Emitter<E: Clone> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Emitter<E> {
    /// Create a new emitter with the given channel capacity (number of events a slow subscriber
    /// may lag behind before it starts missing them).
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Emitter { sender }
    }

    /// Create a new emitter with a capacity suitable for low-frequency lifecycle events.
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    /// Register a new subscriber. The returned receiver observes every event emitted after this
    /// call.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers. A send with no subscribers is not an error.
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// A cloned handle to the underlying sender, for a task that needs to go on emitting after
    /// the call that spawned it returns (the registry's per-device forwarder is the only user of
    /// this today).
    pub(crate) fn sender_handle(&self) -> broadcast::Sender<E> {
        self.sender.clone()
    }
}

///
/// A generic holder for a small lifecycle-state enum `S`. Setting the state to its current value
/// is a no-op and does not emit a transition; this mirrors the invariant that a state machine
/// must not notify subscribers of a non-change.
///
#[derive(Debug)]
pub struct StateCell<S> {
    state: Mutex<S>,
}

/// A state transition: the new state and the one it replaced.
#[derive(Clone, Debug)]
pub struct Transition<S> {
    pub new_state: S,
    pub previous_state: S,
}

impl<S> StateCell<S>
where
    S: Copy + Eq + Debug,
{
    pub fn new(initial: S) -> Self {
        StateCell {
            state: Mutex::new(initial),
        }
    }

    /// The current state.
    pub fn get(&self) -> S {
        *self.state.lock().unwrap()
    }

    /// Set the state, returning `Some(Transition)` if it actually changed, `None` if `new` equals
    /// the current state (in which case no side effect other than this call occurred).
    pub fn set(&self, new: S) -> Option<Transition<S>> {
        let mut guard = self.state.lock().unwrap();
        if *guard == new {
            trace!("StateCell::set - no-op, already {:?}", new);
            None
        } else {
            let previous_state = *guard;
            *guard = new;
            Some(Transition {
                new_state: new,
                previous_state,
            })
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    enum Lifecycle {
        Down,
        Up,
    }

    #[test]
    fn state_cell_no_op_on_same_value() {
        let cell = StateCell::new(Lifecycle::Down);
        assert!(cell.set(Lifecycle::Down).is_none());
        let t = cell.set(Lifecycle::Up).unwrap();
        assert_eq!(t.previous_state, Lifecycle::Down);
        assert_eq!(t.new_state, Lifecycle::Up);
        assert!(cell.set(Lifecycle::Up).is_none());
    }

    #[tokio::test]
    async fn emitter_delivers_to_subscriber() {
        let emitter: Emitter<i32> = Emitter::new();
        let mut rx = emitter.subscribe();
        emitter.emit(42);
        assert_eq!(rx.recv().await.unwrap(), 42);
    }
}

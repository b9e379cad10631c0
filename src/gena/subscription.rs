/*!
A single GENA subscription: its SID, the sequence-number tracker that enforces delivery
ordering, and the expiry timer driven by its negotiated `TIMEOUT`.
*/

use crate::event::{Emitter, StateCell, Transition};
use crate::types::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscriptionState {
    Active,
    Expired,
}

#[derive(Clone, Debug)]
pub enum SubscriptionEvent {
    StateChanged(Transition<SubscriptionState>),
    PropertyChanged { name: String, value: Value },
}

///
/// A live subscription to one service's eventing URL. Constructed once [`subscribe`] succeeds;
/// [`GenaBinding`](crate::gena::binding::GenaBinding) owns the renewal schedule, this type owns
/// only the expiry-on-silence timer and the SEQ-ordering rule.
///
/// [`subscribe`]: crate::gena::session::subscribe
///
#[derive(Debug)]
pub struct GenaSubscription {
    sid: String,
    event_url: String,
    callback_url: String,
    timeout_secs: Mutex<u64>,
    last_seq: Mutex<Option<u32>>,
    state: StateCell<SubscriptionState>,
    events: Emitter<SubscriptionEvent>,
    expiry: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl GenaSubscription {
    pub fn new(sid: String, event_url: String, callback_url: String, timeout_secs: u64) -> Arc<Self> {
        let subscription = Arc::new(GenaSubscription {
            sid,
            event_url,
            callback_url,
            timeout_secs: Mutex::new(timeout_secs),
            last_seq: Mutex::new(None),
            state: StateCell::new(SubscriptionState::Active),
            events: Emitter::new(),
            expiry: Mutex::new(None),
        });
        subscription.rearm_expiry(timeout_secs);
        subscription
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn event_url(&self) -> &str {
        &self.event_url
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn timeout_secs(&self) -> u64 {
        *self.timeout_secs.lock().unwrap()
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SubscriptionEvent> {
        self.events.subscribe()
    }

    /// Apply a renewal's new `TIMEOUT` and re-arm the expiry timer. A no-op if the subscription
    /// has already expired.
    pub fn renewed(self: &Arc<Self>, timeout_secs: u64) {
        if self.state() == SubscriptionState::Expired {
            return;
        }
        *self.timeout_secs.lock().unwrap() = timeout_secs;
        self.rearm_expiry(timeout_secs);
    }

    /// Mark this subscription expired, cancelling its timer. Idempotent.
    pub fn expire(self: &Arc<Self>) {
        if let Some(transition) = self.state.set(SubscriptionState::Expired) {
            self.events.emit(SubscriptionEvent::StateChanged(transition));
        }
        if let Some((cancel, _handle)) = self.expiry.lock().unwrap().take() {
            cancel.cancel();
        }
    }

    /// Accept or drop an incoming NOTIFY's `SEQ`. `0` always resets the tracker (the device
    /// restarted its event session); any other value must be strictly greater than the last
    /// accepted one, otherwise it is a duplicate or out-of-order delivery and is dropped.
    pub fn accept_sequence(&self, seq: u32) -> bool {
        let mut last = self.last_seq.lock().unwrap();
        let accept = match *last {
            None => true,
            Some(previous) => seq == 0 || seq > previous,
        };
        if accept {
            *last = Some(seq);
        } else {
            trace!(
                "GenaSubscription::accept_sequence - dropping out-of-order SEQ {} (last {:?}) for {}",
                seq, *last, self.sid
            );
        }
        accept
    }

    /// Publish a property update carried in a NOTIFY body.
    pub fn publish(&self, name: String, value: Value) {
        self.events.emit(SubscriptionEvent::PropertyChanged { name, value });
    }

    fn rearm_expiry(self: &Arc<Self>, timeout_secs: u64) {
        let mut guard = self.expiry.lock().unwrap();
        if let Some((cancel, _handle)) = guard.take() {
            cancel.cancel();
        }
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let subscription = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
                    debug!("GenaSubscription - {} expired after {}s of silence", subscription.sid, timeout_secs);
                    subscription.expire();
                }
            }
        });
        *guard = Some((cancel, handle));
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Advance paused test time in small steps (yielding between each) so that timers armed by
    /// tasks spawned just before this call are reliably polled and woken.
    async fn advance_in_steps(total: Duration, step: Duration) {
        tokio::task::yield_now().await;
        let mut remaining = total;
        while remaining > Duration::ZERO {
            let this_step = remaining.min(step);
            tokio::time::advance(this_step).await;
            tokio::task::yield_now().await;
            remaining -= this_step;
        }
    }

    fn fixture() -> Arc<GenaSubscription> {
        GenaSubscription::new(
            "uuid:subscription-1".to_string(),
            "http://192.168.1.1:5885/event".to_string(),
            "http://192.168.1.50:8080/notify/subscription-1".to_string(),
            1800,
        )
    }

    #[tokio::test]
    async fn accepts_strictly_increasing_sequence() {
        let sub = fixture();
        assert!(sub.accept_sequence(0));
        assert!(sub.accept_sequence(1));
        assert!(sub.accept_sequence(2));
        assert!(!sub.accept_sequence(2));
        assert!(!sub.accept_sequence(1));
        assert!(sub.accept_sequence(3));
    }

    #[tokio::test]
    async fn seq_zero_always_resets_tracker() {
        let sub = fixture();
        assert!(sub.accept_sequence(5));
        assert!(sub.accept_sequence(0));
        assert!(sub.accept_sequence(1));
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_timeout_of_silence() {
        let sub = GenaSubscription::new(
            "uuid:subscription-2".to_string(),
            "http://192.168.1.1:5885/event".to_string(),
            "http://192.168.1.50:8080/notify/subscription-2".to_string(),
            1,
        );
        assert_eq!(sub.state(), SubscriptionState::Active);
        advance_in_steps(Duration::from_millis(1100), Duration::from_millis(100)).await;
        assert_eq!(sub.state(), SubscriptionState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_before_expiry_keeps_it_active() {
        let sub = GenaSubscription::new(
            "uuid:subscription-3".to_string(),
            "http://192.168.1.1:5885/event".to_string(),
            "http://192.168.1.50:8080/notify/subscription-3".to_string(),
            2,
        );
        tokio::time::advance(Duration::from_millis(1500)).await;
        sub.renewed(2);
        tokio::time::advance(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        assert_eq!(sub.state(), SubscriptionState::Active);
    }
}

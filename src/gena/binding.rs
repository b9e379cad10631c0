/*!
Bridges a [`GenaSubscription`] to the [`model`](crate::model) state variables it was opened for:
every accepted property update flows into [`StateVariable::set_value`], and a renewal is
scheduled automatically well before the subscription would otherwise expire.

This is the only place allowed to depend on both `gena` and `model` — the reverse direction
(`model` importing anything from `gena`) does not exist anywhere in this crate.
*/

use crate::gena::session::GenaSession;
use crate::gena::subscription::{GenaSubscription, SubscriptionEvent};
use crate::model::service::Service;
use crate::model::state_variable::StateVariable;
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Renew at 80% of the negotiated timeout, leaving headroom for request latency and a missed
/// tick before the device actually expires the subscription.
const RENEW_FRACTION_NUM: u64 = 4;
const RENEW_FRACTION_DEN: u64 = 5;

///
/// Owns the auto-renew task for one subscription and forwards its events into the matching
/// service's state variables by name.
///
#[derive(Debug)]
pub struct GenaBinding {
    subscription: Arc<GenaSubscription>,
    renew_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl GenaBinding {
    /// Bind `subscription` to `service`'s state variables and start the forwarding task plus the
    /// auto-renew schedule.
    pub fn bind(subscription: Arc<GenaSubscription>, service: Arc<Service>, session: Arc<GenaSession>) -> Arc<Self> {
        let state_variables: HashMap<String, Arc<StateVariable>> = service
            .state_variables()
            .map(|variable| (variable.name().to_string(), variable.clone()))
            .collect();

        let binding = Arc::new(GenaBinding {
            subscription: subscription.clone(),
            renew_task: Mutex::new(None),
        });

        let mut events = subscription.subscribe();
        let forwarder_subscription = subscription.clone();
        let forwarder_session = session.clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    SubscriptionEvent::PropertyChanged { name, value } => {
                        if let Some(variable) = state_variables.get(&name) {
                            let parsed = variable.data_type().parse(&value.to_wire_string()).unwrap_or(value);
                            variable.set_value(parsed);
                        } else {
                            trace!("GenaBinding - {} is not a known state variable", name);
                        }
                    }
                    SubscriptionEvent::StateChanged(transition)
                        if transition.new_state == crate::gena::subscription::SubscriptionState::Expired =>
                    {
                        forwarder_session.forget(forwarder_subscription.sid());
                        break;
                    }
                    SubscriptionEvent::StateChanged(_) => {}
                }
            }
        });

        binding.schedule_renew(session);
        binding
    }

    pub fn subscription(&self) -> &Arc<GenaSubscription> {
        &self.subscription
    }

    /// Cancel the auto-renew schedule and unsubscribe.
    pub async fn unbind(&self, session: &GenaSession) -> Result<()> {
        if let Some((cancel, _handle)) = self.renew_task.lock().unwrap().take() {
            cancel.cancel();
        }
        session.unsubscribe(&self.subscription).await
    }

    fn schedule_renew(self: &Arc<Self>, session: Arc<GenaSession>) {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let binding = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let timeout_secs = binding.subscription.timeout_secs();
                let delay = timeout_secs.saturating_mul(RENEW_FRACTION_NUM) / RENEW_FRACTION_DEN;
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(delay.max(1))) => {}
                }
                if binding.subscription.state() == crate::gena::subscription::SubscriptionState::Expired {
                    break;
                }
                if let Err(e) = session.renew(&binding.subscription).await {
                    warn!("GenaBinding::schedule_renew - renewal of {} failed: {}", binding.subscription.sid(), e);
                    break;
                }
            }
        });
        *self.renew_task.lock().unwrap() = Some((cancel, handle));
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #[test]
    fn renew_fraction_is_four_fifths() {
        assert_eq!(super::RENEW_FRACTION_NUM * 100 / super::RENEW_FRACTION_DEN, 80);
    }
}

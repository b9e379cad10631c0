/*!
A live service: its action and state-variable tables plus a lifecycle state that tracks whether
its SCPD schema has finished loading.
*/

use crate::event::{Emitter, StateCell, Transition};
use crate::model::action::Action;
use crate::model::device::Device;
use crate::model::state_variable::StateVariable;
use crate::urn::Urn;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// A service's lifecycle. A service is constructed in `Down` state before its SCPD has loaded;
/// it becomes `Up` only once its action/state-variable tables are populated and its owning
/// device is up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceState {
    Down,
    Up,
}

#[derive(Clone, Debug)]
pub enum ServiceEvent {
    StateChanged(Transition<ServiceState>),
}

///
/// A live UPnP service: schema (actions, state variables) plus control/event URLs resolved
/// against its owning device's location.
///
#[derive(Debug)]
pub struct Service {
    service_id: String,
    service_type: Urn,
    control_url: String,
    event_sub_url: String,
    scpd_url: String,
    actions: HashMap<String, Action>,
    state_variables: HashMap<String, Arc<StateVariable>>,
    device: Weak<Device>,
    state: StateCell<ServiceState>,
    events: Emitter<ServiceEvent>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Service {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service_id: String,
        service_type: Urn,
        control_url: String,
        event_sub_url: String,
        scpd_url: String,
        actions: HashMap<String, Action>,
        state_variables: HashMap<String, Arc<StateVariable>>,
        device: Weak<Device>,
    ) -> Arc<Self> {
        Arc::new(Service {
            service_id,
            service_type,
            control_url,
            event_sub_url,
            scpd_url,
            actions,
            state_variables,
            device,
            state: StateCell::new(ServiceState::Down),
            events: Emitter::new(),
        })
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn service_type(&self) -> &Urn {
        &self.service_type
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    pub fn event_sub_url(&self) -> &str {
        &self.event_sub_url
    }

    pub fn scpd_url(&self) -> &str {
        &self.scpd_url
    }

    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.upgrade()
    }

    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn state_variable(&self, name: &str) -> Option<&Arc<StateVariable>> {
        self.state_variables.get(name)
    }

    pub fn state_variables(&self) -> impl Iterator<Item = &Arc<StateVariable>> {
        self.state_variables.values()
    }

    /// Mark this service up once its schema has loaded and its device is advertising. A no-op
    /// (no event emitted) if already up.
    pub fn up(&self) {
        if let Some(transition) = self.state.set(ServiceState::Up) {
            self.events.emit(ServiceEvent::StateChanged(transition));
        }
    }

    /// Mark this service down, typically cascaded from the owning device's expiry.
    pub fn down(&self) {
        if let Some(transition) = self.state.set(ServiceState::Down) {
            self.events.emit(ServiceEvent::StateChanged(transition));
        }
    }
}

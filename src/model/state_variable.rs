/*!
A live service state variable: its schema (from the SCPD description) plus the most recently
observed value and an update stream fed by GENA eventing.
*/

use crate::description::scpd::{AllowedRange, StateVariableDescription};
use crate::event::Emitter;
use crate::types::{DataType, Value};
use std::sync::Mutex;
use tokio::sync::broadcast;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// A service state variable. `send_events` mirrors the SCPD declaration; it does not by itself
/// mean a subscription is active — see [`gena::binding`](crate::gena::binding) for that.
///
#[derive(Debug)]
pub struct StateVariable {
    name: String,
    data_type: DataType,
    default_value: Option<String>,
    allowed_values: Vec<String>,
    allowed_range: Option<AllowedRange>,
    send_events: bool,
    multicast: bool,
    current_value: Mutex<Option<Value>>,
    updates: Emitter<Value>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl StateVariable {
    pub fn from_description(description: &StateVariableDescription) -> Self {
        StateVariable {
            name: description.name.clone(),
            data_type: description.data_type,
            default_value: description.default_value.clone(),
            allowed_values: description.allowed_values.clone(),
            allowed_range: description.allowed_range.clone(),
            send_events: description.send_events,
            multicast: description.multicast,
            current_value: Mutex::new(None),
            updates: Emitter::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn allowed_values(&self) -> &[String] {
        &self.allowed_values
    }

    pub fn allowed_range(&self) -> Option<&AllowedRange> {
        self.allowed_range.as_ref()
    }

    pub fn send_events(&self) -> bool {
        self.send_events
    }

    pub fn multicast(&self) -> bool {
        self.multicast
    }

    /// The most recently observed value, either from a GENA event or a SOAP `out` argument.
    pub fn value(&self) -> Option<Value> {
        self.current_value.lock().unwrap().clone()
    }

    /// Record a new value and notify subscribers.
    pub fn set_value(&self, value: Value) {
        *self.current_value.lock().unwrap() = Some(value.clone());
        self.updates.emit(value);
    }

    /// Subscribe to value updates as they are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.updates.subscribe()
    }
}

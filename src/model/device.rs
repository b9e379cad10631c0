/*!
The live device tree: a `Device` owns its child devices and services, tracks a lifecycle state
driven by SSDP advertisements, and arms a single expiry timer per `CACHE-CONTROL: max-age`.
*/

use crate::event::{Emitter, StateCell, Transition};
use crate::model::service::Service;
use crate::ssdp::message::{SsdpMessage, Target};
use crate::urn::Urn;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// `max-age` assumed when an advertisement omits `CACHE-CONTROL`.
pub const DEFAULT_MAX_AGE_SECS: u64 = 900;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceState {
    Down,
    Up,
}

#[derive(Clone, Debug)]
pub enum DeviceEvent {
    StateChanged(Transition<DeviceState>),
}

///
/// A live UPnP device, root or embedded. Root devices are owned by the
/// [registry](crate::registry); embedded devices are owned by their parent, reachable from it
/// only through a strong child link, while the registry indexes them weakly.
///
#[derive(Debug)]
pub struct Device {
    uuid: String,
    address: Mutex<Option<IpAddr>>,
    location: Mutex<String>,
    device_type: Mutex<Urn>,
    friendly_name: Mutex<String>,
    metadata: Mutex<HashMap<String, String>>,
    urns_seen: Mutex<HashSet<String>>,
    parent: Option<Weak<Device>>,
    children: Mutex<Vec<Arc<Device>>>,
    services: Mutex<HashMap<String, Arc<Service>>>,
    state: StateCell<DeviceState>,
    events: Emitter<DeviceEvent>,
    expiry: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Device {
    pub fn new(
        uuid: String,
        address: Option<IpAddr>,
        location: String,
        device_type: Urn,
        friendly_name: String,
        metadata: HashMap<String, String>,
        parent: Option<Weak<Device>>,
    ) -> Arc<Self> {
        Arc::new(Device {
            uuid,
            address: Mutex::new(address),
            location: Mutex::new(location),
            device_type: Mutex::new(device_type),
            friendly_name: Mutex::new(friendly_name),
            metadata: Mutex::new(metadata),
            urns_seen: Mutex::new(HashSet::new()),
            parent,
            children: Mutex::new(Vec::new()),
            services: Mutex::new(HashMap::new()),
            state: StateCell::new(DeviceState::Down),
            events: Emitter::new(),
            expiry: Mutex::new(None),
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn address(&self) -> Option<IpAddr> {
        *self.address.lock().unwrap()
    }

    /// Record the source IP of the most recent activating packet for this device.
    pub fn set_address(&self, address: IpAddr) {
        *self.address.lock().unwrap() = Some(address);
    }

    pub fn location(&self) -> String {
        self.location.lock().unwrap().clone()
    }

    pub fn device_type(&self) -> Urn {
        self.device_type.lock().unwrap().clone()
    }

    pub fn friendly_name(&self) -> String {
        self.friendly_name.lock().unwrap().clone()
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        self.metadata.lock().unwrap().get(key).cloned()
    }

    pub fn urns_seen(&self) -> HashSet<String> {
        self.urns_seen.lock().unwrap().clone()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent(&self) -> Option<Arc<Device>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn state(&self) -> DeviceState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    pub fn add_child(self: &Arc<Self>, child: Arc<Device>) {
        self.children.lock().unwrap().push(child);
    }

    pub fn children(&self) -> Vec<Arc<Device>> {
        self.children.lock().unwrap().clone()
    }

    pub fn add_service(self: &Arc<Self>, service: Arc<Service>) {
        self.services
            .lock()
            .unwrap()
            .insert(service.service_id().to_string(), service);
    }

    pub fn service(&self, service_id: &str) -> Option<Arc<Service>> {
        self.services.lock().unwrap().get(service_id).cloned()
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.services.lock().unwrap().values().cloned().collect()
    }

    /// Iterate this device and every descendant, depth-first.
    pub fn iter_tree(self: &Arc<Self>) -> Vec<Arc<Device>> {
        let mut out = vec![self.clone()];
        for child in self.children() {
            out.extend(child.iter_tree());
        }
        out
    }

    /// Transition to `Up` and (re-)arm the expiry timer at `max_age` seconds (default 900 when
    /// not given). Re-advertising while already up cancels and re-arms the timer without
    /// emitting a spurious state transition. Cascades `up` to every service whose schema has
    /// already loaded (a service still mid-fetch brings itself up when that fetch completes).
    pub fn up(self: &Arc<Self>, max_age: Option<u64>) {
        if let Some(transition) = self.state.set(DeviceState::Up) {
            self.events.emit(DeviceEvent::StateChanged(transition));
        }
        self.rearm_expiry(max_age.unwrap_or(DEFAULT_MAX_AGE_SECS));
        for service in self.services() {
            service.up();
        }
    }

    /// Transition to `Down`, cancel the expiry timer, and cascade down to every service and
    /// child device.
    pub fn down(self: &Arc<Self>) {
        if let Some(transition) = self.state.set(DeviceState::Down) {
            self.events.emit(DeviceEvent::StateChanged(transition));
        }
        if let Some((cancel, _handle)) = self.expiry.lock().unwrap().take() {
            cancel.cancel();
        }
        for service in self.services() {
            service.down();
        }
        for child in self.children() {
            child.down();
        }
    }

    /// Dispatch an SSDP advertisement (response, `ssdp:alive`, or `ssdp:byebye`) to this device,
    /// updating liveness and the observed-URN set.
    pub fn on_message(self: &Arc<Self>, message: &SsdpMessage) {
        if message.is_response() || message.nts() == Some("ssdp:alive") {
            self.up(message.max_age());
        } else if message.nts() == Some("ssdp:byebye") {
            self.down();
        }

        if let Some(usn) = message.usn() {
            if let Some(urn) = usn.urn() {
                self.urns_seen.lock().unwrap().insert(urn.to_string());
            }
        }
        for target in [message.st(), message.nt()].into_iter().flatten() {
            if let Target::Urn(urn) = target {
                self.urns_seen.lock().unwrap().insert(urn.to_string());
            }
        }
    }

    /// Update the cached `CONFIGID.UPNP.ORG` value observed on this device's advertisements,
    /// returning `true` if it differs from what was previously recorded (the refetch trigger
    /// described in the crate's design notes).
    pub fn update_config_id(&self, config_id: Option<&str>) -> bool {
        let mut metadata = self.metadata.lock().unwrap();
        let key = "CONFIGID.UPNP.ORG";
        match config_id {
            Some(value) => {
                let changed = metadata.get(key).map(|v| v.as_str()) != Some(value);
                metadata.insert(key.to_string(), value.to_string());
                changed
            }
            None => false,
        }
    }

    fn rearm_expiry(self: &Arc<Self>, max_age_secs: u64) {
        let mut guard = self.expiry.lock().unwrap();
        if let Some((cancel, _handle)) = guard.take() {
            cancel.cancel();
        }
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let device = self.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    trace!("Device::rearm_expiry - timer for {} cancelled", device.uuid());
                }
                _ = tokio::time::sleep(Duration::from_secs(max_age_secs)) => {
                    debug!("Device::rearm_expiry - {} expired after {}s", device.uuid(), max_age_secs);
                    device.down();
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
    use crate::urn::Kind;

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

    fn test_device() -> Arc<Device> {
        Device::new(
            "4d696e69-444c-4e41-9d41-000102030405".to_string(),
            None,
            "http://192.168.1.1:5885/description.xml".to_string(),
            Urn::new("schemas-upnp-org", Kind::Device, "Basic", "1"),
            "Test Device".to_string(),
            HashMap::new(),
            None,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_expires_after_max_age() {
        let device = test_device();
        let mut events = device.subscribe();
        device.up(Some(1));
        assert_eq!(device.state(), DeviceState::Up);

        advance_in_steps(Duration::from_millis(1100), Duration::from_millis(100)).await;

        assert_eq!(device.state(), DeviceState::Down);
        let DeviceEvent::StateChanged(t) = events.recv().await.unwrap();
        assert_eq!(t.new_state, DeviceState::Up);
        let DeviceEvent::StateChanged(t) = events.recv().await.unwrap();
        assert_eq!(t.new_state, DeviceState::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn readvertisement_resets_timer() {
        let device = test_device();
        device.up(Some(2));
        tokio::time::advance(Duration::from_millis(1500)).await;
        device.up(Some(2));
        tokio::time::advance(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        assert_eq!(device.state(), DeviceState::Up);
    }

    #[test]
    fn down_is_idempotent_and_does_not_double_emit() {
        let device = test_device();
        assert_eq!(device.state(), DeviceState::Down);
        let mut events = device.subscribe();
        device.down();
        assert!(events.try_recv().is_err());
    }
}

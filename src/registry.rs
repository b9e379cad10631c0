/*!
The device registry: the control point's view of every device currently known to be alive,
built by turning SSDP advertisements into fetched descriptions and, from those, live
[`model`](crate::model) trees.

# Specification

An advertisement identifying a UUID not yet known triggers a description fetch at its `LOCATION`;
a concurrent second advertisement for the same location while that fetch is outstanding does not
trigger a second fetch (at-most-one-in-flight-fetch-per-location), and both waiters observe the
same result. An advertisement for an already-known device only refreshes its liveness timer. A
`ssdp:byebye` brings the device down without removing it from the registry (the caller later
reaps `Down` devices on its own schedule, if it wants to).
*/

use crate::description::device::DeviceDescription;
use crate::description::loader::{self, DescriptionFetchOptions};
use crate::error::not_found;
use crate::event::Emitter;
use crate::model::action::Action;
use crate::model::device::{Device, DeviceEvent, DeviceState};
use crate::model::service::Service;
use crate::model::state_variable::StateVariable;
use crate::ssdp::message::SsdpMessage;
use crate::urn::Urn;
use crate::{Error, Result};
use futures::future::{FutureExt, Shared};
use reqwest::Url;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

type FetchResult = std::result::Result<Arc<Device>, String>;
type FetchFuture = Shared<Pin<Box<dyn Future<Output = FetchResult> + Send>>>;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// An event raised by the registry itself, as distinct from the per-device lifecycle events a
/// caller can also get by subscribing to one `Device` directly. `New` fires once, the first time
/// a uuid is ever registered; `Up`/`Down` mirror that device's own state transitions for the
/// lifetime of its registration.
#[derive(Clone, Debug)]
pub enum RegistryEvent {
    New(Arc<Device>),
    Up(Arc<Device>),
    Down(Arc<Device>),
}

///
/// Tracks every root device discovered so far, plus a weak index over embedded devices so
/// `by_uuid` resolves without walking every tree.
///
#[derive(Debug)]
pub struct Registry {
    fetch_options: DescriptionFetchOptions,
    roots: Mutex<HashMap<String, Arc<Device>>>,
    sub_devices: Mutex<HashMap<String, Weak<Device>>>,
    pending_fetches: Mutex<HashMap<String, FetchFuture>>,
    events: Emitter<RegistryEvent>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DescriptionFetchOptions::default())
    }
}

impl Registry {
    pub fn new(fetch_options: DescriptionFetchOptions) -> Self {
        Registry {
            fetch_options,
            roots: Mutex::new(HashMap::new()),
            sub_devices: Mutex::new(HashMap::new()),
            pending_fetches: Mutex::new(HashMap::new()),
            events: Emitter::new(),
        }
    }

    /// Subscribe to registry-level `New`/`Up`/`Down` events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// The device with this UUID, root or embedded.
    pub fn by_uuid(&self, uuid: &str) -> Option<Arc<Device>> {
        if let Some(device) = self.roots.lock().unwrap().get(uuid) {
            return Some(device.clone());
        }
        self.sub_devices
            .lock()
            .unwrap()
            .get(uuid)
            .and_then(Weak::upgrade)
    }

    /// Every device (root or embedded) that has advertised the given type URN.
    pub fn by_urn(&self, urn: &Urn) -> Vec<Arc<Device>> {
        let target = urn.to_string();
        self.roots
            .lock()
            .unwrap()
            .values()
            .flat_map(|root| root.iter_tree())
            .filter(|device| device.urns_seen().contains(&target))
            .collect()
    }

    /// Every device (root or embedded) last seen advertising from `ip`.
    pub fn by_ip(&self, ip: IpAddr) -> Vec<Arc<Device>> {
        self.roots
            .lock()
            .unwrap()
            .values()
            .flat_map(|root| root.iter_tree())
            .filter(|device| device.address() == Some(ip))
            .collect()
    }

    /// Every root device currently known.
    pub fn roots(&self) -> Vec<Arc<Device>> {
        self.roots.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.roots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle one classified inbound SSDP message: dispatch liveness to an already-known device,
    /// or fetch and build the tree for a device seen for the first time.
    pub async fn handle_message(&self, message: SsdpMessage, from: SocketAddr) -> Result<()> {
        let usn = match message.usn() {
            Some(usn) => usn,
            None => return Ok(()),
        };
        let uuid = usn.uuid().to_string();

        if message.nts() == Some("ssdp:byebye") {
            if let Some(device) = self.by_uuid(&uuid) {
                device.down();
            }
            return Ok(());
        }

        if let Some(device) = self.by_uuid(&uuid) {
            device.set_address(from.ip());
            device.on_message(&message);
            if device.is_root() && device.update_config_id(message.header(crate::syntax::HTTP_HEADER_CONFIGID)) {
                if let Some(location) = message.location() {
                    debug!(
                        "Registry::handle_message - CONFIGID.UPNP.ORG changed for {}, refetching {}",
                        uuid, location
                    );
                    let _ = self.ensure_root(location).await;
                }
            }
            return Ok(());
        }

        let location = match message.location() {
            Some(location) => location.to_string(),
            None => {
                trace!("Registry::handle_message - no LOCATION for unknown uuid {}", uuid);
                return Ok(());
            }
        };

        let device = self.ensure_root(&location).await?;
        device.set_address(from.ip());
        device.on_message(&message);
        Ok(())
    }

    /// Fetch (or join an in-flight fetch of) the device tree rooted at `location`, registering it
    /// on success.
    pub async fn ensure_root(&self, location: &str) -> Result<Arc<Device>> {
        let future = {
            let mut pending = self.pending_fetches.lock().unwrap();
            match pending.get(location) {
                Some(future) => future.clone(),
                None => {
                    let location = location.to_string();
                    let options = self.fetch_options.clone();
                    let fut: Pin<Box<dyn Future<Output = FetchResult> + Send>> = Box::pin(
                        build_tree(location.clone(), options).map(|r| r.map_err(|e| e.to_string())),
                    );
                    let shared = fut.shared();
                    pending.insert(location.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = future.await;
        self.pending_fetches.lock().unwrap().remove(location);

        let root = result.map_err(|e| not_found("Device", e))?;
        self.register(root.clone());
        Ok(root)
    }

    /// Insert every device in `root`'s tree into the appropriate index, emitting
    /// [`RegistryEvent::New`] and spawning an up/down forwarder for each uuid not already known.
    /// A uuid already present (a CONFIGID-triggered rebuild, say) is re-indexed silently.
    fn register(&self, root: Arc<Device>) {
        for device in root.iter_tree() {
            let is_new = if device.is_root() {
                self.roots
                    .lock()
                    .unwrap()
                    .insert(device.uuid().to_string(), device.clone())
                    .is_none()
            } else {
                self.sub_devices
                    .lock()
                    .unwrap()
                    .insert(device.uuid().to_string(), Arc::downgrade(&device))
                    .is_none()
            };
            if is_new {
                self.events.emit(RegistryEvent::New(device.clone()));
                self.forward_device_events(device);
            }
        }
    }

    /// Relay one device's own `Up`/`Down` transitions onto the registry's event stream for as
    /// long as the device stays alive, without keeping it alive itself.
    fn forward_device_events(&self, device: Arc<Device>) {
        let weak = Arc::downgrade(&device);
        let mut device_events = device.subscribe();
        let sender = self.events.sender_handle();
        drop(device);
        tokio::spawn(async move {
            while let Ok(DeviceEvent::StateChanged(transition)) = device_events.recv().await {
                let device = match weak.upgrade() {
                    Some(device) => device,
                    None => break,
                };
                let event = match transition.new_state {
                    DeviceState::Up => RegistryEvent::Up(device),
                    DeviceState::Down => RegistryEvent::Down(device),
                };
                let _ = sender.send(event);
            }
        });
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

/// Fetch the description at `location` and every nested SCPD, building the full live tree.
/// Runs once per distinct location no matter how many callers await [`Registry::ensure_root`]
/// concurrently.
async fn build_tree(location: String, options: DescriptionFetchOptions) -> Result<Arc<Device>> {
    let description = loader::fetch_description(&location, &options).await?;
    let base = Url::parse(&location).map_err(|_| not_found("Location", location.clone()))?;
    build_device(&description, &base, &options, None).await
}

fn build_device<'a>(
    description: &'a DeviceDescription,
    base: &'a Url,
    options: &'a DescriptionFetchOptions,
    parent: Option<Weak<Device>>,
) -> Pin<Box<dyn Future<Output = Result<Arc<Device>>> + Send + 'a>> {
    Box::pin(async move {
        let device_type = Urn::from_str(&description.device_type)?;
        let device = Device::new(
            description.udn.clone(),
            None,
            base.to_string(),
            device_type,
            description.friendly_name.clone(),
            description.metadata.clone(),
            parent,
        );

        for service_description in &description.services {
            let service = build_service(service_description, base, options, Arc::downgrade(&device)).await?;
            device.add_service(service);
        }

        for embedded in &description.embedded_devices {
            let child = build_device(embedded, base, options, Some(Arc::downgrade(&device))).await?;
            device.add_child(child);
        }

        Ok(device)
    })
}

async fn build_service(
    description: &crate::description::device::ServiceDescription,
    base: &Url,
    options: &DescriptionFetchOptions,
    device: Weak<Device>,
) -> Result<Arc<Service>> {
    let scpd_url = resolve(base, &description.scpd_url)?;
    let scpd = loader::fetch_scpd(scpd_url.as_str(), options).await?;

    let mut state_variables = HashMap::new();
    for variable_description in &scpd.state_variables {
        state_variables.insert(
            variable_description.name.clone(),
            Arc::new(StateVariable::from_description(variable_description)),
        );
    }

    let mut actions = HashMap::new();
    for action_description in &scpd.actions {
        let action = Action::from_description(action_description, &state_variables)?;
        actions.insert(action.name().to_string(), action);
    }

    let service_type = Urn::from_str(&description.service_type)?;
    let control_url = resolve(base, &description.control_url)?;
    let event_sub_url = resolve(base, &description.event_sub_url)?;

    // Schema loading (the SCPD fetch above) has now succeeded; the service is constructed fully
    // formed. It still starts `Down` — `Device::up` brings it up once the owning device itself
    // is advertised as up, so a service never reports `Up` ahead of its device.
    Ok(Service::new(
        description.service_id.clone(),
        service_type,
        control_url.to_string(),
        event_sub_url.to_string(),
        scpd_url.to_string(),
        actions,
        state_variables,
        device,
    ))
}

fn resolve(base: &Url, relative: &str) -> Result<Url> {
    base.join(relative)
        .map_err(|_| Error::MessageFormat(crate::error::invalid_field_value("url", relative)))
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_roots() {
        let registry = Registry::default();
        assert!(registry.is_empty());
        assert!(registry.roots().is_empty());
        assert!(registry.by_uuid("whatever").is_none());
    }

    #[test]
    fn by_urn_is_empty_when_nothing_registered() {
        let registry = Registry::default();
        let urn = Urn::from_str("urn:schemas-upnp-org:device:Basic:1").unwrap();
        assert!(registry.by_urn(&urn).is_empty());
    }

    fn test_device() -> Arc<Device> {
        Device::new(
            "4d696e69-444c-4e41-9d41-000102030405".to_string(),
            Some("192.168.1.50".parse().unwrap()),
            "http://192.168.1.50:5885/description.xml".to_string(),
            Urn::from_str("urn:schemas-upnp-org:device:Basic:1").unwrap(),
            "Test Device".to_string(),
            HashMap::new(),
            None,
        )
    }

    #[tokio::test]
    async fn registering_a_new_device_emits_new_and_is_findable_by_ip() {
        let registry = Registry::default();
        let mut events = registry.subscribe();
        let device = test_device();

        registry.register(device.clone());

        match events.recv().await.unwrap() {
            RegistryEvent::New(d) => assert_eq!(d.uuid(), device.uuid()),
            other => panic!("expected New, got {:?}", other),
        }
        assert_eq!(registry.by_ip("192.168.1.50".parse().unwrap()).len(), 1);
    }

    #[tokio::test]
    async fn re_registering_a_known_device_does_not_re_emit_new() {
        let registry = Registry::default();
        let device = test_device();
        registry.register(device.clone());
        let mut events = registry.subscribe();

        registry.register(device);

        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn registry_forwards_device_up_and_down() {
        let registry = Registry::default();
        let device = test_device();
        registry.register(device.clone());
        let mut events = registry.subscribe();

        device.up(Some(1));
        match events.recv().await.unwrap() {
            RegistryEvent::Up(d) => assert_eq!(d.uuid(), device.uuid()),
            other => panic!("expected Up, got {:?}", other),
        }

        device.down();
        match events.recv().await.unwrap() {
            RegistryEvent::Down(d) => assert_eq!(d.uuid(), device.uuid()),
            other => panic!("expected Down, got {:?}", other),
        }
    }
}

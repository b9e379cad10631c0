/*!
The control point façade: wires the SSDP server's classified message stream into the device
registry, and bundles the SOAP client, GENA session and GENA callback server that a consumer
needs to act on what the registry discovers.

Everything below this module can be used independently (a caller is free to drive
[`SsdpServer`]/[`Registry`]/[`SoapClient`]/[`GenaSession`]/[`GenaServer`] directly); this type
only saves the boilerplate of wiring the common path.
*/

use crate::gena::{GenaServer, GenaSession, GenaSessionOptions};
use crate::registry::Registry;
use crate::soap::{SoapClient, SoapClientOptions};
use crate::ssdp::{SsdpEvent, SsdpServer, SsdpServerOptions};
use crate::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Construction-site options for [`ControlPoint`].
#[derive(Clone, Debug)]
pub struct ControlPointOptions {
    pub ssdp: SsdpServerOptions,
    pub gena: GenaSessionOptions,
    /// Address the GENA callback server binds to. Must be reachable by every device this control
    /// point subscribes to, so the unspecified-address default is only useful until a caller
    /// supplies a real one.
    pub gena_bind_addr: SocketAddr,
}

impl Default for ControlPointOptions {
    fn default() -> Self {
        ControlPointOptions {
            ssdp: SsdpServerOptions::default(),
            gena: GenaSessionOptions::default(),
            gena_bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        }
    }
}

///
/// Owns one SSDP server, one device registry fed from it, and the SOAP/GENA clients a caller
/// uses to act on devices the registry finds.
///
#[derive(Debug)]
pub struct ControlPoint {
    ssdp: Arc<SsdpServer>,
    registry: Arc<Registry>,
    soap: SoapClient,
    gena_session: Arc<GenaSession>,
    gena_server: Arc<GenaServer>,
    gena_bind_addr: SocketAddr,
    pump: std::sync::Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl ControlPoint {
    pub fn new(options: ControlPointOptions) -> Result<Self> {
        let gena_server = Arc::new(GenaServer::new());
        let gena_session = Arc::new(GenaSession::new(options.gena, gena_server.clone(), options.gena_bind_addr)?);
        Ok(ControlPoint {
            ssdp: Arc::new(SsdpServer::new(options.ssdp)),
            registry: Arc::new(Registry::default()),
            soap: SoapClient::new(SoapClientOptions::default())?,
            gena_session,
            gena_server,
            gena_bind_addr: options.gena_bind_addr,
            pump: std::sync::Mutex::new(None),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn soap(&self) -> &SoapClient {
        &self.soap
    }

    pub fn gena_session(&self) -> &Arc<GenaSession> {
        &self.gena_session
    }

    pub fn gena_server(&self) -> &Arc<GenaServer> {
        &self.gena_server
    }

    /// Start the SSDP endpoint, the GENA callback server, and the background task that feeds
    /// every classified SSDP message into the registry. Idempotent.
    pub async fn start(&self) -> Result<()> {
        self.ssdp.start().await?;
        self.gena_server.start(self.gena_bind_addr).await?;

        if self.pump.lock().unwrap().is_some() {
            return Ok(());
        }
        let mut events = self.ssdp.subscribe();
        let registry = self.registry.clone();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    event = events.recv() => {
                        match event {
                            Ok(SsdpEvent::Message(message, from)) => {
                                if let Err(e) = registry.handle_message(message, from).await {
                                    trace!("ControlPoint - dropping malformed SSDP message from {}: {}", from, e);
                                }
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!("ControlPoint - SSDP event stream lagged, dropped {} messages", n);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
        *self.pump.lock().unwrap() = Some((cancel, handle));
        Ok(())
    }

    /// Stop the background pump, best-effort unsubscribe and deregister the GENA session, stop
    /// the GENA callback server, then stop the SSDP endpoint. Idempotent.
    pub async fn stop(&self) {
        if let Some((cancel, handle)) = self.pump.lock().unwrap().take() {
            cancel.cancel();
            let _ = handle.await;
        }
        self.gena_session.close().await;
        self.gena_server.stop().await;
        self.ssdp.stop().await;
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_control_point_has_an_empty_registry() {
        let cp = ControlPoint::new(ControlPointOptions::default()).unwrap();
        assert!(cp.registry().is_empty());
    }
}

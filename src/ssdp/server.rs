/*!
The SSDP server façade: owns the primary multicast endpoint, classifies inbound messages, and
drives `M-SEARCH` rounds.

# Specification

`start`/`stop` are idempotent. `send` broadcasts a message on the multicast group and fails if
the server has not been started. `search` opens a separate ephemeral endpoint, emits one
`M-SEARCH` per requested search target, collects responses for `2*MX` seconds, and then closes;
every received message is also classified and forwarded to `message`/`notify`/`response`/
`search` subscribers of the main server (received messages from both the primary socket and a
search round are announced there).
*/

use crate::error::Error;
use crate::ssdp::message::SsdpMessage;
use crate::ssdp::socket::MulticastEndpoint;
use crate::syntax::{
    HTTP_EXTENSION, HTTP_HEADER_MAN, HTTP_HEADER_MX, HTTP_HEADER_ST, HTTP_METHOD_SEARCH,
};
use crate::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// Classification of an inbound SSDP datagram, delivered to every [`SsdpServer`] subscriber
/// alongside the source address.
#[derive(Clone, Debug)]
pub enum SsdpEvent {
    /// Every inbound message, regardless of classification.
    Message(SsdpMessage, SocketAddr),
    /// A `NOTIFY` advertisement (`ssdp:alive`, `ssdp:byebye`, or `ssdp:update`).
    Notify(SsdpMessage, SocketAddr),
    /// A search response.
    Response(SsdpMessage, SocketAddr),
    /// An inbound `M-SEARCH` (relevant only if this process also answers searches, which it does
    /// not today; kept for symmetry with the reference implementation's event surface).
    Search(SsdpMessage, SocketAddr),
}

/// Construction-site options for [`SsdpServer`].
#[derive(Clone, Debug)]
pub struct SsdpServerOptions {
    /// IP packet TTL used for every outbound multicast datagram.
    pub multicast_ttl: u32,
}

impl Default for SsdpServerOptions {
    fn default() -> Self {
        SsdpServerOptions {
            multicast_ttl: crate::ssdp::socket::DEFAULT_TTL,
        }
    }
}

///
/// Owns the primary SSDP multicast endpoint and the background task that reads from it.
///
#[derive(Debug)]
pub struct SsdpServer {
    options: SsdpServerOptions,
    endpoint: Mutex<Option<Arc<MulticastEndpoint>>>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
    events: broadcast::Sender<SsdpEvent>,
    started: AtomicBool,
}

impl SsdpServer {
    pub fn new(options: SsdpServerOptions) -> Self {
        let (events, _) = broadcast::channel(256);
        SsdpServer {
            options,
            endpoint: Mutex::new(None),
            recv_task: Mutex::new(None),
            cancel: Mutex::new(None),
            events,
            started: AtomicBool::new(false),
        }
    }

    /// Subscribe to classified inbound messages.
    pub fn subscribe(&self) -> broadcast::Receiver<SsdpEvent> {
        self.events.subscribe()
    }

    /// `true` once [`start`](Self::start) has succeeded and before [`stop`](Self::stop).
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Bind the primary endpoint and begin the receive loop. Idempotent: calling `start` on an
    /// already-started server is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            trace!("SsdpServer::start - already started");
            return Ok(());
        }
        let endpoint = Arc::new(MulticastEndpoint::bind(self.options.multicast_ttl)?);
        let cancel = CancellationToken::new();

        let task_endpoint = endpoint.clone();
        let task_cancel = cancel.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("SsdpServer - receive loop cancelled");
                        break;
                    }
                    result = task_endpoint.recv() => {
                        match result {
                            Ok((message, from)) => dispatch(&events, message, from),
                            Err(e) => {
                                error!("SsdpServer - receive error: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        });

        *self.endpoint.lock().await = Some(endpoint);
        *self.recv_task.lock().await = Some(handle);
        *self.cancel.lock().await = Some(cancel);
        self.started.store(true, Ordering::SeqCst);
        info!("SsdpServer::start - started");
        Ok(())
    }

    /// Stop the receive loop and release the primary endpoint. Idempotent.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.recv_task.lock().await.take() {
            let _ = handle.await;
        }
        *self.endpoint.lock().await = None;
        info!("SsdpServer::stop - stopped");
    }

    /// Broadcast a message on the multicast group. Fails with [`Error::Closed`] if the server
    /// has not been started.
    pub async fn send(&self, message: &SsdpMessage) -> Result<()> {
        let guard = self.endpoint.lock().await;
        match guard.as_ref() {
            Some(endpoint) => endpoint.send_multicast(message).await,
            None => Err(Error::Closed),
        }
    }

    /// Issue one `M-SEARCH` per search target and collect responses for `2*mx` seconds on a
    /// fresh ephemeral endpoint. Each response is classified and also published to this server's
    /// own [`subscribe`](Self::subscribe) stream, mirroring how a response arriving on the
    /// primary socket would be announced.
    pub async fn search(&self, targets: &[String], mx: u8) -> Result<mpsc::Receiver<(SsdpMessage, SocketAddr)>> {
        let endpoint = Arc::new(MulticastEndpoint::ephemeral(self.options.multicast_ttl)?);
        for target in targets {
            let mut request = SsdpMessage::request(HTTP_METHOD_SEARCH);
            request
                .set_header(HTTP_HEADER_MAN, HTTP_EXTENSION)
                .set_header(HTTP_HEADER_MX, mx.to_string())
                .set_header(HTTP_HEADER_ST, target);
            endpoint.send_multicast(&request).await?;
        }

        let (tx, rx) = mpsc::channel(64);
        let events = self.events.clone();
        let duration = std::time::Duration::from_secs(u64::from(mx) * 2);
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + duration;
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, endpoint.recv()).await {
                    Ok(Ok((message, from))) => {
                        dispatch(&events, message.clone(), from);
                        if tx.send((message, from)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        error!("SsdpServer::search - receive error: {}", e);
                        break;
                    }
                    Err(_timeout) => break,
                }
            }
            debug!("SsdpServer::search - round complete");
        });
        Ok(rx)
    }
}

fn dispatch(events: &broadcast::Sender<SsdpEvent>, message: SsdpMessage, from: SocketAddr) {
    let _ = events.send(SsdpEvent::Message(message.clone(), from));
    if message.is_notify() {
        let _ = events.send(SsdpEvent::Notify(message, from));
    } else if message.is_response() {
        let _ = events.send(SsdpEvent::Response(message, from));
    } else if message.is_search() {
        let _ = events.send(SsdpEvent::Search(message, from));
    }
}

/*!
The process-wide GENA callback server: one `axum` HTTP listener that accepts `NOTIFY` requests
and routes each to the session named by the callback id in its path, leaving that session to pick
the right subscription by the `SID` header. The SSDP/description side of the crate never needs to
know any of this exists.
*/

use crate::error::invalid_header_value;
use crate::gena::subscription::GenaSubscription;
use crate::syntax::{GENA_HEADER_SEQ, GENA_HEADER_SID, XML_ELEM_PROPERTY, XML_ELEM_PROPERTYSET};
use crate::{Error, Result};
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::routing::any;
use axum::{Router, Server};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A session's live subscriptions, keyed by SID. Shared between the owning
/// [`GenaSession`](crate::gena::session::GenaSession) (which inserts/removes entries as it
/// subscribes/unsubscribes) and the [`GenaServer`] route registered for that session's callback
/// id (which only reads it). Neither side owns the other, so there is no `Arc` cycle.
pub type SubscriptionMap = Arc<Mutex<HashMap<String, Arc<GenaSubscription>>>>;

// ------------------------------------------------------------------------------------------------
// Private Types
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Subscriptions {
    by_callback_id: Mutex<HashMap<String, SubscriptionMap>>,
}

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// Owns the callback HTTP listener for every active [`GenaSession`](crate::gena::session::GenaSession)
/// in this process. One instance is enough for a whole control point; a session registers its
/// subscription map once, at construction, and deregisters it when closed.
///
#[derive(Debug, Default)]
pub struct GenaServer {
    subscriptions: Arc<Subscriptions>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl GenaServer {
    pub fn new() -> Self {
        GenaServer::default()
    }

    /// The callback URL a session should present as its `CALLBACK` header for every `SUBSCRIBE`
    /// it issues. Built from a callback id the session owns independently of any SID, since the
    /// callback URL must exist before a `SUBSCRIBE` response hands back a SID.
    pub fn callback_url(&self, bind_addr: SocketAddr, callback_id: &str) -> String {
        format!("http://{}/notify/{}", bind_addr, callback_id)
    }

    /// Start routing NOTIFYs addressed to `callback_id` into `subscriptions`. Called once by a
    /// session at construction.
    pub fn register_session(&self, callback_id: String, subscriptions: SubscriptionMap) {
        self.subscriptions.by_callback_id.lock().unwrap().insert(callback_id, subscriptions);
    }

    /// Stop routing for `callback_id`. Called by a session when it closes.
    pub fn deregister_session(&self, callback_id: &str) {
        self.subscriptions.by_callback_id.lock().unwrap().remove(callback_id);
    }

    /// Bind and start serving. Idempotent: calling `start` while already running is a no-op and
    /// returns the existing bound address is not tracked here — callers pass a fixed `bind_addr`.
    pub async fn start(&self, bind_addr: SocketAddr) -> Result<()> {
        if self.task.lock().unwrap().is_some() {
            trace!("GenaServer::start - already started");
            return Ok(());
        }
        let app = Router::new()
            .route("/notify/:callback_id", any(notify_handler))
            .with_state(self.subscriptions.clone());

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let server = Server::try_bind(&bind_addr)
            .map_err(|e| Error::NetworkTransport(std::io::Error::new(std::io::ErrorKind::AddrInUse, e)))?
            .serve(app.into_make_service());

        let handle = tokio::spawn(async move {
            let graceful = server.with_graceful_shutdown(async move {
                task_cancel.cancelled().await;
            });
            if let Err(e) = graceful.await {
                error!("GenaServer - listener terminated: {}", e);
            }
        });

        *self.task.lock().unwrap() = Some((cancel, handle));
        info!("GenaServer::start - listening on {}", bind_addr);
        Ok(())
    }

    /// Stop the listener. Idempotent.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap().take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            let _ = handle.await;
            info!("GenaServer::stop - stopped");
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Private Functions
// ------------------------------------------------------------------------------------------------

async fn notify_handler(
    State(subscriptions): State<Arc<Subscriptions>>,
    Path(callback_id): Path<String>,
    method: Method,
    headers: axum::http::HeaderMap,
    body: String,
) -> StatusCode {
    if method.as_str() != "NOTIFY" {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let header_sid = headers
        .get(GENA_HEADER_SID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let session_subscriptions = match subscriptions.by_callback_id.lock().unwrap().get(&callback_id).cloned() {
        Some(map) => map,
        None => {
            warn!("GenaServer::notify_handler - NOTIFY for unknown callback id {}", callback_id);
            return StatusCode::PRECONDITION_FAILED;
        }
    };

    let subscription = match session_subscriptions.lock().unwrap().get(header_sid).cloned() {
        Some(subscription) => subscription,
        None => {
            warn!("GenaServer::notify_handler - NOTIFY for unknown SID {} on callback {}", header_sid, callback_id);
            return StatusCode::PRECONDITION_FAILED;
        }
    };

    let seq: u32 = match headers.get(GENA_HEADER_SEQ).and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok()) {
        Some(seq) => seq,
        None => {
            warn!("GenaServer::notify_handler - NOTIFY without a valid SEQ for {}", header_sid);
            return StatusCode::BAD_REQUEST;
        }
    };

    if !subscription.accept_sequence(seq) {
        return StatusCode::OK;
    }

    match parse_properties(&body) {
        Ok(properties) => {
            for (name, value) in properties {
                subscription.publish(name, crate::types::Value::String(value));
            }
            StatusCode::OK
        }
        Err(e) => {
            error!("GenaServer::notify_handler - malformed NOTIFY body for {}: {}", header_sid, e);
            StatusCode::BAD_REQUEST
        }
    }
}

/// Parse an `<e:propertyset>` body into `(name, text)` pairs, one per `<e:property>` child
/// element (whatever state-variable name that child element carries).
fn parse_properties(xml: &str) -> std::result::Result<Vec<(String, String)>, crate::error::MessageFormatError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut properties = Vec::new();

    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) if local_name(e.name()) == local_name(XML_ELEM_PROPERTY.as_bytes()) => {
                if let Ok(Event::Start(ref child)) = reader.read_event(&mut buf) {
                    let name = local_name(child.name()).to_string();
                    let text = read_text(&mut reader)?;
                    properties.push((name, text));
                }
            }
            Ok(Event::End(ref e)) if local_name(e.name()) == local_name(XML_ELEM_PROPERTYSET.as_bytes()) => {
                return Ok(properties)
            }
            Ok(Event::Eof) => return Ok(properties),
            Ok(_) => {}
            Err(_) => return Err(invalid_header_value("notify body", "malformed xml")),
        }
        buf.clear();
    }
}

fn local_name(name: &[u8]) -> &str {
    let name = std::str::from_utf8(name).unwrap_or("");
    name.rsplit(':').next().unwrap_or(name)
}

fn read_text(reader: &mut Reader<&[u8]>) -> std::result::Result<String, crate::error::MessageFormatError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Text(e)) => {
                text.push_str(
                    &e.unescape_and_decode(reader)
                        .map_err(|_| invalid_header_value("notify body", "invalid encoding"))?,
                );
            }
            Ok(Event::End(_)) => return Ok(text),
            Ok(Event::Eof) => return Ok(text),
            Ok(_) => {}
            Err(_) => return Err(invalid_header_value("notify body", "malformed xml")),
        }
        buf.clear();
    }
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_propertyset_body() {
        let xml = concat!(
            r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#,
            r#"<e:property><Status>1</Status></e:property>"#,
            r#"<e:property><LoadLevelStatus>80</LoadLevelStatus></e:property>"#,
            r#"</e:propertyset>"#
        );
        let properties = parse_properties(xml).unwrap();
        assert_eq!(properties, vec![
            ("Status".to_string(), "1".to_string()),
            ("LoadLevelStatus".to_string(), "80".to_string()),
        ]);
    }
}

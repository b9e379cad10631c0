/*!
GENA session commands: `SUBSCRIBE`, its renewal form, and `UNSUBSCRIBE`, sent as raw HTTP
extension methods via `reqwest`.
*/

use crate::error::gena_error;
use crate::gena::server::{GenaServer, SubscriptionMap};
use crate::gena::subscription::GenaSubscription;
use crate::syntax::{
    GENA_HEADER_CALLBACK, GENA_HEADER_NT, GENA_HEADER_SID, GENA_HEADER_STATEVAR, GENA_HEADER_TIMEOUT,
    GENA_METHOD_SUBSCRIBE, GENA_METHOD_UNSUBSCRIBE, GENA_NT_EVENT, GENA_TIMEOUT_PREFIX,
};
use crate::Result;
use reqwest::Method;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Construction-site options for GENA session commands.
#[derive(Clone, Debug)]
pub struct GenaSessionOptions {
    pub timeout: Duration,
    /// Requested subscription duration in seconds, sent as `TIMEOUT: Second-<n>`.
    pub requested_duration_secs: u64,
    /// State variables to subscribe to, sent as `STATEVAR: v1,v2,...`. Empty subscribes to all.
    pub statevars: Vec<String>,
}

impl Default for GenaSessionOptions {
    fn default() -> Self {
        GenaSessionOptions {
            timeout: Duration::from_secs(10),
            requested_duration_secs: 1800,
            statevars: Vec::new(),
        }
    }
}

///
/// Issues `SUBSCRIBE`/`UNSUBSCRIBE` requests against a service's event subscription URL. Owns one
/// callback id — generated once, independently of any SID, since the callback URL a `SUBSCRIBE`
/// announces has to exist before the response hands back a SID — and the map of subscriptions
/// opened through it, shared with the [`GenaServer`] so inbound `NOTIFY`s route back here.
///
#[derive(Debug)]
pub struct GenaSession {
    http: reqwest::Client,
    options: GenaSessionOptions,
    server: Arc<GenaServer>,
    bind_addr: SocketAddr,
    callback_id: String,
    subscriptions: SubscriptionMap,
}

impl GenaSession {
    /// Construct a session bound to `bind_addr` (the address the shared [`GenaServer`] is
    /// listening, or will listen, on) and register its subscription map for callback routing.
    pub fn new(options: GenaSessionOptions, server: Arc<GenaServer>, bind_addr: SocketAddr) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(options.timeout).build()?;
        let callback_id = Uuid::new_v4().to_string();
        let subscriptions: SubscriptionMap = Arc::new(Mutex::new(HashMap::new()));
        server.register_session(callback_id.clone(), subscriptions.clone());
        Ok(GenaSession {
            http,
            options,
            server,
            bind_addr,
            callback_id,
            subscriptions,
        })
    }

    pub fn callback_id(&self) -> &str {
        &self.callback_id
    }

    /// Every subscription opened through this session that has not yet been unsubscribed or
    /// forgotten after a natural expiry.
    pub fn subscriptions(&self) -> Vec<Arc<GenaSubscription>> {
        self.subscriptions.lock().unwrap().values().cloned().collect()
    }

    /// Drop a subscription from this session's routing table without issuing `UNSUBSCRIBE` —
    /// used once a subscription has expired on its own and there is nothing left to tear down on
    /// the device side.
    pub fn forget(&self, sid: &str) {
        self.subscriptions.lock().unwrap().remove(sid);
    }

    /// Create a new subscription at `event_url`, announcing this session's callback URL as the
    /// NOTIFY target, and register it so inbound NOTIFYs route to it.
    pub async fn subscribe(&self, event_url: &str) -> Result<Arc<GenaSubscription>> {
        let callback_url = self.server.callback_url(self.bind_addr, &self.callback_id);
        let mut request = self
            .http
            .request(Method::from_bytes(GENA_METHOD_SUBSCRIBE.as_bytes()).unwrap(), event_url)
            .header(GENA_HEADER_CALLBACK, format!("<{}>", callback_url))
            .header(GENA_HEADER_NT, GENA_NT_EVENT)
            .header(
                GENA_HEADER_TIMEOUT,
                format!("{}{}", GENA_TIMEOUT_PREFIX, self.options.requested_duration_secs),
            );
        if !self.options.statevars.is_empty() {
            request = request.header(GENA_HEADER_STATEVAR, self.options.statevars.join(","));
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(gena_error(status, format!("SUBSCRIBE {} failed", event_url)));
        }

        let sid = header(&response, GENA_HEADER_SID)
            .ok_or_else(|| gena_error(response.status().as_u16(), "missing SID in SUBSCRIBE response"))?;
        let timeout_secs = header(&response, GENA_HEADER_TIMEOUT)
            .and_then(|v| v.strip_prefix(GENA_TIMEOUT_PREFIX).map(str::to_string))
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.options.requested_duration_secs);

        info!("GenaSession::subscribe - {} -> SID {} (timeout {}s)", event_url, sid, timeout_secs);
        let subscription = GenaSubscription::new(sid.clone(), event_url.to_string(), callback_url, timeout_secs);
        self.subscriptions.lock().unwrap().insert(sid, subscription.clone());
        Ok(subscription)
    }

    /// Renew an existing subscription, updating its expiry on success.
    pub async fn renew(&self, subscription: &Arc<GenaSubscription>) -> Result<()> {
        let response = self
            .http
            .request(
                Method::from_bytes(GENA_METHOD_SUBSCRIBE.as_bytes()).unwrap(),
                subscription.event_url(),
            )
            .header(GENA_HEADER_SID, subscription.sid())
            .header(
                GENA_HEADER_TIMEOUT,
                format!("{}{}", GENA_TIMEOUT_PREFIX, self.options.requested_duration_secs),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(gena_error(status, format!("renewal of {} failed", subscription.sid())));
        }

        let timeout_secs = header(&response, GENA_HEADER_TIMEOUT)
            .and_then(|v| v.strip_prefix(GENA_TIMEOUT_PREFIX).map(str::to_string))
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.options.requested_duration_secs);

        subscription.renewed(timeout_secs);
        debug!("GenaSession::renew - {} renewed for {}s", subscription.sid(), timeout_secs);
        Ok(())
    }

    /// Tear down a subscription. A non-2xx response is logged but not treated as fatal — the
    /// subscription is gone from our side either way.
    pub async fn unsubscribe(&self, subscription: &Arc<GenaSubscription>) -> Result<()> {
        let response = self
            .http
            .request(
                Method::from_bytes(GENA_METHOD_UNSUBSCRIBE.as_bytes()).unwrap(),
                subscription.event_url(),
            )
            .header(GENA_HEADER_SID, subscription.sid())
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                "GenaSession::unsubscribe - {} returned {} for {}",
                subscription.event_url(),
                response.status(),
                subscription.sid()
            );
        }
        subscription.expire();
        self.subscriptions.lock().unwrap().remove(subscription.sid());
        Ok(())
    }

    /// Best-effort unsubscribe every subscription still open through this session, then stop
    /// routing its callback id. Individual `UNSUBSCRIBE` failures are logged, not propagated —
    /// the session is going away either way.
    pub async fn close(&self) {
        for subscription in self.subscriptions() {
            if let Err(e) = self.unsubscribe(&subscription).await {
                warn!("GenaSession::close - unsubscribe of {} failed: {}", subscription.sid(), e);
            }
        }
        self.server.deregister_session(&self.callback_id);
    }
}

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gena::server::GenaServer;

    #[test]
    fn default_requests_thirty_minutes() {
        assert_eq!(GenaSessionOptions::default().requested_duration_secs, 1800);
    }

    #[test]
    fn each_session_gets_its_own_callback_id() {
        let server = Arc::new(GenaServer::new());
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let a = GenaSession::new(GenaSessionOptions::default(), server.clone(), bind_addr).unwrap();
        let b = GenaSession::new(GenaSessionOptions::default(), server, bind_addr).unwrap();
        assert_ne!(a.callback_id(), b.callback_id());
    }

    #[test]
    fn subscribe_needs_no_sid_to_form_a_callback_url() {
        let server = Arc::new(GenaServer::new());
        let bind_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let session = GenaSession::new(GenaSessionOptions::default(), server.clone(), bind_addr).unwrap();
        let callback_url = server.callback_url(bind_addr, session.callback_id());
        assert!(callback_url.ends_with(session.callback_id()));
    }
}

use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, ResourceType,
};
use futures::StreamExt;
use kestrel_core::snapshot::{ApiCallRecord, FailedRequestRecord};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Network events observed during one navigation window.
#[derive(Debug, Clone, Default)]
pub struct NetworkActivity {
    pub api_calls: Vec<ApiCallRecord>,
    pub failed_requests: Vec<FailedRequestRecord>,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    method: String,
    url: String,
    resource_type: String,
    /// Monotonic clock at requestWillBeSent, in seconds.
    started_at: f64,
}

/// Accumulates API call timings and failed requests for a single navigation
/// window. A ledger is created fresh per target URL, so events can never
/// leak across windows.
///
/// The API-path filter and the HTTP-failure condition are independent: a 500
/// response on an `/api/` URL produces both an [`ApiCallRecord`] and a
/// [`FailedRequestRecord`].
pub struct NetworkLedger {
    api_filter: String,
    pending: HashMap<String, PendingRequest>,
    activity: NetworkActivity,
}

impl NetworkLedger {
    pub fn new(api_filter: impl Into<String>) -> Self {
        Self {
            api_filter: api_filter.into(),
            pending: HashMap::new(),
            activity: NetworkActivity::default(),
        }
    }

    /// Record a request starting. `timestamp_secs` is the monotonic clock
    /// reading from the requestWillBeSent event.
    pub fn on_request(
        &mut self,
        request_id: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        resource_type: impl Into<String>,
        timestamp_secs: f64,
    ) {
        let request = PendingRequest {
            method: method.into(),
            url: url.into(),
            resource_type: resource_type.into(),
            started_at: timestamp_secs,
        };
        self.pending.insert(request_id.into(), request);
    }

    /// Record response headers. Statuses >= 400 are captured as HTTP-level
    /// failures; the request stays pending so its timing can still complete.
    pub fn on_response(&mut self, request_id: &str, url: &str, status: u16) {
        if status < 400 {
            return;
        }

        let pending = self.pending.get(request_id);
        self.activity.failed_requests.push(FailedRequestRecord {
            url: url.to_string(),
            method: pending
                .map(|p| p.method.clone())
                .unwrap_or_else(|| "GET".to_string()),
            status: Some(status),
            failure: None,
            resource_type: pending
                .map(|p| p.resource_type.clone())
                .unwrap_or_else(|| "other".to_string()),
        });
    }

    /// Record a request completing. Responses on URLs matching the API path
    /// filter get an [`ApiCallRecord`] timed from request start to response
    /// end.
    pub fn on_finished(&mut self, request_id: &str, timestamp_secs: f64) {
        if let Some(pending) = self.pending.remove(request_id)
            && pending.url.contains(&self.api_filter)
        {
            let response_time = ((timestamp_secs - pending.started_at) * 1000.0).max(0.0);
            self.activity.api_calls.push(ApiCallRecord {
                url: pending.url,
                response_time,
            });
        }
    }

    /// Record a network-level failure (DNS, abort, connection reset).
    pub fn on_failed(&mut self, request_id: &str, error_text: impl Into<String>) {
        // Without a matching requestWillBeSent there is no URL to report
        let Some(pending) = self.pending.remove(request_id) else {
            return;
        };

        self.activity.failed_requests.push(FailedRequestRecord {
            url: pending.url,
            method: pending.method,
            status: None,
            failure: Some(error_text.into()),
            resource_type: pending.resource_type,
        });
    }

    /// Consume the ledger, yielding the window's accumulated activity.
    pub fn into_activity(self) -> NetworkActivity {
        self.activity
    }
}

/// Resource type in the lowercase form used by the snapshot schema.
pub(crate) fn resource_type_label(resource_type: &ResourceType) -> String {
    serde_json::to_value(resource_type)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_ascii_lowercase()))
        .unwrap_or_else(|| "other".to_string())
}

/// Drains CDP network events into a [`NetworkLedger`] on a background task.
///
/// Attach before navigating so events from the very start of the load are
/// observed; call [`finish`](NetworkRecorder::finish) at the end of the
/// window to take the accumulated activity.
pub struct NetworkRecorder {
    shutdown_tx: oneshot::Sender<()>,
    activity_rx: oneshot::Receiver<NetworkActivity>,
}

impl NetworkRecorder {
    pub async fn attach(page: &Page, api_filter: &str) -> Result<Self> {
        page.execute(EnableParams::default()).await?;

        let mut request_events = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut response_events = page.event_listener::<EventResponseReceived>().await?;
        let mut finished_events = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed_events = page.event_listener::<EventLoadingFailed>().await?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (activity_tx, activity_rx) = oneshot::channel::<NetworkActivity>();

        let mut ledger = NetworkLedger::new(api_filter);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Network recorder: window closed");
                        break;
                    }
                    Some(event) = request_events.next() => {
                        tracing::trace!("Request: {} {}", event.request.method, event.request.url);
                        let resource_type = event
                            .r#type
                            .as_ref()
                            .map(resource_type_label)
                            .unwrap_or_else(|| "other".to_string());
                        ledger.on_request(
                            event.request_id.inner().to_string(),
                            event.request.method.clone(),
                            event.request.url.clone(),
                            resource_type,
                            *event.timestamp.inner(),
                        );
                    }
                    Some(event) = response_events.next() => {
                        tracing::trace!("Response: {} - {}", event.response.status, event.response.url);
                        ledger.on_response(
                            event.request_id.inner(),
                            &event.response.url,
                            event.response.status as u16,
                        );
                    }
                    Some(event) = finished_events.next() => {
                        ledger.on_finished(event.request_id.inner(), *event.timestamp.inner());
                    }
                    Some(event) = failed_events.next() => {
                        tracing::trace!("Request failed: {}", event.error_text);
                        ledger.on_failed(event.request_id.inner(), event.error_text.clone());
                    }
                }
            }
            let _ = activity_tx.send(ledger.into_activity());
        });

        Ok(Self {
            shutdown_tx,
            activity_rx,
        })
    }

    /// Stop observing and take the window's activity.
    pub async fn finish(self) -> Result<NetworkActivity> {
        let _ = self.shutdown_tx.send(());
        self.activity_rx
            .await
            .map_err(|_| Error::Cdp("network recorder task dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> NetworkLedger {
        NetworkLedger::new("/api/")
    }

    #[test]
    fn test_api_call_timed_from_request_start_to_response_end() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://example.com/api/session", "xhr", 10.0);
        ledger.on_response("req-1", "https://example.com/api/session", 200);
        ledger.on_finished("req-1", 10.25);

        let activity = ledger.into_activity();
        assert_eq!(activity.api_calls.len(), 1);
        assert_eq!(activity.api_calls[0].url, "https://example.com/api/session");
        assert!((activity.api_calls[0].response_time - 250.0).abs() < 1e-6);
        assert!(activity.failed_requests.is_empty());
    }

    #[test]
    fn test_non_api_responses_are_not_timed() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://example.com/bundle.js", "script", 1.0);
        ledger.on_finished("req-1", 1.1);

        let activity = ledger.into_activity();
        assert!(activity.api_calls.is_empty());
    }

    #[test]
    fn test_http_failure_recorded_with_status() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "POST", "https://example.com/assets/map.bin", "fetch", 2.0);
        ledger.on_response("req-1", "https://example.com/assets/map.bin", 404);

        let activity = ledger.into_activity();
        assert_eq!(activity.failed_requests.len(), 1);
        let failed = &activity.failed_requests[0];
        assert_eq!(failed.status, Some(404));
        assert_eq!(failed.method, "POST");
        assert_eq!(failed.failure, None);
        assert_eq!(failed.resource_type, "fetch");
    }

    #[test]
    fn test_success_statuses_are_not_failures() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://example.com/", "document", 0.0);
        ledger.on_response("req-1", "https://example.com/", 200);
        ledger.on_response("req-1", "https://example.com/", 399);

        assert!(ledger.into_activity().failed_requests.is_empty());
    }

    #[test]
    fn test_api_500_yields_both_records() {
        // The API-path filter and the failure condition are independent
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://example.com/api/state", "xhr", 5.0);
        ledger.on_response("req-1", "https://example.com/api/state", 500);
        ledger.on_finished("req-1", 5.016);

        let activity = ledger.into_activity();
        assert_eq!(activity.api_calls.len(), 1);
        assert_eq!(activity.failed_requests.len(), 1);
        assert_eq!(activity.failed_requests[0].status, Some(500));
        assert!((activity.api_calls[0].response_time - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_network_failure_recorded_with_reason() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://cdn.example.com/world.glb", "fetch", 3.0);
        ledger.on_failed("req-1", "net::ERR_NAME_NOT_RESOLVED");

        let activity = ledger.into_activity();
        assert_eq!(activity.failed_requests.len(), 1);
        let failed = &activity.failed_requests[0];
        assert_eq!(failed.status, None);
        assert_eq!(
            failed.failure.as_deref(),
            Some("net::ERR_NAME_NOT_RESOLVED")
        );
    }

    #[test]
    fn test_failure_without_known_request_is_skipped() {
        let mut ledger = ledger();
        ledger.on_failed("req-unknown", "net::ERR_ABORTED");

        assert!(ledger.into_activity().failed_requests.is_empty());
    }

    #[test]
    fn test_fresh_ledger_per_window_does_not_leak() {
        // Window A observes a 404
        let mut window_a = ledger();
        window_a.on_request("req-1", "GET", "https://example.com/api/missing", "xhr", 0.0);
        window_a.on_response("req-1", "https://example.com/api/missing", 404);
        assert_eq!(window_a.into_activity().failed_requests.len(), 1);

        // Window B starts from an empty ledger by construction
        let window_b = ledger();
        let activity = window_b.into_activity();
        assert!(activity.failed_requests.is_empty());
        assert!(activity.api_calls.is_empty());
    }

    #[test]
    fn test_records_append_in_observation_order_without_dedup() {
        let mut ledger = ledger();
        for (id, ts) in [("req-1", 1.0), ("req-2", 2.0)] {
            ledger.on_request(id, "GET", "https://example.com/api/tick", "xhr", ts);
        }
        ledger.on_finished("req-1", 1.05);
        ledger.on_finished("req-2", 2.2);

        let activity = ledger.into_activity();
        assert_eq!(activity.api_calls.len(), 2);
        assert!((activity.api_calls[0].response_time - 50.0).abs() < 1e-6);
        assert!((activity.api_calls[1].response_time - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_clock_skew_clamps_to_zero() {
        let mut ledger = ledger();
        ledger.on_request("req-1", "GET", "https://example.com/api/x", "xhr", 10.0);
        ledger.on_finished("req-1", 9.5);

        let activity = ledger.into_activity();
        assert_eq!(activity.api_calls[0].response_time, 0.0);
    }
}

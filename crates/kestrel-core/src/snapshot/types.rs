use serde::{Deserialize, Serialize};

/// One measurement of a target URL. Assembled once per navigation and
/// immutable afterwards; the JSON field names are the persisted schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub url: String,
    /// ISO-8601 wall-clock time the snapshot was assembled.
    pub timestamp: String,
    /// DOMContentLoaded, in ms relative to navigation start. 0 when the
    /// navigation-timing entry was missing.
    pub dom_content_loaded: f64,
    /// Load event end, in ms relative to navigation start.
    pub load_event: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps_sample_duration_ms: Option<u64>,
    pub api_calls: Vec<ApiCallRecord>,
    pub failed_requests: Vec<FailedRequestRecord>,
}

/// Timing of a single API response observed during one navigation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallRecord {
    pub url: String,
    /// Request start to response end, in ms.
    pub response_time: f64,
}

/// A request that failed at the HTTP level (status carries the code) or at
/// the network level (failure carries the abort reason).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRequestRecord {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub resource_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = PerformanceSnapshot {
            url: "https://example.com/worlds/plaza".to_string(),
            timestamp: "2026-08-07T12:00:00Z".to_string(),
            dom_content_loaded: 812.4,
            load_event: 1420.0,
            lcp: Some(950.2),
            avg_fps: Some(58),
            min_fps: Some(41),
            fps_sample_duration_ms: Some(3000),
            api_calls: vec![ApiCallRecord {
                url: "https://example.com/api/session".to_string(),
                response_time: 131.5,
            }],
            failed_requests: vec![],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["domContentLoaded"], 812.4);
        assert_eq!(json["loadEvent"], 1420.0);
        assert_eq!(json["avgFps"], 58);
        assert_eq!(json["fpsSampleDurationMs"], 3000);
        assert_eq!(json["apiCalls"][0]["responseTime"], 131.5);
        assert_eq!(json["failedRequests"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let snapshot = PerformanceSnapshot {
            url: "https://example.com/".to_string(),
            timestamp: "2026-08-07T12:00:00Z".to_string(),
            dom_content_loaded: 100.0,
            load_event: 200.0,
            lcp: None,
            avg_fps: None,
            min_fps: None,
            fps_sample_duration_ms: None,
            api_calls: vec![],
            failed_requests: vec![],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("lcp"));
        assert!(!obj.contains_key("avgFps"));
        assert!(!obj.contains_key("minFps"));
        assert!(!obj.contains_key("fpsSampleDurationMs"));
    }

    #[test]
    fn failed_request_keeps_status_and_failure_independent() {
        let http = FailedRequestRecord {
            url: "https://example.com/api/missing".to_string(),
            method: "GET".to_string(),
            status: Some(404),
            failure: None,
            resource_type: "xhr".to_string(),
        };
        let network = FailedRequestRecord {
            url: "https://cdn.example.com/bundle.js".to_string(),
            method: "GET".to_string(),
            status: None,
            failure: Some("net::ERR_NAME_NOT_RESOLVED".to_string()),
            resource_type: "script".to_string(),
        };

        let http_json = serde_json::to_value(&http).unwrap();
        assert_eq!(http_json["status"], 404);
        assert!(http_json.get("failure").is_none());

        let network_json = serde_json::to_value(&network).unwrap();
        assert!(network_json.get("status").is_none());
        assert_eq!(network_json["failure"], "net::ERR_NAME_NOT_RESOLVED");
    }
}

use crate::network::NetworkRecorder;
use crate::readiness::{ReadinessProbe, ReadyFrame, evaluate_in_context, evaluate_in_page};
use crate::{Error, Result};
use chromiumoxide::Page;
use chrono::{SecondsFormat, Utc};
use kestrel_core::metrics::summarize_frame_deltas;
use kestrel_core::snapshot::PerformanceSnapshot;
use serde::Deserialize;
use std::time::{Duration, Instant};

const NAV_TIMING_POLL: Duration = Duration::from_millis(100);

/// Per-run sampling configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Substring a response URL must contain to be timed as an API call.
    pub api_filter: String,
    /// Accessible title of the experience iframe.
    pub iframe_title: String,
    /// Budget for the whole readiness sequence.
    pub readiness_timeout: Duration,
    /// Length of the frame-rate sampling window.
    pub fps_window: Duration,
    /// When false, readiness probing and frame-rate sampling are skipped.
    pub sample_fps: bool,
    /// How long to wait for the load event to settle after navigation.
    pub load_settle_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            api_filter: "/api/".to_string(),
            iframe_title: "Experience".to_string(),
            readiness_timeout: Duration::from_secs(30),
            fps_window: Duration::from_millis(3000),
            sample_fps: true,
            load_settle_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavigationTiming {
    dom_content_loaded: f64,
    load_event: f64,
}

/// Produces exactly one [`PerformanceSnapshot`] per target URL.
///
/// Any structural failure (navigation, readiness) aborts the URL's
/// measurement entirely; there is no partial snapshot.
pub struct MetricsSampler<'p> {
    page: &'p Page,
    config: &'p SamplerConfig,
}

impl<'p> MetricsSampler<'p> {
    pub fn new(page: &'p Page, config: &'p SamplerConfig) -> Self {
        Self { page, config }
    }

    /// Measure one target URL.
    pub async fn sample(&self, target_url: &str) -> Result<PerformanceSnapshot> {
        tracing::info!("Measuring {}", target_url);

        // Fresh recorder per URL window: accumulators cannot leak across
        // targets, and observers are live before navigation starts.
        let recorder = NetworkRecorder::attach(self.page, &self.config.api_filter).await?;

        self.navigate(target_url).await?;

        let timing = self.read_navigation_timing().await?;
        let lcp = self.read_largest_contentful_paint().await?;

        let fps = if self.config.sample_fps {
            let probe = ReadinessProbe::new(
                self.config.iframe_title.clone(),
                self.config.readiness_timeout,
            );
            let frame = probe.wait_until_rendering(self.page).await?;
            let deltas = self.collect_frame_deltas(&frame).await?;
            tracing::debug!("Collected {} frame deltas", deltas.len());
            Some(summarize_frame_deltas(&deltas))
        } else {
            None
        };

        let activity = recorder.finish().await?;

        Ok(PerformanceSnapshot {
            url: target_url.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            dom_content_loaded: timing.dom_content_loaded,
            load_event: timing.load_event,
            lcp,
            avg_fps: fps.map(|f| f.avg_fps),
            min_fps: fps.map(|f| f.min_fps),
            fps_sample_duration_ms: fps.map(|_| self.config.fps_window.as_millis() as u64),
            api_calls: activity.api_calls,
            failed_requests: activity.failed_requests,
        })
    }

    /// Navigate to the target through a neutral blank page. Fragment-only
    /// transitions between same-origin targets are same-document
    /// navigations that leave the previous target's navigation-timing and
    /// paint entries in place; the interstitial forces a full navigation.
    async fn navigate(&self, target_url: &str) -> Result<()> {
        self.page
            .goto("about:blank")
            .await
            .map_err(|e| Error::Navigation {
                url: "about:blank".to_string(),
                reason: e.to_string(),
            })?;

        self.page
            .goto(target_url)
            .await
            .map_err(|e| Error::Navigation {
                url: target_url.to_string(),
                reason: e.to_string(),
            })?;

        // Bounded: the settle poll below reads whatever timing exists once
        // this returns or expires.
        match tokio::time::timeout(
            self.config.load_settle_timeout,
            self.page.wait_for_navigation(),
        )
        .await
        {
            Ok(Err(e)) => tracing::debug!("wait_for_navigation: {}", e),
            Err(_) => tracing::debug!("wait_for_navigation timed out; continuing"),
            Ok(Ok(_)) => {}
        }

        Ok(())
    }

    /// Read navigation timing, polling briefly until the load event has
    /// settled. Values are 0 when no navigation-timing entry exists.
    async fn read_navigation_timing(&self) -> Result<NavigationTiming> {
        let started = Instant::now();

        loop {
            let value = evaluate_in_page(self.page, NAV_TIMING_SCRIPT.to_string()).await?;
            let timing: NavigationTiming =
                serde_json::from_value(value).unwrap_or(NavigationTiming {
                    dom_content_loaded: 0.0,
                    load_event: 0.0,
                });

            if timing.load_event > 0.0 || started.elapsed() >= self.config.load_settle_timeout {
                return Ok(timing);
            }
            tokio::time::sleep(NAV_TIMING_POLL).await;
        }
    }

    /// Latest Largest Contentful Paint candidate observed so far, replayed
    /// from the buffered entries of this navigation.
    async fn read_largest_contentful_paint(&self) -> Result<Option<f64>> {
        let value = evaluate_in_page(self.page, LCP_SCRIPT.to_string()).await?;
        Ok(serde_json::from_value(value).unwrap_or(None))
    }

    /// Record inter-frame deltas inside the ready frame for the configured
    /// window and return them raw; aggregation happens in kestrel-core.
    async fn collect_frame_deltas(&self, frame: &ReadyFrame) -> Result<Vec<f64>> {
        let window_ms = self.config.fps_window.as_millis() as u64;
        let script = frame_deltas_script(window_ms);

        let value = evaluate_in_context(self.page, &frame.execution_context_id, script).await?;

        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Frame delta payload not decodable: {}", e);
            Vec::new()
        }))
    }
}

const NAV_TIMING_SCRIPT: &str = r#"(() => {
    const [nav] = performance.getEntriesByType('navigation');
    return {
        domContentLoaded: nav ? nav.domContentLoadedEventEnd : 0,
        loadEvent: nav ? nav.loadEventEnd : 0
    };
})()"#;

const LCP_SCRIPT: &str = r#"new Promise(resolve => {
    let latest = null;
    let observer;
    try {
        observer = new PerformanceObserver(list => {
            for (const entry of list.getEntries()) latest = entry.startTime;
        });
        observer.observe({ type: 'largest-contentful-paint', buffered: true });
    } catch (err) {
        resolve(null);
        return;
    }
    setTimeout(() => { observer.disconnect(); resolve(latest); }, 200);
})"#;

/// The sampling loop runs on animation frames; a guard timer returns
/// whatever was collected if the render loop dies mid-window.
fn frame_deltas_script(window_ms: u64) -> String {
    let guard_ms = window_ms * 2 + 1000;
    format!(
        r#"new Promise(resolve => {{
    const deltas = [];
    let last = performance.now();
    const start = last;
    const guard = setTimeout(() => resolve(deltas), {guard_ms});
    const tick = now => {{
        deltas.push(now - last);
        last = now;
        if (now - start < {window_ms}) {{
            requestAnimationFrame(tick);
        }} else {{
            clearTimeout(guard);
            resolve(deltas);
        }}
    }};
    requestAnimationFrame(tick);
}})"#
    )
}

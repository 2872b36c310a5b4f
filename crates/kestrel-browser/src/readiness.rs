use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, Frame, FrameId, FrameTree, GetFrameTreeParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a single in-page two-frame check may run before reporting back.
/// Keeps every CDP evaluate bounded even when the render loop is dead.
const TWO_FRAME_SLICE_MS: u64 = 600;

/// The resolved experience frame, ready for in-frame evaluation.
#[derive(Debug, Clone)]
pub struct ReadyFrame {
    pub frame_id: FrameId,
    pub execution_context_id: ExecutionContextId,
}

/// Detects when the experience embedded in a titled iframe is actively
/// rendering.
///
/// A canvas element alone is not a readiness signal: it can exist before the
/// render loop starts. The probe only succeeds after observing two
/// consecutive animation-frame callbacks inside the frame.
pub struct ReadinessProbe {
    iframe_title: String,
    timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(iframe_title: impl Into<String>, timeout: Duration) -> Self {
        Self {
            iframe_title: iframe_title.into(),
            timeout,
        }
    }

    /// Wait until the embedded experience renders two consecutive animation
    /// frames, or fail within the probe timeout.
    pub async fn wait_until_rendering(&self, page: &Page) -> Result<ReadyFrame> {
        let deadline = Instant::now() + self.timeout;

        let src = self.wait_for_visible_iframe(page, deadline).await?;
        tracing::debug!("Experience iframe visible, src: {:?}", src);

        let frame_id = self.resolve_inner_frame(page, &src).await?;
        let execution_context_id = create_probe_context(page, &frame_id).await?;

        let mut canvas_seen = false;
        loop {
            let state = evaluate_in_context(page, &execution_context_id, two_frame_script())
                .await?
                .as_str()
                .unwrap_or("no-canvas")
                .to_string();

            match state.as_str() {
                "rendering" => {
                    tracing::info!("Experience rendering: two consecutive frames observed");
                    return Ok(ReadyFrame {
                        frame_id,
                        execution_context_id,
                    });
                }
                // Canvas exists but the render loop produced no frames in
                // this slice; keep polling until the deadline.
                "stalled" => canvas_seen = true,
                _ => {}
            }

            if Instant::now() >= deadline {
                let detail = if canvas_seen {
                    "canvas present but no two consecutive animation frames"
                } else {
                    "no canvas element appeared inside the frame"
                };
                return Err(Error::ReadinessTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                    detail: detail.to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll the host document until an iframe with the configured title is
    /// visible; returns its resolved src.
    async fn wait_for_visible_iframe(&self, page: &Page, deadline: Instant) -> Result<String> {
        let script = visible_iframe_script(&self.iframe_title);

        loop {
            let value = evaluate_in_page(page, script.clone()).await?;
            let src: Option<String> = serde_json::from_value(value).unwrap_or(None);
            if let Some(src) = src {
                return Ok(src);
            }

            if Instant::now() >= deadline {
                return Err(Error::ElementNotFound(self.iframe_title.clone()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Find the child frame backing the iframe by matching its src against
    /// the CDP frame tree.
    async fn resolve_inner_frame(&self, page: &Page, src: &str) -> Result<FrameId> {
        let tree = page.execute(GetFrameTreeParams::default()).await?;

        let mut frames = Vec::new();
        collect_child_frames(&tree.frame_tree, &mut frames);

        if frames.is_empty() {
            return Err(Error::FrameResolution(
                "page has no child frames".to_string(),
            ));
        }

        let wanted = strip_fragment(src);
        if !wanted.is_empty()
            && let Some(frame) = frames.iter().find(|f| frame_matches(&f.url, wanted))
        {
            return Ok(frame.id.clone());
        }

        // An iframe without a usable src still resolves when it is the only
        // child frame on the page.
        if frames.len() == 1 {
            return Ok(frames[0].id.clone());
        }

        Err(Error::FrameResolution(format!(
            "no frame matches iframe src {:?} among {} child frames",
            src,
            frames.len()
        )))
    }
}

/// Create an isolated world in the frame so probe scripts do not interact
/// with the experience's own globals.
async fn create_probe_context(page: &Page, frame_id: &FrameId) -> Result<ExecutionContextId> {
    let params = CreateIsolatedWorldParams::builder()
        .frame_id(frame_id.clone())
        .world_name("__kestrel_probe__")
        .build()
        .map_err(Error::Cdp)?;

    let world = page.execute(params).await?;
    Ok(world.execution_context_id.clone())
}

/// Evaluate an expression in the page's main world, awaiting any returned
/// promise, and yield the value as JSON.
pub(crate) async fn evaluate_in_page(page: &Page, expression: String) -> Result<serde_json::Value> {
    evaluate(page, None, expression).await
}

/// Evaluate an expression inside a specific execution context, awaiting any
/// returned promise, and yield the value as JSON.
pub(crate) async fn evaluate_in_context(
    page: &Page,
    context_id: &ExecutionContextId,
    expression: String,
) -> Result<serde_json::Value> {
    evaluate(page, Some(context_id), expression).await
}

async fn evaluate(
    page: &Page,
    context_id: Option<&ExecutionContextId>,
    expression: String,
) -> Result<serde_json::Value> {
    let mut builder = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true);
    if let Some(context_id) = context_id {
        builder = builder.context_id(context_id.clone());
    }
    let params = builder.build().map_err(Error::Cdp)?;

    let result = page.evaluate_expression(params).await?;
    Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
}

fn collect_child_frames<'t>(tree: &'t FrameTree, out: &mut Vec<&'t Frame>) {
    if let Some(children) = &tree.child_frames {
        for child in children {
            out.push(&child.frame);
            collect_child_frames(child, out);
        }
    }
}

/// Frame URLs in the tree never carry fragments; compare modulo trailing
/// slash.
fn frame_matches(frame_url: &str, wanted: &str) -> bool {
    frame_url.trim_end_matches('/') == wanted.trim_end_matches('/')
}

fn strip_fragment(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// JSON-quote a string for safe embedding in an evaluated script.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Returns the iframe's src when an iframe with the given title is visible,
/// an empty string when it is visible without a src, and null otherwise.
fn visible_iframe_script(title: &str) -> String {
    format!(
        r#"(() => {{
    const title = {title};
    for (const el of document.querySelectorAll('iframe')) {{
        if (el.getAttribute('title') !== title) continue;
        const rect = el.getBoundingClientRect();
        if (rect.width > 0 && rect.height > 0) return el.src || '';
    }}
    return null;
}})()"#,
        title = js_string(title)
    )
}

/// One bounded readiness check: resolves 'no-canvas' immediately when the
/// frame has no canvas, 'rendering' after two consecutive animation frames,
/// or 'stalled' when the slice elapses first.
fn two_frame_script() -> String {
    format!(
        r#"new Promise(resolve => {{
    if (!document.querySelector('canvas')) {{ resolve('no-canvas'); return; }}
    let frames = 0;
    const slice = setTimeout(() => resolve('stalled'), {slice_ms});
    const tick = () => {{
        frames += 1;
        if (frames >= 2) {{ clearTimeout(slice); resolve('rendering'); }}
        else requestAnimationFrame(tick);
    }};
    requestAnimationFrame(tick);
}})"#,
        slice_ms = TWO_FRAME_SLICE_MS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_frame_script_requires_two_callbacks() {
        let script = two_frame_script();
        assert!(script.contains("frames >= 2"));
        assert!(script.contains("requestAnimationFrame"));
        // A dead render loop must resolve 'stalled' within the slice, never
        // 'rendering'
        assert!(script.contains("'stalled'"));
        assert!(script.contains(&TWO_FRAME_SLICE_MS.to_string()));
    }

    #[test]
    fn test_visible_iframe_script_embeds_escaped_title() {
        let script = visible_iframe_script(r#"My "Quoted" Experience"#);
        assert!(script.contains(r#""My \"Quoted\" Experience""#));
        assert!(script.contains("getBoundingClientRect"));
    }

    #[test]
    fn test_frame_matching_ignores_trailing_slash_and_fragment() {
        let src = "https://cdn.example.com/embed/world#spawn";
        let wanted = strip_fragment(src);
        assert_eq!(wanted, "https://cdn.example.com/embed/world");
        assert!(frame_matches("https://cdn.example.com/embed/world/", wanted));
        assert!(!frame_matches("https://cdn.example.com/other", wanted));
    }

    #[test]
    fn test_probe_carries_configured_timeout() {
        let probe = ReadinessProbe::new("Experience", Duration::from_secs(30));
        assert_eq!(probe.timeout, Duration::from_secs(30));
        assert_eq!(probe.iframe_title, "Experience");
    }
}

use crate::Result;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A live Chrome DevTools Protocol connection
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Connect to a Chrome instance listening on the given debugging port.
    /// Chrome may not be ready right after spawn, so the connection is
    /// retried a bounded number of times.
    pub async fn connect(debugging_port: u16) -> Result<Self> {
        let ws_url = format!("http://localhost:{}", debugging_port);
        tracing::info!("Connecting to Chrome on port {}", debugging_port);

        let (browser, mut handler) = {
            let mut retries = CONNECT_ATTEMPTS;
            loop {
                tracing::debug!("Attempting CDP connection to {}...", ws_url);
                match Browser::connect(&ws_url).await {
                    Ok(result) => {
                        tracing::info!("CDP connection established");
                        break result;
                    }
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(crate::Error::Cdp(format!(
                                "Failed to connect to Chrome after {} attempts: {}",
                                CONNECT_ATTEMPTS, e
                            )));
                        }
                        tracing::info!(
                            "CDP connection attempt failed, retrying... ({} left)",
                            retries
                        );
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        };

        // The handler task must run for any CDP command to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    // Some CDP events are not fully parseable; keep draining
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// The page measurements run on: the browser's initial tab, or a new
    /// blank one when none exists yet.
    pub async fn page(&self) -> Result<Page> {
        // Chrome may still be creating its initial tab
        tokio::time::sleep(Duration::from_millis(500)).await;

        let pages = self.browser.pages().await?;
        if let Some(page) = pages.first() {
            tracing::debug!("Using existing page");
            Ok(page.clone())
        } else {
            tracing::debug!("No existing pages, creating new page");
            Ok(self.browser.new_page("about:blank").await?)
        }
    }

    /// Close the browser connection and stop the handler task.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed (continuing): {}", e);
        }
        self.handler_task.abort();
    }
}

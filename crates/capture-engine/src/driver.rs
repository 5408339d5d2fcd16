//! The browser-driver contract.
//!
//! The capture engine needs only a narrow surface from whatever automates
//! the browser: navigation, screenshots, input dispatch, element geometry,
//! and overlay injection. Two implementations exist: [`NullDriver`], a total
//! no-op used by the narration dry-run and by tests, and
//! [`crate::bridge::BridgeDriver`], which drives an external automation
//! helper subprocess.

use std::sync::Arc;

use async_trait::async_trait;
use demoreel_common::error::DemoreelResult;
use demoreel_timeline_model::event::BoundingBox;
use demoreel_timeline_model::timeline::ViewportSize;

/// Browser launch options.
///
/// DPR is fixed at 1 during capture; upscaling is deferred to the encoder.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub viewport: ViewportSize,
    pub device_pixel_ratio: f64,
    pub locale: String,
    pub timezone: String,
    pub color_scheme: String,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            viewport: ViewportSize {
                width: 1280,
                height: 720,
            },
            device_pixel_ratio: 1.0,
            locale: "en-US".to_string(),
            timezone: "UTC".to_string(),
            color_scheme: "light".to_string(),
        }
    }
}

/// Minimal browser automation surface used by the capture engine.
///
/// Every method is total on the stub implementation so scenarios can run
/// against it without a browser (narration dry-run).
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate the page to `url` and wait for load.
    async fn goto(&mut self, url: &str) -> DemoreelResult<()>;

    /// Take a screenshot of the viewport, returning encoded image bytes.
    async fn screenshot(&mut self) -> DemoreelResult<Vec<u8>>;

    /// Click the element matched by `selector`.
    async fn click(&mut self, selector: &str) -> DemoreelResult<()>;

    /// Double-click the element matched by `selector`.
    async fn dblclick(&mut self, selector: &str) -> DemoreelResult<()>;

    /// Hover the element matched by `selector`.
    async fn hover(&mut self, selector: &str) -> DemoreelResult<()>;

    /// Send a key press to the element matched by `selector`.
    async fn press(&mut self, selector: &str, key: &str) -> DemoreelResult<()>;

    /// Type a single character into the element matched by `selector`.
    async fn type_char(&mut self, selector: &str, ch: char) -> DemoreelResult<()>;

    /// Bounding box of the element matched by `selector`, if it resolves.
    async fn bounding_box(&mut self, selector: &str) -> DemoreelResult<Option<BoundingBox>>;

    /// Inject a full-viewport overlay (title slides).
    async fn inject_overlay(&mut self, html: &str, css: &str) -> DemoreelResult<()>;

    /// Remove a previously injected overlay.
    async fn remove_overlay(&mut self) -> DemoreelResult<()>;

    /// Close the browser session.
    async fn close(&mut self) -> DemoreelResult<()>;
}

/// Shared handle to a driver: the capture loop and the scenario runner
/// alternate access, and the async mutex guarantees only one side issues
/// screenshots at a time.
pub type SharedDriver = Arc<tokio::sync::Mutex<Box<dyn BrowserDriver>>>;

/// Wrap a driver for shared use.
pub fn share_driver(driver: Box<dyn BrowserDriver>) -> SharedDriver {
    Arc::new(tokio::sync::Mutex::new(driver))
}

/// A total no-op driver.
///
/// Every operation succeeds with a neutral default; screenshots return a
/// small fixed buffer. Used by the narration dry-run (which must execute a
/// scenario without a browser) and by tests.
#[derive(Debug, Default)]
pub struct NullDriver {
    /// Bytes returned from `screenshot`; tests override this to exercise
    /// dedup behaviour.
    pub screenshot_bytes: Vec<u8>,
}

impl NullDriver {
    pub fn new() -> Self {
        Self {
            screenshot_bytes: vec![0u8; 16],
        }
    }
}

#[async_trait]
impl BrowserDriver for NullDriver {
    async fn goto(&mut self, _url: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn screenshot(&mut self) -> DemoreelResult<Vec<u8>> {
        Ok(self.screenshot_bytes.clone())
    }

    async fn click(&mut self, _selector: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn dblclick(&mut self, _selector: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn hover(&mut self, _selector: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn press(&mut self, _selector: &str, _key: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn type_char(&mut self, _selector: &str, _ch: char) -> DemoreelResult<()> {
        Ok(())
    }

    async fn bounding_box(&mut self, _selector: &str) -> DemoreelResult<Option<BoundingBox>> {
        Ok(None)
    }

    async fn inject_overlay(&mut self, _html: &str, _css: &str) -> DemoreelResult<()> {
        Ok(())
    }

    async fn remove_overlay(&mut self) -> DemoreelResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> DemoreelResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_driver_is_total() {
        let mut driver = NullDriver::new();
        driver.goto("http://localhost:3000").await.unwrap();
        driver.click("#missing").await.unwrap();
        driver.press("body", "Enter").await.unwrap();
        assert!(driver.bounding_box("#missing").await.unwrap().is_none());
        assert!(!driver.screenshot().await.unwrap().is_empty());
        driver.close().await.unwrap();
    }
}

//! The page the agent acts on.
//!
//! [`Surface`] is the boundary between the agent and the browser. The host only
//! ever exchanges plain data with it: probe reports, coordinates, bytes.

use async_trait::async_trait;
use eoka::cdp::MouseEventType;
use eoka::Page;
use tracing::debug;

use crate::geometry::{Point, Viewport};
use crate::probe::{ProbeOptions, ProbeReport};
use crate::visibility::ElementIndex;
use crate::{annotate, probe, Error, Result};

#[async_trait]
pub trait Surface: Send + Sync {
    /// Inject the visibility probe and read its report back.
    async fn probe(&self, options: &ProbeOptions) -> Result<ProbeReport>;

    /// Draw the numbered overlay for `index`. Cosmetic only.
    async fn annotate(&self, index: &ElementIndex) -> Result<()>;

    /// Keep a marker at the last pointer position so screenshots show it.
    async fn show_pointer(&self) -> Result<()>;

    /// Current layout viewport.
    async fn viewport(&self) -> Result<Viewport>;

    /// Press and release the primary button at `point`.
    async fn click_at(&self, point: Point) -> Result<()>;

    /// Move the pointer to `point` without pressing.
    async fn move_pointer(&self, point: Point) -> Result<()>;

    /// Dispatch a wheel event at `point`.
    async fn wheel(&self, point: Point, delta_x: f64, delta_y: f64) -> Result<()>;

    /// Insert text into the focused element.
    async fn insert_text(&self, text: &str) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// JPEG screenshot of the viewport.
    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>>;

    async fn url(&self) -> Result<String>;

    /// Fixed delay; the page gets no readiness signal.
    async fn settle(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl Surface for Page {
    async fn probe(&self, options: &ProbeOptions) -> Result<ProbeReport> {
        probe::run(self, options).await
    }

    async fn annotate(&self, index: &ElementIndex) -> Result<()> {
        annotate::draw(self, index).await
    }

    async fn show_pointer(&self) -> Result<()> {
        self.execute(annotate::POINTER_SCRIPT).await?;
        Ok(())
    }

    async fn viewport(&self) -> Result<Viewport> {
        let json: String = self
            .evaluate("JSON.stringify({ width: window.innerWidth, height: window.innerHeight })")
            .await?;
        serde_json::from_str(&json).map_err(|e| Error::Probe(format!("viewport parse error: {}", e)))
    }

    async fn click_at(&self, point: Point) -> Result<()> {
        debug!("click_at ({}, {})", point.x, point.y);
        Page::click_at(self, point.x, point.y).await?;
        Ok(())
    }

    async fn move_pointer(&self, point: Point) -> Result<()> {
        self.session()
            .dispatch_mouse_event(MouseEventType::MouseMoved, point.x, point.y, None, None)
            .await?;
        Ok(())
    }

    async fn wheel(&self, point: Point, delta_x: f64, delta_y: f64) -> Result<()> {
        debug!("wheel at ({}, {}) by ({}, {})", point.x, point.y, delta_x, delta_y);
        self.session()
            .dispatch_mouse_wheel(point.x, point.y, delta_x, delta_y)
            .await?;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<()> {
        self.type_text(text).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        Page::press_key(self, key).await?;
        Ok(())
    }

    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>> {
        Ok(self.screenshot_jpeg(quality).await?)
    }

    async fn url(&self) -> Result<String> {
        Ok(Page::url(self).await?)
    }

    async fn settle(&self, ms: u64) {
        self.wait(ms).await;
    }
}

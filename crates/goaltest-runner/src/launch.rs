//! Browser launch and the start page.

use eoka::{Browser, Page, StealthConfig};
use tracing::debug;

use crate::config::{BrowserConfig, Device};
use crate::{Error, Result};

/// HTTP status of the current document, or 0 when the browser does not know it
/// (`data:` and `file:` URLs).
const RESPONSE_STATUS_JS: &str = r#"(() => {
    const nav = performance.getEntriesByType('navigation')[0];
    return nav && nav.responseStatus ? nav.responseStatus : 0;
})()"#;

/// Launch settings for `device`. A user agent set in the config wins over the
/// device's.
pub fn stealth_config(browser: &BrowserConfig, device: &Device) -> StealthConfig {
    StealthConfig {
        headless: browser.headless,
        proxy: browser.proxy.clone(),
        user_agent: Some(
            browser
                .user_agent
                .clone()
                .unwrap_or_else(|| device.user_agent.to_string()),
        ),
        chrome_path: browser.chrome_path.clone(),
        viewport_width: device.width,
        viewport_height: device.height,
        ..Default::default()
    }
}

/// Open the start page. Failing to load it, or an HTTP error status, is an
/// environment error.
pub async fn open_start_page(browser: &Browser, url: &str) -> Result<Page> {
    let page = browser
        .new_page(url)
        .await
        .map_err(|e| Error::Environment(format!("could not navigate to {}: {}", url, e)))?;
    let status: u16 = page.evaluate(RESPONSE_STATUS_JS).await?;
    debug!("start page status: {}", status);
    check_status(url, status)?;
    Ok(page)
}

pub fn check_status(url: &str, status: u16) -> Result<()> {
    if status >= 400 {
        return Err(Error::Environment(format!(
            "could not navigate to {}: HTTP status {}",
            url, status
        )));
    }
    Ok(())
}

//! Integration tests for goaltest-agent
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use goaltest_agent::{
    observe, ActionPayload, ActionRegistry, Browser, Page, ProbeOptions, StealthConfig, Surface,
};

/// Check if Chrome is available
fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

async fn launch() -> Browser {
    let config = StealthConfig {
        headless: true,
        viewport_width: 1024,
        viewport_height: 768,
        ..Default::default()
    };
    Browser::launch_with_config(config)
        .await
        .expect("Failed to launch browser")
}

async fn load(page: &Page, html: &str) {
    page.goto(&format!("data:text/html,{}", html))
        .await
        .expect("Failed to navigate");
    page.wait(300).await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_empty_page_has_no_elements() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = browser.new_page("about:blank").await.expect("Failed to create page");

    let index = observe(&page, &ProbeOptions::default()).await.expect("observe");
    assert!(index.is_empty());

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_occluded_and_offscreen_are_excluded() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = browser.new_page("about:blank").await.expect("Failed to create page");
    load(
        &page,
        r#"<style>body{margin:0} button{position:absolute;width:100px;height:40px}</style>
        <button style="left:10px;top:10px">visible</button>
        <button style="left:10px;top:100px">covered</button>
        <div style="position:absolute;left:0;top:90px;width:300px;height:80px;background:red"></div>
        <button style="left:10px;top:3000px">below the fold</button>
        <button style="left:10px;top:200px;display:none">hidden</button>"#,
    )
    .await;

    let index = observe(&page, &ProbeOptions::default()).await.expect("observe");
    assert_eq!(index.len(), 1);
    let el = index.get(0).unwrap();
    assert_eq!(el.rect.x, 10.0);
    assert_eq!(el.rect.y, 10.0);

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_shadow_dom_elements_are_found() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = browser.new_page("about:blank").await.expect("Failed to create page");
    load(
        &page,
        r#"<div id="host"></div>
        <script>
          const root = document.getElementById('host').attachShadow({mode: 'open'});
          root.innerHTML = '<button style="width:120px;height:40px">inside</button>';
        </script>"#,
    )
    .await;

    let index = observe(&page, &ProbeOptions::default()).await.expect("observe");
    assert_eq!(index.len(), 1);

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_overlay_does_not_affect_next_probe() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = browser.new_page("about:blank").await.expect("Failed to create page");
    load(
        &page,
        r#"<a href="/a" style="display:inline-block;width:80px;height:30px">a</a>
        <a href="/b" style="display:inline-block;width:80px;height:30px">b</a>"#,
    )
    .await;

    let first = observe(&page, &ProbeOptions::default()).await.expect("observe");
    let second = observe(&page, &ProbeOptions::default()).await.expect("observe");
    assert_eq!(first.rects(), second.rects());

    let published: usize = page
        .evaluate("window.__goaltest_element_info.length")
        .await
        .expect("element info");
    assert_eq!(published, second.len());

    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_click_by_element_number() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let browser = launch().await;
    let page = browser.new_page("about:blank").await.expect("Failed to create page");
    load(
        &page,
        r#"<button style="width:100px;height:40px" onclick="document.title='clicked'">go</button>"#,
    )
    .await;

    let index = observe(&page, &ProbeOptions::default()).await.expect("observe");
    ActionRegistry::default()
        .dispatch(&page, &index, &ActionPayload::new("click").element(0))
        .await
        .expect("click");
    page.wait(200).await;

    let title: String = page.evaluate("document.title").await.expect("title");
    assert_eq!(title, "clicked");
    assert!(Surface::url(&page).await.expect("url").starts_with("data:"));

    browser.close().await.expect("Failed to close browser");
}

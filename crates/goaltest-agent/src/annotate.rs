//! Overlay annotation — numbered markers over the indexed elements.
//!
//! The overlay is `pointer-events: none` so it never intercepts hit tests, and
//! the probe removes it before sampling so it cannot leak into the next index.

use serde_json::json;

use crate::visibility::ElementIndex;
use crate::Result;

/// Global the kept rectangles are published under.
pub const ELEMENT_INFO_GLOBAL: &str = "__goaltest_element_info";

/// Id of the overlay container.
pub const OVERLAY_ID: &str = "__goaltest_overlay";

/// Id of the pointer marker.
pub const POINTER_ID: &str = "__goaltest_pointer";

/// Installs a marker that follows mouse events. Installing twice is a no-op;
/// after a navigation the marker reappears on the next pointer event.
pub const POINTER_SCRIPT: &str = r#"
(() => {
    if (window.__goaltest_pointer_installed) return;
    window.__goaltest_pointer_installed = true;

    const place = (e) => {
        let marker = document.getElementById('__goaltest_pointer');
        if (!marker) {
            if (!document.body) return;
            marker = document.createElement('div');
            marker.id = '__goaltest_pointer';
            marker.style.cssText = 'position:fixed;width:16px;height:16px;margin:-8px 0 0 -8px;'
                + 'border-radius:50%;background:rgba(255,0,0,0.6);border:2px solid white;'
                + 'z-index:2147483647;pointer-events:none';
            document.body.appendChild(marker);
        }
        marker.style.left = e.clientX + 'px';
        marker.style.top = e.clientY + 'px';
    };
    for (const type of ['mousemove', 'mousedown', 'mouseup', 'wheel']) {
        document.addEventListener(type, place, true);
    }
})()
"#;

/// Build the script that publishes the index and draws its markers.
pub fn overlay_script(index: &ElementIndex) -> Result<String> {
    let data: Vec<serde_json::Value> = index
        .iter()
        .map(|el| {
            json!({
                "i": el.index,
                "x": el.rect.x,
                "y": el.rect.y,
                "width": el.rect.width,
                "height": el.rect.height,
            })
        })
        .collect();
    let data = serde_json::to_string(&data)?;

    Ok(format!(
        r#"
(() => {{
    const data = {data};
    window.{global} = data.map(d => ({{ x: d.x, y: d.y, width: d.width, height: d.height }}));

    const old = document.getElementById('{id}');
    if (old) old.remove();
    if (!document.body) return;

    const container = document.createElement('div');
    container.id = '{id}';
    container.style.cssText = 'position:fixed;left:0;top:0;width:0;height:0;z-index:2147483647;pointer-events:none';

    const style = document.createElement('style');
    style.textContent = `
        .__goaltest_marker {{
            position: fixed;
            display: flex;
            justify-content: center;
            align-items: center;
            background-color: rgba(255, 255, 0, 0.9);
            box-shadow: 0 0 0 1px white;
            border-radius: 50%;
            padding: 2px;
            min-width: 12px;
            font: bold 13px/14px sans-serif;
            color: black;
            pointer-events: none;
        }}
    `;
    container.appendChild(style);

    for (const el of data) {{
        const marker = document.createElement('div');
        marker.className = '__goaltest_marker';
        marker.style.left = (el.x + el.width * 0.4) + 'px';
        marker.style.top = Math.max(0, el.y - 5) + 'px';
        marker.textContent = String(el.i);
        container.appendChild(marker);
    }}

    document.body.appendChild(container);
}})()
"#,
        data = data,
        global = ELEMENT_INFO_GLOBAL,
        id = OVERLAY_ID,
    ))
}

/// Inject the overlay into `page`.
pub async fn draw(page: &eoka::Page, index: &ElementIndex) -> Result<()> {
    let js = overlay_script(index)?;
    page.execute(&js).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Viewport;
    use crate::probe::{ProbeCandidate, ProbeReport};
    use crate::visibility::build_index;

    #[test]
    fn test_overlay_script_lists_every_element() {
        let report = ProbeReport {
            viewport: Viewport::new(800.0, 600.0),
            grid: 2,
            candidates: vec![
                ProbeCandidate {
                    x: 10.0,
                    y: 20.0,
                    width: 40.0,
                    height: 20.0,
                    rendered: true,
                    samples: "1111".into(),
                },
                ProbeCandidate {
                    x: 100.0,
                    y: 20.0,
                    width: 40.0,
                    height: 20.0,
                    rendered: true,
                    samples: "1000".into(),
                },
            ],
        };
        let index = build_index(&report);
        let js = overlay_script(&index).unwrap();
        assert!(js.contains(r#""i":0"#));
        assert!(js.contains(r#""i":1"#));
        assert!(js.contains(ELEMENT_INFO_GLOBAL));
        assert!(js.contains("pointer-events:none"));
    }

    #[test]
    fn test_pointer_marker_ignores_hit_tests() {
        assert!(POINTER_SCRIPT.contains(POINTER_ID));
        assert!(POINTER_SCRIPT.contains("pointer-events:none"));
        assert!(POINTER_SCRIPT.contains("__goaltest_pointer_installed"));
    }

    #[test]
    fn test_overlay_script_for_empty_index_clears() {
        let js = overlay_script(&ElementIndex::empty()).unwrap();
        assert!(js.contains("const data = [];"));
        assert!(js.contains("old.remove()"));
    }
}

//! In-page visibility probe.
//!
//! The probe runs inside the page's script environment. It walks the document
//! (including nested shadow roots), and for every interactive candidate reports
//! its bounding box plus which points of a sample grid hit-test back to it. The
//! report is plain data; all geometry decisions are made on the host side in
//! [`crate::visibility`].

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Viewport};
use crate::{Error, Result};

/// Default interactive selector family: links, buttons, SVG `use` targets,
/// form controls, ARIA buttons and tab stops.
pub const DEFAULT_SELECTOR: &str = r#"a, button, use, select, input, textarea, [role="button"], [tabindex]:not([tabindex="-1"])"#;

/// Default sample grid resolution (n × n points per candidate).
pub const DEFAULT_GRID: usize = 10;

/// Global the probe publishes its raw report under.
pub const PROBE_GLOBAL: &str = "__goaltest_probe";

/// Options passed into the probe script.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOptions {
    /// CSS selector matched against every node in the deep traversal.
    pub selector: String,
    /// Sample grid resolution.
    pub grid: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            selector: DEFAULT_SELECTOR.to_string(),
            grid: DEFAULT_GRID,
        }
    }
}

/// One candidate as seen by the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeCandidate {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// False when computed style hides the element or it has no intrinsic size.
    pub rendered: bool,
    /// Row-major exposure map: `samples[i * grid + j]` is sample (i, j),
    /// `'1'` when the top-most hit at that point is the candidate or inside it.
    #[serde(default)]
    pub samples: String,
}

impl ProbeCandidate {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Iterate the exposed sample points.
    pub fn exposed_points(&self, grid: usize) -> impl Iterator<Item = Point> + '_ {
        let n = grid as f64;
        let (left, top, w, h) = (self.x, self.y, self.width, self.height);
        self.samples
            .bytes()
            .take(grid * grid)
            .enumerate()
            .filter(|(_, b)| *b == b'1')
            .map(move |(k, _)| {
                let (i, j) = ((k / grid) as f64, (k % grid) as f64);
                Point::new(left + w * i / n, top + h * j / n)
            })
    }
}

/// Everything the probe hands back across the page boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub viewport: Viewport,
    pub grid: usize,
    pub candidates: Vec<ProbeCandidate>,
}

impl ProbeReport {
    /// Parse the JSON string read back from the page.
    pub fn from_json(json: &str) -> Result<Self> {
        let report: ProbeReport = serde_json::from_str(json)
            .map_err(|e| Error::Probe(format!("report parse error: {}", e)))?;
        report.check()?;
        Ok(report)
    }

    fn check(&self) -> Result<()> {
        if self.grid == 0 {
            return Err(Error::Probe("grid must be positive".into()));
        }
        let expected = self.grid * self.grid;
        for (i, c) in self.candidates.iter().enumerate() {
            if c.rendered && c.samples.len() != expected {
                return Err(Error::Probe(format!(
                    "candidate {} has {} samples, expected {}",
                    i,
                    c.samples.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Script that computes the probe report and stores it on `window`.
/// Expects `__goaltest_probe_options` to be defined beforehand.
const PROBE_JS: &str = r#"
(() => {
    const opts = __goaltest_probe_options;
    const previous = document.getElementById('__goaltest_overlay');
    if (previous) previous.remove();

    // Depth-first, document order; shadow children after light children.
    function querySelectorDeep(selector, root) {
        const found = [];
        const visit = (node) => {
            if (node.nodeType !== Node.ELEMENT_NODE) return;
            if (node.matches(selector)) found.push(node);
            for (const child of node.children) visit(child);
            if (node.shadowRoot) {
                for (const child of node.shadowRoot.children) visit(child);
            }
        };
        if (root) visit(root);
        return found;
    }

    function elementFromPointDeep(x, y) {
        let el = document.elementFromPoint(x, y);
        while (el && el.shadowRoot) {
            const inner = el.shadowRoot.elementFromPoint(x, y);
            if (!inner || inner === el) break;
            el = inner;
        }
        return el;
    }

    function isDeepDescendant(ancestor, node) {
        let cur = node.parentNode ? node.parentNode : node.host;
        while (cur) {
            if (cur === ancestor || cur.shadowRoot === ancestor) return true;
            cur = cur.parentNode ? cur.parentNode : cur.host;
        }
        return false;
    }

    const n = opts.grid;
    const candidates = querySelectorDeep(opts.selector, document.body).map((el) => {
        const rect = el.getBoundingClientRect();
        const base = { x: rect.left, y: rect.top, width: rect.width, height: rect.height };
        const style = getComputedStyle(el);
        if (style.display === 'none' || style.visibility !== 'visible') {
            return Object.assign(base, { rendered: false, samples: '' });
        }
        const htmlEl = el instanceof HTMLElement ? el : null;
        const intrinsic = (htmlEl ? htmlEl.offsetWidth + htmlEl.offsetHeight : 0) + rect.width + rect.height;
        if (intrinsic === 0) {
            return Object.assign(base, { rendered: false, samples: '' });
        }
        let samples = '';
        for (let i = 0; i < n; ++i) {
            for (let j = 0; j < n; ++j) {
                const px = rect.left + (rect.width * i) / n;
                const py = rect.top + (rect.height * j) / n;
                const hit = elementFromPointDeep(px, py);
                samples += hit && (hit === el || isDeepDescendant(el, hit)) ? '1' : '0';
            }
        }
        return Object.assign(base, { rendered: true, samples });
    });

    window.__goaltest_probe = {
        viewport: { width: window.innerWidth, height: window.innerHeight },
        grid: n,
        candidates,
    };
    return JSON.stringify(window.__goaltest_probe);
})()
"#;

/// Build the full script for the given options.
pub fn probe_script(options: &ProbeOptions) -> Result<String> {
    let opts = serde_json::to_string(options)?;
    Ok(format!("var __goaltest_probe_options = {}; {}", opts, PROBE_JS))
}

/// Inject the probe into `page` and read the report back.
pub async fn run(page: &eoka::Page, options: &ProbeOptions) -> Result<ProbeReport> {
    let js = probe_script(options)?;
    let json_str: String = page.evaluate(&js).await?;
    ProbeReport::from_json(&json_str)
}

//! Host-side visibility engine: turns a [`ProbeReport`] into the per-turn
//! [`ElementIndex`].

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::geometry::{Point, Rect, Viewport};
use crate::probe::{ProbeCandidate, ProbeOptions, ProbeReport};
use crate::surface::Surface;
use crate::Result;

/// A visible, unobstructed interactive element for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibleElement {
    /// Zero-based, dense, turn-local index. Meaningless in any other turn.
    pub index: usize,
    /// Visible, viewport-clipped rectangle. Width and height are > 0.
    pub rect: Rect,
}

impl VisibleElement {
    /// The point actions aim at.
    pub fn target(&self) -> Point {
        self.rect.center()
    }
}

impl fmt::Display for VisibleElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] at ({:.0}, {:.0}) {:.0}x{:.0}",
            self.index, self.rect.x, self.rect.y, self.rect.width, self.rect.height
        )
    }
}

/// The element index for one turn. Rebuilt on every observation and never
/// carried over; a new observation replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementIndex {
    elements: Vec<VisibleElement>,
    viewport: Option<Viewport>,
}

impl ElementIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&VisibleElement> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisibleElement> {
        self.elements.iter()
    }

    pub fn rects(&self) -> Vec<Rect> {
        self.elements.iter().map(|e| e.rect).collect()
    }

    /// Viewport the index was computed against, if known.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

/// Visible portion of one candidate, before viewport clipping.
///
/// The bounding box of all exposed sample points. A single exposed point still
/// yields a 1×1 rectangle, so an element that is exposed anywhere survives.
pub fn visible_rect(candidate: &ProbeCandidate, grid: usize) -> Rect {
    if !candidate.rendered {
        return Rect::EMPTY;
    }
    match Rect::bounding(candidate.exposed_points(grid)) {
        Some(b) => Rect::new(b.x, b.y, b.width.max(1.0), b.height.max(1.0)),
        None => Rect::EMPTY,
    }
}

/// Build the index: visible rect → clip to viewport → keep strictly positive.
/// Indices follow discovery order of the kept candidates.
pub fn build_index(report: &ProbeReport) -> ElementIndex {
    let screen = report.viewport.as_rect();
    let elements: Vec<VisibleElement> = report
        .candidates
        .iter()
        .map(|c| visible_rect(c, report.grid).clip_to(&screen))
        .filter(|r| !r.is_empty())
        .enumerate()
        .map(|(index, rect)| VisibleElement { index, rect })
        .collect();

    debug!(
        "visibility: {} of {} candidates visible",
        elements.len(),
        report.candidates.len()
    );

    ElementIndex {
        elements,
        viewport: Some(report.viewport),
    }
}

/// Probe the surface, build this turn's index and draw the numbered overlay.
pub async fn observe<S: Surface + ?Sized>(surface: &S, options: &ProbeOptions) -> Result<ElementIndex> {
    let report = surface.probe(options).await?;
    let index = build_index(&report);
    surface.annotate(&index).await?;
    Ok(index)
}

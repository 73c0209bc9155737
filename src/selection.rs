//! Text selection on the page and the floating Copy / Note tooltip.
//!
//! The controller owns the current selection, expressed as anchor and focus
//! text points. It decides when the tooltip appears: recomputation is
//! debounced, and only a selection that is non-trivial and fully inside the
//! content region gets one.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use log::debug;
use ratatui::layout::Rect;
use regex::Regex;

use crate::clipboard::FallbackClipboard;
use crate::content::{PageSurface, TextPoint};
use crate::layout::PageLayout;
use crate::notes::{NewNote, Note, NotesStore};
use crate::storage::LocalStore;

pub const SELECTION_CHANGE_DELAY: Duration = Duration::from_millis(60);
pub const TOUCH_SELECTION_CHANGE_DELAY: Duration = Duration::from_millis(80);
pub const POINTER_UP_DELAY: Duration = Duration::from_millis(120);
pub const TOUCH_END_DELAY: Duration = Duration::from_millis(120);
pub const TAP_DELAY: Duration = Duration::from_millis(200);

pub const TOOLTIP_INSET: u16 = 1;
pub const TOOLTIP_HEIGHT: u16 = 3;
const MIN_SELECTION_CHARS: usize = 2;

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("Failed to compile space run regex"));
static LINE_EDGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\n[ \t]*").expect("Failed to compile line edge regex")
});
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Failed to compile blank line regex"));

/// Collapses space runs, trims each line, caps blank lines at one. Returns
/// `None` when fewer than two characters survive.
pub fn normalize_selection_text(raw: &str) -> Option<String> {
    let text = SPACE_RUNS.replace_all(raw, " ");
    let text = LINE_EDGES.replace_all(&text, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    let text = text.trim();
    (text.chars().count() >= MIN_SELECTION_CHARS).then(|| text.to_string())
}

/// Top-left anchor of the tooltip box: `x` is its horizontal centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooltipPlacement {
    pub x: u16,
    pub y: u16,
}

pub fn position_tooltip(anchor: Rect, container: Rect, below: bool) -> TooltipPlacement {
    let center = anchor.x + anchor.width / 2;
    let min_x = container.x + TOOLTIP_INSET;
    let max_x = container.right().saturating_sub(TOOLTIP_INSET).max(min_x);
    let x = center.max(min_x).min(max_x);

    let y = if below {
        let desired = anchor.bottom();
        let max_top = container.bottom().saturating_sub(TOOLTIP_HEIGHT);
        desired.max(container.y).min(max_top)
    } else {
        anchor.y.saturating_sub(TOOLTIP_HEIGHT).max(container.y)
    };

    TooltipPlacement { x, y }
}

/// Bounding box of the rects that cover cells. When none do, the first rect
/// with nonzero width or height, else the first rect.
pub fn anchor_rect(rects: &[Rect]) -> Option<Rect> {
    let first = *rects.first()?;
    let bounding = rects
        .iter()
        .copied()
        .filter(|r| !r.is_empty())
        .reduce(|a, b| a.union(b));
    Some(bounding.unwrap_or_else(|| {
        rects
            .iter()
            .copied()
            .find(|r| r.width > 0 || r.height > 0)
            .unwrap_or(first)
    }))
}

/// Anchor and focus of the reader's selection. A `None` focus means the
/// pointer left the content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSelection {
    pub anchor: TextPoint,
    pub focus: Option<TextPoint>,
}

impl TextSelection {
    pub fn caret(point: TextPoint) -> Self {
        Self {
            anchor: point,
            focus: Some(point),
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.focus == Some(self.anchor)
    }

    pub fn is_contained(&self) -> bool {
        self.focus.is_some()
    }

    /// `[start, end)`. Both endpoint cells are included.
    pub fn range(&self) -> Option<(TextPoint, TextPoint)> {
        let focus = self.focus?;
        let (start, last) = if focus >= self.anchor {
            (self.anchor, focus)
        } else {
            (focus, self.anchor)
        };
        Some((start, TextPoint::new(last.block, last.offset + 1)))
    }
}

/// What the controller needs to see of the rendered page.
pub struct SurfaceView<'a> {
    pub surface: &'a PageSurface,
    pub layout: &'a PageLayout,
    /// The whole page region.
    pub container: Rect,
    /// The text column inside it.
    pub column: Rect,
    pub scroll: usize,
}

impl SurfaceView<'_> {
    pub fn selection_rects(&self, start: TextPoint, end: TextPoint) -> Vec<Rect> {
        let visible = self.scroll..self.scroll + self.column.height as usize;
        self.layout
            .selection_spans(start, end)
            .into_iter()
            .filter(|span| visible.contains(&span.line))
            .map(|span| {
                Rect::new(
                    self.column.x + span.x,
                    self.column.y + (span.line - self.scroll) as u16,
                    span.width,
                    1,
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub placement: TooltipPlacement,
    pub text: String,
}

#[derive(Default)]
pub struct SelectionController {
    selection: Option<TextSelection>,
    dragging: bool,
    touch_selecting: bool,
    tooltip: Option<Tooltip>,
    pending: Option<Instant>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&TextSelection> {
        self.selection.as_ref()
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Non-collapsed and inside the content region.
    pub fn has_active_selection(&self) -> bool {
        self.selection
            .is_some_and(|s| !s.is_collapsed() && s.is_contained())
    }

    /// Pointer pressed somewhere other than the tooltip. `point` is the text
    /// position under it, `None` outside the content region.
    pub fn pointer_down(&mut self, point: Option<TextPoint>) {
        self.hide();
        self.selection = point.map(TextSelection::caret);
        self.dragging = point.is_some();
    }

    pub fn pointer_drag(&mut self, point: Option<TextPoint>, now: Instant) {
        if !self.dragging {
            return;
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.focus = point;
        }
        self.on_selection_changed(now);
    }

    pub fn pointer_up(&mut self, now: Instant) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        if self.has_active_selection() {
            self.schedule(now, POINTER_UP_DELAY);
        } else {
            self.hide();
        }
    }

    pub fn on_selection_changed(&mut self, now: Instant) {
        if !self.has_active_selection() {
            self.hide();
            return;
        }
        let delay = if self.touch_selecting {
            TOUCH_SELECTION_CHANGE_DELAY
        } else {
            SELECTION_CHANGE_DELAY
        };
        self.schedule(now, delay);
    }

    /// A touch ended with a selection in place: show below, after a pause.
    pub fn on_touch_selection(&mut self, now: Instant) {
        self.touch_selecting = true;
        self.schedule(now, TOUCH_END_DELAY);
    }

    pub fn on_tap(&mut self, now: Instant) {
        self.schedule(now, TAP_DELAY);
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.pending = Some(now + delay);
    }

    /// Runs the debounced recompute once its deadline passed. Returns true
    /// when it ran.
    pub fn tick(&mut self, now: Instant, view: &SurfaceView<'_>) -> bool {
        match self.pending {
            Some(deadline) if deadline <= now => {
                self.pending = None;
                self.show(view);
                true
            }
            _ => false,
        }
    }

    pub fn show(&mut self, view: &SurfaceView<'_>) {
        let Some((start, end)) = self
            .selection
            .filter(|s| !s.is_collapsed())
            .and_then(|s| s.range())
        else {
            self.hide();
            return;
        };

        let Some(text) = normalize_selection_text(&view.surface.text_between(start, end)) else {
            self.hide();
            return;
        };

        let Some(anchor) = anchor_rect(&view.selection_rects(start, end)) else {
            self.hide();
            return;
        };

        let placement = position_tooltip(anchor, view.container, self.touch_selecting);
        debug!(
            "Tooltip at {},{} for {} chars",
            placement.x,
            placement.y,
            text.chars().count()
        );
        self.tooltip = Some(Tooltip { placement, text });
    }

    pub fn hide(&mut self) {
        self.pending = None;
        self.touch_selecting = false;
        self.tooltip = None;
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.dragging = false;
    }

    /// Copies the tooltip text. Clears tooltip and selection either way.
    pub fn copy(&mut self, clipboard: &mut FallbackClipboard) -> bool {
        let Some(tooltip) = self.tooltip.take() else {
            return false;
        };
        let copied = clipboard.copy(&tooltip.text);
        self.hide();
        self.clear_selection();
        copied
    }

    pub fn bookmark(
        &mut self,
        notes: &mut NotesStore,
        store: &mut LocalStore,
        book_title: &str,
        author: &str,
    ) -> Option<Note> {
        let tooltip = self.tooltip.take()?;
        let note = notes.add_note(
            store,
            NewNote {
                book_title: book_title.to_string(),
                author: author.to_string(),
                text: tooltip.text,
            },
        );
        self.hide();
        self.clear_selection();
        Some(note)
    }

    pub fn on_content_updated(&mut self) {
        self.hide();
        self.clear_selection();
    }

    pub fn on_scroll(&mut self) {
        if !self.has_active_selection() {
            self.hide();
        }
    }
}

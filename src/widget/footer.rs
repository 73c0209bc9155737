use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::Base16Palette;

const PREVIOUS_ARROW: &str = "◀";
const NEXT_ARROW: &str = "▶";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterTarget {
    Previous,
    Next,
}

pub fn page_label(current: usize, total: usize) -> String {
    format!("Page {current} of {total}")
}

/// "◀  Page X of Y  ▶" centred on one row.
#[derive(Debug, Default)]
pub struct Footer {
    previous: Rect,
    next: Rect,
}

impl Footer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        palette: &Base16Palette,
        current: usize,
        total: usize,
    ) {
        if area.height == 0 {
            return;
        }

        let label = page_label(current, total);
        let width = (label.width() + 6) as u16;
        let start = area.x + area.width.saturating_sub(width) / 2;
        self.previous = Rect::new(start, area.y, 1, 1);
        self.next = Rect::new(start + width.saturating_sub(1), area.y, 1, 1);

        let arrow_style = |enabled: bool| {
            if enabled {
                Style::default().fg(palette.base_0d)
            } else {
                Style::default().fg(palette.base_02)
            }
        };
        let line = Line::from(vec![
            Span::styled(PREVIOUS_ARROW, arrow_style(current > 1)),
            Span::raw("  "),
            Span::styled(label, Style::default().fg(palette.base_05)),
            Span::raw("  "),
            Span::styled(NEXT_ARROW, arrow_style(current < total)),
        ]);
        f.render_widget(
            Paragraph::new(line),
            Rect::new(start, area.y, width.min(area.width), 1),
        );
    }

    pub fn hit_test(&self, column: u16, row: u16) -> Option<FooterTarget> {
        let position = Position::new(column, row);
        if self.previous.contains(position) {
            Some(FooterTarget::Previous)
        } else if self.next.contains(position) {
            Some(FooterTarget::Next)
        } else {
            None
        }
    }
}

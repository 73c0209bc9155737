use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::selection::{TOOLTIP_HEIGHT, TooltipPlacement};
use crate::theme::Base16Palette;

const COPY_LABEL: &str = " Copy ";
const NOTE_LABEL: &str = " Note ";
/// Borders plus both labels and the divider.
const TOOLTIP_WIDTH: u16 = (COPY_LABEL.len() + 1 + NOTE_LABEL.len() + 2) as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipAction {
    Copy,
    Note,
}

/// The `[ Copy | Note ]` box over a selection.
#[derive(Debug, Default)]
pub struct TooltipWidget {
    area: Option<Rect>,
}

impl TooltipWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box for `placement`, kept inside `bounds`.
    pub fn area_for(placement: TooltipPlacement, bounds: Rect) -> Rect {
        let width = TOOLTIP_WIDTH.min(bounds.width);
        let max_x = bounds.right().saturating_sub(width);
        let x = placement
            .x
            .saturating_sub(width / 2)
            .max(bounds.x)
            .min(max_x);
        let height = TOOLTIP_HEIGHT.min(bounds.height);
        let y = placement
            .y
            .min(bounds.bottom().saturating_sub(height))
            .max(bounds.y);
        Rect::new(x, y, width, height)
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        placement: TooltipPlacement,
        bounds: Rect,
        palette: &Base16Palette,
    ) {
        let area = Self::area_for(placement, bounds);
        self.area = Some(area);

        let (text, border, background) = palette.get_panel_colors(true);
        let label = Style::default().fg(text).add_modifier(Modifier::BOLD);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(COPY_LABEL, label),
                Span::styled("│", Style::default().fg(border)),
                Span::styled(NOTE_LABEL, label),
            ]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border))
                    .style(Style::default().bg(background)),
            ),
            area,
        );
    }

    pub fn clear(&mut self) {
        self.area = None;
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        self.area
            .is_some_and(|area| area.contains(Position::new(column, row)))
    }

    /// Copy left of the divider, Note right of it. Borders count.
    pub fn hit_test(&self, column: u16, row: u16) -> Option<TooltipAction> {
        let area = self.area?;
        if !area.contains(Position::new(column, row)) {
            return None;
        }
        let divider = area.x + 1 + COPY_LABEL.len() as u16;
        match column.cmp(&divider) {
            std::cmp::Ordering::Less => Some(TooltipAction::Copy),
            std::cmp::Ordering::Greater => Some(TooltipAction::Note),
            std::cmp::Ordering::Equal => None,
        }
    }
}

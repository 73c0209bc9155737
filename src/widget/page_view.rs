use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::content::{RunStyle, TextPoint};
use crate::layout::{LayoutCell, PageLayout};
use crate::theme::Base16Palette;

pub const LOADING_TEXT: &str = "Loading…";

/// Draws the visible rows of `layout` into `column`.
pub struct PageView<'a> {
    pub layout: &'a PageLayout,
    pub scroll: usize,
    pub palette: &'a Base16Palette,
    /// `[start, end)` of the current selection.
    pub selection: Option<(TextPoint, TextPoint)>,
    pub current_match: Option<usize>,
}

impl PageView<'_> {
    pub fn render(&self, buf: &mut Buffer, column: Rect) {
        let rows = self
            .layout
            .lines()
            .iter()
            .skip(self.scroll)
            .take(column.height as usize);

        for (row, line) in rows.enumerate() {
            let Some(block) = line.block else {
                continue;
            };
            let y = column.y + row as u16;
            for cell in &line.cells {
                if cell.x + cell.width > column.width {
                    break;
                }
                let selected = self.selection.is_some_and(|(start, end)| {
                    let point = TextPoint::new(block, cell.offset);
                    point >= start && point < end
                });
                buf.set_string(
                    column.x + cell.x,
                    y,
                    cell.ch.to_string(),
                    self.cell_style(cell, selected),
                );
            }
        }
    }

    fn cell_style(&self, cell: &LayoutCell, selected: bool) -> Style {
        let palette = self.palette;
        let mut style = run_style(&cell.style, palette);

        if let Some(index) = cell.highlight {
            let (bg, fg) = palette.get_highlight_colors(self.current_match == Some(index));
            style = style.bg(bg).fg(fg);
        }
        if selected {
            let (bg, fg) = palette.get_selection_colors();
            style = style.bg(bg).fg(fg);
        }
        style
    }
}

fn run_style(run: &RunStyle, palette: &Base16Palette) -> Style {
    let mut style = Style::default().fg(palette.base_05);
    if run.heading {
        style = style.fg(palette.base_0d).add_modifier(Modifier::BOLD);
    }
    if run.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if run.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if run.code {
        style = style.fg(palette.base_0b);
    }
    if run.link {
        style = style.fg(palette.base_0c).add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// A centred status line in place of the page ("Loading…" or an error).
pub fn render_status(f: &mut Frame, area: Rect, message: &str, style: Style) {
    if area.height == 0 {
        return;
    }
    let top = area.y + area.height / 3;
    let status_area = Rect::new(area.x, top, area.width, area.bottom().saturating_sub(top));
    f.render_widget(
        Paragraph::new(Line::styled(message.to_string(), style))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        status_area,
    );
}

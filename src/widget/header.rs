use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::Base16Palette;

const NOTES_LABEL: &str = "[Notes]";
const SETTINGS_LABEL: &str = "[Settings]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderTarget {
    Notes,
    Settings,
    Search,
}

pub struct HeaderView<'a> {
    pub title: &'a str,
    pub query: &'a str,
    pub search_focused: bool,
    /// `None` while no query is set.
    pub match_info: Option<String>,
}

/// Title row with the notes and settings buttons, then the search row.
#[derive(Debug, Default)]
pub struct Header {
    notes_button: Rect,
    settings_button: Rect,
    search_box: Rect,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette, view: &HeaderView) {
        if area.height == 0 {
            return;
        }

        let buttons_width = (NOTES_LABEL.width() + 1 + SETTINGS_LABEL.width()) as u16;
        let title_width = area.width.saturating_sub(buttons_width + 1);
        let title_area = Rect::new(area.x, area.y, title_width, 1);
        let title = Line::from(Span::styled(
            format!(" {}", view.title),
            Style::default()
                .fg(palette.base_07)
                .add_modifier(Modifier::BOLD),
        ));
        f.render_widget(Paragraph::new(title), title_area);

        let settings_x = area.right().saturating_sub(SETTINGS_LABEL.width() as u16);
        let notes_x = settings_x.saturating_sub(NOTES_LABEL.width() as u16 + 1);
        self.notes_button = Rect::new(notes_x, area.y, NOTES_LABEL.width() as u16, 1);
        self.settings_button = Rect::new(settings_x, area.y, SETTINGS_LABEL.width() as u16, 1);
        let button_style = Style::default().fg(palette.base_0d);
        f.render_widget(
            Paragraph::new(Span::styled(NOTES_LABEL, button_style)),
            self.notes_button.intersection(area),
        );
        f.render_widget(
            Paragraph::new(Span::styled(SETTINGS_LABEL, button_style)),
            self.settings_button.intersection(area),
        );

        if area.height < 2 {
            self.search_box = Rect::default();
            return;
        }
        self.search_box = Rect::new(area.x, area.y + 1, area.width, 1);
        f.render_widget(Paragraph::new(search_line(view, palette)), self.search_box);
    }

    pub fn hit_test(&self, column: u16, row: u16) -> Option<HeaderTarget> {
        let position = ratatui::layout::Position::new(column, row);
        if self.notes_button.contains(position) {
            Some(HeaderTarget::Notes)
        } else if self.settings_button.contains(position) {
            Some(HeaderTarget::Settings)
        } else if self.search_box.contains(position) {
            Some(HeaderTarget::Search)
        } else {
            None
        }
    }
}

fn search_line(view: &HeaderView, palette: &Base16Palette) -> Line<'static> {
    let label_style = Style::default().fg(palette.base_03);
    let mut spans = vec![Span::styled(" / ", label_style)];

    if view.query.is_empty() && !view.search_focused {
        spans.push(Span::styled("Search", label_style));
    } else {
        let query_style = if view.search_focused {
            Style::default()
                .fg(palette.base_06)
                .add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(palette.base_05)
        };
        spans.push(Span::styled(view.query.to_string(), query_style));
        if view.search_focused {
            spans.push(Span::styled("_", Style::default().fg(palette.base_0a)));
        }
    }

    if let Some(info) = &view.match_info {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(info.clone(), Style::default().fg(palette.base_0a)));
    }
    Line::from(spans)
}

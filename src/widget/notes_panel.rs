use chrono::Local;
use log::debug;
use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::notes::{Note, NotesStore};
use crate::signal::{NotesUpdated, Subscription};
use crate::storage::LocalStore;
use crate::theme::Base16Palette;
use crate::widget::centered_rect;

const UNTITLED: &str = "Untitled";
const EMPTY_MESSAGE: &str = "No notes yet";

pub enum NotesAction {
    Close,
    Delete(String),
}

/// Saved quotes, oldest first. Reloads whenever the notes change.
pub struct NotesPanel {
    notes: Vec<Note>,
    list_state: ListState,
    updates: Subscription<NotesUpdated>,
    last_popup_area: Option<Rect>,
}

impl NotesPanel {
    pub fn new(notes_store: &mut NotesStore, store: &LocalStore) -> Self {
        let updates = notes_store.subscribe();
        let mut panel = Self {
            notes: Vec::new(),
            list_state: ListState::default(),
            updates,
            last_popup_area: None,
        };
        panel.reload(notes_store, store);
        panel
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn selected(&self) -> Option<&Note> {
        self.list_state.selected().and_then(|i| self.notes.get(i))
    }

    /// Picks up changes announced since the last call.
    pub fn refresh(&mut self, notes_store: &NotesStore, store: &LocalStore) -> bool {
        match self.updates.latest() {
            Some(update) => {
                debug!("Notes panel reload ({} notes)", update.count);
                self.reload(notes_store, store);
                true
            }
            None => false,
        }
    }

    fn reload(&mut self, notes_store: &NotesStore, store: &LocalStore) {
        self.notes = notes_store.get_notes(store);
        let selected = match self.list_state.selected() {
            _ if self.notes.is_empty() => None,
            Some(i) => Some(i.min(self.notes.len() - 1)),
            None => Some(0),
        };
        self.list_state.select(selected);
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let popup_area = centered_rect(70, 80, area);
        self.last_popup_area = Some(popup_area);
        f.render_widget(Clear, popup_area);

        let (text, border, background) = palette.get_panel_colors(true);
        let block = Block::default()
            .title(format!(" Notes ({}) ", self.notes.len()))
            .title_bottom(Line::from(" j/k move  d delete  Esc close ").right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(background));

        if self.notes.is_empty() {
            f.render_widget(
                Paragraph::new(Line::styled(
                    EMPTY_MESSAGE,
                    Style::default().fg(palette.base_03),
                ))
                .centered()
                .block(block),
                popup_area,
            );
            return;
        }

        let quote_width = popup_area.width.saturating_sub(6).max(10) as usize;
        let items: Vec<ListItem> = self
            .notes
            .iter()
            .map(|note| ListItem::new(note_lines(note, quote_width, text, palette)))
            .collect();

        let (selection_bg, selection_fg) = palette.get_selection_colors();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(selection_bg).fg(selection_fg));
        f.render_stateful_widget(list, popup_area, &mut self.list_state);
    }

    pub fn is_outside_popup_area(&self, x: u16, y: u16) -> bool {
        self.last_popup_area
            .is_none_or(|area| !area.contains(Position::new(x, y)))
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<NotesAction> {
        use crossterm::event::KeyCode;

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.select_next();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.select_previous();
                None
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                self.selected().map(|note| NotesAction::Delete(note.id.clone()))
            }
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('q') => Some(NotesAction::Close),
            _ => None,
        }
    }

    fn select_next(&mut self) {
        if self.notes.is_empty() {
            return;
        }
        let next = match self.list_state.selected() {
            Some(i) if i + 1 < self.notes.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.list_state.select(Some(next));
    }

    fn select_previous(&mut self) {
        if self.notes.is_empty() {
            return;
        }
        let previous = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.list_state.select(Some(previous));
    }
}

fn note_lines(
    note: &Note,
    quote_width: usize,
    text: ratatui::style::Color,
    palette: &Base16Palette,
) -> Vec<Line<'static>> {
    let title = if note.book_title.is_empty() {
        UNTITLED.to_string()
    } else {
        note.book_title.clone()
    };
    let mut heading = vec![Span::styled(
        title,
        Style::default().fg(text).add_modifier(Modifier::BOLD),
    )];
    if !note.author.is_empty() {
        heading.push(Span::styled(
            format!(" — {}", note.author),
            Style::default().fg(palette.base_04),
        ));
    }

    let created = note
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string();

    let mut lines = vec![
        Line::from(heading),
        Line::styled(created, Style::default().fg(palette.base_03)),
    ];
    let quote_style = Style::default()
        .fg(palette.base_05)
        .add_modifier(Modifier::ITALIC);
    lines.extend(
        textwrap::wrap(&note.text, quote_width)
            .into_iter()
            .map(|line| Line::styled(format!("  {line}"), quote_style)),
    );
    lines.push(Line::default());
    lines
}

use crate::theme::{Base16Palette, FontSize, Theme, ThemePrefs};
use crate::widget::centered_rect;
use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

pub enum SettingsAction {
    Close,
    SettingsChanged(ThemePrefs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsRow {
    FontSize,
    Theme,
}

impl SettingsRow {
    fn toggle(self) -> Self {
        match self {
            SettingsRow::FontSize => SettingsRow::Theme,
            SettingsRow::Theme => SettingsRow::FontSize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Choice {
    FontSize(FontSize),
    Theme(Theme),
}

/// Font size and theme. Every change applies at once; the caller persists.
pub struct SettingsPopup {
    prefs: ThemePrefs,
    selected_row: SettingsRow,
    choice_areas: Vec<(Rect, Choice)>,
    last_popup_area: Option<Rect>,
}

impl SettingsPopup {
    pub fn new(prefs: ThemePrefs) -> Self {
        SettingsPopup {
            prefs,
            selected_row: SettingsRow::FontSize,
            choice_areas: Vec::new(),
            last_popup_area: None,
        }
    }

    pub fn prefs(&self) -> ThemePrefs {
        self.prefs
    }

    pub fn selected_row(&self) -> SettingsRow {
        self.selected_row
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let palette = self.prefs.palette();
        let popup_area = centered_rect(50, 40, area);
        self.last_popup_area = Some(popup_area);
        self.choice_areas.clear();

        f.render_widget(Clear, popup_area);

        let (_, border, background) = palette.get_panel_colors(true);
        let block = Block::default()
            .title(" Settings ")
            .title_bottom(Line::from(" j/k row  h/l change  Esc close ").right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(background));

        let inner = block.inner(popup_area);
        f.render_widget(block, popup_area);

        let padded = Rect {
            x: inner.x + 2,
            y: inner.y + 1,
            width: inner.width.saturating_sub(4),
            height: inner.height.saturating_sub(2),
        };

        let font_choices: Vec<(String, Choice, bool)> = FontSize::all()
            .iter()
            .map(|size| {
                (
                    capitalize(size.as_str()),
                    Choice::FontSize(*size),
                    *size == self.prefs.font_size,
                )
            })
            .collect();
        let theme_choices: Vec<(String, Choice, bool)> = Theme::all()
            .iter()
            .map(|theme| {
                (
                    capitalize(theme.as_str()),
                    Choice::Theme(*theme),
                    *theme == self.prefs.theme,
                )
            })
            .collect();

        let rows = [
            (SettingsRow::FontSize, "Font size", font_choices),
            (SettingsRow::Theme, "Theme", theme_choices),
        ];
        for (index, (row, title, choices)) in rows.into_iter().enumerate() {
            let y = padded.y + index as u16 * 3;
            if y + 1 >= padded.bottom() {
                break;
            }
            self.render_section_header(
                f,
                Rect::new(padded.x, y, padded.width, 1),
                title,
                palette,
                self.selected_row == row,
            );
            self.render_choices(f, Rect::new(padded.x + 2, y + 1, padded.width.saturating_sub(2), 1), &choices, palette);
        }
    }

    fn render_section_header(
        &self,
        f: &mut Frame,
        area: Rect,
        title: &str,
        palette: &Base16Palette,
        is_selected: bool,
    ) {
        let prefix = if is_selected { "» " } else { "▸ " };
        let prefix_style = if is_selected {
            Style::default()
                .fg(palette.base_0a)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.base_0d)
        };
        let line = Line::from(vec![
            Span::styled(prefix, prefix_style),
            Span::styled(title.to_string(), Style::default().fg(palette.base_06)),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }

    fn render_choices(
        &mut self,
        f: &mut Frame,
        area: Rect,
        choices: &[(String, Choice, bool)],
        palette: &Base16Palette,
    ) {
        let mut x = area.x;
        for (label, choice, is_current) in choices {
            let radio = if *is_current { "●" } else { "○" };
            let text = format!("{radio} {label}");
            let width = text.chars().count() as u16;
            if x + width > area.right() {
                break;
            }
            let style = if *is_current {
                Style::default()
                    .fg(palette.base_06)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.base_04)
            };
            let choice_area = Rect::new(x, area.y, width, 1);
            f.render_widget(Paragraph::new(Span::styled(text, style)), choice_area);
            self.choice_areas.push((choice_area, *choice));
            x += width + 3;
        }
    }

    fn apply(&mut self, choice: Choice) -> Option<SettingsAction> {
        let before = self.prefs;
        match choice {
            Choice::FontSize(size) => self.prefs.font_size = size,
            Choice::Theme(theme) => self.prefs.theme = theme,
        }
        (self.prefs != before).then_some(SettingsAction::SettingsChanged(self.prefs))
    }

    fn step(&mut self, forward: bool) -> Option<SettingsAction> {
        let choice = match self.selected_row {
            SettingsRow::FontSize => {
                Choice::FontSize(cycle(FontSize::all(), self.prefs.font_size, forward))
            }
            SettingsRow::Theme => Choice::Theme(cycle(Theme::all(), self.prefs.theme, forward)),
        };
        self.apply(choice)
    }

    pub fn is_outside_popup_area(&self, x: u16, y: u16) -> bool {
        self.last_popup_area
            .is_none_or(|area| !area.contains(Position::new(x, y)))
    }

    /// Clicking a choice selects it, clicking outside closes.
    pub fn handle_mouse_click(&mut self, x: u16, y: u16) -> Option<SettingsAction> {
        if self.is_outside_popup_area(x, y) {
            return Some(SettingsAction::Close);
        }
        let choice = self
            .choice_areas
            .iter()
            .find(|(area, _)| area.contains(Position::new(x, y)))
            .map(|(_, choice)| *choice)?;
        self.selected_row = match choice {
            Choice::FontSize(_) => SettingsRow::FontSize,
            Choice::Theme(_) => SettingsRow::Theme,
        };
        self.apply(choice)
    }

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<SettingsAction> {
        use crossterm::event::KeyCode;

        match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Char('k') | KeyCode::Up | KeyCode::Tab => {
                self.selected_row = self.selected_row.toggle();
                None
            }
            KeyCode::Char('h') | KeyCode::Left => self.step(false),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter | KeyCode::Char(' ') => {
                self.step(true)
            }
            KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('q') => Some(SettingsAction::Close),
            _ => None,
        }
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T, forward: bool) -> T {
    let index = all.iter().position(|v| *v == current).unwrap_or(0);
    let next = if forward {
        (index + 1) % all.len()
    } else {
        (index + all.len() - 1) % all.len()
    };
    all[next]
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_source::{KeyCode, KeyModifiers, SimulatedEventSource};
    use crate::event_source::Event;
    use ratatui::{Terminal, backend::TestBackend};

    fn key(code: KeyCode) -> crossterm::event::KeyEvent {
        match SimulatedEventSource::key_event(code, KeyModifiers::empty()) {
            Event::Key(key) => key,
            _ => unreachable!(),
        }
    }

    fn changed(action: Option<SettingsAction>) -> Option<ThemePrefs> {
        match action {
            Some(SettingsAction::SettingsChanged(prefs)) => Some(prefs),
            _ => None,
        }
    }

    #[test]
    fn arrows_cycle_the_selected_row() {
        let mut popup = SettingsPopup::new(ThemePrefs::default());
        let prefs = changed(popup.handle_key(key(KeyCode::Right))).unwrap();
        assert_eq!(prefs.font_size, FontSize::Large);

        popup.handle_key(key(KeyCode::Char('j')));
        assert_eq!(popup.selected_row(), SettingsRow::Theme);
        let prefs = changed(popup.handle_key(key(KeyCode::Left))).unwrap();
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(prefs.font_size, FontSize::Large);
    }

    #[test]
    fn escape_closes() {
        let mut popup = SettingsPopup::new(ThemePrefs::default());
        assert!(matches!(
            popup.handle_key(key(KeyCode::Esc)),
            Some(SettingsAction::Close)
        ));
    }

    #[test]
    fn clicks_pick_choices_and_outside_closes() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut popup = SettingsPopup::new(ThemePrefs::default());
        terminal.draw(|f| popup.render(f, f.area())).unwrap();

        let (area, _) = popup
            .choice_areas
            .iter()
            .copied()
            .find(|(_, choice)| *choice == Choice::Theme(Theme::Light))
            .unwrap();
        let prefs = changed(popup.handle_mouse_click(area.x, area.y)).unwrap();
        assert_eq!(prefs.theme, Theme::Light);
        assert_eq!(popup.selected_row(), SettingsRow::Theme);

        assert!(matches!(
            popup.handle_mouse_click(0, 0),
            Some(SettingsAction::Close)
        ));
    }
}

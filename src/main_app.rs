use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, info};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::Style,
    widgets::{Block, Paragraph},
};

use crate::api::PageSource;
use crate::clipboard::FallbackClipboard;
use crate::content::TextPoint;
use crate::event_source::EventSource;
use crate::fetcher::{FetchCompletion, PageFetcher};
use crate::gesture::{GestureOutcome, SwipeRecognizer, SwipeThresholds, TouchPoint};
use crate::layout::PageLayout;
use crate::location::ReaderUrl;
use crate::navigation::Navigator;
use crate::notes::NotesStore;
use crate::reader::{ApplyOutcome, BookReader, LoadState};
use crate::search::SearchController;
use crate::selection::{SelectionController, SurfaceView};
use crate::settings::{DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH};
use crate::signal::{ContentUpdated, Subscription};
use crate::storage::LocalStore;
use crate::theme::{FontSize, ThemePrefs};
use crate::widget::footer::{Footer, FooterTarget};
use crate::widget::header::{Header, HeaderTarget, HeaderView};
use crate::widget::hud_message::HudMessage;
use crate::widget::notes_panel::{NotesAction, NotesPanel};
use crate::widget::page_view::{LOADING_TEXT, PageView, render_status};
use crate::widget::settings_popup::{SettingsAction, SettingsPopup};
use crate::widget::tooltip::{TooltipAction, TooltipWidget};

const HEADER_HEIGHT: u16 = 2;
const FOOTER_HEIGHT: u16 = 1;
const WHEEL_STEP: isize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    Main,
    Popup(PopupWindow),
}

#[derive(PartialEq, Debug, Clone, Copy, Eq)]
pub enum PopupWindow {
    Settings,
    Notes,
}

/// Reading column centred in the page area, sized by the font size.
pub fn column_rect(page: Rect, font_size: FontSize) -> Rect {
    let available = page.width.saturating_sub(2);
    let width = font_size.column_width(available).min(page.width);
    let x = page.x + (page.width - width) / 2;
    Rect::new(x, page.y, width, page.height)
}

pub struct App {
    store: LocalStore,
    navigator: Navigator,
    reader: BookReader,
    content_updates: Subscription<ContentUpdated>,
    fetcher: PageFetcher,
    search: SearchController,
    selection: SelectionController,
    swipe: SwipeRecognizer,
    notes: NotesStore,
    prefs: ThemePrefs,
    clipboard: FallbackClipboard,
    pub focused_panel: FocusedPanel,
    settings_popup: Option<SettingsPopup>,
    notes_panel: Option<NotesPanel>,
    hud: Option<HudMessage>,
    header: Header,
    footer: Footer,
    tooltip: TooltipWidget,
    layout: PageLayout,
    scroll: usize,
    page_area: Rect,
    column_area: Rect,
    cell_size: (f32, f32),
}

impl App {
    /// Builds the reader for `url` and starts loading its page.
    pub fn new(
        url: ReaderUrl,
        store: LocalStore,
        source: Arc<dyn PageSource>,
        clipboard: FallbackClipboard,
    ) -> Self {
        let navigator = Navigator::new(url, &store);
        let mut reader = BookReader::new(navigator.url_title());
        let content_updates = reader.subscribe_content();
        let prefs = ThemePrefs::load(&store);

        let mut app = Self {
            store,
            navigator,
            reader,
            content_updates,
            fetcher: PageFetcher::new(source),
            search: SearchController::new(),
            selection: SelectionController::new(),
            swipe: SwipeRecognizer::new(SwipeThresholds::default()),
            notes: NotesStore::new(),
            prefs,
            clipboard,
            focused_panel: FocusedPanel::Main,
            settings_popup: None,
            notes_panel: None,
            hud: None,
            header: Header::new(),
            footer: Footer::new(),
            tooltip: TooltipWidget::new(),
            layout: PageLayout::default(),
            scroll: 0,
            page_area: Rect::default(),
            column_area: Rect::default(),
            cell_size: (DEFAULT_CELL_WIDTH, DEFAULT_CELL_HEIGHT),
        };
        app.load_current_page();
        app
    }

    /// Pixel size of one cell, for swipe distances.
    pub fn with_cell_size(mut self, width: f32, height: f32) -> Self {
        self.cell_size = (width.max(1.0), height.max(1.0));
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn reader(&self) -> &BookReader {
        &self.reader
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    pub fn prefs(&self) -> ThemePrefs {
        self.prefs
    }

    pub fn hud_message(&self) -> Option<&HudMessage> {
        self.hud.as_ref()
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn column_area(&self) -> Rect {
        self.column_area
    }

    pub fn page_area(&self) -> Rect {
        self.page_area
    }

    pub fn has_active_popup(&self) -> bool {
        matches!(self.focused_panel, FocusedPanel::Popup(_))
    }

    // Page loading

    pub fn load_current_page(&mut self) {
        self.selection.on_content_updated();
        self.tooltip.clear();
        self.scroll = 0;
        self.reader.set_url_title(self.navigator.url_title());

        let Some(path) = self.navigator.book_path() else {
            self.fetcher.cancel();
            self.reader.fail_missing_path();
            return;
        };
        let ticket = self.fetcher.request(&path, self.navigator.current_page());
        self.reader.begin_load(&ticket);
    }

    /// Moves to `page` when it is inside `[1, total]`.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.navigator.total_pages() {
            return false;
        }
        self.navigator.set_page(page, &mut self.store);
        self.load_current_page();
        true
    }

    pub fn next_page(&mut self) -> bool {
        if !self.navigator.next_page(&mut self.store) {
            return false;
        }
        self.load_current_page();
        true
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.navigator.previous_page(&mut self.store) {
            return false;
        }
        self.load_current_page();
        true
    }

    pub fn history_back(&mut self) -> bool {
        if !self.navigator.history_back(&mut self.store) {
            return false;
        }
        self.load_current_page();
        true
    }

    pub fn history_forward(&mut self) -> bool {
        if !self.navigator.history_forward(&mut self.store) {
            return false;
        }
        self.load_current_page();
        true
    }

    /// Applies every finished fetch. Returns true when something arrived.
    pub fn poll_fetches(&mut self) -> bool {
        let completions = self.fetcher.poll();
        let arrived = !completions.is_empty();
        for completion in completions {
            self.apply_completion(completion);
        }
        arrived
    }

    /// Blocks until the current page leaves the loading state or `timeout`
    /// passes. Returns whether it finished.
    pub fn wait_for_pending_load(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.reader.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.fetcher.completions().recv_timeout(remaining) {
                Ok(completion) => self.apply_completion(completion),
                Err(_) => return false,
            }
        }
        true
    }

    fn apply_completion(&mut self, completion: FetchCompletion) {
        match self.reader.apply(completion) {
            ApplyOutcome::Stale => return,
            ApplyOutcome::Applied { total: Some(total) } => {
                self.navigator.set_total_pages(total);
            }
            ApplyOutcome::Applied { total: None } => {}
        }
        if self.content_updates.latest().is_some() {
            self.on_content_updated();
        }
    }

    fn on_content_updated(&mut self) {
        self.selection.on_content_updated();
        self.tooltip.clear();
        self.scroll = 0;
        self.search.on_content_updated(self.reader.surface_mut());
        self.scroll_to_current_match();
    }

    // Layout

    fn relayout(&mut self) {
        self.layout = if matches!(self.reader.state(), LoadState::Ready) && self.column_area.width > 0
        {
            PageLayout::build(self.reader.surface(), self.column_area.width)
        } else {
            PageLayout::default()
        };
    }

    fn max_scroll(&self) -> usize {
        self.layout
            .len()
            .saturating_sub(self.column_area.height as usize)
    }

    fn scroll_by(&mut self, delta: isize) {
        let target = self.scroll.saturating_add_signed(delta).min(self.max_scroll());
        if target == self.scroll {
            return;
        }
        self.scroll = target;
        self.selection.on_scroll();
        if self.selection.has_active_selection() && self.selection.tooltip().is_some() {
            let view = SurfaceView {
                surface: self.reader.surface(),
                layout: &self.layout,
                container: self.page_area,
                column: self.column_area,
                scroll: self.scroll,
            };
            self.selection.show(&view);
        }
        if self.selection.tooltip().is_none() {
            self.tooltip.clear();
        }
    }

    fn scroll_to_current_match(&mut self) {
        self.relayout();
        let Some(current) = self.search.current_match() else {
            return;
        };
        let Some(line) = self
            .layout
            .line_of(TextPoint::new(current.block, current.offset))
        else {
            return;
        };
        let height = self.column_area.height.max(1) as usize;
        if line < self.scroll || line >= self.scroll + height {
            self.scroll = line.saturating_sub(height / 3).min(self.max_scroll());
            debug!("Scrolled to match on line {line}");
        }
    }

    fn text_point_at(&self, column: u16, row: u16) -> Option<TextPoint> {
        if !self.page_area.contains(Position::new(column, row)) || row < self.column_area.y {
            return None;
        }
        let col = column.saturating_sub(self.column_area.x);
        let line = self.scroll + (row - self.column_area.y) as usize;
        self.layout.hit_test(col, line)
    }

    fn touch_point(&self, column: u16, row: u16) -> TouchPoint {
        TouchPoint::new(
            column as f32 * self.cell_size.0,
            row as f32 * self.cell_size.1,
        )
    }

    fn scroll_px(&self) -> f32 {
        self.scroll as f32 * self.cell_size.1
    }

    // Selection actions

    fn copy_selection(&mut self) {
        let copied = self.selection.copy(&mut self.clipboard);
        self.tooltip.clear();
        self.hud = Some(if copied {
            HudMessage::info("Copied")
        } else {
            HudMessage::error("Copy failed")
        });
    }

    fn save_selection_note(&mut self) {
        let title = self.reader.note_title();
        let author = self.reader.author().to_string();
        let saved = self
            .selection
            .bookmark(&mut self.notes, &mut self.store, &title, &author);
        self.tooltip.clear();
        if saved.is_some() {
            self.hud = Some(HudMessage::info("Saved to notes"));
        }
    }

    // Popups

    pub fn open_settings(&mut self) {
        self.settings_popup = Some(SettingsPopup::new(self.prefs));
        self.focused_panel = FocusedPanel::Popup(PopupWindow::Settings);
    }

    pub fn open_notes(&mut self) {
        self.notes_panel = Some(NotesPanel::new(&mut self.notes, &self.store));
        self.focused_panel = FocusedPanel::Popup(PopupWindow::Notes);
    }

    fn close_popup(&mut self) {
        self.settings_popup = None;
        self.notes_panel = None;
        self.focused_panel = FocusedPanel::Main;
    }

    fn apply_settings_action(&mut self, action: SettingsAction) {
        match action {
            SettingsAction::Close => self.close_popup(),
            SettingsAction::SettingsChanged(prefs) => {
                info!(
                    "Appearance: theme {}, font size {}",
                    prefs.theme.as_str(),
                    prefs.font_size.as_str()
                );
                self.prefs = prefs;
                prefs.save(&mut self.store);
                self.selection.hide();
                self.tooltip.clear();
            }
        }
    }

    fn apply_notes_action(&mut self, action: NotesAction) {
        match action {
            NotesAction::Close => self.close_popup(),
            NotesAction::Delete(id) => {
                if self.notes.delete_note(&mut self.store, &id) {
                    self.hud = Some(HudMessage::info("Note deleted"));
                }
                if let Some(panel) = self.notes_panel.as_mut() {
                    panel.refresh(&self.notes, &self.store);
                }
            }
        }
    }

    // Input

    pub fn handle_event(&mut self, event: Event) -> Option<AppAction> {
        match event {
            Event::Key(key) => self.handle_key_event(key),
            Event::Mouse(mouse) => {
                match mouse.kind {
                    MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => {}
                    _ => self.handle_mouse_event(mouse),
                }
                None
            }
            Event::Resize(_, _) => {
                self.handle_resize();
                None
            }
            _ => None,
        }
    }

    pub fn handle_resize(&mut self) {
        self.selection.hide();
        self.tooltip.clear();
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Some(AppAction::Quit);
        }

        match self.focused_panel {
            FocusedPanel::Popup(PopupWindow::Settings) => {
                if let Some(action) = self
                    .settings_popup
                    .as_mut()
                    .and_then(|popup| popup.handle_key(key))
                {
                    self.apply_settings_action(action);
                }
                return None;
            }
            FocusedPanel::Popup(PopupWindow::Notes) => {
                if let Some(action) = self
                    .notes_panel
                    .as_mut()
                    .and_then(|panel| panel.handle_key(key))
                {
                    self.apply_notes_action(action);
                }
                return None;
            }
            FocusedPanel::Main => {}
        }

        if self.search.is_input_active() {
            self.handle_search_input(key);
            return None;
        }

        if self.selection.tooltip().is_some() {
            match key.code {
                KeyCode::Char('c') => {
                    self.copy_selection();
                    return None;
                }
                KeyCode::Char('n') => {
                    self.save_selection_note();
                    return None;
                }
                _ => {}
            }
        }

        let half_page = (self.column_area.height / 2).max(1) as isize;
        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Esc => self.handle_escape(),
            KeyCode::Char('/') => self.search.start_input(),
            KeyCode::Char('n') => self.jump_to_match(true),
            KeyCode::Char('N') => self.jump_to_match(false),
            KeyCode::Char('h') | KeyCode::Left => {
                self.previous_page();
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.next_page();
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::Char('d') if ctrl => self.scroll_by(half_page),
            KeyCode::Char('u') if ctrl => self.scroll_by(-half_page),
            KeyCode::Char('o') if ctrl => {
                self.history_back();
            }
            KeyCode::Char('i') if ctrl => {
                self.history_forward();
            }
            KeyCode::Tab => {
                self.history_forward();
            }
            KeyCode::Char('b') => self.open_notes(),
            KeyCode::Char('s') => self.open_settings(),
            KeyCode::Char('r') => self.load_current_page(),
            _ => {}
        }
        None
    }

    fn handle_search_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.search.clear(self.reader.surface_mut()),
            KeyCode::Enter => self.search.confirm(),
            KeyCode::Backspace => {
                self.search.pop_char(self.reader.surface_mut());
                self.scroll_to_current_match();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.search.push_char(c, self.reader.surface_mut());
                self.scroll_to_current_match();
            }
            _ => {}
        }
    }

    fn handle_escape(&mut self) {
        if self.swipe.is_armed() {
            let outcome = self.swipe.touch_cancel();
            self.apply_gesture(outcome, Instant::now());
        } else if self.selection.tooltip().is_some() || self.selection.selection().is_some() {
            self.selection.hide();
            self.selection.clear_selection();
            self.tooltip.clear();
        } else if !self.search.query().is_empty() {
            self.search.clear(self.reader.surface_mut());
        }
    }

    fn jump_to_match(&mut self, forward: bool) {
        let found = if forward {
            self.search.next_match()
        } else {
            self.search.previous_match()
        };
        if found.is_some() {
            self.scroll_to_current_match();
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        let now = Instant::now();
        let (x, y) = (mouse.column, mouse.row);

        match self.focused_panel {
            FocusedPanel::Popup(PopupWindow::Settings) => {
                if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
                    if let Some(action) = self
                        .settings_popup
                        .as_mut()
                        .and_then(|popup| popup.handle_mouse_click(x, y))
                    {
                        self.apply_settings_action(action);
                    }
                }
                return;
            }
            FocusedPanel::Popup(PopupWindow::Notes) => {
                if mouse.kind == MouseEventKind::Down(MouseButton::Left)
                    && self
                        .notes_panel
                        .as_ref()
                        .is_none_or(|panel| panel.is_outside_popup_area(x, y))
                {
                    self.close_popup();
                }
                return;
            }
            FocusedPanel::Main => {}
        }

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.handle_left_down(x, y),
            MouseEventKind::Drag(MouseButton::Left) => {
                let point = self.text_point_at(x, y);
                self.selection.pointer_drag(point, now);
                self.swipe.on_selection_changed();
                if self.selection.tooltip().is_none() {
                    self.tooltip.clear();
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.selection.pointer_up(now),
            MouseEventKind::Down(MouseButton::Right) => {
                let point = self.touch_point(x, y);
                let selection_active = self.selection.has_active_selection();
                self.swipe
                    .touch_start(point, now, self.scroll_px(), selection_active);
            }
            MouseEventKind::Drag(MouseButton::Right) => {
                let point = self.touch_point(x, y);
                self.swipe.touch_move(point);
            }
            MouseEventKind::Up(MouseButton::Right) => self.handle_touch_end(now),
            MouseEventKind::ScrollDown => self.scroll_by(WHEEL_STEP),
            MouseEventKind::ScrollUp => self.scroll_by(-WHEEL_STEP),
            _ => {}
        }
    }

    fn handle_left_down(&mut self, x: u16, y: u16) {
        if let Some(action) = self.tooltip.hit_test(x, y) {
            match action {
                TooltipAction::Copy => self.copy_selection(),
                TooltipAction::Note => self.save_selection_note(),
            }
            return;
        }
        if self.tooltip.contains(x, y) {
            return;
        }
        if let Some(target) = self.header.hit_test(x, y) {
            match target {
                HeaderTarget::Notes => self.open_notes(),
                HeaderTarget::Settings => self.open_settings(),
                HeaderTarget::Search => self.search.start_input(),
            }
            return;
        }
        if let Some(target) = self.footer.hit_test(x, y) {
            match target {
                FooterTarget::Previous => self.previous_page(),
                FooterTarget::Next => self.next_page(),
            };
            return;
        }

        let point = self.text_point_at(x, y);
        self.selection.pointer_down(point);
        self.tooltip.clear();
    }

    fn handle_touch_end(&mut self, now: Instant) {
        let outcome = self.swipe.touch_end(
            now,
            self.scroll_px(),
            self.selection.has_active_selection(),
            self.navigator.current_page(),
            self.navigator.total_pages(),
        );
        debug!("Touch ended: {outcome:?}");
        self.apply_gesture(outcome, now);
    }

    fn apply_gesture(&mut self, outcome: GestureOutcome, now: Instant) {
        match outcome {
            GestureOutcome::NextPage => {
                self.next_page();
            }
            GestureOutcome::PreviousPage => {
                self.previous_page();
            }
            GestureOutcome::Selection => self.selection.on_touch_selection(now),
            GestureOutcome::Tap => self.selection.on_tap(now),
            GestureOutcome::Cancelled => {
                self.selection.hide();
                self.tooltip.clear();
            }
            GestureOutcome::None => {}
        }
    }

    /// Periodic work: fetch results, debounced tooltip, HUD expiry, notes
    /// panel reload. Returns true when a redraw is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.poll_fetches();

        let view = SurfaceView {
            surface: self.reader.surface(),
            layout: &self.layout,
            container: self.page_area,
            column: self.column_area,
            scroll: self.scroll,
        };
        if self.selection.tick(now, &view) {
            changed = true;
        }

        if self.hud.as_ref().is_some_and(|hud| hud.is_expired_at(now)) {
            self.hud = None;
            changed = true;
        }

        if let Some(panel) = self.notes_panel.as_mut() {
            if panel.refresh(&self.notes, &self.store) {
                changed = true;
            }
        }
        changed
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let palette = self.prefs.palette();
        let area = f.area();
        f.render_widget(
            Block::default().style(Style::default().bg(palette.base_00).fg(palette.base_05)),
            area,
        );

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(1),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        let title = self.reader.header_line();
        let match_info = (!self.search.query().is_empty()).then(|| self.search.get_match_info());
        self.header.render(
            f,
            chunks[0],
            palette,
            &HeaderView {
                title: &title,
                query: self.search.query(),
                search_focused: self.search.is_input_active(),
                match_info,
            },
        );

        self.page_area = chunks[1];
        self.column_area = column_rect(chunks[1], self.prefs.font_size);
        self.relayout();
        self.scroll = self.scroll.min(self.max_scroll());

        match self.reader.state() {
            LoadState::Loading => render_status(
                f,
                self.column_area,
                LOADING_TEXT,
                Style::default().fg(palette.base_04),
            ),
            LoadState::Failed(e) => render_status(
                f,
                self.column_area,
                &e.to_string(),
                Style::default().fg(palette.base_08),
            ),
            LoadState::Ready => {
                let selection = self
                    .selection
                    .selection()
                    .filter(|s| !s.is_collapsed())
                    .and_then(|s| s.range());
                PageView {
                    layout: &self.layout,
                    scroll: self.scroll,
                    palette,
                    selection,
                    current_match: self.search.current_match_index(),
                }
                .render(f.buffer_mut(), self.column_area);
            }
        }

        match self.selection.tooltip().map(|t| t.placement) {
            Some(placement) => self.tooltip.render(f, placement, self.page_area, palette),
            None => self.tooltip.clear(),
        }

        self.footer.render(
            f,
            chunks[2],
            palette,
            self.navigator.current_page(),
            self.navigator.total_pages(),
        );

        if let Some(hud) = &self.hud {
            if self.page_area.height > 0 {
                let hud_area = Rect::new(
                    self.page_area.x,
                    self.page_area.bottom() - 1,
                    self.page_area.width,
                    1,
                );
                f.render_widget(Paragraph::new(hud.styled_line(palette)), hud_area);
            }
        }

        if let Some(popup) = self.settings_popup.as_mut() {
            popup.render(f, area);
        }
        if let Some(panel) = self.notes_panel.as_mut() {
            panel.render(f, area, palette);
        }
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    // Hit areas come from the first frame, so draw before reading input.
    terminal.draw(|f| app.draw(f))?;
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;
            if app.handle_event(event) == Some(AppAction::Quit) {
                should_quit = true;
                break;
            }
        }

        let mut needs_redraw = events_processed > 0;

        if last_tick.elapsed() >= tick_rate {
            if app.tick(Instant::now()) {
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }

        if should_quit {
            return Ok(());
        }

        // If no events were processed, wait a bit to avoid busy-waiting
        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout);
        }
    }
}

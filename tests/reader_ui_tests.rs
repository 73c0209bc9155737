use std::sync::Arc;
use std::time::{Duration, Instant};

use folio::clipboard::FallbackClipboard;
use folio::event_source::{KeyCode, KeyModifiers, MouseButton, SimulatedEventSource};
use folio::location::ReaderUrl;
use folio::main_app::{PopupWindow, run_app_with_event_source};
use folio::storage::LocalStore;
use folio::test_utils::test_helpers::*;
use folio::theme::{DARK_PALETTE, FONT_SIZE_KEY, FontSize, THEME_KEY, Theme, ThemePrefs};
use folio::{App, FocusedPanel};
use ratatui::Terminal;
use ratatui::backend::TestBackend;

fn open_book(source: &FakePageSource, clipboard: FallbackClipboard) -> App {
    let url = ReaderUrl::from_params(Some("books/test.epub"), Some("Test_Book"), None);
    App::new(url, LocalStore::ephemeral(), Arc::new(source.clone()), clipboard)
}

fn loaded_app(source: &FakePageSource) -> (App, RecordingClipboard, Terminal<TestBackend>) {
    let (clipboard, recorder) = recording_clipboard();
    let mut app = open_book(source, clipboard);
    wait_for_page(&mut app);
    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    (app, recorder, terminal)
}

fn feed(app: &mut App, scenario: TestScenarioBuilder) {
    for event in scenario.events() {
        app.handle_event(event.clone());
    }
}

/// Drags across the first line of the page and lets the tooltip settle.
fn select_first_line(app: &mut App, terminal: &mut Terminal<TestBackend>) {
    let column = app.column_area();
    feed(
        app,
        TestScenarioBuilder::new().select((column.x, column.y), (column.x + 30, column.y)),
    );
    app.tick(Instant::now() + Duration::from_millis(300));
    terminal.draw(|f| app.draw(f)).unwrap();
}

#[test]
fn test_selection_shows_tooltip_and_copies() {
    let source = FakePageSource::numbered(3);
    let (mut app, recorder, mut terminal) = loaded_app(&source);

    select_first_line(&mut app, &mut terminal);
    let tooltip = app.selection().tooltip().cloned().expect("tooltip after selecting");
    assert_eq!(tooltip.text, "Page 1 text");
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Copy"), "{screen}");
    assert!(screen.contains("Note"), "{screen}");

    app.handle_event(SimulatedEventSource::char_key('c'));
    assert_eq!(recorder.texts(), vec!["Page 1 text".to_string()]);
    assert!(app.selection().tooltip().is_none());
    assert!(app.selection().selection().is_none());
    assert_eq!(app.hud_message().map(|hud| hud.message.as_str()), Some("Copied"));
}

#[test]
fn test_cancelled_touch_hides_tooltip() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, mut terminal) = loaded_app(&source);

    let column = app.column_area();
    app.handle_event(SimulatedEventSource::mouse_down(
        MouseButton::Right,
        column.x + 20,
        column.y + 2,
    ));
    select_first_line(&mut app, &mut terminal);
    assert!(app.selection().tooltip().is_some());

    app.handle_event(SimulatedEventSource::key_event(
        KeyCode::Esc,
        KeyModifiers::empty(),
    ));
    assert!(app.selection().tooltip().is_none());

    app.tick(Instant::now() + Duration::from_millis(300));
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(app.selection().tooltip().is_none());
    assert!(!capture_terminal_state(&terminal).contains("Copy"));
}

#[test]
fn test_single_click_shows_no_tooltip() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, mut terminal) = loaded_app(&source);

    let column = app.column_area();
    feed(&mut app, TestScenarioBuilder::new().click(column.x + 2, column.y));
    app.tick(Instant::now() + Duration::from_millis(300));
    terminal.draw(|f| app.draw(f)).unwrap();

    assert!(app.selection().tooltip().is_none());
    assert!(!app.selection().has_active_selection());
}

#[test]
fn test_note_saved_from_selection_and_deleted_in_panel() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, mut terminal) = loaded_app(&source);

    select_first_line(&mut app, &mut terminal);
    app.handle_event(SimulatedEventSource::char_key('n'));

    let notes = app.notes().get_notes(app.store());
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].text, "Page 1 text");
    assert_eq!(notes[0].book_title, "Test Book");
    assert_eq!(notes[0].author, "Tester");
    assert!(app.selection().tooltip().is_none());

    app.handle_event(SimulatedEventSource::char_key('b'));
    assert_eq!(app.focused_panel, FocusedPanel::Popup(PopupWindow::Notes));
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Notes (1)"), "{screen}");
    assert!(screen.contains("Page 1 text"), "{screen}");

    app.handle_event(SimulatedEventSource::char_key('d'));
    assert!(app.notes().get_notes(app.store()).is_empty());
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(capture_terminal_state(&terminal).contains("No notes yet"));

    app.handle_event(SimulatedEventSource::key_event(
        KeyCode::Esc,
        KeyModifiers::empty(),
    ));
    assert_eq!(app.focused_panel, FocusedPanel::Main);
}

#[test]
fn test_tooltip_note_button_saves_note() {
    let source = FakePageSource::numbered(3);
    let (mut app, recorder, mut terminal) = loaded_app(&source);

    select_first_line(&mut app, &mut terminal);
    let placement = app
        .selection()
        .tooltip()
        .map(|t| t.placement)
        .expect("tooltip after selecting");
    let area = folio::widget::tooltip::TooltipWidget::area_for(placement, app.page_area());

    // Right half of the tooltip is the Note button.
    feed(
        &mut app,
        TestScenarioBuilder::new().click(area.x + area.width - 3, area.y + 1),
    );

    assert_eq!(app.notes().get_notes(app.store()).len(), 1);
    assert!(recorder.texts().is_empty());
}

#[test]
fn test_header_button_opens_notes_panel() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, mut terminal) = loaded_app(&source);

    let mut events = TestScenarioBuilder::new().click(45, 0).quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.focused_panel, FocusedPanel::Popup(PopupWindow::Notes));
    assert!(capture_terminal_state(&terminal).contains("Notes (0)"));
}

#[test]
fn test_search_highlights_and_cycles_matches() {
    let source = FakePageSource::new(
        "Whales",
        "Ishmael",
        vec![vec!["<p>The whale and the whale</p>".to_string()]],
    );
    let (mut app, _, mut terminal) = loaded_app(&source);

    feed(&mut app, TestScenarioBuilder::new().search("whale"));
    terminal.draw(|f| app.draw(f)).unwrap();

    assert_eq!(app.search().query(), "whale");
    assert!(!app.search().is_input_active());
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("[1/2]"), "{screen}");

    let column = app.column_area();
    let (current_bg, _) = DARK_PALETTE.get_highlight_colors(true);
    let (other_bg, _) = DARK_PALETTE.get_highlight_colors(false);
    let buffer = terminal.backend().buffer();
    assert_eq!(buffer[(column.x + 4, column.y)].bg, current_bg);
    assert_eq!(buffer[(column.x + 18, column.y)].bg, other_bg);

    app.handle_event(SimulatedEventSource::char_key('n'));
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(capture_terminal_state(&terminal).contains("[2/2]"));
    let buffer = terminal.backend().buffer();
    assert_eq!(buffer[(column.x + 18, column.y)].bg, current_bg);

    app.handle_event(SimulatedEventSource::char_key('N'));
    assert_eq!(app.search().current_match_index(), Some(0));
}

#[test]
fn test_search_reapplies_after_page_change() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, _) = loaded_app(&source);

    feed(&mut app, TestScenarioBuilder::new().search("text"));
    assert_eq!(app.search().get_match_info(), "[1/1]");

    app.next_page();
    wait_for_page(&mut app);
    assert_eq!(app.search().query(), "text");
    assert_eq!(app.search().get_match_info(), "[1/1]");
    assert!(app.reader().surface().blocks()[0].is_highlighted());
}

#[test]
fn test_escape_clears_search() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, _) = loaded_app(&source);

    feed(&mut app, TestScenarioBuilder::new().search("text").press_esc());
    assert_eq!(app.search().query(), "");
    assert!(!app.reader().surface().blocks()[0].is_highlighted());
}

#[test]
fn test_settings_change_is_stored_and_narrows_column() {
    let source = FakePageSource::numbered(3);
    let (mut app, _, mut terminal) = loaded_app(&source);
    let medium_width = app.column_area().width;

    let mut events = TestScenarioBuilder::new()
        .press_char('s')
        // font size: medium -> large
        .press_char('l')
        .press_tab()
        // theme: dark -> light
        .press_char('l')
        .press_esc()
        .quit()
        .build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.focused_panel, FocusedPanel::Main);
    assert_eq!(
        app.prefs(),
        ThemePrefs {
            theme: Theme::Light,
            font_size: FontSize::Large,
        }
    );
    assert_eq!(app.store().get(FONT_SIZE_KEY), Some("large"));
    assert_eq!(app.store().get(THEME_KEY), Some("light"));
    assert!(app.column_area().width < medium_width);
}

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use folio::location::ReaderUrl;
use folio::main_app::run_app_with_event_source;
use folio::navigation::read_persisted_page;
use folio::storage::LocalStore;
use folio::test_utils::test_helpers::*;
use folio::App;
use tempfile::TempDir;

const BOOK_PATH: &str = "books/test.epub";

fn book_url(page: Option<usize>) -> ReaderUrl {
    ReaderUrl::from_params(Some(BOOK_PATH), Some("Test_Book"), page)
}

fn open(url: ReaderUrl, store: LocalStore, source: &FakePageSource) -> App {
    let (clipboard, _) = recording_clipboard();
    App::new(url, store, Arc::new(source.clone()), clipboard)
}

fn wait_for_requests(source: &FakePageSource, count: usize) {
    let deadline = Instant::now() + LOAD_TIMEOUT;
    while source.requests().len() < count {
        assert!(Instant::now() < deadline, "request never reached the source");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_first_page_renders_with_header_and_footer() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);

    assert!(screen.contains("Test Book — Tester"), "{screen}");
    assert!(screen.contains("Page 1 text"), "{screen}");
    assert!(screen.contains("Page 1 of 5"), "{screen}");

    let request = &source.requests()[0];
    assert_eq!((request.path.as_str(), request.from, request.to), (BOOK_PATH, 0, 4));
}

#[test]
fn test_page_turns_persist_across_restarts() {
    let dir = TempDir::new().unwrap();
    let state_file = dir.path().join("state.json");
    let source = FakePageSource::numbered(5);

    let mut app = open(
        book_url(None),
        LocalStore::load_or_ephemeral(Some(&state_file)),
        &source,
    );
    wait_for_page(&mut app);
    assert_eq!(app.navigator().total_pages(), 5);

    let mut terminal = create_test_terminal(60, 20);
    let mut events = TestScenarioBuilder::new()
        .next_page()
        .next_page()
        .quit()
        .build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    wait_for_page(&mut app);

    assert_eq!(app.navigator().current_page(), 3);
    assert_eq!(app.navigator().url().query("page").as_deref(), Some("3"));
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 3 text");

    // The stored position beats the page carried by the URL.
    let store = LocalStore::load_or_ephemeral(Some(&state_file));
    assert_eq!(read_persisted_page(&store, BOOK_PATH), Some(3));
    let reopened = open(book_url(Some(1)), store, &source);
    assert_eq!(reopened.navigator().current_page(), 3);
}

#[test]
fn test_url_page_used_without_stored_position() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(Some(4)), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    assert_eq!(app.navigator().current_page(), 4);
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 4 text");
}

#[test]
fn test_last_page_does_not_advance() {
    let source = FakePageSource::numbered(2);
    let mut app = open(book_url(Some(2)), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    assert!(!app.next_page());
    assert_eq!(app.navigator().current_page(), 2);
    assert!(app.previous_page());
    wait_for_page(&mut app);
    assert_eq!(app.navigator().current_page(), 1);
    assert!(!app.previous_page());
}

#[test]
fn test_history_back_and_forward() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    app.next_page();
    wait_for_page(&mut app);
    app.next_page();
    wait_for_page(&mut app);
    assert_eq!(app.navigator().current_page(), 3);

    let mut terminal = create_test_terminal(60, 20);
    let mut events = TestScenarioBuilder::new()
        .press_ctrl_char('o')
        .quit()
        .build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    wait_for_page(&mut app);
    assert_eq!(app.navigator().current_page(), 2);
    assert_eq!(
        read_persisted_page(app.store(), BOOK_PATH),
        Some(2),
        "history pops persist the page too"
    );

    let mut events = TestScenarioBuilder::new().press_tab().quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    wait_for_page(&mut app);
    assert_eq!(app.navigator().current_page(), 3);
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 3 text");
}

#[test]
fn test_stale_response_is_discarded() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let gate = source.hold_page(2);
    app.next_page();
    wait_for_requests(&source, 2);
    app.next_page();
    wait_for_page(&mut app);
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 3 text");

    gate.release();
    let deadline = Instant::now() + LOAD_TIMEOUT;
    while !app.poll_fetches() {
        assert!(Instant::now() < deadline, "held response never arrived");
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(app.navigator().current_page(), 3);
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 3 text");
}

#[test]
fn test_loading_text_until_page_arrives() {
    let source = FakePageSource::numbered(3);
    let gate = source.hold_page(1);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);

    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(capture_terminal_state(&terminal).contains("Loading…"));

    gate.release();
    wait_for_page(&mut app);
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);
    assert!(!screen.contains("Loading…"));
    assert!(screen.contains("Page 1 text"));
}

#[test]
fn test_request_failure_is_shown_inline() {
    let source = FakePageSource::numbered(3);
    source.fail_with(503, "down");
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("Request failed 503: down"), "{screen}");
    // Unknown total keeps the default page count.
    assert!(screen.contains("Page 1 of 10"), "{screen}");
}

#[test]
fn test_missing_path_never_fetches() {
    let source = FakePageSource::numbered(3);
    let url = ReaderUrl::from_params(None, Some("Orphan"), None);
    let mut app = open(url, LocalStore::ephemeral(), &source);

    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    let screen = capture_terminal_state(&terminal);

    assert!(screen.contains("No book path given"), "{screen}");
    assert!(screen.contains("Orphan"), "{screen}");
    assert!(source.requests().is_empty());
}

#[test]
fn test_empty_book_is_reported() {
    let source = FakePageSource::new("Empty", "", Vec::new());
    source.set_total(None);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let mut terminal = create_test_terminal(60, 20);
    terminal.draw(|f| app.draw(f)).unwrap();
    assert!(capture_terminal_state(&terminal).contains("Book not found or empty"));
}

#[test]
fn test_left_swipe_turns_to_next_page() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let mut terminal = create_test_terminal(60, 20);
    let mut events = TestScenarioBuilder::new().swipe(10, 40, 20).quit().build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();
    wait_for_page(&mut app);

    assert_eq!(app.navigator().current_page(), 2);
    assert_eq!(app.reader().surface().blocks()[0].plain_text(), "Page 2 text");
}

#[test]
fn test_right_swipe_on_first_page_stays_put() {
    let source = FakePageSource::numbered(5);
    let mut app = open(book_url(None), LocalStore::ephemeral(), &source);
    wait_for_page(&mut app);

    let mut terminal = create_test_terminal(60, 20);
    let mut events = TestScenarioBuilder::new()
        .swipe(10, 20, 40)
        // too short: 3 cells at 8px
        .swipe(10, 30, 27)
        .quit()
        .build();
    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert_eq!(app.navigator().current_page(), 1);
    assert_eq!(source.requests().len(), 1);
}

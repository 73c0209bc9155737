pub mod test_helpers {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::api::{PageContent, PageRequest, PageSource, PageWindow};
    use crate::clipboard::{Clipboard, FallbackClipboard};
    use crate::error::FetchError;
    use crate::event_source::{Event, KeyCode, KeyModifiers, MouseButton, SimulatedEventSource};
    use crate::main_app::App;
    use crate::navigation::window_for_page;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    pub const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self { events: Vec::new() }
        }

        /// Add a character key press
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        /// Add a Ctrl+character key press
        pub fn press_ctrl_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events
                .push(SimulatedEventSource::key_event(code, KeyModifiers::empty()));
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        pub fn press_tab(self) -> Self {
            self.press_key(KeyCode::Tab)
        }

        /// Types `text` one key at a time.
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events.push(SimulatedEventSource::char_key(c));
            }
            self
        }

        /// "/" then the query, then Enter to keep the highlights.
        pub fn search(self, query: &str) -> Self {
            self.press_char('/').type_text(query).press_enter()
        }

        /// Scroll down n rows (press 'j' n times)
        pub fn scroll_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        /// Next page (press 'l')
        pub fn next_page(self) -> Self {
            self.press_char('l')
        }

        /// Previous page (press 'h')
        pub fn prev_page(self) -> Self {
            self.press_char('h')
        }

        pub fn click(mut self, column: u16, row: u16) -> Self {
            self.events.extend(SimulatedEventSource::click(column, row));
            self
        }

        /// Left-button drag from one cell to another, released at the end.
        pub fn select(mut self, from: (u16, u16), to: (u16, u16)) -> Self {
            self.events.push(SimulatedEventSource::mouse_down(
                MouseButton::Left,
                from.0,
                from.1,
            ));
            self.events
                .push(SimulatedEventSource::mouse_drag(MouseButton::Left, to.0, to.1));
            self.events
                .push(SimulatedEventSource::mouse_up(MouseButton::Left, to.0, to.1));
            self
        }

        /// Right-button press, drag and release along one row.
        pub fn swipe(mut self, row: u16, from_column: u16, to_column: u16) -> Self {
            self.events.push(SimulatedEventSource::mouse_down(
                MouseButton::Right,
                from_column,
                row,
            ));
            self.events.push(SimulatedEventSource::mouse_drag(
                MouseButton::Right,
                to_column,
                row,
            ));
            self.events.push(SimulatedEventSource::mouse_up(
                MouseButton::Right,
                to_column,
                row,
            ));
            self
        }

        /// Quit the application (Ctrl+c works from every mode)
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key('c'));
            self
        }

        pub fn events(&self) -> &[Event] {
            &self.events
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// In-memory page service. Pages are 1-based; a request returns the slice
    /// of its window that exists.
    #[derive(Clone)]
    pub struct FakePageSource {
        inner: Arc<FakeInner>,
    }

    struct FakeInner {
        title: Option<String>,
        author: Option<String>,
        total: Mutex<Option<usize>>,
        pages: Vec<PageContent>,
        requests: Mutex<Vec<PageRequest>>,
        held: Mutex<HashMap<usize, flume::Receiver<()>>>,
        failure: Mutex<Option<(u16, String)>>,
    }

    /// Releases a held page request when fired or dropped.
    pub struct PageGate {
        tx: Option<flume::Sender<()>>,
    }

    impl PageGate {
        pub fn release(mut self) {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(());
            }
        }
    }

    impl Drop for PageGate {
        fn drop(&mut self) {
            if let Some(tx) = self.tx.take() {
                let _ = tx.send(());
            }
        }
    }

    impl FakePageSource {
        pub fn new(title: &str, author: &str, pages: Vec<PageContent>) -> Self {
            let total = pages.len();
            Self {
                inner: Arc::new(FakeInner {
                    title: (!title.is_empty()).then(|| title.to_string()),
                    author: (!author.is_empty()).then(|| author.to_string()),
                    total: Mutex::new(Some(total)),
                    pages,
                    requests: Mutex::new(Vec::new()),
                    held: Mutex::new(HashMap::new()),
                    failure: Mutex::new(None),
                }),
            }
        }

        /// `count` pages whose single paragraph reads "Page N text".
        pub fn numbered(count: usize) -> Self {
            let pages = (1..=count)
                .map(|n| vec![format!("<p>Page {n} text</p>")])
                .collect();
            Self::new("Test_Book", "Tester", pages)
        }

        pub fn set_total(&self, total: Option<usize>) {
            if let Ok(mut guard) = self.inner.total.lock() {
                *guard = total;
            }
        }

        pub fn fail_with(&self, status: u16, body: &str) {
            if let Ok(mut guard) = self.inner.failure.lock() {
                *guard = Some((status, body.to_string()));
            }
        }

        /// Requests for `page` block until the returned gate is released.
        pub fn hold_page(&self, page: usize) -> PageGate {
            let (tx, rx) = flume::bounded(1);
            if let Ok(mut held) = self.inner.held.lock() {
                held.insert(window_for_page(page).to, rx);
            }
            PageGate { tx: Some(tx) }
        }

        pub fn requests(&self) -> Vec<PageRequest> {
            self.inner
                .requests
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default()
        }
    }

    impl PageSource for FakePageSource {
        fn fetch_page_window(&self, request: &PageRequest) -> Result<PageWindow, FetchError> {
            if let Ok(mut requests) = self.inner.requests.lock() {
                requests.push(request.clone());
            }

            let gate = self
                .inner
                .held
                .lock()
                .ok()
                .and_then(|mut held| held.remove(&request.to));
            if let Some(gate) = gate {
                let _ = gate.recv_timeout(LOAD_TIMEOUT);
            }

            if let Some((status, body)) = self.inner.failure.lock().ok().and_then(|f| f.clone()) {
                return Err(FetchError::Status { status, body });
            }

            let end = (request.to + 1).min(self.inner.pages.len());
            let pages = if request.from < end {
                self.inner.pages[request.from..end].to_vec()
            } else {
                Vec::new()
            };
            Ok(PageWindow {
                title: self.inner.title.clone(),
                author: self.inner.author.clone(),
                total: self.inner.total.lock().ok().and_then(|t| *t),
                pages,
            })
        }
    }

    /// Clipboard that keeps everything written to it.
    #[derive(Clone, Default)]
    pub struct RecordingClipboard {
        texts: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingClipboard {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn texts(&self) -> Vec<String> {
            self.texts.lock().map(|t| t.clone()).unwrap_or_default()
        }
    }

    impl Clipboard for RecordingClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), String> {
            if self.fail {
                return Err("clipboard unavailable".to_string());
            }
            self.texts
                .lock()
                .map_err(|e| e.to_string())?
                .push(text.to_string());
            Ok(())
        }
    }

    /// Primary records, fallback always fails.
    pub fn recording_clipboard() -> (FallbackClipboard, RecordingClipboard) {
        let recorder = RecordingClipboard::new();
        let clipboard = FallbackClipboard::new(
            Box::new(recorder.clone()),
            Box::new(RecordingClipboard::failing()),
        );
        (clipboard, recorder)
    }

    /// Loads the current page and asserts it finished in time.
    pub fn wait_for_page(app: &mut App) {
        assert!(
            app.wait_for_pending_load(LOAD_TIMEOUT),
            "page did not load in time"
        );
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            // Trim trailing whitespace from each line
            lines.push(line.trim_end().to_string());
        }

        // Remove trailing empty lines
        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::api::{PageRequest, PageSource};

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .search("whale")
            .select((2, 3), (9, 3))
            .swipe(5, 30, 10)
            .quit()
            .build();

        // "/", five letters, Enter, three per drag, three per swipe, quit
        assert_eq!(scenario.len(), 1 + 5 + 1 + 3 + 3 + 1);
    }

    #[test]
    fn fake_source_serves_existing_part_of_window() {
        let source = FakePageSource::numbered(3);
        let window = source
            .fetch_page_window(&PageRequest {
                path: "book.epub".into(),
                from: 0,
                to: 4,
            })
            .unwrap();
        assert_eq!(window.pages.len(), 3);
        assert_eq!(window.total, Some(3));
        assert_eq!(source.requests().len(), 1);
    }

    #[test]
    fn fake_source_reports_failures() {
        let source = FakePageSource::numbered(3);
        source.fail_with(503, "down");
        let err = source
            .fetch_page_window(&PageRequest {
                path: "book.epub".into(),
                from: 0,
                to: 4,
            })
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
    }
}

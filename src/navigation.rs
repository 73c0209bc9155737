//! Reading position: which book, which page, and how that survives reloads.
//!
//! The position lives in three places. The navigator's memory is the source
//! of truth at runtime, the reader URL mirrors it for history navigation,
//! and a per-book store entry (30-day rolling expiry) restores it on the
//! next start.

use chrono::Duration;
use log::{debug, info};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::location::{History, ReaderUrl};
use crate::storage::LocalStore;

pub const SENTINEL_BOOK_ID: &str = "default";
pub const DEFAULT_TOTAL_PAGES: usize = 10;
/// Pages of context requested on each side of the target page.
pub const WINDOW_RADIUS: usize = 4;

const POSITION_KEY_PREFIX: &str = "book_page_";
const POSITION_MAX_AGE_DAYS: i64 = 30;
const HISTORY_LIMIT: usize = 200;

// Same set encodeURIComponent leaves untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingPosition {
    pub book_id: String,
    pub page: usize,
}

/// Index range of one page-window request plus where the target sits in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub from: usize,
    pub to: usize,
    pub offset: usize,
}

pub fn window_for_page(page: usize) -> WindowRange {
    let target = page.saturating_sub(1);
    let from = target.saturating_sub(WINDOW_RADIUS);
    WindowRange {
        from,
        to: target + WINDOW_RADIUS,
        offset: target - from,
    }
}

/// `path`, then `title`, then the sentinel.
pub fn resolve_book_id(url: &ReaderUrl) -> String {
    non_empty(url.query("path"))
        .or_else(|| non_empty(url.query("title")))
        .unwrap_or_else(|| SENTINEL_BOOK_ID.to_string())
}

pub fn position_key(book_id: &str) -> String {
    format!(
        "{POSITION_KEY_PREFIX}{}",
        utf8_percent_encode(book_id, COMPONENT)
    )
}

pub fn read_persisted_page(store: &LocalStore, book_id: &str) -> Option<usize> {
    store.get(&position_key(book_id)).and_then(parse_page)
}

pub fn persist_page(store: &mut LocalStore, book_id: &str, page: usize) {
    let page = page.max(1);
    store.set_with_max_age(
        &position_key(book_id),
        page.to_string(),
        Duration::days(POSITION_MAX_AGE_DAYS),
    );
}

/// Persisted page > URL `page` > 1.
pub fn get_initial_position(url: &ReaderUrl, store: &LocalStore) -> ReadingPosition {
    let book_id = resolve_book_id(url);
    let page = read_persisted_page(store, &book_id)
        .or_else(|| url.query("page").as_deref().and_then(parse_page))
        .unwrap_or(1);
    ReadingPosition { book_id, page }
}

/// Leading-digit parse that only accepts positive values.
pub fn parse_page(value: &str) -> Option<usize> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<usize>().ok().filter(|page| *page > 0)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct Navigator {
    position: ReadingPosition,
    total_pages: usize,
    history: History,
}

impl Navigator {
    pub fn new(url: ReaderUrl, store: &LocalStore) -> Self {
        let position = get_initial_position(&url, store);
        info!(
            "Starting at page {} of book {:?}",
            position.page, position.book_id
        );
        Self {
            position,
            total_pages: DEFAULT_TOTAL_PAGES,
            history: History::new(url, HISTORY_LIMIT),
        }
    }

    pub fn position(&self) -> &ReadingPosition {
        &self.position
    }

    pub fn book_id(&self) -> &str {
        &self.position.book_id
    }

    pub fn current_page(&self) -> usize {
        self.position.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn url(&self) -> &ReaderUrl {
        self.history.current()
    }

    pub fn book_path(&self) -> Option<String> {
        non_empty(self.url().query("path"))
    }

    pub fn url_title(&self) -> Option<String> {
        non_empty(self.url().query("title"))
    }

    pub fn has_next(&self) -> bool {
        self.position.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.position.page > 1
    }

    /// Bounds are the caller's job. Order: memory, URL, store.
    pub fn set_page(&mut self, page: usize, store: &mut LocalStore) {
        let page = page.max(1);
        self.position.page = page;
        let next_url = self.url().with_query("page", &page.to_string());
        self.history.push(next_url);
        persist_page(store, &self.position.book_id, page);
        debug!("Page set to {page}");
    }

    pub fn next_page(&mut self, store: &mut LocalStore) -> bool {
        if !self.has_next() {
            return false;
        }
        self.set_page(self.position.page + 1, store);
        true
    }

    pub fn previous_page(&mut self, store: &mut LocalStore) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.set_page(self.position.page - 1, store);
        true
    }

    /// Current page is left alone even if it now exceeds `total`.
    pub fn set_total_pages(&mut self, total: usize) -> bool {
        if total == 0 || total == self.total_pages {
            return false;
        }
        info!("Total pages: {} -> {total}", self.total_pages);
        self.total_pages = total;
        true
    }

    pub fn history_back(&mut self, store: &mut LocalStore) -> bool {
        if self.history.back().is_none() {
            return false;
        }
        self.on_history_pop(store);
        true
    }

    pub fn history_forward(&mut self, store: &mut LocalStore) -> bool {
        if self.history.forward().is_none() {
            return false;
        }
        self.on_history_pop(store);
        true
    }

    /// Re-resolves the position from the popped URL. Never pushes.
    fn on_history_pop(&mut self, store: &mut LocalStore) {
        let url = self.history.current().clone();
        let book_id = resolve_book_id(&url);
        let page = url
            .query("page")
            .as_deref()
            .and_then(parse_page)
            .or_else(|| read_persisted_page(store, &book_id))
            .unwrap_or(1);
        debug!("History pop to {url} (page {page})");
        self.position = ReadingPosition { book_id, page };
        persist_page(store, &self.position.book_id, page);
    }
}

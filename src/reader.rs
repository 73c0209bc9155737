//! Page loading state for the reading surface.
//!
//! `BookReader` owns the rendered [`PageSurface`]. It is the only place the
//! surface is replaced, and it emits [`ContentUpdated`] right after each swap.

use log::{debug, info, warn};

use crate::content::PageSurface;
use crate::error::ReaderError;
use crate::fetcher::{FetchCompletion, FetchTicket};
use crate::signal::{ContentUpdated, Signal, Subscription};

const FALLBACK_HEADER: &str = "Book";

#[derive(Debug)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(ReaderError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
}

/// What applying a completion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The completion belonged to a superseded request and was dropped.
    Stale,
    /// Applied. Carries the `total` the service reported, if any.
    Applied { total: Option<usize> },
}

pub fn format_book_title(title: &str) -> String {
    title.replace("%20", " ").replace('_', " ")
}

pub struct BookReader {
    state: LoadState,
    meta: BookMeta,
    url_title: Option<String>,
    surface: PageSurface,
    generation: u64,
    content_updated: Signal<ContentUpdated>,
}

impl BookReader {
    pub fn new(url_title: Option<String>) -> Self {
        Self {
            state: LoadState::Loading,
            meta: BookMeta::default(),
            url_title,
            surface: PageSurface::default(),
            generation: 0,
            content_updated: Signal::new(),
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&ReaderError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn meta(&self) -> &BookMeta {
        &self.meta
    }

    pub fn surface(&self) -> &PageSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut PageSurface {
        &mut self.surface
    }

    pub fn subscribe_content(&mut self) -> Subscription<ContentUpdated> {
        self.content_updated.subscribe()
    }

    pub fn set_url_title(&mut self, title: Option<String>) {
        self.url_title = title;
    }

    pub fn display_title(&self) -> String {
        let title = if self.meta.title.is_empty() {
            self.url_title.as_deref().unwrap_or_default()
        } else {
            self.meta.title.as_str()
        };
        format_book_title(title)
    }

    /// Book title stored with a note.
    pub fn note_title(&self) -> String {
        let title = self.display_title();
        if title.is_empty() {
            FALLBACK_HEADER.to_string()
        } else {
            title
        }
    }

    pub fn author(&self) -> &str {
        &self.meta.author
    }

    pub fn header_line(&self) -> String {
        let title = self.display_title();
        match (title.is_empty(), self.meta.author.is_empty()) {
            (false, false) => format!("{title} — {}", self.meta.author),
            (false, true) => title,
            (true, _) => FALLBACK_HEADER.to_string(),
        }
    }

    pub fn begin_load(&mut self, ticket: &FetchTicket) {
        debug!("Loading page {} ({:?})", ticket.page, ticket.id);
        self.state = LoadState::Loading;
    }

    pub fn fail_missing_path(&mut self) {
        warn!("No book path, nothing to load");
        self.state = LoadState::Failed(ReaderError::MissingPath);
    }

    pub fn apply(&mut self, completion: FetchCompletion) -> ApplyOutcome {
        let FetchCompletion { ticket, result } = completion;
        if ticket.is_cancelled() {
            debug!("Discarding stale response {:?} for page {}", ticket.id, ticket.page);
            return ApplyOutcome::Stale;
        }

        let window = match result {
            Ok(window) => window,
            Err(e) => {
                warn!("Loading page {} failed: {e}", ticket.page);
                self.state = LoadState::Failed(e.into());
                return ApplyOutcome::Applied { total: None };
            }
        };

        self.meta = BookMeta {
            title: window.title.clone().unwrap_or_default(),
            author: window.author.clone().unwrap_or_default(),
        };
        let total = window.total;

        if window.pages.is_empty() {
            self.state = LoadState::Failed(ReaderError::EmptyBook);
            return ApplyOutcome::Applied { total };
        }

        let offset = ticket.window.offset;
        let Some(page) = window.pages.get(offset) else {
            warn!(
                "Page {} missing: offset {offset} of {} returned",
                ticket.page,
                window.pages.len()
            );
            self.state = LoadState::Failed(ReaderError::PageNotInResponse);
            return ApplyOutcome::Applied { total };
        };

        self.generation += 1;
        self.surface = PageSurface::from_fragments(page, self.generation);
        self.state = LoadState::Ready;
        info!("Rendered page {} ({} blocks)", ticket.page, page.len());
        self.content_updated.emit(ContentUpdated {
            generation: self.generation,
        });
        ApplyOutcome::Applied { total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PageWindow;
    use crate::error::FetchError;
    use crate::fetcher::{RequestId, TicketIssuer};

    fn window(pages: usize) -> PageWindow {
        PageWindow {
            title: Some("Moby_Dick".into()),
            author: Some("Melville".into()),
            total: Some(40),
            pages: (0..pages).map(|i| vec![format!("<p>page {i}</p>")]).collect(),
        }
    }

    #[test]
    fn renders_page_at_window_offset() {
        let mut reader = BookReader::new(None);
        let ticket = FetchTicket::new(RequestId(1), 7);
        let outcome = reader.apply(FetchCompletion {
            ticket,
            result: Ok(window(9)),
        });
        assert_eq!(outcome, ApplyOutcome::Applied { total: Some(40) });
        assert_eq!(reader.surface().blocks()[0].plain_text(), "page 4");
        assert_eq!(reader.header_line(), "Moby Dick — Melville");
    }

    #[test]
    fn short_window_is_a_consistency_error() {
        let mut reader = BookReader::new(None);
        let ticket = FetchTicket::new(RequestId(1), 7);
        reader.apply(FetchCompletion {
            ticket,
            result: Ok(window(3)),
        });
        assert!(matches!(reader.error(), Some(ReaderError::PageNotInResponse)));
    }

    #[test]
    fn empty_window_is_reported_separately() {
        let mut reader = BookReader::new(None);
        reader.apply(FetchCompletion {
            ticket: FetchTicket::new(RequestId(1), 1),
            result: Ok(window(0)),
        });
        assert!(matches!(reader.error(), Some(ReaderError::EmptyBook)));
    }

    #[test]
    fn fetch_errors_surface_inline() {
        let mut reader = BookReader::new(None);
        reader.apply(FetchCompletion {
            ticket: FetchTicket::new(RequestId(1), 1),
            result: Err(FetchError::Status {
                status: 500,
                body: "boom".into(),
            }),
        });
        assert_eq!(
            reader.error().map(ToString::to_string).as_deref(),
            Some("Request failed 500: boom")
        );
    }

    #[test]
    fn stale_completion_does_not_replace_newer_page() {
        let mut issuer = TicketIssuer::default();
        let mut reader = BookReader::new(None);
        let updates = reader.subscribe_content();

        let first = issuer.issue(1);
        let second = issuer.issue(2);

        reader.apply(FetchCompletion {
            ticket: second,
            result: Ok(window(6)),
        });
        let outcome = reader.apply(FetchCompletion {
            ticket: first,
            result: Ok(window(5)),
        });

        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(reader.surface().blocks()[0].plain_text(), "page 1");
        assert_eq!(updates.latest(), Some(ContentUpdated { generation: 1 }));
    }

    #[test]
    fn header_falls_back_to_url_title_then_constant() {
        let reader = BookReader::new(Some("War%20and_Peace".into()));
        assert_eq!(reader.header_line(), "War and Peace");
        assert_eq!(BookReader::new(None).header_line(), FALLBACK_HEADER);
        assert_eq!(BookReader::new(None).note_title(), FALLBACK_HEADER);
    }
}

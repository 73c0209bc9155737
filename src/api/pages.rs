use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{ApiClient, ApiResponse};
use crate::error::FetchError;

const PAGES_ENDPOINT: &str = "/epub/pages";

/// HTML fragments making up one page.
pub type PageContent = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub path: String,
    pub from: usize,
    pub to: usize,
}

/// A contiguous run of pages as returned by the page service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWindow {
    pub title: Option<String>,
    pub author: Option<String>,
    pub total: Option<usize>,
    pub pages: Vec<PageContent>,
}

#[derive(Deserialize)]
struct RawWindow {
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    author: Option<Value>,
    #[serde(default)]
    total: Option<Value>,
    #[serde(default)]
    pages: Option<Value>,
}

impl PageWindow {
    /// Lenient decode: missing or mistyped fields read as absent, anything
    /// other than an array of pages reads as no pages.
    pub fn from_json(value: Value) -> Result<Self, FetchError> {
        let raw: RawWindow =
            serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))?;

        let pages = match raw.pages {
            Some(Value::Array(pages)) => pages.into_iter().map(page_fragments).collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            title: raw.title.and_then(string_value),
            author: raw.author.and_then(string_value),
            total: raw.total.and_then(|t| t.as_u64()).map(|t| t as usize),
            pages,
        })
    }
}

fn string_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn page_fragments(page: Value) -> PageContent {
    match page {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    }
}

/// Anything that can serve a window of pages for a book path.
pub trait PageSource: Send + Sync {
    fn fetch_page_window(&self, request: &PageRequest) -> Result<PageWindow, FetchError>;
}

pub struct HttpPageSource {
    client: ApiClient,
}

impl HttpPageSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }
}

impl PageSource for HttpPageSource {
    fn fetch_page_window(&self, request: &PageRequest) -> Result<PageWindow, FetchError> {
        debug!(
            "Fetching pages {}..={} of {:?}",
            request.from, request.to, request.path
        );
        match self.client.post_json(PAGES_ENDPOINT, request)? {
            ApiResponse::Json(value) => PageWindow::from_json(value),
            ApiResponse::Text(text) => {
                warn!("Page service answered with non-JSON body ({} bytes)", text.len());
                Ok(PageWindow::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = PageRequest {
            path: "books/a.epub".into(),
            from: 0,
            to: 4,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"path": "books/a.epub", "from": 0, "to": 4})
        );
    }

    #[test]
    fn window_decodes_full_response() {
        let window = PageWindow::from_json(json!({
            "title": "Moby Dick",
            "author": "Melville",
            "total": 120,
            "pages": [["<p>a</p>", "<p>b</p>"], ["<p>c</p>"]]
        }))
        .unwrap();
        assert_eq!(window.title.as_deref(), Some("Moby Dick"));
        assert_eq!(window.total, Some(120));
        assert_eq!(window.pages.len(), 2);
        assert_eq!(window.pages[0].len(), 2);
    }

    #[test]
    fn window_tolerates_odd_fields() {
        let window = PageWindow::from_json(json!({"title": 5, "total": "x", "pages": null})).unwrap();
        assert_eq!(window, PageWindow::default());
    }
}

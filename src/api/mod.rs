//! Remote page source: the HTTP client and the page-window endpoint on top of it.

pub mod client;
pub mod pages;

pub use client::{ApiClient, ApiResponse, DEFAULT_API_ROOT};
pub use pages::{HttpPageSource, PageContent, PageRequest, PageSource, PageWindow};

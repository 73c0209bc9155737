// Export modules for use in tests
pub mod api;
pub mod clipboard;
pub mod content;
pub mod error;
pub mod event_source;
pub mod fetcher;
pub mod gesture;
pub mod layout;
pub mod location;
pub mod main_app;
pub mod navigation;
pub mod notes;
pub mod panic_handler;
pub mod reader;
pub mod search;
pub mod selection;
pub mod settings;
pub mod signal;
pub mod storage;
pub mod theme;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use main_app::{App, AppAction, FocusedPanel, run_app_with_event_source};

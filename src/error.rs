use thiserror::Error;

/// Failures of a single page-window request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(String),

    #[error("Request failed {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors shown inline in the page area. None of them are fatal to the app.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("No book path given")]
    MissingPath,

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Current page not found in response")]
    PageNotInResponse,

    #[error("Book not found or empty")]
    EmptyBook,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_carries_code_and_body() {
        let err = FetchError::Status {
            status: 404,
            body: "no such book".to_string(),
        };
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "Request failed 404: no such book");
    }

    #[test]
    fn reader_error_messages_are_distinct() {
        assert_ne!(
            ReaderError::PageNotInResponse.to_string(),
            ReaderError::EmptyBook.to_string()
        );
        let wrapped: ReaderError = FetchError::Transport("connection refused".into()).into();
        assert_eq!(wrapped.to_string(), "connection refused");
    }
}

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String>;
}

/// System clipboard.
pub struct ArboardClipboard;

impl Clipboard for ArboardClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| format!("Failed to access clipboard: {e}"))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| format!("Failed to copy to clipboard: {e}"))
    }
}

/// Writes an OSC 52 sequence, letting the terminal own the clipboard. Works
/// over ssh and without a display server.
pub struct Osc52Clipboard<W: Write> {
    out: W,
}

impl<W: Write> Osc52Clipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

pub fn osc52_sequence(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        self.out
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| format!("Failed to write OSC 52 sequence: {e}"))
    }
}

/// Tries the primary clipboard, then the fallback. Never fails loudly.
pub struct FallbackClipboard {
    primary: Box<dyn Clipboard>,
    fallback: Box<dyn Clipboard>,
}

impl FallbackClipboard {
    pub fn new(primary: Box<dyn Clipboard>, fallback: Box<dyn Clipboard>) -> Self {
        Self { primary, fallback }
    }

    pub fn system() -> Self {
        Self::new(
            Box::new(ArboardClipboard),
            Box::new(Osc52Clipboard::new(std::io::stdout())),
        )
    }

    /// Returns whether either clipboard took the text.
    pub fn copy(&mut self, text: &str) -> bool {
        match self.primary.set_text(text) {
            Ok(()) => {
                debug!("Copied {} chars", text.chars().count());
                true
            }
            Err(primary_err) => {
                warn!("{primary_err}, trying fallback");
                match self.fallback.set_text(text) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{e}");
                        false
                    }
                }
            }
        }
    }
}

impl Clipboard for FallbackClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        if self.copy(text) {
            Ok(())
        } else {
            Err("No clipboard accepted the text".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Clipboard for Broken {
        fn set_text(&mut self, _text: &str) -> Result<(), String> {
            Err("no display".to_string())
        }
    }

    #[test]
    fn osc52_encodes_text_as_base64() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn fallback_is_used_when_primary_fails() {
        let mut clipboard = FallbackClipboard::new(
            Box::new(Broken),
            Box::new(Osc52Clipboard::new(Vec::new())),
        );
        assert!(clipboard.copy("hi"));
    }

    #[test]
    fn failure_of_both_is_reported_not_raised() {
        let mut clipboard = FallbackClipboard::new(Box::new(Broken), Box::new(Broken));
        assert!(!clipboard.copy("hi"));
        assert!(clipboard.set_text("hi").is_err());
    }
}

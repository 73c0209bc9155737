/// In-page search.
/// "/" opens the query box, typing highlights live, "n"/"N" walk the matches.
use log::debug;
use regex::{Regex, RegexBuilder};

use crate::content::{HighlightRange, PageSurface};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchMode {
    #[default]
    Inactive,
    InputMode,      // Typing into the query box
    NavigationMode, // Query kept, highlights stay, n/N navigate
}

/// One occurrence: owning block plus flow character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRef {
    pub block: usize,
    pub offset: usize,
    pub len: usize,
}

/// Case-insensitive literal pattern for `query`, `None` when empty.
pub fn build_pattern(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Character-offset matches of `pattern` in `text`.
pub fn find_matches(pattern: &Regex, text: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut chars_seen = 0;
    let mut bytes_seen = 0;
    for m in pattern.find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        chars_seen += text[bytes_seen..m.start()].chars().count();
        let len = m.as_str().chars().count();
        found.push((chars_seen, len));
        chars_seen += len;
        bytes_seen = m.end();
    }
    found
}

#[derive(Debug, Clone, Default)]
pub struct SearchController {
    pub mode: SearchMode,
    query: String,
    matches: Vec<MatchRef>,
    current_match_index: Option<usize>,
}

impl SearchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> &[MatchRef] {
        &self.matches
    }

    pub fn is_input_active(&self) -> bool {
        self.mode == SearchMode::InputMode
    }

    pub fn start_input(&mut self) {
        self.mode = SearchMode::InputMode;
    }

    /// Enter: leave the box, keep highlights.
    pub fn confirm(&mut self) {
        self.mode = if self.query.is_empty() {
            SearchMode::Inactive
        } else {
            SearchMode::NavigationMode
        };
    }

    pub fn push_char(&mut self, c: char, surface: &mut PageSurface) {
        let mut query = self.query.clone();
        query.push(c);
        self.set_query(&query, surface);
    }

    pub fn pop_char(&mut self, surface: &mut PageSurface) {
        let mut query = self.query.clone();
        query.pop();
        self.set_query(&query, surface);
    }

    /// Restores every block, then highlights the new query from scratch.
    pub fn set_query(&mut self, query: &str, surface: &mut PageSurface) {
        self.query = query.to_string();
        self.apply(surface);
    }

    /// Esc: drop the query and all highlights.
    pub fn clear(&mut self, surface: &mut PageSurface) {
        self.mode = SearchMode::Inactive;
        self.set_query("", surface);
    }

    /// Re-runs the current query against freshly rendered content.
    pub fn on_content_updated(&mut self, surface: &mut PageSurface) {
        self.apply(surface);
    }

    fn apply(&mut self, surface: &mut PageSurface) {
        self.matches.clear();
        self.current_match_index = None;

        let Some(pattern) = build_pattern(&self.query) else {
            for block in surface.blocks_mut() {
                block.restore();
            }
            return;
        };

        for (index, block) in surface.blocks_mut().iter_mut().enumerate() {
            let text = block.plain_text();
            let ranges: Vec<HighlightRange> = find_matches(&pattern, &text)
                .into_iter()
                .map(|(offset, len)| {
                    let match_index = self.matches.len();
                    self.matches.push(MatchRef {
                        block: index,
                        offset,
                        len,
                    });
                    HighlightRange {
                        start: offset,
                        end: offset + len,
                        match_index,
                    }
                })
                .collect();
            block.highlight(&ranges);
        }

        if !self.matches.is_empty() {
            self.current_match_index = Some(0);
        }
        debug!("Search {:?}: {} matches", self.query, self.matches.len());
    }

    pub fn next_match(&mut self) -> Option<MatchRef> {
        if self.matches.is_empty() {
            return None;
        }
        self.current_match_index = Some(match self.current_match_index {
            Some(idx) => (idx + 1) % self.matches.len(),
            None => 0,
        });
        self.current_match()
    }

    pub fn previous_match(&mut self) -> Option<MatchRef> {
        if self.matches.is_empty() {
            return None;
        }
        self.current_match_index = Some(match self.current_match_index {
            Some(0) | None => self.matches.len() - 1,
            Some(idx) => idx - 1,
        });
        self.current_match()
    }

    pub fn current_match(&self) -> Option<MatchRef> {
        self.current_match_index
            .and_then(|idx| self.matches.get(idx))
            .copied()
    }

    pub fn current_match_index(&self) -> Option<usize> {
        self.current_match_index
    }

    pub fn get_match_info(&self) -> String {
        if self.matches.is_empty() {
            "No matches".to_string()
        } else if let Some(current) = self.current_match_index {
            format!("[{}/{}]", current + 1, self.matches.len())
        } else {
            format!("[{} matches]", self.matches.len())
        }
    }
}

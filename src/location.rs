use anyhow::Context;
use reqwest::Url;
use std::fmt;

const READER_BASE: &str = "folio://reader/";

/// The reader's address: a URL whose query carries `path`, `title` and `page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderUrl {
    url: Url,
}

impl ReaderUrl {
    /// Accepts a bare query (`?path=..`), a relative reference or an absolute URL.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let base = Url::parse(READER_BASE)?;
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(_) => base
                .join(input)
                .with_context(|| format!("invalid reader url {input:?}"))?,
        };
        Ok(Self { url })
    }

    pub fn from_params(path: Option<&str>, title: Option<&str>, page: Option<usize>) -> Self {
        let mut url = Url::parse(READER_BASE).expect("static reader base url");
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(path) = path {
                pairs.append_pair("path", path);
            }
            if let Some(title) = title {
                pairs.append_pair("title", title);
            }
            if let Some(page) = page {
                pairs.append_pair("page", &page.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Self { url }
    }

    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns a copy with `name` set to `value`, keeping the other pairs in order.
    pub fn with_query(&self, name: &str, value: &str) -> Self {
        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        match pairs.iter_mut().find(|(key, _)| key == name) {
            Some(pair) => pair.1 = value.to_string(),
            None => pairs.push((name.to_string(), value.to_string())),
        }

        let mut url = self.url.clone();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        Self { url }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for ReaderUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Session history with browser semantics: pushing drops the forward tail,
/// back/forward move the cursor without creating entries.
pub struct History {
    entries: Vec<ReaderUrl>,
    index: usize,
    max_size: usize,
}

impl History {
    pub fn new(initial: ReaderUrl, max_size: usize) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
            max_size: max_size.max(1),
        }
    }

    pub fn current(&self) -> &ReaderUrl {
        &self.entries[self.index]
    }

    pub fn push(&mut self, url: ReaderUrl) {
        self.entries.truncate(self.index + 1);
        if self.entries.last() == Some(&url) {
            return;
        }
        self.entries.push(url);
        if self.entries.len() > self.max_size {
            let overflow = self.entries.len() - self.max_size;
            self.entries.drain(..overflow);
        }
        self.index = self.entries.len() - 1;
    }

    pub fn back(&mut self) -> Option<&ReaderUrl> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(&self.entries[self.index])
    }

    pub fn forward(&mut self) -> Option<&ReaderUrl> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(&self.entries[self.index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_query() {
        let url = ReaderUrl::parse("?path=books/moby.epub&title=Moby_Dick&page=4").unwrap();
        assert_eq!(url.query("path").as_deref(), Some("books/moby.epub"));
        assert_eq!(url.query("title").as_deref(), Some("Moby_Dick"));
        assert_eq!(url.query("page").as_deref(), Some("4"));
        assert_eq!(url.query("missing"), None);
    }

    #[test]
    fn with_query_replaces_in_place() {
        let url = ReaderUrl::from_params(Some("a b.epub"), None, Some(1));
        let next = url.with_query("page", "2");
        assert_eq!(next.query("page").as_deref(), Some("2"));
        assert_eq!(next.query("path").as_deref(), Some("a b.epub"));
        assert!(next.as_str().find("path").unwrap() < next.as_str().find("page").unwrap());
    }

    #[test]
    fn history_back_and_forward() {
        let first = ReaderUrl::from_params(Some("b"), None, Some(1));
        let mut history = History::new(first.clone(), 10);
        history.push(first.with_query("page", "2"));
        history.push(first.with_query("page", "3"));

        assert_eq!(history.back().and_then(|u| u.query("page")).as_deref(), Some("2"));
        assert_eq!(history.back().and_then(|u| u.query("page")).as_deref(), Some("1"));
        assert!(history.back().is_none());
        assert_eq!(history.forward().and_then(|u| u.query("page")).as_deref(), Some("2"));

        history.push(first.with_query("page", "9"));
        assert!(history.forward().is_none());
        assert_eq!(history.len(), 3);
    }
}

//! Page content as a tree of nodes.
//!
//! Each HTML fragment returned by the page service becomes one
//! [`ContentBlock`]. Parsing goes through html5ever, after which the tree is
//! sanitised and its whitespace collapsed the way a browser would lay it
//! out. The result is kept as the block's pristine snapshot. Search
//! highlighting never edits that snapshot: it rebuilds the live tree from it,
//! wrapping matched text in [`ContentNode::Highlight`] pieces.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use log::warn;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const REMOVED_ATTRIBUTES: [&str; 6] = [
    "unselectable",
    "onselectstart",
    "onmousedown",
    "draggable",
    "ondragstart",
    "ondrag",
];

const BLOCKED_STYLE_PREFIXES: [&str; 6] = [
    "user-select",
    "-webkit-user-select",
    "-moz-user-select",
    "-ms-user-select",
    "-webkit-touch-callout",
    "-webkit-user-drag",
];

const BLOCKED_CLASSES: [&str; 5] = [
    "noselect",
    "no-select",
    "unselectable",
    "disable-select",
    "text-unselectable",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element {
        tag: String,
        attrs: Vec<Attr>,
        children: Vec<ContentNode>,
    },
    Text(String),
    /// A piece of one search match. A match that crosses element boundaries
    /// is split into several pieces sharing `match_index`.
    Highlight { match_index: usize, text: String },
}

impl ContentNode {
    pub fn element(tag: &str, children: Vec<ContentNode>) -> Self {
        ContentNode::Element {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children,
        }
    }

    pub fn text(text: &str) -> Self {
        ContentNode::Text(text.to_string())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            ContentNode::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Element { children, .. } => children,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub heading: bool,
    pub link: bool,
    pub code: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowChar {
    pub ch: char,
    pub style: RunStyle,
    pub highlight: Option<usize>,
}

/// Linear text of a block as it would be laid out, one entry per character.
/// Offsets into this sequence are the coordinates used by selection and search.
#[derive(Debug, Clone, Default)]
pub struct FlowText {
    chars: Vec<FlowChar>,
    text_starts: Vec<usize>,
    emitted: Vec<String>,
}

impl FlowText {
    pub fn chars(&self) -> &[FlowChar] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }

    pub fn slice(&self, from: usize, to: usize) -> String {
        let to = to.min(self.chars.len());
        let from = from.min(to);
        self.chars[from..to].iter().map(|c| c.ch).collect()
    }

    fn last_char(&self) -> Option<char> {
        self.chars.last().map(|c| c.ch)
    }

    fn push(&mut self, ch: char, style: RunStyle, highlight: Option<usize>) {
        self.chars.push(FlowChar {
            ch,
            style,
            highlight,
        });
    }

    fn push_text(&mut self, text: &str, style: RunStyle, highlight: Option<usize>, pre: bool) {
        self.text_starts.push(self.chars.len());
        let mut emitted = String::with_capacity(text.len());
        for ch in text.chars() {
            if pre {
                self.push(ch, style, highlight);
                emitted.push(ch);
            } else if ch.is_whitespace() {
                if matches!(self.last_char(), None | Some(' ') | Some('\n')) {
                    continue;
                }
                self.push(' ', style, highlight);
                emitted.push(' ');
            } else {
                self.push(ch, style, highlight);
                emitted.push(ch);
            }
        }
        self.emitted.push(emitted);
    }

    fn line_break(&mut self) {
        if !self.chars.is_empty() && self.last_char() != Some('\n') {
            self.push('\n', RunStyle::default(), None);
        }
    }

    fn paragraph_break(&mut self) {
        if self.chars.is_empty() {
            return;
        }
        self.line_break();
        let len = self.chars.len();
        if len < 2 || self.chars[len - 2].ch != '\n' {
            self.push('\n', RunStyle::default(), None);
        }
    }

    fn hard_break(&mut self) {
        if !self.chars.is_empty() {
            self.push('\n', RunStyle::default(), None);
        }
    }

    fn finish(mut self) -> Self {
        while self.last_char() == Some('\n') {
            self.chars.pop();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Display {
    Skip,
    HardBreak,
    Paragraph,
    Line,
    Inline,
}

fn display_of(tag: &str) -> Display {
    match tag {
        "script" | "style" | "head" | "title" | "noscript" | "template" | "img" | "svg" => {
            Display::Skip
        }
        "br" => Display::HardBreak,
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "pre" | "section"
        | "article" | "figure" | "header" | "footer" | "aside" | "nav" | "main" | "table"
        | "ul" | "ol" | "dl" | "hr" => Display::Paragraph,
        "div" | "li" | "tr" | "dt" | "dd" | "figcaption" | "caption" | "address" => Display::Line,
        _ => Display::Inline,
    }
}

fn styled(tag: &str, mut style: RunStyle) -> RunStyle {
    match tag {
        "b" | "strong" | "th" => style.bold = true,
        "i" | "em" | "cite" | "blockquote" => style.italic = true,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            style.heading = true;
            style.bold = true;
        }
        "a" => style.link = true,
        "code" | "pre" | "tt" | "kbd" | "samp" => style.code = true,
        _ => {}
    }
    style
}

fn walk(nodes: &[ContentNode], style: RunStyle, pre: bool, flow: &mut FlowText) {
    for node in nodes {
        match node {
            ContentNode::Text(text) => flow.push_text(text, style, None, pre),
            ContentNode::Highlight { match_index, text } => {
                flow.push_text(text, style, Some(*match_index), pre)
            }
            ContentNode::Element { tag, children, .. } => {
                let display = display_of(tag);
                let inner_style = styled(tag, style);
                let inner_pre = pre || tag == "pre";
                match display {
                    Display::Skip => {}
                    Display::HardBreak => flow.hard_break(),
                    Display::Paragraph => {
                        flow.paragraph_break();
                        walk(children, inner_style, inner_pre, flow);
                        flow.paragraph_break();
                    }
                    Display::Line => {
                        flow.line_break();
                        walk(children, inner_style, inner_pre, flow);
                        flow.line_break();
                    }
                    Display::Inline => walk(children, inner_style, inner_pre, flow),
                }
            }
        }
    }
}

pub fn flatten(nodes: &[ContentNode]) -> FlowText {
    let mut flow = FlowText::default();
    walk(nodes, RunStyle::default(), false, &mut flow);
    flow.finish()
}

/// Rebuilds the tree, replacing every text-bearing node (in the same order
/// `walk` visits them) by whatever `f` returns for it.
fn map_text_nodes<F>(nodes: &[ContentNode], ordinal: &mut usize, f: &mut F) -> Vec<ContentNode>
where
    F: FnMut(usize, &str) -> Vec<ContentNode>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            ContentNode::Text(text) | ContentNode::Highlight { text, .. } => {
                let index = *ordinal;
                *ordinal += 1;
                out.extend(f(index, text));
            }
            ContentNode::Element {
                tag,
                attrs,
                children,
            } => {
                let children = if display_of(tag) == Display::Skip {
                    children.clone()
                } else {
                    map_text_nodes(children, ordinal, f)
                };
                out.push(ContentNode::Element {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children,
                });
            }
        }
    }
    out
}

/// Rewrites text nodes to the exact characters they contribute to the flow,
/// so node text and flow offsets line up one to one.
fn collapse_whitespace(nodes: &[ContentNode]) -> Vec<ContentNode> {
    let flow = flatten(nodes);
    let mut ordinal = 0;
    map_text_nodes(nodes, &mut ordinal, &mut |index, _| {
        match flow.emitted.get(index) {
            Some(text) if !text.is_empty() => vec![ContentNode::Text(text.clone())],
            _ => Vec::new(),
        }
    })
}

/// Strips the markup that would stop a reader from selecting text.
pub fn sanitize(nodes: &mut Vec<ContentNode>) {
    nodes.retain(|node| {
        !matches!(node, ContentNode::Element { tag, .. } if tag == "style" || tag == "script")
    });
    for node in nodes.iter_mut() {
        if let ContentNode::Element {
            attrs, children, ..
        } = node
        {
            clean_attributes(attrs);
            sanitize(children);
        }
    }
}

fn clean_attributes(attrs: &mut Vec<Attr>) {
    attrs.retain(|a| !REMOVED_ATTRIBUTES.contains(&a.name.as_str()));

    for attr in attrs.iter_mut() {
        match attr.name.as_str() {
            "style" => {
                attr.value = attr
                    .value
                    .split(';')
                    .map(str::trim)
                    .filter(|part| {
                        let lower = part.to_lowercase();
                        !part.is_empty()
                            && !BLOCKED_STYLE_PREFIXES
                                .iter()
                                .any(|prefix| lower.starts_with(prefix))
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
            }
            "class" => {
                attr.value = attr
                    .value
                    .split_whitespace()
                    .filter(|class| !BLOCKED_CLASSES.contains(class))
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            _ => {}
        }
    }

    attrs.retain(|a| !((a.name == "style" || a.name == "class") && a.value.is_empty()));
}

/// Parses one HTML fragment into body-level nodes.
pub fn parse_fragment(html: &str) -> Vec<ContentNode> {
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => {
            warn!("Failed to parse page fragment: {e}");
            return vec![ContentNode::Text(html.to_string())];
        }
    };

    let Some(body) = find_element(&dom.document, "body") else {
        return Vec::new();
    };
    body.children.borrow().iter().filter_map(convert).collect()
}

fn find_element(handle: &Handle, name: &str) -> Option<Handle> {
    for child in handle.children.borrow().iter() {
        if let NodeData::Element { name: qual, .. } = &child.data {
            if qual.local.as_ref() == name {
                return Some(child.clone());
            }
        }
        if let Some(found) = find_element(child, name) {
            return Some(found);
        }
    }
    None
}

fn convert(handle: &Handle) -> Option<ContentNode> {
    match &handle.data {
        NodeData::Text { contents } => Some(ContentNode::Text(contents.borrow().to_string())),
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| Attr {
                    name: a.name.local.to_string(),
                    value: a.value.to_string(),
                })
                .collect();
            let children = handle.children.borrow().iter().filter_map(convert).collect();
            Some(ContentNode::Element {
                tag: name.local.to_string(),
                attrs,
                children,
            })
        }
        _ => None,
    }
}

/// A search match inside one block, in flow character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    pub match_index: usize,
}

#[derive(Debug, Clone)]
pub struct ContentBlock {
    pristine: Vec<ContentNode>,
    nodes: Vec<ContentNode>,
    pristine_flow: FlowText,
    flow: FlowText,
}

impl ContentBlock {
    pub fn from_html(html: &str) -> Self {
        let mut nodes = parse_fragment(html);
        sanitize(&mut nodes);
        Self::from_nodes(collapse_whitespace(&nodes))
    }

    fn from_nodes(pristine: Vec<ContentNode>) -> Self {
        let flow = flatten(&pristine);
        Self {
            nodes: pristine.clone(),
            pristine,
            pristine_flow: flow.clone(),
            flow,
        }
    }

    pub fn nodes(&self) -> &[ContentNode] {
        &self.nodes
    }

    pub fn pristine(&self) -> &[ContentNode] {
        &self.pristine
    }

    /// Flow of the live (possibly highlighted) tree.
    pub fn flow(&self) -> &FlowText {
        &self.flow
    }

    pub fn plain_text(&self) -> String {
        self.pristine_flow.as_string()
    }

    pub fn char_len(&self) -> usize {
        self.pristine_flow.len()
    }

    pub fn text_range(&self, from: usize, to: usize) -> String {
        self.pristine_flow.slice(from, to)
    }

    pub fn is_highlighted(&self) -> bool {
        self.nodes != self.pristine
    }

    pub fn restore(&mut self) {
        self.nodes = self.pristine.clone();
        self.flow = self.pristine_flow.clone();
    }

    /// Restores the pristine tree, then wraps each range in highlight pieces.
    pub fn highlight(&mut self, ranges: &[HighlightRange]) {
        if ranges.is_empty() {
            self.restore();
            return;
        }
        let starts = &self.pristine_flow.text_starts;
        let mut ordinal = 0;
        self.nodes = map_text_nodes(&self.pristine, &mut ordinal, &mut |index, text| {
            let start = starts.get(index).copied().unwrap_or(0);
            split_for_highlights(text, start, ranges)
        });
        self.flow = flatten(&self.nodes);
    }
}

fn split_for_highlights(text: &str, start: usize, ranges: &[HighlightRange]) -> Vec<ContentNode> {
    let chars: Vec<char> = text.chars().collect();
    let end = start + chars.len();
    let mut pieces = Vec::new();
    let mut cursor = 0;

    for range in ranges {
        if range.end <= start || range.start >= end {
            continue;
        }
        let from = range.start.saturating_sub(start).max(cursor);
        let to = (range.end - start).min(chars.len());
        if from >= to {
            continue;
        }
        if from > cursor {
            pieces.push(ContentNode::Text(chars[cursor..from].iter().collect()));
        }
        pieces.push(ContentNode::Highlight {
            match_index: range.match_index,
            text: chars[from..to].iter().collect(),
        });
        cursor = to;
    }
    if cursor < chars.len() {
        pieces.push(ContentNode::Text(chars[cursor..].iter().collect()));
    }
    pieces
}

/// Location inside the page: block index plus flow character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPoint {
    pub block: usize,
    pub offset: usize,
}

impl TextPoint {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// The rendered content region. Only the page loader replaces it, and it does
/// so in one step.
#[derive(Debug, Clone, Default)]
pub struct PageSurface {
    blocks: Vec<ContentBlock>,
    generation: u64,
}

impl PageSurface {
    pub fn from_fragments(fragments: &[String], generation: u64) -> Self {
        Self {
            blocks: fragments.iter().map(|html| ContentBlock::from_html(html)).collect(),
            generation,
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [ContentBlock] {
        &mut self.blocks
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.char_len() == 0)
    }

    /// Pristine text between two points, `end` exclusive. Blocks are
    /// separated by a blank line.
    pub fn text_between(&self, start: TextPoint, end: TextPoint) -> String {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let mut parts = Vec::new();
        for index in start.block..=end.block.min(self.blocks.len().saturating_sub(1)) {
            let Some(block) = self.blocks.get(index) else {
                break;
            };
            let from = if index == start.block { start.offset } else { 0 };
            let to = if index == end.block {
                end.offset
            } else {
                block.char_len()
            };
            parts.push(block.text_range(from, to));
        }
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fragment_and_collapses_whitespace() {
        let block = ContentBlock::from_html("<h1>Chapter  1</h1>\n<p>It was\n   a <b>dark</b> night.</p>");
        assert_eq!(block.plain_text(), "Chapter 1\n\nIt was a dark night.");
    }

    #[test]
    fn line_breaks_and_list_items() {
        let block = ContentBlock::from_html("<p>one<br>two</p><ul><li>a</li><li>b</li></ul>");
        assert_eq!(block.plain_text(), "one\ntwo\n\na\nb");
    }

    #[test]
    fn styles_and_scripts_are_dropped() {
        let block = ContentBlock::from_html(
            "<style>p{user-select:none}</style><p>text</p><script>alert(1)</script>",
        );
        assert_eq!(block.plain_text(), "text");
    }

    #[test]
    fn sanitize_removes_selection_blockers() {
        let mut nodes = parse_fragment(
            r#"<p class="noselect lead" unselectable="on" style="user-select: none; color: red" draggable="false">x</p><div style="-webkit-user-select:none">y</div>"#,
        );
        sanitize(&mut nodes);

        let p = &nodes[0];
        assert_eq!(p.attr("class"), Some("lead"));
        assert_eq!(p.attr("style"), Some("color: red"));
        assert_eq!(p.attr("unselectable"), None);
        assert_eq!(p.attr("draggable"), None);
        assert_eq!(nodes[1].attr("style"), None);
    }

    #[test]
    fn highlight_splits_across_elements() {
        let mut block = ContentBlock::from_html("<p>hel<b>lo</b> world</p>");
        block.highlight(&[HighlightRange {
            start: 0,
            end: 5,
            match_index: 0,
        }]);

        let highlighted: String = block
            .flow()
            .chars()
            .iter()
            .filter(|c| c.highlight == Some(0))
            .map(|c| c.ch)
            .collect();
        assert_eq!(highlighted, "hello");
        assert_eq!(block.flow().as_string(), block.plain_text());
    }

    #[test]
    fn highlight_always_starts_from_pristine() {
        let mut block = ContentBlock::from_html("<p>abc abc</p>");
        let ranges = [
            HighlightRange {
                start: 0,
                end: 3,
                match_index: 0,
            },
            HighlightRange {
                start: 4,
                end: 7,
                match_index: 1,
            },
        ];
        block.highlight(&ranges);
        let once = block.nodes().to_vec();
        block.highlight(&ranges);
        assert_eq!(block.nodes(), once.as_slice());

        block.restore();
        assert!(!block.is_highlighted());
    }

    #[test]
    fn text_between_spans_blocks() {
        let surface = PageSurface::from_fragments(
            &["<p>first block</p>".to_string(), "<p>second</p>".to_string()],
            1,
        );
        let text = surface.text_between(TextPoint::new(0, 6), TextPoint::new(1, 3));
        assert_eq!(text, "block\n\nsec");
    }
}

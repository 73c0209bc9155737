use unicode_width::UnicodeWidthChar;

use crate::content::{PageSurface, RunStyle, TextPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCell {
    pub ch: char,
    pub offset: usize,
    pub x: u16,
    pub width: u16,
    pub style: RunStyle,
    pub highlight: Option<usize>,
}

/// One wrapped row. Spacer rows between blocks have no block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutLine {
    pub block: Option<usize>,
    pub cells: Vec<LayoutCell>,
    pub start: usize,
    pub end: usize,
}

impl LayoutLine {
    fn spacer() -> Self {
        Self {
            block: None,
            cells: Vec::new(),
            start: 0,
            end: 0,
        }
    }
}

/// Horizontal run of selected cells on one row, in column coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub line: usize,
    pub x: u16,
    pub width: u16,
}

/// Page text wrapped to a column width.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    lines: Vec<LayoutLine>,
    width: u16,
}

impl PageLayout {
    pub fn build(surface: &PageSurface, width: u16) -> Self {
        let width = width.max(1);
        let mut lines = Vec::new();

        for (index, block) in surface.blocks().iter().enumerate() {
            if block.flow().is_empty() {
                continue;
            }
            if !lines.is_empty() {
                lines.push(LayoutLine::spacer());
            }
            let chars = block.flow().chars();
            let mut segment_start = 0;
            for i in 0..=chars.len() {
                if i == chars.len() || chars[i].ch == '\n' {
                    wrap_segment(index, chars, segment_start, i, width, &mut lines);
                    segment_start = i + 1;
                }
            }
        }

        Self { lines, width }
    }

    pub fn lines(&self) -> &[LayoutLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    /// Maps a column and absolute row to a text position. Past the end of a
    /// row snaps to the row end; spacer rows snap to the nearest text row above.
    pub fn hit_test(&self, col: u16, line: usize) -> Option<TextPoint> {
        let line = line.min(self.lines.len().checked_sub(1)?);
        let row = &self.lines[line];

        let Some(block) = row.block else {
            return self.lines[..line]
                .iter()
                .rev()
                .find_map(|l| l.block.map(|b| TextPoint::new(b, l.end)))
                .or_else(|| {
                    self.lines[line..]
                        .iter()
                        .find_map(|l| l.block.map(|b| TextPoint::new(b, l.start)))
                });
        };

        let offset = row
            .cells
            .iter()
            .find(|cell| col < cell.x + cell.width)
            .map(|cell| cell.offset)
            .unwrap_or(row.end);
        Some(TextPoint::new(block, offset))
    }

    /// Row holding `point`, preferring the row where the offset is drawn.
    pub fn line_of(&self, point: TextPoint) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| {
                l.block == Some(point.block) && point.offset >= l.start && point.offset < l.end
            })
            .or_else(|| {
                self.lines.iter().position(|l| {
                    l.block == Some(point.block) && point.offset >= l.start && point.offset <= l.end
                })
            })
    }

    /// Selected spans for `[start, end)`.
    pub fn selection_spans(&self, start: TextPoint, end: TextPoint) -> Vec<LineSpan> {
        let mut spans = Vec::new();
        for (index, line) in self.lines.iter().enumerate() {
            let Some(block) = line.block else {
                continue;
            };
            let mut first: Option<&LayoutCell> = None;
            let mut last: Option<&LayoutCell> = None;
            for cell in &line.cells {
                let point = TextPoint::new(block, cell.offset);
                if point >= start && point < end {
                    first.get_or_insert(cell);
                    last = Some(cell);
                }
            }
            if let (Some(first), Some(last)) = (first, last) {
                spans.push(LineSpan {
                    line: index,
                    x: first.x,
                    width: last.x + last.width - first.x,
                });
            }
        }
        spans
    }
}

fn wrap_segment(
    block: usize,
    chars: &[crate::content::FlowChar],
    from: usize,
    to: usize,
    width: u16,
    lines: &mut Vec<LayoutLine>,
) {
    if from == to {
        lines.push(LayoutLine {
            block: Some(block),
            cells: Vec::new(),
            start: from,
            end: from,
        });
        return;
    }

    let mut line_start = from;
    while line_start < to {
        let mut used: u16 = 0;
        let mut last_space = None;
        let mut j = line_start;
        while j < to {
            let w = char_width(chars[j].ch);
            if used + w > width && j > line_start {
                break;
            }
            if chars[j].ch == ' ' {
                last_space = Some(j);
            }
            used += w;
            j += 1;
        }

        let (line_end, next_start) = if j >= to {
            (to, to)
        } else if chars[j].ch == ' ' {
            (j, j + 1)
        } else if let Some(space) = last_space.filter(|s| *s > line_start) {
            (space, space + 1)
        } else {
            (j, j)
        };

        let mut x = 0;
        let cells = (line_start..line_end)
            .map(|offset| {
                let c = chars[offset];
                let w = char_width(c.ch);
                let cell = LayoutCell {
                    ch: c.ch,
                    offset,
                    x,
                    width: w,
                    style: c.style,
                    highlight: c.highlight,
                };
                x += w;
                cell
            })
            .collect();
        lines.push(LayoutLine {
            block: Some(block),
            cells,
            start: line_start,
            end: line_end,
        });
        line_start = next_start;
    }
}

fn char_width(ch: char) -> u16 {
    ch.width().unwrap_or(0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(fragments: &[&str]) -> PageSurface {
        let owned: Vec<String> = fragments.iter().map(|s| s.to_string()).collect();
        PageSurface::from_fragments(&owned, 1)
    }

    fn row_text(line: &LayoutLine) -> String {
        line.cells.iter().map(|c| c.ch).collect()
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let layout = PageLayout::build(&surface(&["<p>the quick brown fox</p>"]), 10);
        let rows: Vec<String> = layout.lines().iter().map(row_text).collect();
        assert_eq!(rows, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn long_words_are_hard_broken() {
        let layout = PageLayout::build(&surface(&["<p>abcdefghij</p>"]), 4);
        let rows: Vec<String> = layout.lines().iter().map(row_text).collect();
        assert_eq!(rows, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn blocks_are_separated_by_spacer() {
        let layout = PageLayout::build(&surface(&["<p>one</p>", "<p>two</p>"]), 20);
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.lines()[1].block, None);
        assert_eq!(layout.hit_test(0, 1), Some(TextPoint::new(0, 3)));
    }

    #[test]
    fn hit_test_maps_columns_to_offsets() {
        let layout = PageLayout::build(&surface(&["<p>the quick brown fox</p>"]), 10);
        assert_eq!(layout.hit_test(4, 0), Some(TextPoint::new(0, 4)));
        assert_eq!(layout.hit_test(0, 1), Some(TextPoint::new(0, 10)));
        assert_eq!(layout.hit_test(30, 1), Some(TextPoint::new(0, 19)));
        assert_eq!(layout.hit_test(2, 99), Some(TextPoint::new(0, 12)));
    }

    #[test]
    fn selection_spans_cover_each_row() {
        let layout = PageLayout::build(&surface(&["<p>the quick brown fox</p>"]), 10);
        let spans = layout.selection_spans(TextPoint::new(0, 4), TextPoint::new(0, 15));
        assert_eq!(
            spans,
            vec![
                LineSpan {
                    line: 0,
                    x: 4,
                    width: 5
                },
                LineSpan {
                    line: 1,
                    x: 0,
                    width: 5
                },
            ]
        );
    }
}

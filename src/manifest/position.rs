//! Source positions for YAML manifests.
//!
//! `serde_yaml` values carry no locations, so the manifest text is indexed
//! separately: every mapping key and sequence item gets a slash-joined path
//! (`dependencies/0/license`) mapped to the 1-based line and column of the
//! key and of its value. Block collections are indexed line by line; a flow
//! collection (`[a, b]`, `{k: v}`) is scanned to its closing bracket, across
//! lines if needed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::SourcePosition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Marks {
    key: Option<(usize, usize)>,
    value: Option<(usize, usize)>,
}

/// Open block collection while indexing.
struct Frame {
    indent: usize,
    path: String,
    seq: bool,
    next_index: usize,
}

/// Key and value positions of one manifest source, by path.
#[derive(Debug, Default)]
pub struct PositionIndex {
    source_name: String,
    marks: HashMap<String, Marks>,
}

pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}/{segment}")
    }
}

impl PositionIndex {
    pub fn build(source_name: impl Into<String>, text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let mut builder = Builder {
            index: PositionIndex {
                source_name: source_name.into(),
                marks: HashMap::new(),
            },
            text,
            line_starts,
            stack: Vec::new(),
            pending: Some(String::new()),
            block_scalar: None,
            resume_at: 0,
        };

        for (i, raw) in text.lines().enumerate() {
            let start = builder.line_starts[i];
            // Still inside a flow collection opened on an earlier line.
            if start < builder.resume_at {
                continue;
            }
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            let content = raw[indent..].trim_end();

            if let Some(owner_indent) = builder.block_scalar {
                if content.is_empty() || indent > owner_indent {
                    continue;
                }
                builder.block_scalar = None;
            }
            if content.is_empty() || content.starts_with('#') || content == "---" || content == "..." {
                continue;
            }
            builder.place(i + 1, start, indent, content);
        }

        builder.index
    }

    pub fn file_position(&self) -> SourcePosition {
        SourcePosition::new(1, 1, &self.source_name)
    }

    pub fn key_position(&self, path: &str) -> Option<SourcePosition> {
        let (line, column) = self.marks.get(path)?.key?;
        Some(SourcePosition::new(line, column, &self.source_name))
    }

    pub fn value_position(&self, path: &str) -> Option<SourcePosition> {
        let (line, column) = self.marks.get(path)?.value?;
        Some(SourcePosition::new(line, column, &self.source_name))
    }
}

struct Builder<'a> {
    index: PositionIndex,
    text: &'a str,
    /// Byte offset of each line's first character.
    line_starts: Vec<usize>,
    stack: Vec<Frame>,
    /// Path of a key or item whose value starts on a later line.
    pending: Option<String>,
    /// Indent of the key owning a `|` or `>` scalar being skipped.
    block_scalar: Option<usize>,
    /// Byte offset just past the last scanned flow collection.
    resume_at: usize,
}

impl Builder<'_> {
    fn place(&mut self, line: usize, line_start: usize, indent: usize, content: &str) {
        let mut col = indent;
        let mut rest = content;

        loop {
            let is_item = rest == "-" || rest.starts_with("- ");
            let opens = match (&self.pending, self.stack.last()) {
                (Some(_), None) => true,
                (Some(_), Some(top)) => {
                    col > top.indent || (col == top.indent && is_item && !top.seq)
                }
                (None, _) => false,
            };

            if opens {
                let path = self.pending.take().unwrap_or_default();
                self.index
                    .marks
                    .entry(path.clone())
                    .or_default()
                    .value
                    .get_or_insert((line, col + 1));
                self.stack.push(Frame {
                    indent: col,
                    path,
                    seq: is_item,
                    next_index: 0,
                });
            } else {
                self.pending = None;
                while self.stack.last().is_some_and(|top| top.indent > col) {
                    self.stack.pop();
                }
                // A sequence written at its parent key's indent ends at the next key.
                if self
                    .stack
                    .last()
                    .is_some_and(|top| top.indent == col && top.seq && !is_item)
                {
                    self.stack.pop();
                }
            }

            let Some(top) = self.stack.last_mut() else {
                return;
            };
            if top.indent != col || top.seq != is_item {
                return;
            }

            if top.seq {
                let item_path = join_path(&top.path, &top.next_index.to_string());
                top.next_index += 1;

                let after_dash = &rest[1..];
                let item = after_dash.trim_start();
                let item_col = col + 1 + (after_dash.len() - item.len());
                if item.is_empty() {
                    self.pending = Some(item_path);
                    return;
                }

                self.index.marks.entry(item_path.clone()).or_default().value =
                    Some((line, item_col + 1));
                if starts_flow(item) {
                    self.flow(line_start + item_col, &item_path);
                    return;
                }

                let nested = item == "-" || item.starts_with("- ") || split_key(item).is_some();
                if !nested {
                    return;
                }
                self.pending = Some(item_path);
                col = item_col;
                rest = item;
                continue;
            }

            if starts_flow(rest) {
                let path = top.path.clone();
                self.flow(line_start + col, &path);
                return;
            }
            let Some((key, value_offset)) = split_key(rest) else {
                return;
            };
            let key_path = join_path(&top.path, key);
            let marks = self.index.marks.entry(key_path.clone()).or_default();
            marks.key = Some((line, col + 1));
            match value_offset {
                Some(offset) => {
                    marks.value = Some((line, col + offset + 1));
                    if rest[offset..].starts_with(['|', '>']) {
                        self.block_scalar = Some(col);
                    } else if starts_flow(&rest[offset..]) {
                        self.flow(line_start + col + offset, &key_path);
                    }
                }
                None => self.pending = Some(key_path),
            }
            return;
        }
    }

    /// Indexes the flow collection starting at byte `offset` as `path`.
    fn flow(&mut self, offset: usize, path: &str) {
        let mut flow = FlowScanner {
            text: self.text,
            pos: offset,
            line_starts: &self.line_starts,
            marks: &mut self.index.marks,
        };
        flow.node(path);
        self.resume_at = flow.pos;
    }
}

fn starts_flow(s: &str) -> bool {
    s.starts_with(['[', '{'])
}

/// Character-level scanner for one flow collection and everything nested in it.
struct FlowScanner<'a> {
    text: &'a str,
    pos: usize,
    line_starts: &'a [usize],
    marks: &'a mut HashMap<String, Marks>,
}

impl FlowScanner<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// 1-based line and column of the cursor.
    fn mark(&self) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= self.pos);
        (line, self.pos - self.line_starts[line - 1] + 1)
    }

    /// Skips whitespace, line breaks and comments.
    fn skip_space(&mut self) {
        while let Some(c) = self.peek() {
            if c == '#' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                return;
            }
        }
    }

    fn node(&mut self, path: &str) {
        let before = self.pos;
        match self.peek() {
            Some('[') => self.sequence(path),
            Some('{') => self.mapping(path),
            _ => {
                self.scalar();
            }
        }
        if self.pos == before {
            self.bump();
        }
    }

    fn sequence(&mut self, path: &str) {
        self.bump();
        let mut next_index = 0;
        loop {
            self.skip_space();
            match self.peek() {
                None => return,
                Some(']') => {
                    self.bump();
                    return;
                }
                Some(',') => self.bump(),
                Some(_) => {
                    let item_path = join_path(path, &next_index.to_string());
                    next_index += 1;
                    self.marks.entry(item_path.clone()).or_default().value = Some(self.mark());
                    self.node(&item_path);
                }
            }
        }
    }

    fn mapping(&mut self, path: &str) {
        self.bump();
        loop {
            self.skip_space();
            match self.peek() {
                None => return,
                Some('}') => {
                    self.bump();
                    return;
                }
                Some(',') => self.bump(),
                Some(_) => {
                    let key_mark = self.mark();
                    let key_path = join_path(path, &self.scalar());
                    self.marks.entry(key_path.clone()).or_default().key = Some(key_mark);

                    self.skip_space();
                    if self.peek() != Some(':') {
                        continue;
                    }
                    self.bump();
                    self.skip_space();
                    if matches!(self.peek(), None | Some(',' | '}')) {
                        continue;
                    }
                    self.marks.entry(key_path.clone()).or_default().value = Some(self.mark());
                    self.node(&key_path);
                }
            }
        }
    }

    /// Reads a scalar and returns its text.
    fn scalar(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.quoted(quote),
            Some(',' | '[' | ']' | '{' | '}') => {
                self.bump();
                String::new()
            }
            _ => self.plain(),
        }
    }

    fn quoted(&mut self, quote: char) -> String {
        self.bump();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            self.bump();
            match c {
                '\\' if quote == '"' => {
                    if let Some(escaped) = self.peek() {
                        self.bump();
                        text.push(escaped);
                    }
                }
                '\'' if quote == '\'' && self.peek() == Some('\'') => {
                    self.bump();
                    text.push('\'');
                }
                c if c == quote => break,
                c => text.push(c),
            }
        }
        text
    }

    /// A plain scalar ends at a flow indicator, at `: `, or at a ` #` comment.
    fn plain(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let rest = &self.text[self.pos + c.len_utf8()..];
            let ends = match c {
                ',' | '[' | ']' | '{' | '}' => true,
                ':' => rest
                    .chars()
                    .next()
                    .map_or(true, |next| next.is_whitespace() || ",[]{}".contains(next)),
                '#' => self.text[..self.pos].ends_with(char::is_whitespace),
                _ => false,
            };
            if ends {
                break;
            }
            self.bump();
        }
        self.text[start..self.pos]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split `key: value` into the key and the byte offset of the value, if any.
fn split_key(s: &str) -> Option<(&str, Option<usize>)> {
    if s.starts_with(['{', '[', '#']) {
        return None;
    }

    let (key, colon) = match s.chars().next() {
        Some(q @ ('"' | '\'')) => {
            let close = s[1..].find(q)? + 1;
            if !s[close + 1..].starts_with(':') {
                return None;
            }
            (&s[1..close], close + 1)
        }
        _ => {
            let colon = s
                .match_indices(':')
                .map(|(i, _)| i)
                .find(|&i| s[i + 1..].is_empty() || s[i + 1..].starts_with(' '))?;
            (s[..colon].trim_end(), colon)
        }
    };

    let after = &s[colon + 1..];
    let value = after.trim_start();
    let offset = if value.is_empty() || value.starts_with('#') {
        None
    } else {
        Some(colon + 1 + (after.len() - value.len()))
    };
    Some((key, offset))
}

/// Where a manifest node sits inside its source, if it came from one.
#[derive(Debug, Clone, Default)]
pub struct Location {
    index: Option<Arc<PositionIndex>>,
    path: String,
}

impl Location {
    pub fn new(index: Arc<PositionIndex>) -> Self {
        Self {
            index: Some(index),
            path: String::new(),
        }
    }

    pub fn child(&self, segment: &str) -> Self {
        Self {
            index: self.index.clone(),
            path: join_path(&self.path, segment),
        }
    }

    pub fn file_position(&self) -> Option<SourcePosition> {
        self.index.as_ref().map(|index| index.file_position())
    }

    pub fn key_position(&self, key: &str) -> Option<SourcePosition> {
        self.index.as_ref()?.key_position(&join_path(&self.path, key))
    }

    pub fn value_position(&self, key: &str) -> Option<SourcePosition> {
        self.index.as_ref()?.value_position(&join_path(&self.path, key))
    }

    pub fn item_position(&self, key: &str, idx: usize) -> Option<SourcePosition> {
        self.value_position(&join_path(key, &idx.to_string()))
    }

    /// Position of the node itself: its item position, or the top of its file.
    pub fn position(&self) -> Option<SourcePosition> {
        if self.path.is_empty() {
            self.file_position()
        } else {
            let index = self.index.as_ref()?;
            index.value_position(&self.path)
        }
    }
}

//! Source submissions and automatic wrapping of bare snippets.
//!
//! A snippet may be a complete module or just a list of instructions. Bare
//! snippets are wrapped in a synthetic module: top-level fields such as
//! `(data ...)` or `(func ...)` are hoisted to module scope, the standard
//! `console` imports and an exported memory are added, and the remaining
//! text becomes the body of an exported `main` function.
//!
//! Wrapping moves text around, so it also produces a [`SourceMap`] that
//! maps positions in the compiled text back to the submitted text.

use crate::host_functions::CONSOLE_FUNCTIONS;
use regex::Regex;
use snipbox_core::Location;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::LazyLock;

static ENTRY_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(\s*export\s+"(?:main|_start)""#).expect("valid regex")
});

static START_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*start\s").expect("valid regex"));

static MODULE_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\s*module\b").expect("valid regex"));

static MEMORY_EXPORTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\(\s*export\s+"memory"\s*(?:\)|\(\s*memory\b)"#).expect("valid regex")
});

static FUNC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*func\s+(\$[^\s()]+)").expect("valid regex"));

/// Module fields that are hoisted out of a bare snippet's body.
const HOISTED_FIELDS: &[&str] = &[
    "data", "elem", "export", "func", "global", "import", "memory", "rec", "table", "tag", "type",
];

/// Name of the synthetic entry point.
pub const SYNTHETIC_ENTRY: &str = "main";

/// Submitted source text plus what its shape tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSubmission {
    text: String,
    defines_entry: bool,
    is_module: bool,
    has_start: bool,
}

impl SourceSubmission {
    /// Inspects `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let stripped = strip_comments(&text);
        let trimmed = stripped.trim_start();
        Self {
            defines_entry: ENTRY_EXPORT.is_match(&stripped) || START_FIELD.is_match(&stripped),
            is_module: MODULE_FORM.is_match(trimmed),
            has_start: START_FIELD.is_match(&stripped),
            text,
        }
    }

    /// The submitted text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the text exports `main`/`_start` or declares a start function.
    #[must_use]
    pub const fn defines_entry(&self) -> bool {
        self.defines_entry
    }

    /// Whether the text is a complete `(module ...)` form.
    #[must_use]
    pub const fn is_module(&self) -> bool {
        self.is_module
    }

    /// Whether the text declares a start function.
    #[must_use]
    pub const fn has_start(&self) -> bool {
        self.has_start
    }

    /// Whether compiling needs the synthetic wrapper.
    #[must_use]
    pub const fn needs_wrapping(&self) -> bool {
        !self.defines_entry && !self.is_module
    }
}

/// Maps compiled-text positions back to the submitted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMap {
    /// Compiled text is the submitted text.
    Identity,
    /// Per compiled line: where it came from, or `None` for wrapper lines.
    Lines(Vec<Option<(u32, u32)>>),
}

impl SourceMap {
    /// Maps a 1-based location; wrapper positions map to `None`.
    #[must_use]
    pub fn resolve(&self, location: Location) -> Option<Location> {
        match self {
            Self::Identity => Some(location),
            Self::Lines(lines) => {
                let index = usize::try_from(location.line.checked_sub(1)?).ok()?;
                let (line, shift) = (*lines.get(index)?)?;
                Some(Location::new(line, location.column + shift))
            }
        }
    }
}

/// Compiled text produced from a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    /// Text handed to the assembler
    pub text: String,
    /// Mapping back to the submission
    pub map: SourceMap,
    /// Whether the synthetic wrapper was applied
    pub wrapped: bool,
}

/// Produces the text to compile for `submission`.
#[must_use]
pub fn prepare(submission: &SourceSubmission) -> PreparedSource {
    if !submission.needs_wrapping() {
        return PreparedSource {
            text: submission.text.clone(),
            map: SourceMap::Identity,
            wrapped: false,
        };
    }

    let text = submission.text();
    let index = LineIndex::new(text);
    let (imports, blanked) = strip_import_lines(text, &index);
    let forms = top_level_forms(&blanked);

    let mut hoisted_imports = Vec::new();
    let mut fields = Vec::new();
    let mut body = Vec::new();
    let mut cursor = 0;
    for form in &forms {
        if !HOISTED_FIELDS.contains(&form.keyword.as_str()) {
            continue;
        }
        body.push(index.piece(&blanked, cursor, form.start));
        let piece = index.piece(&blanked, form.start, form.end);
        if form.keyword == "import" {
            hoisted_imports.push(piece);
        } else {
            fields.push(piece);
        }
        cursor = form.end;
    }
    body.push(index.piece(&blanked, cursor, blanked.len()));

    let defines_memory = forms.iter().any(|f| f.keyword == "memory");
    let standard_ids: HashSet<String> = CONSOLE_FUNCTIONS
        .iter()
        .map(|f| format!("${}", f.name))
        .collect();

    let mut out = WrappedBuilder::default();
    out.synthetic("(module");
    for function in CONSOLE_FUNCTIONS {
        out.synthetic(&format!("  {}", function.import_decl()));
    }
    for import in &imports {
        let redeclares = FUNC_ID
            .captures(&import.text)
            .and_then(|c| c.get(1))
            .is_some_and(|id| standard_ids.contains(id.as_str()));
        if redeclares {
            tracing::debug!(line = import.line, "dropping import that shadows a console import");
        } else {
            out.piece(import);
        }
    }
    for import in &hoisted_imports {
        out.piece(import);
    }
    if !defines_memory {
        out.synthetic("  (memory (export \"memory\") 1)");
    }
    for field in &fields {
        out.piece(field);
    }
    if defines_memory && !MEMORY_EXPORTED.is_match(&strip_comments(text)) {
        out.synthetic("  (export \"memory\" (memory 0))");
    }
    out.synthetic(&format!(
        "  (func ${SYNTHETIC_ENTRY} (export \"{SYNTHETIC_ENTRY}\")"
    ));
    for piece in &body {
        out.piece(piece);
    }
    out.synthetic("  )");
    out.synthetic(")");

    PreparedSource {
        text: out.text,
        map: SourceMap::Lines(out.origins),
        wrapped: true,
    }
}

/// A contiguous slice of the submitted text and where it started.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Piece {
    text: String,
    line: u32,
    column: u32,
}

#[derive(Debug, Default)]
struct WrappedBuilder {
    text: String,
    origins: Vec<Option<(u32, u32)>>,
}

impl WrappedBuilder {
    fn synthetic(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.origins.push(None);
    }

    fn piece(&mut self, piece: &Piece) {
        if piece.text.trim().is_empty() {
            return;
        }
        for (i, line) in piece.text.split('\n').enumerate() {
            let offset = u32::try_from(i).unwrap_or(u32::MAX);
            let shift = if i == 0 { piece.column - 1 } else { 0 };
            let _ = writeln!(self.text, "{line}");
            self.origins
                .push(Some((piece.line.saturating_add(offset), shift)));
        }
    }
}

/// Byte offset to 1-based line/column conversion over the submitted text.
#[derive(Debug)]
struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let start = self.starts.get(line).copied().unwrap_or_default();
        let column = self.text.get(start..offset).map_or(0, |s| s.chars().count());
        (
            u32::try_from(line + 1).unwrap_or(u32::MAX),
            u32::try_from(column + 1).unwrap_or(u32::MAX),
        )
    }

    /// Cuts `start..end` out of `content`, which has the same layout as the submission.
    fn piece(&self, content: &str, start: usize, end: usize) -> Piece {
        let (line, column) = self.position(start);
        Piece {
            text: content.get(start..end).unwrap_or_default().to_string(),
            line,
            column,
        }
    }
}

/// Removes single-line top-level imports, replacing them with blank space.
///
/// Only lines that start with `(import` and whose parentheses balance on
/// that line are taken. Imports spread over several lines are left alone
/// and picked up later as hoisted fields.
fn strip_import_lines(text: &str, index: &LineIndex) -> (Vec<Piece>, String) {
    let mut imports = Vec::new();
    let mut blanked = String::with_capacity(text.len());
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        if trimmed.starts_with("(import") && paren_balance(content) == 0 {
            let indent = content.len() - trimmed.len();
            imports.push(index.piece(text, offset + indent, offset + content.len()));
            blank_into(&mut blanked, line);
        } else {
            blanked.push_str(line);
        }
        offset += line.len();
    }

    (imports, blanked)
}

fn paren_balance(line: &str) -> i32 {
    let mut depth = 0;
    let mut scanner = Scanner::new(line);
    while let Some((_, token)) = scanner.next_token() {
        match token {
            Token::Open => depth += 1,
            Token::Close => depth -= 1,
            Token::Other => {}
        }
    }
    depth
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Form {
    start: usize,
    end: usize,
    keyword: String,
}

/// Finds every balanced top-level `( ... )` form and its head keyword.
fn top_level_forms(text: &str) -> Vec<Form> {
    let mut forms = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<usize> = None;
    let mut scanner = Scanner::new(text);

    while let Some((offset, token)) = scanner.next_token() {
        match token {
            Token::Open => {
                if depth == 0 {
                    open = Some(offset);
                }
                depth += 1;
            }
            Token::Close if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(start) = open.take()
                {
                    let keyword = text[start + 1..]
                        .trim_start()
                        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    forms.push(Form {
                        start,
                        end: offset + 1,
                        keyword,
                    });
                }
            }
            Token::Close | Token::Other => {}
        }
    }
    forms
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Other,
}

/// Paren scanner that skips strings, line comments, and nested block comments.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn next_token(&mut self) -> Option<(usize, Token)> {
        loop {
            let start = self.pos;
            let byte = self.peek(0)?;
            match (byte, self.peek(1)) {
                (b';', Some(b';')) => {
                    while let Some(b) = self.peek(0) {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                (b'(', Some(b';')) => self.skip_block_comment(),
                (b'"', _) => {
                    self.pos += 1;
                    while let Some(b) = self.peek(0) {
                        self.pos += 1;
                        match b {
                            b'\\' => self.pos += 1,
                            b'"' => break,
                            _ => {}
                        }
                    }
                    while self.pos < self.bytes.len() && !is_char_start(self.bytes[self.pos]) {
                        self.pos += 1;
                    }
                    self.pos = self.pos.min(self.bytes.len());
                    return Some((start, Token::Other));
                }
                (b'(', _) => {
                    self.pos += 1;
                    return Some((start, Token::Open));
                }
                (b')', _) => {
                    self.pos += 1;
                    return Some((start, Token::Close));
                }
                _ => {
                    self.pos += utf8_width(byte);
                    self.pos = self.pos.min(self.bytes.len());
                    return Some((start, Token::Other));
                }
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let mut depth = 0usize;
        while let Some(b) = self.peek(0) {
            match (b, self.peek(1)) {
                (b'(', Some(b';')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (b';', Some(b')')) => {
                    depth = depth.saturating_sub(1);
                    self.pos += 2;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }
}

const fn utf8_width(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

const fn is_char_start(byte: u8) -> bool {
    byte & 0xC0 != 0x80
}

/// Replaces comments with spaces so shape detection ignores commented-out code.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut scanner = Scanner::new(text);
    let mut last = 0;
    while let Some((offset, _)) = scanner.next_token() {
        blank_into(&mut out, text.get(last..offset).unwrap_or_default());
        out.push_str(text.get(offset..scanner.pos).unwrap_or_default());
        last = scanner.pos;
    }
    blank_into(&mut out, text.get(last..).unwrap_or_default());
    out
}

/// Appends `text` with every character except line breaks turned into
/// spaces, keeping byte offsets unchanged.
fn blank_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            out.push(c);
        } else {
            out.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    }
}

//! Streaming statement segmenter for MySQL dump files.
//!
//! Splits a byte stream into top-level statements on `;` outside quoted
//! spans, backtick identifiers and comments. Leading `--` and `/* */`
//! comments become statements of their own; conditional `/*! ... */`
//! comments run to their terminating `;`.

mod mysql_insert;
mod statement;
pub mod values;

pub use mysql_insert::{parse_insert, InsertValues};
pub use statement::{encoding_note, DumpDocument, OtherStatement, ParsedStatement, Statement};
pub use values::{
    parse_literal, parse_rows, MalformedKind, MalformedLiteral, ParsedRows, Row, Value,
};

use memchr::{memchr, memchr2};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::io::{BufRead, BufReader, Read};

pub const SMALL_BUFFER_SIZE: usize = 64 * 1024;
pub const MEDIUM_BUFFER_SIZE: usize = 256 * 1024;

/// SQL dialects known to the command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    MySql,
    Postgres,
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            _ => Err(format!(
                "Unknown dialect: {}. Valid options: mysql, postgres",
                s
            )),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::MySql => write!(f, "mysql"),
            SqlDialect::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Unknown,
    CreateTable,
    Insert,
    AlterTable,
    DropTable,
    /// `SET ...` or `USE ...` session statement
    Set,
    /// `LOCK TABLES` / `UNLOCK TABLES`
    LockTables,
    /// Comment, including conditional `/*! ... */` comments
    Comment,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Unknown => "unknown",
            StatementType::CreateTable => "create_table",
            StatementType::Insert => "insert",
            StatementType::AlterTable => "alter_table",
            StatementType::DropTable => "drop_table",
            StatementType::Set => "set",
            StatementType::LockTables => "lock_tables",
            StatementType::Comment => "comment",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?").unwrap()
});

static INSERT_INTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^INSERT\s+(?:(?:LOW_PRIORITY|DELAYED|HIGH_PRIORITY)\s+)?(?:IGNORE\s+)?INTO\s+",
    )
    .unwrap()
});

static ALTER_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ALTER\s+(?:ONLINE\s+)?(?:IGNORE\s+)?TABLE\s+").unwrap());

static DROP_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^DROP\s+(?:TEMPORARY\s+)?TABLES?\s+(?:IF\s+EXISTS\s+)?").unwrap()
});

static SESSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:SET|USE)\b").unwrap());

static LOCK_TABLES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:UN)?LOCK\s+TABLES?\b").unwrap());

/// A statement as cut from the input, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// Statement bytes with leading whitespace removed, terminator included
    pub bytes: Vec<u8>,
    /// Zero-based position in the input
    pub index: usize,
    /// Byte offset of the first significant byte
    pub offset: u64,
    /// False when input ended before the statement terminator
    pub terminated: bool,
}

impl RawStatement {
    /// Decode as UTF-8, falling back to a byte-preserving Latin-1 mapping.
    /// The flag reports whether the fallback was used.
    pub fn decode(&self) -> (Cow<'_, str>, bool) {
        decode_bytes(&self.bytes)
    }
}

/// How a statement's bytes were turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Byte-per-char fallback; every char is at most U+00FF
    Latin1,
}

impl TextEncoding {
    pub fn from_fallback(fallback: bool) -> Self {
        if fallback {
            TextEncoding::Latin1
        } else {
            TextEncoding::Utf8
        }
    }

    /// The input bytes `text` was decoded from
    pub fn source_bytes(self, text: &str) -> Cow<'_, [u8]> {
        match self {
            TextEncoding::Utf8 => Cow::Borrowed(text.as_bytes()),
            TextEncoding::Latin1 => Cow::Owned(text.chars().map(|c| c as u32 as u8).collect()),
        }
    }
}

pub fn decode_bytes(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (Cow::Borrowed(s), false),
        Err(_) => (Cow::Owned(bytes.iter().map(|&b| b as char).collect()), true),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    Normal,
    SingleQuote,
    DoubleQuote,
    Backtick,
    LineComment,
    BlockComment,
}

/// Byte-level lexer state for one statement
#[derive(Debug, Default)]
struct Scanner {
    state: ScanState,
    escaped: bool,
    prev: u8,
    /// Previous byte was `-` or `/` and may open a comment
    opener: bool,
    /// Saw `--`; a following blank makes it a line comment
    pending_dash: bool,
    /// The pending opener was the first significant byte of the statement
    opener_leading: bool,
    /// Current comment started the statement
    comment_leading: bool,
    block_first: bool,
    significant: bool,
}

impl Scanner {
    /// Bytes that can be skipped without changing state
    #[inline]
    fn skip_len(&self, buf: &[u8]) -> Option<usize> {
        match self.state {
            ScanState::SingleQuote if !self.escaped => {
                Some(memchr2(b'\\', b'\'', buf).unwrap_or(buf.len()))
            }
            ScanState::DoubleQuote if !self.escaped => {
                Some(memchr2(b'\\', b'"', buf).unwrap_or(buf.len()))
            }
            ScanState::LineComment => Some(memchr(b'\n', buf).unwrap_or(buf.len())),
            _ => None,
        }
    }

    /// Feed one byte; true when it ends the statement.
    fn step(&mut self, b: u8) -> bool {
        let prev = std::mem::replace(&mut self.prev, b);
        match self.state {
            ScanState::SingleQuote | ScanState::DoubleQuote => {
                let quote = if self.state == ScanState::SingleQuote {
                    b'\''
                } else {
                    b'"'
                };
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == quote {
                    self.state = ScanState::Normal;
                }
                false
            }
            ScanState::Backtick => {
                if b == b'`' {
                    self.state = ScanState::Normal;
                }
                false
            }
            ScanState::LineComment => {
                if b == b'\n' {
                    self.state = ScanState::Normal;
                    return self.comment_leading;
                }
                false
            }
            ScanState::BlockComment => {
                if std::mem::take(&mut self.block_first) && b == b'!' {
                    self.comment_leading = false;
                    self.significant = true;
                }
                if b == b'/' && prev == b'*' {
                    self.state = ScanState::Normal;
                    return self.comment_leading;
                }
                false
            }
            ScanState::Normal => self.step_normal(b, prev),
        }
    }

    fn step_normal(&mut self, b: u8, prev: u8) -> bool {
        if std::mem::take(&mut self.pending_dash) {
            match b {
                b' ' | b'\t' | b'\r' => {
                    self.state = ScanState::LineComment;
                    self.comment_leading = self.opener_leading;
                    return false;
                }
                // bare "--" line
                b'\n' => return self.opener_leading,
                _ => self.significant = true,
            }
        }

        if std::mem::take(&mut self.opener) {
            if b == b'-' && prev == b'-' {
                self.pending_dash = true;
                return false;
            }
            if b == b'*' && prev == b'/' {
                self.state = ScanState::BlockComment;
                self.block_first = true;
                self.comment_leading = self.opener_leading;
                self.prev = 0;
                return false;
            }
            self.significant = true;
        }

        match b {
            b'\'' => {
                self.state = ScanState::SingleQuote;
                self.significant = true;
            }
            b'"' => {
                self.state = ScanState::DoubleQuote;
                self.significant = true;
            }
            b'`' => {
                self.state = ScanState::Backtick;
                self.significant = true;
            }
            b';' => return true,
            b'-' | b'/' => {
                self.opener = true;
                self.opener_leading = !self.significant;
            }
            _ if b.is_ascii_whitespace() => {}
            _ => self.significant = true,
        }
        false
    }

    /// Whether the text scanned so far is complete when input ends
    fn complete_at_eof(&self) -> bool {
        match self.state {
            ScanState::LineComment => self.comment_leading,
            ScanState::Normal => self.pending_dash && self.opener_leading,
            _ => false,
        }
    }
}

pub struct Parser<R: Read> {
    reader: BufReader<R>,
    stmt_buffer: Vec<u8>,
    position: u64,
    index: usize,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R, buffer_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, reader),
            stmt_buffer: Vec::with_capacity(32 * 1024),
            position: 0,
            index: 0,
        }
    }

    /// Read the next statement. Memory use is bounded by the largest statement.
    pub fn read_statement(&mut self) -> std::io::Result<Option<RawStatement>> {
        self.stmt_buffer.clear();
        let start = self.position;
        let mut scan = Scanner::default();

        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                if self.stmt_buffer.iter().all(|b| b.is_ascii_whitespace()) {
                    self.stmt_buffer.clear();
                    return Ok(None);
                }
                let terminated = scan.complete_at_eof();
                return Ok(Some(self.take_statement(start, terminated)));
            }

            let mut i = 0;
            let mut found_terminator = false;
            while i < buf.len() {
                if let Some(skip) = scan.skip_len(&buf[i..]) {
                    i += skip;
                    if i >= buf.len() {
                        break;
                    }
                }
                let b = buf[i];
                i += 1;
                if scan.step(b) {
                    found_terminator = true;
                    break;
                }
            }

            self.stmt_buffer.extend_from_slice(&buf[..i]);
            self.reader.consume(i);
            self.position += i as u64;

            if found_terminator {
                return Ok(Some(self.take_statement(start, true)));
            }
        }
    }

    fn take_statement(&mut self, start: u64, terminated: bool) -> RawStatement {
        let mut bytes = std::mem::take(&mut self.stmt_buffer);
        let lead = bytes
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        bytes.drain(..lead);

        let stmt = RawStatement {
            bytes,
            index: self.index,
            offset: start + lead as u64,
            terminated,
        };
        self.index += 1;
        stmt
    }

    /// Total bytes consumed from the underlying reader
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = std::io::Result<RawStatement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_statement().transpose()
    }
}

/// Classify a statement and extract its table name (empty when not applicable).
pub fn parse_statement(stmt: &str) -> (StatementType, String) {
    let body = strip_leading_comments(stmt);

    if body.is_empty() || body.starts_with("/*!") {
        return (StatementType::Comment, String::new());
    }

    if let Some(m) = CREATE_TABLE_RE.find(body) {
        let name = extract_table_name(&body[m.end()..]).unwrap_or_default();
        return (StatementType::CreateTable, name);
    }

    if let Some(m) = INSERT_INTO_RE.find(body) {
        let name = extract_table_name(&body[m.end()..]).unwrap_or_default();
        return (StatementType::Insert, name);
    }

    if let Some(m) = ALTER_TABLE_RE.find(body) {
        let name = extract_table_name(&body[m.end()..]).unwrap_or_default();
        return (StatementType::AlterTable, name);
    }

    if let Some(m) = DROP_TABLE_RE.find(body) {
        let name = extract_table_name(&body[m.end()..]).unwrap_or_default();
        return (StatementType::DropTable, name);
    }

    if LOCK_TABLES_RE.is_match(body) {
        return (StatementType::LockTables, String::new());
    }

    if SESSION_RE.is_match(body) {
        return (StatementType::Set, String::new());
    }

    (StatementType::Unknown, String::new())
}

/// Skip leading `--` and `/* */` comments (conditional comments are kept).
pub fn strip_leading_comments(stmt: &str) -> &str {
    let mut rest = stmt.trim_start();
    loop {
        if rest.starts_with("--") {
            match rest.find('\n') {
                Some(pos) => rest = rest[pos + 1..].trim_start(),
                None => return "",
            }
        } else if rest.starts_with("/*") && !rest.starts_with("/*!") {
            match rest[2..].find("*/") {
                Some(pos) => rest = rest[pos + 4..].trim_start(),
                None => return "",
            }
        } else {
            return rest;
        }
    }
}

/// Byte length of the prefix matched by the table-statement keyword regexes,
/// measured from the start of `body`.
pub fn table_keyword_len(body: &str, kind: StatementType) -> Option<usize> {
    let re = match kind {
        StatementType::CreateTable => &*CREATE_TABLE_RE,
        StatementType::Insert => &*INSERT_INTO_RE,
        StatementType::AlterTable => &*ALTER_TABLE_RE,
        StatementType::DropTable => &*DROP_TABLE_RE,
        _ => return None,
    };
    re.find(body).map(|m| m.end())
}

/// Read a possibly qualified table name (`db`.`t`, "t", t); returns the last part.
pub fn extract_table_name(s: &str) -> Option<String> {
    let mut rest = s.trim_start();
    let name = read_qualified_identifier(&mut rest)?;
    Some(name)
}

/// Read a possibly qualified identifier, advancing `rest` past it.
pub fn read_qualified_identifier(rest: &mut &str) -> Option<String> {
    let mut name = read_identifier(rest)?;
    loop {
        let after = rest.trim_start();
        match after.strip_prefix('.') {
            Some(r) => {
                *rest = r.trim_start();
                name = read_identifier(rest)?;
            }
            None => return Some(name),
        }
    }
}

/// Read one identifier (backtick, double-quoted or bare), advancing `rest`.
pub fn read_identifier(rest: &mut &str) -> Option<String> {
    let s = *rest;
    let first = s.chars().next()?;

    if first == '`' || first == '"' {
        let mut out = String::new();
        let mut iter = s.char_indices().skip(1).peekable();
        while let Some((i, c)) = iter.next() {
            if c == first {
                if matches!(iter.peek(), Some(&(_, n)) if n == first) {
                    iter.next();
                    out.push(first);
                    continue;
                }
                *rest = &s[i + 1..];
                return Some(out);
            }
            out.push(c);
        }
        return None;
    }

    let end = s
        .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ';' | ',' | '.' | '='))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    *rest = &s[end..];
    Some(s[..end].to_string())
}

pub fn determine_buffer_size(file_size: u64) -> usize {
    if file_size > 1024 * 1024 * 1024 {
        MEDIUM_BUFFER_SIZE
    } else {
        SMALL_BUFFER_SIZE
    }
}

//! Parser for parenthesized value lists (`VALUES (..), (..)`).
//!
//! A single-pass character scanner. Quoted spans are unescaped into
//! `Value::Text`; anything else is kept as the trimmed raw token in
//! `Value::Bare` so callers decide how to re-quote it.

use std::fmt;

/// A single parsed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Bare `NULL` keyword (any case)
    Null,
    /// Quoted literal, fully unescaped
    Text(String),
    /// Unquoted token (number, hex literal, function call, ...), trimmed
    Bare(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Content of the value, `None` for NULL
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Null => None,
            Value::Text(s) | Value::Bare(s) => Some(s),
        }
    }
}

/// One parenthesized tuple
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    UnterminatedQuote,
    UnterminatedRow,
}

/// Recoverable parse failure; rows before `offset` were kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLiteral {
    /// Byte offset (within the parsed input) where the open quote or row started
    pub offset: usize,
    pub kind: MalformedKind,
}

impl fmt::Display for MalformedLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MalformedKind::UnterminatedQuote => {
                write!(f, "unterminated quoted literal at byte {}", self.offset)
            }
            MalformedKind::UnterminatedRow => {
                write!(f, "unterminated row at byte {}", self.offset)
            }
        }
    }
}

/// Result of scanning a value list
#[derive(Debug, Default)]
pub struct ParsedRows {
    pub rows: Vec<Row>,
    /// Bytes of input consumed; anything after is a trailing clause
    pub consumed: usize,
    pub error: Option<MalformedLiteral>,
}

/// Accumulator for the value currently being scanned
#[derive(Debug, Default)]
struct ValueBuf {
    raw: String,
    content: String,
    quoted: bool,
    /// Non-whitespace seen outside quotes
    residue: bool,
}

impl ValueBuf {
    fn is_blank(&self) -> bool {
        !self.quoted && self.raw.trim().is_empty()
    }

    fn finish(&mut self) -> Value {
        let buf = std::mem::take(self);
        let raw = buf.raw.trim();
        if buf.quoted && !buf.residue {
            Value::Text(buf.content)
        } else if raw.eq_ignore_ascii_case("NULL") {
            Value::Null
        } else {
            Value::Bare(raw.to_string())
        }
    }
}

#[inline]
fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        // \\, \', \" and anything else stand for themselves
        other => other,
    }
}

/// Parse `(v, v, ...), (v, ...)` starting at the beginning of `input`.
///
/// Scanning stops at the first top-level character that cannot start a
/// row; `consumed` tells the caller where that trailing text begins.
pub fn parse_rows(input: &str) -> ParsedRows {
    let mut out = ParsedRows::default();
    let mut chars = input.char_indices().peekable();

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut quote_start = 0;
    let mut escaped = false;
    let mut row_start = 0;
    let mut row = Row::default();
    let mut value = ValueBuf::default();

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            value.raw.push(c);
            if escaped {
                value.content.push(unescape(c));
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                if let Some(&(_, next)) = chars.peek() {
                    if next == q {
                        chars.next();
                        value.raw.push(next);
                        value.content.push(q);
                        continue;
                    }
                }
                quote = None;
            } else {
                value.content.push(c);
            }
            continue;
        }

        if depth == 0 {
            match c {
                '(' => {
                    depth = 1;
                    row_start = i;
                    row = Row::default();
                    value = ValueBuf::default();
                }
                ',' => {}
                c if c.is_whitespace() => {}
                _ => {
                    out.consumed = i;
                    return out;
                }
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                quote_start = i;
                value.quoted = true;
                value.raw.push(c);
            }
            '(' => {
                depth += 1;
                value.residue = true;
                value.raw.push(c);
            }
            ')' if depth == 1 => {
                if row.values.is_empty() && value.is_blank() {
                    value = ValueBuf::default();
                } else {
                    row.values.push(value.finish());
                }
                out.rows.push(std::mem::take(&mut row));
                depth = 0;
            }
            ')' => {
                depth -= 1;
                value.raw.push(c);
            }
            ',' if depth == 1 => {
                row.values.push(value.finish());
            }
            _ => {
                if !c.is_whitespace() {
                    value.residue = true;
                }
                value.raw.push(c);
            }
        }
    }

    out.consumed = input.len();
    if quote.is_some() {
        out.error = Some(MalformedLiteral {
            offset: quote_start,
            kind: MalformedKind::UnterminatedQuote,
        });
    } else if depth > 0 {
        out.error = Some(MalformedLiteral {
            offset: row_start,
            kind: MalformedKind::UnterminatedRow,
        });
    }
    out
}

/// Parse a single value token (e.g. a column `DEFAULT`) with the same rules.
pub fn parse_literal(token: &str) -> Value {
    let token = token.trim();
    let parsed = parse_rows(&format!("({})", token));
    if parsed.error.is_none() && parsed.rows.len() == 1 {
        if let Some(row) = parsed.rows.into_iter().next() {
            let mut values = row.values;
            if values.len() == 1 {
                if let Some(v) = values.pop() {
                    return v;
                }
            }
        }
    }
    Value::Bare(token.to_string())
}

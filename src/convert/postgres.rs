//! PostgreSQL rendering of translated schemas, rows and pass-through text.

use super::types::{TypeFamily, TypeMapper};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::parser::{parse_literal, InsertValues, Row, TextEncoding, Value};
use crate::schema::{ColumnDefinition, ForeignKeyConstraint, TableSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static NOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:current_timestamp|now|localtimestamp|localtime)(?:\((\d*)\))?$").unwrap()
});

static ZERO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0000-00-00(?:[ T]00:00:00(?:\.0+)?)?$").unwrap());

static INTRODUCER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^_[a-z0-9]+\s*('.*')$").unwrap());

static HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:0x([0-9a-f]*)|x'([0-9a-f]*)')$").unwrap());

static BIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^b'([01]*)'$").unwrap());

/// Quote an identifier for PostgreSQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Standard-conforming string literal (backslashes are literal)
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn is_zero_date(s: &str) -> bool {
    ZERO_DATE_RE.is_match(s.trim())
}

/// Column families of a table, in column order
pub fn column_families(table: &TableSchema) -> Vec<TypeFamily> {
    table
        .columns
        .iter()
        .map(|c| TypeMapper::map(&c.type_token).family)
        .collect()
}

/// Render a CREATE TABLE statement. `inline_fks[i]` decides whether FK `i`
/// is emitted inside the table body.
pub fn render_create_table(
    table: &TableSchema,
    inline_fks: &[bool],
    notes: &mut Vec<Diagnostic>,
) -> String {
    let mut items: Vec<String> = Vec::new();
    let mut serial_pk = false;

    for column in &table.columns {
        let (sql, collapsed) = render_column(table, column, notes);
        serial_pk |= collapsed;
        items.push(sql);
    }

    if let Some(pk) = &table.primary_key {
        if !serial_pk && !pk.columns.is_empty() {
            items.push(format!("PRIMARY KEY ({})", quote_list(&pk.columns)));
        }
    }

    for unique in &table.unique_keys {
        let name = unique_name(&table.name, unique.name.as_deref(), &unique.columns);
        items.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote_ident(&name),
            quote_list(&unique.columns)
        ));
    }

    for (idx, fk) in table.foreign_keys.iter().enumerate() {
        if inline_fks.get(idx).copied().unwrap_or(false) {
            items.push(render_fk(fk));
        }
    }

    for check in &table.checks {
        items.push(backticks_to_double_quotes(check));
    }

    for opaque in &table.opaque {
        items.push(backticks_to_double_quotes(opaque));
    }

    let mut out = String::new();
    let _ = writeln!(out, "CREATE TABLE {} (", quote_ident(&table.name));
    let _ = writeln!(out, "    {}", items.join(",\n    "));
    out.push_str(");");
    out
}

/// Render one column; the flag reports a serial primary key collapsed inline.
fn render_column(
    table: &TableSchema,
    column: &ColumnDefinition,
    notes: &mut Vec<Diagnostic>,
) -> (String, bool) {
    let mapped = TypeMapper::map(&column.type_token);
    let note = |kind, message: String| Diagnostic::new(kind, message).with_table(&table.name);

    let serial = if column.auto_increment {
        TypeMapper::serial_type(&column.type_token)
    } else {
        None
    };

    if column.auto_increment && serial.is_none() {
        notes.push(note(
            DiagnosticKind::UnsupportedClause,
            format!(
                "AUTO_INCREMENT on non-integer column {} dropped",
                column.name
            ),
        ));
    }

    if serial.is_none() {
        if mapped.unmatched {
            notes.push(note(
                DiagnosticKind::UnsupportedTypeToken,
                format!(
                    "type {} of column {} passed through unchanged",
                    column.type_token, column.name
                ),
            ));
        }
        if let Some(reason) = &mapped.lossy {
            notes.push(note(
                DiagnosticKind::LossyConversion,
                format!("column {}: {}", column.name, reason),
            ));
        }
    }

    let mut sql = format!(
        "{} {}",
        quote_ident(&column.name),
        serial.unwrap_or(mapped.sql.as_str())
    );

    // SERIAL implies NOT NULL and its own sequence default
    let mut inline_pk = false;
    if serial.is_some() {
        inline_pk = table.is_single_pk(&column.name);
        if inline_pk {
            sql.push_str(" PRIMARY KEY");
        }
        if let Some(raw) = &column.default {
            notes.push(note(
                DiagnosticKind::LossyConversion,
                format!("DEFAULT {} on serial column {} dropped", raw, column.name),
            ));
        }
    } else {
        let mut nullable = column.nullable;
        if let Some(raw) = &column.default {
            match render_default(raw, mapped.family) {
                Some(default) => {
                    let _ = write!(sql, " DEFAULT {}", default);
                }
                None => {
                    let dropped_not_null = !nullable;
                    nullable = true;
                    notes.push(note(
                        DiagnosticKind::LossyConversion,
                        format!(
                            "zero-date default on {} dropped{}",
                            column.name,
                            if dropped_not_null { " along with NOT NULL" } else { "" }
                        ),
                    ));
                }
            }
        }
        if !nullable {
            sql.push_str(" NOT NULL");
        }
    }

    if column.unique && !inline_pk {
        sql.push_str(" UNIQUE");
    }

    if let Some(on_update) = &column.on_update {
        notes.push(note(
            DiagnosticKind::UnsupportedClause,
            format!("ON UPDATE {} on column {} dropped", on_update, column.name),
        ));
    }

    if !column.extra.is_empty() {
        let extra = column.extra.join(" ");
        notes.push(note(
            DiagnosticKind::UnsupportedClause,
            format!("column {} modifiers passed through: {}", column.name, extra),
        ));
        sql.push(' ');
        sql.push_str(&backticks_to_double_quotes(&extra));
    }

    (sql, inline_pk)
}

/// Translate a column default; `None` means a zero date that must be dropped.
pub fn render_default(raw: &str, family: TypeFamily) -> Option<String> {
    match parse_literal(raw) {
        Value::Null => Some("NULL".to_string()),
        Value::Text(s) => {
            if family == TypeFamily::Temporal && is_zero_date(&s) {
                return None;
            }
            if family == TypeFamily::Boolean {
                if let Some(b) = bool_literal(&s) {
                    return Some(b.to_string());
                }
            }
            Some(quote_literal(&s))
        }
        Value::Bare(token) => {
            if let Some(caps) = NOW_RE.captures(&token) {
                return Some(match caps.get(1).map(|m| m.as_str()) {
                    Some(p) if !p.is_empty() => format!("CURRENT_TIMESTAMP({})", p),
                    _ => "CURRENT_TIMESTAMP".to_string(),
                });
            }
            Some(render_bare(&token, family))
        }
    }
}

/// MySQL booleans are integers; any non-zero number is true.
fn bool_literal(s: &str) -> Option<&'static str> {
    let s = s.trim();
    let digits = s.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(if digits.chars().all(|c| c == '0' || c == '.') {
        "FALSE"
    } else {
        "TRUE"
    })
}

/// Translate one row value for a column of the given family.
/// `encoding` recovers the original bytes of binary values;
/// `zero_dates` counts sentinel dates mapped to NULL.
pub fn render_value(
    value: &Value,
    family: TypeFamily,
    encoding: TextEncoding,
    zero_dates: &mut usize,
) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Text(s) => render_text(s, family, encoding, zero_dates),
        Value::Bare(token) => {
            if let Some(caps) = INTRODUCER_RE.captures(token) {
                let quoted = caps.get(1).map_or("", |m| m.as_str());
                if let Value::Text(s) = parse_literal(quoted) {
                    return render_text(&s, family, encoding, zero_dates);
                }
            }
            render_bare(token, family)
        }
    }
}

fn render_text(
    s: &str,
    family: TypeFamily,
    encoding: TextEncoding,
    zero_dates: &mut usize,
) -> String {
    match family {
        TypeFamily::Temporal if is_zero_date(s) => {
            *zero_dates += 1;
            "NULL".to_string()
        }
        TypeFamily::Binary => bytea_literal(&encoding.source_bytes(s)),
        _ => quote_literal(s),
    }
}

fn render_bare(token: &str, family: TypeFamily) -> String {
    if family == TypeFamily::Boolean {
        if let Some(b) = bool_literal(token) {
            return b.to_string();
        }
    }

    if let Some(caps) = HEX_RE.captures(token) {
        let digits = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        return match family {
            TypeFamily::Binary | TypeFamily::Other => format!("'\\x{}'", digits.to_lowercase()),
            TypeFamily::Text => quote_literal(&String::from_utf8_lossy(&decode_hex(digits))),
            TypeFamily::Integer | TypeFamily::Numeric => hex_to_decimal(digits),
            _ => token.to_string(),
        };
    }

    if let Some(caps) = BIT_RE.captures(token) {
        return format!("B'{}'", caps.get(1).map_or("", |m| m.as_str()));
    }

    backticks_to_double_quotes(token)
}

fn bytea_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 4);
    out.push_str("'\\x");
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out.push('\'');
    out
}

/// Decimal text of an unsigned hex number of any length
fn hex_to_decimal(digits: &str) -> String {
    const LIMB: u64 = 1_000_000_000;
    // base 10^9, least significant first
    let mut limbs: Vec<u64> = vec![0];
    for nibble in digits.chars().filter_map(|c| c.to_digit(16)) {
        let mut carry = u64::from(nibble);
        for limb in limbs.iter_mut() {
            let v = *limb * 16 + carry;
            *limb = v % LIMB;
            carry = v / LIMB;
        }
        if carry > 0 {
            limbs.push(carry);
        }
    }

    let mut out = String::with_capacity(limbs.len() * 9);
    let mut iter = limbs.iter().rev();
    if let Some(top) = iter.next() {
        let _ = write!(out, "{}", top);
    }
    for limb in iter {
        let _ = write!(out, "{:09}", limb);
    }
    out
}

fn decode_hex(digits: &str) -> Vec<u8> {
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    (0..padded.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
        .collect()
}

/// Render a multi-row INSERT. Returns `None` when there are no rows.
pub fn render_insert(
    insert: &InsertValues,
    families: &[TypeFamily],
    zero_dates: &mut usize,
) -> Option<String> {
    if insert.rows.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(64 + insert.rows.len() * 32);
    let _ = write!(out, "INSERT INTO {}", quote_ident(&insert.table));
    if let Some(columns) = &insert.columns {
        let _ = write!(out, " ({})", quote_list(columns));
    }
    out.push_str(" VALUES\n");

    for (i, row) in insert.rows.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        render_row(&mut out, row, families, insert.encoding, zero_dates);
    }
    out.push(';');
    Some(out)
}

fn render_row(
    out: &mut String,
    row: &Row,
    families: &[TypeFamily],
    encoding: TextEncoding,
    zero_dates: &mut usize,
) {
    out.push('(');
    for (i, value) in row.values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let family = families.get(i).copied().unwrap_or(TypeFamily::Other);
        out.push_str(&render_value(value, family, encoding, zero_dates));
    }
    out.push(')');
}

pub fn render_fk(fk: &ForeignKeyConstraint) -> String {
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(&fk.name),
        quote_list(&fk.columns),
        quote_ident(&fk.referenced_table),
        quote_list(&fk.referenced_columns)
    );
    if let Some(action) = &fk.on_delete {
        let _ = write!(sql, " ON DELETE {}", action);
    }
    if let Some(action) = &fk.on_update {
        let _ = write!(sql, " ON UPDATE {}", action);
    }
    sql
}

pub fn render_deferred_fk(fk: &ForeignKeyConstraint) -> String {
    format!("ALTER TABLE {} ADD {};", quote_ident(&fk.table), render_fk(fk))
}

/// Sequence reset after bulk load of a serial column
pub fn render_setval(table: &str, column: &str) -> String {
    format!(
        "SELECT setval(pg_get_serial_sequence({}, {}), COALESCE((SELECT MAX({}) FROM {}), 0) + 1, false);",
        quote_literal(&quote_ident(table)),
        quote_literal(column),
        quote_ident(column),
        quote_ident(table)
    )
}

pub fn render_drop(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE;", quote_ident(table))
}

/// Translate a pass-through statement: conditional comments removed and
/// backtick identifiers requoted. `None` when nothing is left.
pub fn render_other(text: &str) -> Option<String> {
    let stripped = strip_conditional_comments(text);
    let converted = backticks_to_double_quotes(stripped.trim());
    let body = converted.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if body.is_empty() {
        return None;
    }
    Some(format!("{};", body))
}

/// Render a leading comment statement for output
pub fn render_comment(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with("/*!") {
        return None;
    }
    Some(trimmed.to_string())
}

/// Comment out an unterminated tail so the output stays parseable
pub fn render_unterminated(text: &str) -> String {
    let mut out = String::from("-- unterminated statement kept as comment:");
    for line in text.lines() {
        out.push_str("\n-- ");
        out.push_str(line);
    }
    out
}

fn unique_name(table: &str, name: Option<&str>, columns: &[String]) -> String {
    match name {
        Some(n) if n.starts_with(&format!("{}_", table)) => n.to_string(),
        Some(n) => format!("{}_{}", table, n),
        None => format!("{}_{}_key", table, columns.join("_")),
    }
}

/// Convert backticks to double quotes outside string literals.
/// A `"` inside a backtick identifier is doubled.
pub fn backticks_to_double_quotes(stmt: &str) -> String {
    let mut result = String::with_capacity(stmt.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in stmt.chars() {
        match quote {
            Some('`') => {
                if c == '`' {
                    quote = None;
                    result.push('"');
                } else if c == '"' {
                    result.push_str("\"\"");
                } else {
                    result.push(c);
                }
            }
            Some(q) => {
                result.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '`' => {
                    quote = Some('`');
                    result.push('"');
                }
                '\'' | '"' => {
                    quote = Some(c);
                    result.push(c);
                }
                _ => result.push(c),
            },
        }
    }
    result
}

/// Strip MySQL conditional comments /*!40101 ... */
pub fn strip_conditional_comments(stmt: &str) -> String {
    let mut result = String::with_capacity(stmt.len());
    let mut chars = stmt.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            result.push(c);
            if c == '\\' && q != '`' {
                if let Some(n) = chars.next() {
                    result.push(n);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            if chars.peek() == Some(&'!') {
                chars.next();
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            } else {
                result.push_str("/*");
            }
        } else {
            if matches!(c, '\'' | '"' | '`') {
                quote = Some(c);
            }
            result.push(c);
        }
    }
    result
}

//! MySQL DDL parsing for schema extraction.
//!
//! Parses CREATE TABLE bodies into [`TableSchema`] and absorbs the key and
//! constraint clauses of `ALTER TABLE` statements (phpMyAdmin puts all keys
//! in trailing ALTER blocks).

use super::{
    Catalog, ColumnDefinition, ColumnList, ForeignKeyConstraint, PrimaryKey, TableSchema,
    UniqueConstraint,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::parser::{
    parse_literal, read_identifier, read_qualified_identifier, strip_leading_comments,
    table_keyword_len, StatementType,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Identifier as written in MySQL DDL: backtick, double-quoted or bare
const IDENT: &str = r#"(?:`(?:[^`]|``)+`|"(?:[^"]|"")+"|[\w$]+)"#;

static PRIMARY_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:CONSTRAINT(?:\s+({}))?\s+)?PRIMARY\s+KEY\b",
        IDENT
    ))
    .unwrap()
});

static FOREIGN_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:CONSTRAINT(?:\s+({}))?\s+)?FOREIGN\s+KEY\b",
        IDENT
    ))
    .unwrap()
});

static UNIQUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:CONSTRAINT(?:\s+({0}))?\s+)?UNIQUE\b(?:\s+(?:KEY|INDEX))?(?:\s+({0}))?",
        IDENT
    ))
    .unwrap()
});

static INDEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:KEY|INDEX|FULLTEXT|SPATIAL)\b").unwrap());

static CHECK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:CONSTRAINT(?:\s+{})?\s+)?CHECK\s*\(",
        IDENT
    ))
    .unwrap()
});

static REFERENCES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^REFERENCES\s+({0}(?:\s*\.\s*{0})?)\s*\(",
        IDENT
    ))
    .unwrap()
});

static ON_DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bON\s+DELETE\s+(RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .unwrap()
});

static ON_UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bON\s+UPDATE\s+(RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)")
        .unwrap()
});

/// `KEY = value` table option; value may be a quoted string
static TABLE_OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:DEFAULT\s+)?([A-Z_]+(?:\s+SET)?)\s*=?\s*('(?:[^'\\]|\\.|'')*'|[^\s,;]+)")
        .unwrap()
});

static ALTER_ADD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^ADD\s+(.*)$").unwrap());

static ALTER_MODIFY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^MODIFY\s+(?:COLUMN\s+)?(.*)$").unwrap());

static ALTER_AUTO_INCREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^AUTO_INCREMENT\s*=?\s*\d+$").unwrap());

/// Table options with no PostgreSQL meaning, dropped silently
const NOOP_TABLE_OPTIONS: &[&str] = &[
    "engine",
    "type",
    "charset",
    "character set",
    "collate",
    "auto_increment",
    "row_format",
    "comment",
    "key_block_size",
    "pack_keys",
    "checksum",
    "delay_key_write",
    "max_rows",
    "min_rows",
    "avg_row_length",
];

/// Referenced side of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
struct References {
    table: String,
    columns: ColumnList,
    on_delete: Option<String>,
    on_update: Option<String>,
}

/// One classified item of a CREATE TABLE body
#[derive(Debug)]
enum BodyItem {
    PrimaryKey(PrimaryKey),
    ForeignKey(ForeignKeyConstraint),
    Unique(UniqueConstraint),
    Index,
    Check(String),
    Column(ColumnDefinition, Option<References>),
    Opaque(String),
}

/// Result of absorbing an ALTER TABLE statement into the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterOutcome {
    pub table: String,
    /// Number of clauses merged into the table schema
    pub absorbed: usize,
    /// Statement rebuilt from the clauses that were not absorbed
    pub remainder: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a CREATE TABLE statement.
///
/// Returns `None` when the statement has no parenthesized body
/// (`CREATE TABLE ... LIKE`, `CREATE TABLE ... AS SELECT`).
pub fn parse_create_table(stmt: &str) -> Option<(TableSchema, Vec<Diagnostic>)> {
    let body = strip_leading_comments(stmt);
    let kw_len = table_keyword_len(body, StatementType::CreateTable)?;
    let mut rest = &body[kw_len..];
    let name = read_qualified_identifier(&mut rest)?;

    let rest = rest.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let (inner, after) = paren_group(rest)?;

    let mut table = TableSchema::new(name);
    let mut notes = Vec::new();

    for item in split_table_body(inner) {
        let parsed = classify_item(&table.name, &item);
        apply_item(&mut table, parsed, &mut notes);
    }

    parse_table_options(after, &mut table, &mut notes);

    Some((table, notes))
}

/// Merge the key clauses of an ALTER TABLE statement into the catalog.
///
/// Returns `None` when the statement is not an ALTER TABLE or names a
/// table the catalog does not know; such statements pass through as-is.
pub fn parse_alter_table(stmt: &str, catalog: &mut Catalog) -> Option<AlterOutcome> {
    let body = strip_leading_comments(stmt);
    let kw_len = table_keyword_len(body, StatementType::AlterTable)?;
    let mut rest = &body[kw_len..];
    let name = read_qualified_identifier(&mut rest)?;
    let table = catalog.get_mut(&name)?;

    let clauses = split_table_body(rest.trim().trim_end_matches(';'));
    let mut absorbed = 0;
    let mut remaining = Vec::new();
    let mut notes = Vec::new();

    for clause in clauses {
        if absorb_alter_clause(table, &clause, &mut notes) {
            absorbed += 1;
        } else {
            remaining.push(clause);
        }
    }

    let remainder = if remaining.is_empty() {
        None
    } else {
        notes.push(
            Diagnostic::new(
                DiagnosticKind::UnsupportedClause,
                format!(
                    "ALTER TABLE clause passed through: {}",
                    remaining.join(", ")
                ),
            )
            .with_table(&table.name),
        );
        Some(format!(
            "ALTER TABLE `{}` {};",
            table.name.replace('`', "``"),
            remaining.join(", ")
        ))
    };

    Some(AlterOutcome {
        table: table.name.clone(),
        absorbed,
        remainder,
        diagnostics: notes,
    })
}

fn absorb_alter_clause(table: &mut TableSchema, clause: &str, notes: &mut Vec<Diagnostic>) -> bool {
    if ALTER_AUTO_INCREMENT_RE.is_match(clause) {
        return true;
    }

    if let Some(caps) = ALTER_ADD_RE.captures(clause) {
        let item = caps.get(1).map_or("", |m| m.as_str());
        return match classify_item(&table.name, item) {
            parsed @ (BodyItem::PrimaryKey(_)
            | BodyItem::ForeignKey(_)
            | BodyItem::Unique(_)
            | BodyItem::Index) => {
                apply_item(table, parsed, notes);
                true
            }
            _ => false,
        };
    }

    if let Some(caps) = ALTER_MODIFY_RE.captures(clause) {
        let def = caps.get(1).map_or("", |m| m.as_str());
        if let Some((column, references)) = parse_column_def(def) {
            if table.column(&column.name).is_some() {
                let name = column.name.clone();
                if let Some(slot) = table.column_mut(&name) {
                    *slot = column.clone();
                }
                attach_column_keys(table, &column, references);
                return true;
            }
        }
    }

    false
}

fn classify_item(table: &str, item: &str) -> BodyItem {
    let item = item.trim();

    if let Some(m) = PRIMARY_KEY_RE.captures(item) {
        let name = m.get(1).map(|n| unquote(n.as_str()));
        if let Some((cols, _)) = paren_group(&item[m.get(0).map_or(0, |x| x.end())..]) {
            return BodyItem::PrimaryKey(PrimaryKey {
                name,
                columns: parse_column_list(cols),
            });
        }
        return BodyItem::Opaque(item.to_string());
    }

    if let Some(m) = FOREIGN_KEY_RE.captures(item) {
        let name = m.get(1).map(|n| unquote(n.as_str()));
        let tail = &item[m.get(0).map_or(0, |x| x.end())..];
        if let Some((cols, after)) = paren_group(tail) {
            if let Some(refs) = parse_references(after.trim_start()) {
                let columns = parse_column_list(cols);
                return BodyItem::ForeignKey(ForeignKeyConstraint {
                    name: name.unwrap_or_else(|| fk_name(table, &columns)),
                    table: table.to_string(),
                    columns,
                    referenced_table: refs.table,
                    referenced_columns: refs.columns,
                    on_delete: refs.on_delete,
                    on_update: refs.on_update,
                });
            }
        }
        return BodyItem::Opaque(item.to_string());
    }

    if let Some(m) = UNIQUE_RE.captures(item) {
        let name = m
            .get(2)
            .or_else(|| m.get(1))
            .map(|n| unquote(n.as_str()));
        if let Some((cols, _)) = paren_group(&item[m.get(0).map_or(0, |x| x.end())..]) {
            return BodyItem::Unique(UniqueConstraint {
                name,
                columns: parse_column_list(cols),
            });
        }
        return BodyItem::Opaque(item.to_string());
    }

    if INDEX_RE.is_match(item) {
        return BodyItem::Index;
    }

    if CHECK_RE.is_match(item) {
        return BodyItem::Check(item.to_string());
    }

    match parse_column_def(item) {
        Some((column, references)) => BodyItem::Column(column, references),
        None => BodyItem::Opaque(item.to_string()),
    }
}

fn apply_item(table: &mut TableSchema, item: BodyItem, notes: &mut Vec<Diagnostic>) {
    match item {
        BodyItem::PrimaryKey(pk) => table.primary_key = Some(pk),
        BodyItem::ForeignKey(fk) => table.foreign_keys.push(fk),
        BodyItem::Unique(unique) => table.unique_keys.push(unique),
        BodyItem::Index => {}
        BodyItem::Check(check) => table.checks.push(check),
        BodyItem::Column(column, references) => {
            table.columns.push(column.clone());
            attach_column_keys(table, &column, references);
        }
        BodyItem::Opaque(text) => {
            notes.push(
                Diagnostic::new(
                    DiagnosticKind::UnsupportedTypeToken,
                    format!("unrecognized table item kept verbatim: {}", text),
                )
                .with_table(&table.name),
            );
            table.opaque.push(text);
        }
    }
}

/// Table-level effects of inline column keys
fn attach_column_keys(
    table: &mut TableSchema,
    column: &ColumnDefinition,
    references: Option<References>,
) {
    if column.primary_key {
        table.primary_key = Some(PrimaryKey {
            name: None,
            columns: ColumnList::from_vec(vec![column.name.clone()]),
        });
    }
    if let Some(refs) = references {
        let columns = ColumnList::from_vec(vec![column.name.clone()]);
        table.foreign_keys.push(ForeignKeyConstraint {
            name: fk_name(&table.name, &columns),
            table: table.name.clone(),
            columns,
            referenced_table: refs.table,
            referenced_columns: refs.columns,
            on_delete: refs.on_delete,
            on_update: refs.on_update,
        });
    }
}

fn fk_name(table: &str, columns: &[String]) -> String {
    format!("fk_{}_{}", table, columns.join("_"))
}

/// Parse `name type [modifiers...]`
fn parse_column_def(item: &str) -> Option<(ColumnDefinition, Option<References>)> {
    let mut rest = item.trim();
    let name = read_identifier(&mut rest)?;
    let tokens = tokenize(rest);

    let first = tokens.first()?;
    if !first.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut type_token = first.clone();
    let mut i = 1;
    if tokens.get(i).is_some_and(|t| t.starts_with('(')) {
        type_token.push_str(&tokens[i]);
        i += 1;
    }
    while let Some(tok) = tokens.get(i) {
        match tok.to_ascii_uppercase().as_str() {
            "UNSIGNED" | "SIGNED" | "ZEROFILL" | "PRECISION" | "VARYING" => {
                type_token.push(' ');
                type_token.push_str(tok);
                i += 1;
            }
            _ => break,
        }
    }

    let mut column = ColumnDefinition::new(name, type_token);
    let mut references = None;

    while i < tokens.len() {
        let upper = tokens[i].to_ascii_uppercase();
        let next = tokens.get(i + 1).map(|t| t.to_ascii_uppercase());
        match (upper.as_str(), next.as_deref()) {
            ("NOT", Some("NULL")) => {
                column.nullable = false;
                i += 2;
            }
            ("NULL", _) => {
                column.nullable = true;
                i += 1;
            }
            ("DEFAULT", _) => {
                column.default = tokens.get(i + 1).cloned();
                i += 2;
            }
            ("AUTO_INCREMENT", _) => {
                column.auto_increment = true;
                i += 1;
            }
            ("ON", Some("UPDATE")) => {
                column.on_update = tokens.get(i + 2).cloned();
                i += 3;
            }
            ("PRIMARY", Some("KEY")) => {
                column.primary_key = true;
                i += 2;
            }
            ("UNIQUE", Some("KEY")) => {
                column.unique = true;
                i += 2;
            }
            ("UNIQUE", _) => {
                column.unique = true;
                i += 1;
            }
            ("COMMENT", _) => {
                column.comment = tokens
                    .get(i + 1)
                    .and_then(|t| parse_literal(t).as_str().map(str::to_string));
                i += 2;
            }
            ("CHARACTER", Some("SET")) => i += 3,
            ("CHARSET", _) | ("COLLATE", _) => i += 2,
            ("REFERENCES", _) => {
                references = parse_references(&tokens[i..].join(" "));
                break;
            }
            _ => {
                column.extra.push(tokens[i].clone());
                i += 1;
            }
        }
    }

    Some((column, references))
}

/// Parse `REFERENCES table (cols) [ON DELETE ..] [ON UPDATE ..]`
fn parse_references(s: &str) -> Option<References> {
    let caps = REFERENCES_RE.captures(s)?;
    let mut name_part = caps.get(1)?.as_str();
    let table = read_qualified_identifier(&mut name_part)?;
    let open = caps.get(0)?.end() - 1;
    let (cols, after) = paren_group(&s[open..])?;

    let action = |re: &Regex| {
        re.captures(after)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase())
    };

    Some(References {
        table,
        columns: parse_column_list(cols),
        on_delete: action(&ON_DELETE_RE),
        on_update: action(&ON_UPDATE_RE),
    })
}

fn parse_table_options(after: &str, table: &mut TableSchema, notes: &mut Vec<Diagnostic>) {
    let text = after.trim().trim_end_matches(';').trim();
    let mut last_end = 0;

    for caps in TABLE_OPTION_RE.captures_iter(text) {
        let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !text[last_end..whole.start()]
            .chars()
            .all(|c| c.is_whitespace() || c == ',')
        {
            break;
        }
        last_end = whole.end();

        let key = key
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if !NOOP_TABLE_OPTIONS.contains(&key.as_str()) && !key.starts_with("stats_") {
            notes.push(
                Diagnostic::new(
                    DiagnosticKind::UnsupportedClause,
                    format!("table option {}={} dropped", key, value.as_str()),
                )
                .with_table(&table.name),
            );
        }
        table.options.push((key, value.as_str().to_string()));
    }

    let leftover = text[last_end..].trim();
    if !leftover.is_empty() {
        notes.push(
            Diagnostic::new(
                DiagnosticKind::UnsupportedClause,
                format!("table clause dropped: {}", leftover),
            )
            .with_table(&table.name),
        );
    }
}

/// Content of the first parenthesized group and the text after it.
/// Quotes and backticks are honoured; returns `None` when unbalanced.
pub fn paren_group(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut start = None;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|st| (&s[st..i], &s[i + 1..]));
                }
            }
            _ => {}
        }
    }

    None
}

/// Split table body by commas, respecting nested parentheses and quotes
pub fn split_table_body(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in body.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }

    parts.retain(|p| !p.is_empty());
    parts
}

/// Split a column definition tail into whitespace-separated tokens,
/// keeping quoted spans and parenthesized groups whole.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in s.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' && q != '`' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse a key column list, dropping prefix lengths and sort order
pub fn parse_column_list(s: &str) -> ColumnList {
    split_table_body(s)
        .iter()
        .filter_map(|part| {
            let mut rest = part.trim();
            read_identifier(&mut rest)
        })
        .collect()
}

fn unquote(ident: &str) -> String {
    let mut rest = ident;
    read_identifier(&mut rest).unwrap_or_else(|| ident.to_string())
}

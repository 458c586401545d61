//! MySQL `INSERT ... VALUES` statement parsing.

use super::values::{parse_rows, MalformedLiteral, Row};
use super::{
    read_identifier, read_qualified_identifier, strip_leading_comments, table_keyword_len,
    StatementType, TextEncoding,
};
use crate::schema::{paren_group, split_table_body};
use once_cell::sync::Lazy;
use regex::Regex;

static VALUES_KW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^VALUES?\b").unwrap());

/// A parsed multi-row INSERT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertValues {
    pub table: String,
    /// Explicit column list, if the statement has one
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Row>,
    /// Text after the last row (e.g. `ON DUPLICATE KEY UPDATE ...`), without `;`
    pub trailing: Option<String>,
    /// Decoding of the statement the values came from
    pub encoding: TextEncoding,
}

impl InsertValues {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Parse an INSERT statement.
///
/// Returns `None` when the statement is not an `INSERT ... VALUES` form
/// (e.g. `INSERT ... SELECT`). A malformed value list still yields the rows
/// parsed before the fault; the error offset is relative to `stmt`.
pub fn parse_insert(stmt: &str) -> Option<(InsertValues, Option<MalformedLiteral>)> {
    let body = strip_leading_comments(stmt);
    let kw_len = table_keyword_len(body, StatementType::Insert)?;

    let mut rest = &body[kw_len..];
    let table = read_qualified_identifier(&mut rest)?;
    rest = rest.trim_start();

    let mut columns = None;
    if rest.starts_with('(') {
        let (list, after) = paren_group(rest)?;
        columns = Some(parse_insert_columns(list));
        rest = after.trim_start();
    }

    let kw = VALUES_KW_RE.find(rest)?;
    rest = &rest[kw.end()..];

    let values_start = stmt.len() - rest.len();
    let parsed = parse_rows(rest);

    let trailing = rest[parsed.consumed..].trim().trim_end_matches(';').trim();
    let trailing = (!trailing.is_empty()).then(|| trailing.to_string());

    let error = parsed.error.map(|mut e| {
        e.offset += values_start;
        e
    });

    Some((
        InsertValues {
            table,
            columns,
            rows: parsed.rows,
            trailing,
            encoding: TextEncoding::Utf8,
        },
        error,
    ))
}

/// Column names of an INSERT column list; quoted names may hold `,` or `)`.
fn parse_insert_columns(list: &str) -> Vec<String> {
    split_table_body(list)
        .iter()
        .filter_map(|c| {
            let mut rest = c.as_str();
            read_identifier(&mut rest)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::values::{MalformedKind, Value};

    #[test]
    fn test_parse_simple_insert() {
        let (ins, err) = parse_insert("INSERT INTO `users` VALUES (1,'alice'),(2,'bob');").unwrap();
        assert!(err.is_none());
        assert_eq!(ins.table, "users");
        assert_eq!(ins.columns, None);
        assert_eq!(ins.row_count(), 2);
        assert_eq!(ins.rows[1].values[1], Value::Text("bob".to_string()));
        assert_eq!(ins.trailing, None);
    }

    #[test]
    fn test_parse_insert_with_columns() {
        let (ins, _) =
            parse_insert("INSERT INTO shop.orders (`id`, \"user_id\", total) VALUES (1, 2, 9.5);")
                .unwrap();
        assert_eq!(ins.table, "orders");
        assert_eq!(
            ins.columns,
            Some(vec!["id".to_string(), "user_id".to_string(), "total".to_string()])
        );
    }

    #[test]
    fn test_quoted_column_names_with_separators() {
        let (ins, err) =
            parse_insert("INSERT INTO t (`a,b`, `c)d`, e) VALUES ('x', 'y', 3);").unwrap();
        assert!(err.is_none());
        assert_eq!(
            ins.columns,
            Some(vec!["a,b".to_string(), "c)d".to_string(), "e".to_string()])
        );
        assert_eq!(ins.rows[0].values.len(), 3);
    }

    #[test]
    fn test_parse_insert_trailing_clause() {
        let (ins, _) = parse_insert(
            "INSERT INTO t (id, n) VALUES (1, 'a') ON DUPLICATE KEY UPDATE n = VALUES(n);",
        )
        .unwrap();
        assert_eq!(ins.rows.len(), 1);
        assert_eq!(
            ins.trailing.as_deref(),
            Some("ON DUPLICATE KEY UPDATE n = VALUES(n)")
        );
    }

    #[test]
    fn test_insert_select_is_not_parsed() {
        assert!(parse_insert("INSERT INTO t SELECT * FROM u;").is_none());
    }

    #[test]
    fn test_insert_ignore_and_value_keyword() {
        let (ins, _) = parse_insert("insert ignore into t value (1);").unwrap();
        assert_eq!(ins.table, "t");
        assert_eq!(ins.rows.len(), 1);
    }

    #[test]
    fn test_malformed_offset_is_statement_relative() {
        let stmt = "INSERT INTO t VALUES (1,'ok'),(2,'open";
        let (ins, err) = parse_insert(stmt).unwrap();
        assert_eq!(ins.rows.len(), 1);
        let err = err.unwrap();
        assert_eq!(err.kind, MalformedKind::UnterminatedQuote);
        assert_eq!(err.offset, stmt.find("'open").unwrap());
    }
}

//! MySQL to PostgreSQL column type mapping.
//!
//! Handles conversion of data types including:
//! - Integer types (TINYINT, SMALLINT, MEDIUMINT, INT, BIGINT) and serials
//! - Float types (FLOAT, DOUBLE, DECIMAL)
//! - String types (CHAR, VARCHAR, TEXT)
//! - Binary types (BLOB, BINARY -> BYTEA)
//! - Date/time types (DATE, DATETIME, TIMESTAMP, TIME, YEAR)
//! - Special types (ENUM, SET, JSON, BIT, UUID)

use crate::parser::{parse_rows, Value};
use crate::schema::paren_group;

/// Minimum width of the VARCHAR an ENUM collapses to
const ENUM_MIN_WIDTH: usize = 50;

/// Coarse value family of a column, used when translating literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Boolean,
    Numeric,
    Text,
    Temporal,
    Binary,
    Json,
    Bit,
    Uuid,
    Other,
}

/// Result of mapping one source type token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    /// PostgreSQL type text
    pub sql: String,
    pub family: TypeFamily,
    /// Why the mapping loses information, if it does
    pub lossy: Option<String>,
    /// No rule matched; `sql` is the source token unchanged
    pub unmatched: bool,
}

impl MappedType {
    fn new(sql: impl Into<String>, family: TypeFamily) -> Self {
        Self {
            sql: sql.into(),
            family,
            lossy: None,
            unmatched: false,
        }
    }

    fn lossy(mut self, reason: impl Into<String>) -> Self {
        self.lossy = Some(reason.into());
        self
    }
}

/// Type mapper for MySQL column types
pub struct TypeMapper;

impl TypeMapper {
    /// Map a raw MySQL type token (e.g. `int(11) unsigned`) to PostgreSQL
    pub fn map(token: &str) -> MappedType {
        let (base, args) = split_type(token);
        let args = args.as_deref();

        match base.as_str() {
            "tinyint" if args == Some("1") => MappedType::new("BOOLEAN", TypeFamily::Boolean),
            "bool" | "boolean" => MappedType::new("BOOLEAN", TypeFamily::Boolean),
            "tinyint" | "smallint" | "int2" => MappedType::new("SMALLINT", TypeFamily::Integer),
            "mediumint" | "int" | "integer" | "int4" => {
                MappedType::new("INTEGER", TypeFamily::Integer)
            }
            "bigint" | "int8" => MappedType::new("BIGINT", TypeFamily::Integer),
            "decimal" | "numeric" | "dec" | "fixed" => match args {
                Some(a) => MappedType::new(format!("NUMERIC({})", compact(a)), TypeFamily::Numeric),
                None => MappedType::new("NUMERIC", TypeFamily::Numeric),
            },
            "float" => match args.and_then(|a| a.trim().parse::<u32>().ok()) {
                Some(p) if p > 24 => MappedType::new("DOUBLE PRECISION", TypeFamily::Numeric),
                _ => MappedType::new("REAL", TypeFamily::Numeric),
            },
            "double" | "double precision" | "real" => {
                MappedType::new("DOUBLE PRECISION", TypeFamily::Numeric)
            }
            "char" | "nchar" => match args {
                Some(a) => MappedType::new(format!("CHAR({})", a.trim()), TypeFamily::Text),
                None => MappedType::new("CHAR", TypeFamily::Text),
            },
            "varchar" | "nvarchar" | "character varying" => match args {
                Some(a) => MappedType::new(format!("VARCHAR({})", a.trim()), TypeFamily::Text),
                None => MappedType::new("VARCHAR", TypeFamily::Text),
            },
            "tinytext" | "text" | "mediumtext" | "longtext" => {
                MappedType::new("TEXT", TypeFamily::Text)
            }
            "enum" => {
                let width = enum_width(args.unwrap_or(""));
                MappedType::new(format!("VARCHAR({})", width), TypeFamily::Text)
                    .lossy("ENUM member list not enforced")
            }
            "set" => MappedType::new("TEXT", TypeFamily::Text).lossy("SET member list not enforced"),
            "date" => MappedType::new("DATE", TypeFamily::Temporal),
            "datetime" | "timestamp" => match args {
                Some(p) => MappedType::new(format!("TIMESTAMP({})", p.trim()), TypeFamily::Temporal),
                None => MappedType::new("TIMESTAMP", TypeFamily::Temporal),
            },
            "time" => match args {
                Some(p) => MappedType::new(format!("TIME({})", p.trim()), TypeFamily::Temporal),
                None => MappedType::new("TIME", TypeFamily::Temporal),
            },
            "year" => MappedType::new("SMALLINT", TypeFamily::Integer),
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                MappedType::new("BYTEA", TypeFamily::Binary)
            }
            "json" => MappedType::new("JSONB", TypeFamily::Json),
            "bit" => match args {
                Some(n) => MappedType::new(format!("BIT({})", n.trim()), TypeFamily::Bit),
                None => MappedType::new("BIT(1)", TypeFamily::Bit),
            },
            "uuid" => MappedType::new("UUID", TypeFamily::Uuid),
            _ => MappedType {
                sql: token.trim().to_string(),
                family: TypeFamily::Other,
                lossy: None,
                unmatched: true,
            },
        }
    }

    /// Serial type for an auto-increment column, `None` for non-integer types
    pub fn serial_type(token: &str) -> Option<&'static str> {
        let (base, _) = split_type(token);
        match base.as_str() {
            "bigint" | "int8" => Some("BIGSERIAL"),
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "int2" | "int4" => {
                Some("SERIAL")
            }
            _ => None,
        }
    }
}

/// Lowercased base name (attributes removed) and raw argument text
fn split_type(token: &str) -> (String, Option<String>) {
    let lower = token.trim().to_lowercase();
    let (head, args, tail) = match lower.find('(') {
        Some(open) => match paren_group(&lower[open..]) {
            Some((inner, after)) => (
                lower[..open].trim().to_string(),
                Some(inner.to_string()),
                after.to_string(),
            ),
            None => (lower.clone(), None, String::new()),
        },
        None => (lower.clone(), None, String::new()),
    };

    let keep = |w: &&str| !matches!(*w, "unsigned" | "signed" | "zerofill");
    let mut base: Vec<&str> = head.split_whitespace().filter(keep).collect();
    // `double precision`, `character varying`
    base.extend(tail.split_whitespace().filter(keep));

    // enum/set members keep their original case
    let args = match (args, token.find('(')) {
        (Some(_), Some(open)) => paren_group(&token[open..]).map(|(inner, _)| inner.to_string()),
        (a, _) => a,
    };

    (base.join(" "), args)
}

fn compact(args: &str) -> String {
    args.split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",")
}

fn enum_width(members: &str) -> usize {
    let parsed = parse_rows(&format!("({})", members));
    let longest = parsed
        .rows
        .first()
        .map(|row| {
            row.values
                .iter()
                .filter_map(Value::as_str)
                .map(|m| m.chars().count())
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    longest.max(ENUM_MIN_WIDTH)
}

use dump_translate::parser::{
    parse_insert, parse_literal, parse_rows, parse_statement, DumpDocument, Parser, Statement,
    StatementType, Value,
};

mod tests {
    use super::*;

    fn texts(sql: &[u8], buffer_size: usize) -> Vec<String> {
        let mut parser = Parser::new(sql, buffer_size);
        let mut out = Vec::new();
        while let Some(stmt) = parser.read_statement().unwrap() {
            out.push(stmt.decode().0.into_owned());
        }
        out
    }

    #[test]
    fn test_classify_statements() {
        let cases = [
            ("CREATE TABLE `users` (id INT);", StatementType::CreateTable, "users"),
            ("CREATE TABLE IF NOT EXISTS db.t (id INT);", StatementType::CreateTable, "t"),
            ("INSERT IGNORE INTO `posts` VALUES (1);", StatementType::Insert, "posts"),
            ("ALTER TABLE orders ADD KEY k (a);", StatementType::AlterTable, "orders"),
            ("DROP TABLE IF EXISTS `tmp`;", StatementType::DropTable, "tmp"),
            ("SET NAMES utf8mb4;", StatementType::Set, ""),
            ("UNLOCK TABLES;", StatementType::LockTables, ""),
            ("/*!40101 SET SQL_MODE='' */;", StatementType::Comment, ""),
            ("START TRANSACTION;", StatementType::Unknown, ""),
        ];
        for (sql, kind, table) in cases {
            let (got_kind, got_table) = parse_statement(sql);
            assert_eq!(got_kind, kind, "{}", sql);
            assert_eq!(got_table, table, "{}", sql);
        }
    }

    #[test]
    fn test_semicolons_inside_quotes_and_comments() {
        let sql = b"INSERT INTO t VALUES ('a;b'),(\"c;d\");\n-- it's; a comment\nINSERT INTO t VALUES ('e');";
        let stmts = texts(sql, 4096);
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].ends_with("(\"c;d\");"));
        assert_eq!(stmts[1].trim(), "-- it's; a comment");
        assert_eq!(stmts[2], "INSERT INTO t VALUES ('e');");
    }

    #[test]
    fn test_segmentation_independent_of_buffer_size() {
        let sql = b"CREATE TABLE `a` (`x` varchar(5) DEFAULT ';');\n/* block; comment */\nINSERT INTO `a` VALUES ('it\\'s;'),('q''q');\nSELECT 1;";
        let expected = texts(sql, 64 * 1024);
        for size in [1, 2, 3, 7, 16] {
            assert_eq!(texts(sql, size), expected, "buffer size {}", size);
        }
    }

    #[test]
    fn test_value_kinds() {
        let parsed = parse_rows("(1, NULL, 'NULL', 'x', 0x1F, -2.5e3, now())");
        let values = &parsed.rows[0].values;
        assert_eq!(values[0], Value::Bare("1".to_string()));
        assert_eq!(values[1], Value::Null);
        assert_eq!(values[2], Value::Text("NULL".to_string()));
        assert_eq!(values[3], Value::Text("x".to_string()));
        assert_eq!(values[4], Value::Bare("0x1F".to_string()));
        assert_eq!(values[5], Value::Bare("-2.5e3".to_string()));
        assert_eq!(values[6], Value::Bare("now()".to_string()));
    }

    #[test]
    fn test_escape_fidelity() {
        let parsed = parse_rows(r#"('a\'b', 'c''d', "e\"f", 'tab\there', 'back\\slash', 'nl\n')"#);
        let values: Vec<_> = parsed.rows[0]
            .values
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            values,
            vec!["a'b", "c'd", "e\"f", "tab\there", "back\\slash", "nl\n"]
        );
    }

    #[test]
    fn test_row_arity_preserved() {
        let parsed = parse_rows("(1,'a,b',(2)),(3,'',NULL)");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.rows.iter().all(|r| r.len() == 3));
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("'x''y'"), Value::Text("x'y".to_string()));
        assert_eq!(parse_literal("NULL"), Value::Null);
        assert_eq!(parse_literal("42"), Value::Bare("42".to_string()));
    }

    #[test]
    fn test_parse_insert_with_columns_and_trailer() {
        let (insert, error) = parse_insert(
            "INSERT INTO `t` (`a`, `b`) VALUES (1,2),(3,4) ON DUPLICATE KEY UPDATE a=VALUES(a);",
        )
        .unwrap();
        assert!(error.is_none());
        assert_eq!(insert.table, "t");
        assert_eq!(insert.columns.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(insert.row_count(), 2);
        assert!(insert.trailing.unwrap().starts_with("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn test_document_keeps_unterminated_tail() {
        let doc = DumpDocument::parse(&b"SELECT 1;\nINSERT INTO t VALUES (1"[..], 4096).unwrap();
        assert_eq!(doc.len(), 2);
        match &doc.statements[1].statement {
            Statement::Other(other) => assert!(!other.terminated),
            other => panic!("expected tail, got {:?}", other),
        }
        assert_eq!(doc.diagnostics().total(), 1);
    }
}

//! Schema extraction and dependency ordering through the public API.

use dump_translate::diagnostics::DiagnosticKind;
use dump_translate::schema::{
    parse_alter_table, parse_create_table, Catalog, PlanOptions, SchemaGraph, TableId,
};

mod tests {
    use super::*;

    const PHPMYADMIN: &[&str] = &[
        "CREATE TABLE `orders` (\n  `id` int(11) NOT NULL,\n  `user_id` int(11) NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=latin1;",
        "CREATE TABLE `users` (\n  `id` int(11) NOT NULL,\n  `email` varchar(100) NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=latin1;",
        "ALTER TABLE `orders`\n  ADD PRIMARY KEY (`id`),\n  ADD KEY `user_id` (`user_id`);",
        "ALTER TABLE `users`\n  ADD PRIMARY KEY (`id`),\n  ADD UNIQUE KEY `email` (`email`);",
        "ALTER TABLE `orders`\n  MODIFY `id` int(11) NOT NULL AUTO_INCREMENT, AUTO_INCREMENT=5;",
        "ALTER TABLE `orders`\n  ADD CONSTRAINT `orders_ibfk_1` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE;",
    ];

    fn load(stmts: &[&str]) -> Catalog {
        let mut catalog = Catalog::new();
        for stmt in stmts {
            if let Some((table, _)) = parse_create_table(stmt) {
                catalog.insert(table);
            } else {
                let outcome = parse_alter_table(stmt, &mut catalog).unwrap();
                assert!(outcome.remainder.is_none(), "{}", stmt);
            }
        }
        catalog
    }

    fn order(catalog: &Catalog, options: &PlanOptions) -> Vec<String> {
        let (plan, _) = SchemaGraph::from_catalog(catalog).plan(options);
        plan.order
            .iter()
            .map(|&id| catalog.table(id).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_phpmyadmin_alter_blocks_build_keys() {
        let catalog = load(PHPMYADMIN);

        let orders = catalog.get("orders").unwrap();
        assert_eq!(orders.primary_key.as_ref().unwrap().columns.as_slice(), ["id"]);
        assert!(orders.column("id").unwrap().auto_increment);
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(orders.foreign_keys[0].referenced_table, "users");
        assert_eq!(orders.foreign_keys[0].on_delete.as_deref(), Some("CASCADE"));

        let users = catalog.get("users").unwrap();
        assert_eq!(users.unique_keys.len(), 1);
    }

    #[test]
    fn test_parents_precede_children() {
        let catalog = load(PHPMYADMIN);
        assert_eq!(order(&catalog, &PlanOptions::default()), vec!["users", "orders"]);
    }

    #[test]
    fn test_pinned_tables_first_without_edges() {
        let catalog = load(&[
            "CREATE TABLE a (id int);",
            "CREATE TABLE b (id int);",
            "CREATE TABLE c (id int);",
        ]);
        let options = PlanOptions {
            pinned: vec!["c".to_string()],
            defer_all: false,
        };
        assert_eq!(order(&catalog, &options), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_three_table_cycle_defers_one_constraint() {
        let catalog = load(&[
            "CREATE TABLE a (id int, c_id int, FOREIGN KEY (c_id) REFERENCES c (id));",
            "CREATE TABLE b (id int, a_id int, FOREIGN KEY (a_id) REFERENCES a (id));",
            "CREATE TABLE c (id int, b_id int, FOREIGN KEY (b_id) REFERENCES b (id));",
        ]);
        let (plan, notes) = SchemaGraph::from_catalog(&catalog).plan(&PlanOptions::default());
        assert_eq!(plan.order, vec![TableId(0), TableId(1), TableId(2)]);
        assert_eq!(plan.deferred, vec![(TableId(0), 0)]);
        assert_eq!(
            notes
                .iter()
                .filter(|n| n.kind == DiagnosticKind::CyclicDependency)
                .count(),
            1
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let catalog = load(PHPMYADMIN);
        let graph = SchemaGraph::from_catalog(&catalog);
        let first = graph.plan(&PlanOptions::default());
        let second = graph.plan(&PlanOptions::default());
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let catalog = load(&["CREATE TABLE `Users` (id int);"]);
        assert!(catalog.get("users").is_some());
        assert!(catalog.get("USERS").is_some());
        assert!(catalog.get("nope").is_none());
    }
}

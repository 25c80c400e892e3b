#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cache::QueryCache;
    use crate::dialect::Dialect;
    use crate::engine::Query;
    use crate::error::Error;
    use crate::executor::{Connection, Driver, DriverError, ExecResult, Transaction};
    use crate::limiter::ConcurrencyLimiter;
    use crate::test_support::{FakeDriver, FakePool, int_rows, row};
    use crate::value::Value;
    use crate::values;
    use pretty_assertions::assert_eq;

    fn query(driver: &Arc<FakeDriver>, table: &str) -> Query {
        let mut q = Query::table(driver.clone(), table);
        q.set_dialect(Dialect::MySQL);
        q
    }

    #[test]
    fn get_compiles_executes_and_materializes() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1, 2, 3])]));
        let mut q = query(&driver, "users");
        q.where_("age", ">", 18);

        let rows = q.get().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            driver.calls(),
            vec![(
                "SELECT * FROM users WHERE age > ?".to_string(),
                vec![Value::Int(18)]
            )]
        );
    }

    #[test]
    fn get_normalizes_byte_cells_to_text() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![row(&[
            ("name", Value::Bytes(b"alice".to_vec())),
        ])]]));
        let q = query(&driver, "users");

        let rows = q.get().unwrap();
        assert_eq!(rows.first().unwrap()["name"], Value::Text("alice".into()));
    }

    #[test]
    fn get_aborts_on_an_undecodable_row() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![
            row(&[("name", Value::Text("ok".into()))]),
            row(&[("name", Value::Bytes(vec![0xff]))]),
        ]]));
        let q = query(&driver, "users");

        assert!(matches!(q.get(), Err(Error::Decode(_))));
    }

    #[test]
    fn execution_failures_carry_context() {
        let driver = Arc::new(FakeDriver::new());
        driver.fail_with("connection reset");
        let q = query(&driver, "users");

        assert_eq!(
            q.get(),
            Err(Error::Execute {
                context: "failed to execute query",
                source: DriverError::new("connection reset"),
            })
        );
    }

    #[test]
    fn first_forces_limit_one_and_distinguishes_not_found() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![]]));
        let q = query(&driver, "users");

        let err = q.first().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(driver.calls()[0].0, "SELECT * FROM users LIMIT 1");

        driver.push_rows(int_rows("id", [7]));
        let row = q.first().unwrap();
        assert_eq!(row["id"], Value::Int(7));
    }

    #[test]
    fn first_does_not_mutate_the_base_query() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1]), vec![]]));
        let q = query(&driver, "users");

        let _ = q.first();
        let _ = q.get();
        assert_eq!(driver.calls()[1].0, "SELECT * FROM users");
    }

    #[test]
    fn find_filters_by_primary_id() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [7])]));
        let q = query(&driver, "users");

        let row = q.find(7).unwrap();
        assert_eq!(row["id"], Value::Int(7));
        assert_eq!(
            driver.calls(),
            vec![(
                "SELECT * FROM users WHERE id = ? LIMIT 1".to_string(),
                vec![Value::Int(7)]
            )]
        );
    }

    #[test]
    fn value_returns_a_single_column() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![row(&[
            ("name", Value::Text("alice".into())),
            ("age", Value::Int(30)),
        ])]]));
        let q = query(&driver, "users");

        assert_eq!(q.value("name"), Ok(Value::Text("alice".into())));

        driver.push_rows(vec![row(&[("name", Value::Text("alice".into()))])]);
        assert!(matches!(q.value("missing"), Err(Error::Malformed(_))));
    }

    #[test]
    fn pluck_extracts_one_column() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1, 2])]));
        let q = query(&driver, "users");
        assert_eq!(q.pluck("id").unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn exists_wraps_the_compiled_select() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![row(&[(
            "exists",
            Value::Int(1),
        )])]]));
        let mut q = query(&driver, "users");
        q.where_eq("active", true);

        assert_eq!(q.exists(), Ok(true));
        assert_eq!(
            driver.calls()[0].0,
            "SELECT EXISTS (SELECT * FROM users WHERE active = ?)"
        );
    }

    #[test]
    fn count_replaces_the_projection_and_strips_ordering() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![row(&[
            ("aggregate", Value::Text("23".into())),
        ])]]));
        let mut q = query(&driver, "users");
        q.select(["id", "name"]).order_by("id").limit(5);

        assert_eq!(q.count(), Ok(23));
        assert_eq!(
            driver.calls()[0].0,
            "SELECT COUNT(*) AS aggregate FROM users"
        );
    }

    #[test]
    fn aggregates_normalize_numeric_representations() {
        let driver = Arc::new(FakeDriver::new());

        driver.push_rows(vec![row(&[("aggregate", Value::Bytes(b"1.5".to_vec()))])]);
        let q = query(&driver, "orders");
        assert_eq!(q.sum("total"), Ok(Some(1.5)));

        driver.push_rows(vec![row(&[("aggregate", Value::Text("2.25".into()))])]);
        assert_eq!(q.avg("total"), Ok(Some(2.25)));

        driver.push_rows(vec![row(&[("aggregate", Value::Null)])]);
        assert_eq!(q.min("total"), Ok(None));

        driver.push_rows(vec![row(&[("aggregate", Value::Text("abc".into()))])]);
        assert!(matches!(q.max("total"), Err(Error::Decode(_))));
    }

    #[test]
    fn insert_rejects_empty_values_before_any_sql() {
        let driver = Arc::new(FakeDriver::new());
        let q = query(&driver, "users");

        assert_eq!(
            q.insert(crate::Values::new()),
            Err(Error::Malformed("insert values are empty".into()))
        );
        assert_eq!(driver.call_count(), 0);
    }

    #[test]
    fn insert_executes_and_returns_the_summary() {
        let driver = Arc::new(FakeDriver::new());
        driver.set_exec_result(ExecResult {
            rows_affected: 1,
            last_insert_id: 42,
        });
        let q = query(&driver, "users");

        let result = q.insert(values! { "name" => "alice" }).unwrap();
        assert_eq!(result.last_insert_id, 42);
        assert_eq!(
            driver.calls(),
            vec![(
                "INSERT INTO users (name) VALUES (?)".to_string(),
                vec![Value::Text("alice".into())]
            )]
        );
    }

    #[test]
    fn update_and_delete_share_the_where_section() {
        let driver = Arc::new(FakeDriver::new());
        let mut q = query(&driver, "users");
        q.where_eq("id", 7);

        q.update(values! { "name" => "bob" }).unwrap();
        q.delete().unwrap();

        let calls = driver.calls();
        assert_eq!(calls[0].0, "UPDATE users SET name = ? WHERE id = ?");
        assert_eq!(
            calls[0].1,
            vec![Value::Text("bob".into()), Value::Int(7)]
        );
        assert_eq!(calls[1].0, "DELETE FROM users WHERE id = ?");
    }

    #[test]
    fn update_failure_carries_its_own_context() {
        let driver = Arc::new(FakeDriver::new());
        driver.fail_with("deadlock");
        let mut q = query(&driver, "users");
        q.where_eq("id", 7);

        assert_eq!(
            q.update(values! { "name" => "bob" }),
            Err(Error::Execute {
                context: "failed to execute update",
                source: DriverError::new("deadlock"),
            })
        );
    }

    #[test]
    fn upsert_defaults_the_update_set_to_non_conflict_columns() {
        let driver = Arc::new(FakeDriver::new());
        let q = query(&driver, "users");

        q.upsert(
            vec![values! { "id" => 1, "name" => "alice", "email" => "a@x" }],
            &["id"],
            None,
        )
        .unwrap();
        assert_eq!(
            driver.calls()[0].0,
            "INSERT INTO users (id, name, email) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE name = VALUES(name), email = VALUES(email)"
        );
    }

    #[test]
    fn upsert_without_conflict_target_fails_on_postgres() {
        let driver = Arc::new(FakeDriver::new());
        let mut q = query(&driver, "users");
        q.set_dialect(Dialect::PostgreSQL);

        let err = q
            .upsert(vec![values! { "id" => 1 }], &[], None)
            .unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
        assert_eq!(driver.call_count(), 0);
    }

    #[test]
    fn debug_capture_exposes_the_last_compilation() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1])]));
        let mut q = query(&driver, "users");
        q.enable_debug();
        q.where_("age", ">", 18);

        assert!(q.last_debug().is_none());
        q.get().unwrap();

        let capture = q.last_debug().unwrap();
        assert_eq!(capture.sql, "SELECT * FROM users WHERE age > ?");
        assert_eq!(capture.bindings, vec![Value::Int(18)]);
        assert_eq!(capture.dialect, Dialect::MySQL);
        assert_eq!(
            capture.interpolated().unwrap(),
            "SELECT * FROM users WHERE age > 18"
        );
    }

    #[test]
    fn cached_queries_skip_the_driver_on_a_hit() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1])]));
        let cache = Arc::new(QueryCache::new(std::time::Duration::from_secs(60)));
        let mut q = query(&driver, "users");
        q.with_cache(cache);

        let first = q.get().unwrap();
        let second = q.get().unwrap();
        assert_eq!(first, second);
        assert_eq!(driver.call_count(), 1);

        q.without_cache();
        q.get().unwrap();
        assert_eq!(driver.call_count(), 2);
    }

    #[tokio::test]
    async fn async_wrappers_run_the_synchronous_operation() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1, 2])]));
        let mut q = query(&driver, "users");
        q.with_limiter(Arc::new(ConcurrencyLimiter::new(1)));

        let rows = q.get_async().await.unwrap();
        assert_eq!(rows.len(), 2);

        driver.push_rows(vec![row(&[("aggregate", Value::Int(2))])]);
        assert_eq!(q.count_async().await.unwrap(), 2);
    }

    #[test]
    fn transactions_expose_the_same_execution_contract() {
        let driver = Arc::new(FakeDriver::with_rows(vec![int_rows("id", [1])]));
        let pool = FakePool::new(driver.clone());

        let tx: Arc<dyn Transaction> = Arc::from(pool.begin().unwrap());
        let tx_driver: Arc<dyn Driver> = tx.clone();
        let mut q = Query::table(tx_driver, "users");
        q.set_dialect(Dialect::MySQL);

        assert_eq!(q.get().unwrap().len(), 1);
        tx.commit().unwrap();

        assert_eq!(driver.calls()[0].0, "SELECT * FROM users");
        assert_eq!(*pool.commits.lock().unwrap(), 1);

        let tx: Arc<dyn Transaction> = Arc::from(pool.begin().unwrap());
        tx.rollback().unwrap();
        assert_eq!(*pool.rollbacks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn async_first_propagates_not_found() {
        let driver = Arc::new(FakeDriver::with_rows(vec![vec![]]));
        let q = query(&driver, "users");
        assert!(q.first_async().await.unwrap_err().is_not_found());
    }
}

//! 测试辅助：记录每次调用、按脚本返回预置行的假执行协作方。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::collection::Row;
use crate::executor::{Connection, Driver, DriverError, ExecResult, Transaction};
use crate::value::Value;

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn int_rows(column: &str, values: impl IntoIterator<Item = i64>) -> Vec<Row> {
    values
        .into_iter()
        .map(|n| row(&[(column, Value::Int(n))]))
        .collect()
}

/// 假驱动：`query`/`query_row` 按先进先出弹出一批预置行，`execute` 返回
/// 固定的执行摘要；所有调用（SQL + 参数）都被记录下来。
#[derive(Default)]
pub struct FakeDriver {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    batches: Mutex<VecDeque<Vec<Row>>>,
    exec_result: Mutex<ExecResult>,
    fail_with: Mutex<Option<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(batches: Vec<Vec<Row>>) -> Self {
        let driver = Self::new();
        *driver.batches.lock().unwrap() = batches.into();
        driver
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.batches.lock().unwrap().push_back(rows);
    }

    pub fn set_exec_result(&self, result: ExecResult) {
        *self.exec_result.lock().unwrap() = result;
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, sql: &str, bindings: &[Value]) -> Result<(), DriverError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.to_vec()));
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(DriverError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn next_batch(&self) -> Vec<Row> {
        self.batches.lock().unwrap().pop_front().unwrap_or_default()
    }
}

impl Driver for FakeDriver {
    fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.record(sql, bindings)?;
        Ok(self.next_batch())
    }

    fn query_row(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>, DriverError> {
        self.record(sql, bindings)?;
        Ok(self.next_batch().into_iter().next())
    }

    fn execute(&self, sql: &str, bindings: &[Value]) -> Result<ExecResult, DriverError> {
        self.record(sql, bindings)?;
        Ok(*self.exec_result.lock().unwrap())
    }
}

/// 假连接：`begin` 返回共享同一个 [`FakeDriver`] 的事务句柄。
pub struct FakePool {
    pub driver: Arc<FakeDriver>,
    pub commits: Arc<Mutex<u32>>,
    pub rollbacks: Arc<Mutex<u32>>,
}

impl FakePool {
    pub fn new(driver: Arc<FakeDriver>) -> Self {
        Self {
            driver,
            commits: Arc::new(Mutex::new(0)),
            rollbacks: Arc::new(Mutex::new(0)),
        }
    }
}

impl Driver for FakePool {
    fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.driver.query(sql, bindings)
    }

    fn query_row(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>, DriverError> {
        self.driver.query_row(sql, bindings)
    }

    fn execute(&self, sql: &str, bindings: &[Value]) -> Result<ExecResult, DriverError> {
        self.driver.execute(sql, bindings)
    }
}

impl Connection for FakePool {
    fn begin(&self) -> Result<Box<dyn Transaction>, DriverError> {
        Ok(Box::new(FakeTransaction {
            driver: self.driver.clone(),
            commits: self.commits.clone(),
            rollbacks: self.rollbacks.clone(),
        }))
    }
}

pub struct FakeTransaction {
    driver: Arc<FakeDriver>,
    commits: Arc<Mutex<u32>>,
    rollbacks: Arc<Mutex<u32>>,
}

impl Driver for FakeTransaction {
    fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>, DriverError> {
        self.driver.query(sql, bindings)
    }

    fn query_row(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>, DriverError> {
        self.driver.query_row(sql, bindings)
    }

    fn execute(&self, sql: &str, bindings: &[Value]) -> Result<ExecResult, DriverError> {
        self.driver.execute(sql, bindings)
    }
}

impl Transaction for FakeTransaction {
    fn commit(&self) -> Result<(), DriverError> {
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<(), DriverError> {
        *self.rollbacks.lock().unwrap() += 1;
        Ok(())
    }
}

//! 执行协作方契约：提交 SQL 文本与参数，取回行或执行摘要。
//!
//! 网络传输、连接池与凭据都在这层契约之外；事务只是暴露同一执行契约的
//! 薄透传（begin/commit/rollback）。

use crate::collection::Row;
use crate::value::Value;

/// 执行协作方返回的不透明错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 变更语句的执行摘要。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// 查询执行契约。实现方负责占位符与参数的配对：MySQL 按位置配对 `?`，
/// PostgreSQL 按 `$n` 编号取第 n 个参数。
pub trait Driver: Send + Sync {
    fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Row>, DriverError>;

    fn query_row(&self, sql: &str, bindings: &[Value]) -> Result<Option<Row>, DriverError>;

    fn execute(&self, sql: &str, bindings: &[Value]) -> Result<ExecResult, DriverError>;
}

/// 事务句柄：同一执行契约，外加提交/回滚。
pub trait Transaction: Driver {
    fn commit(&self) -> Result<(), DriverError>;

    fn rollback(&self) -> Result<(), DriverError>;
}

/// 可开启事务的连接。
pub trait Connection: Driver {
    fn begin(&self) -> Result<Box<dyn Transaction>, DriverError>;
}

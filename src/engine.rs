//! 执行引擎：编译当前查询描述，交给执行协作方，把返回的行物化为 Collection。
//!
//! 引擎本身按调用无状态（调试捕获除外），不同 Query 实例之间可以并发调用，
//! 不需要协调。异步便捷包装把同步操作放到一个阻塞任务里执行，返回标准
//! future；除调用方自带的取消之外没有额外的取消传播，也不做自动重试。

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::QueryCache;
use crate::clause::SelectItem;
use crate::collection::{Collection, Row, normalize_row};
use crate::compiler::{self, Compiled};
use crate::dialect::{Dialect, default_dialect};
use crate::error::Error;
use crate::executor::{Driver, DriverError, ExecResult};
use crate::interpolate::InterpolateError;
use crate::limiter::ConcurrencyLimiter;
use crate::query::QueryBuilder;
use crate::value::{Value, Values};

/// 最近一次编译的调试信息。
#[derive(Debug, Clone, PartialEq)]
pub struct DebugCapture {
    pub sql: String,
    pub bindings: Vec<Value>,
    pub dialect: Dialect,
    pub compile_time: Duration,
}

impl DebugCapture {
    /// 便于日志展示的字面量 SQL。
    pub fn interpolated(&self) -> Result<String, InterpolateError> {
        self.dialect.interpolate(&self.sql, &self.bindings)
    }
}

/// 绑定到执行协作方与方言的查询。
///
/// 通过 `Deref`/`DerefMut` 暴露 [`QueryBuilder`] 的全部链式接口；把同一个
/// 基础查询分派给多个并发消费者之前必须先 `clone()`。
#[derive(Clone)]
pub struct Query {
    pub(crate) builder: QueryBuilder,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) dialect: Dialect,
    pub(crate) cache: Option<Arc<QueryCache>>,
    pub(crate) limiter: Option<Arc<ConcurrencyLimiter>>,
    debug: Option<Arc<Mutex<Option<DebugCapture>>>>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("builder", &self.builder)
            .field("dialect", &self.dialect)
            .field("cached", &self.cache.is_some())
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

impl Deref for Query {
    type Target = QueryBuilder;

    fn deref(&self) -> &Self::Target {
        &self.builder
    }
}

impl DerefMut for Query {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.builder
    }
}

impl Query {
    /// 以进程级默认方言创建查询。
    pub fn table(driver: Arc<dyn Driver>, table: impl Into<String>) -> Self {
        Self {
            builder: QueryBuilder::new(table),
            driver,
            dialect: default_dialect(),
            cache: None,
            limiter: None,
            debug: None,
        }
    }

    pub fn set_dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.dialect = dialect;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 挂接查询结果缓存。缓存是优化层，不影响正确性，可随时停用。
    pub fn with_cache(&mut self, cache: Arc<QueryCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(&mut self) -> &mut Self {
        self.cache = None;
        self
    }

    pub fn with_limiter(&mut self, limiter: Arc<ConcurrencyLimiter>) -> &mut Self {
        self.limiter = Some(limiter);
        self
    }

    /// 打开调试捕获；之后每次编译都会记录 SQL、参数、方言与编译耗时。
    pub fn enable_debug(&mut self) -> &mut Self {
        self.debug = Some(Arc::new(Mutex::new(None)));
        self
    }

    pub fn last_debug(&self) -> Option<DebugCapture> {
        self.debug.as_ref()?.lock().ok()?.clone()
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn into_builder(self) -> QueryBuilder {
        self.builder
    }

    fn compile_with(
        &self,
        f: impl FnOnce() -> Result<Compiled, compiler::CompileError>,
    ) -> Result<Compiled, Error> {
        let started = Instant::now();
        let compiled = f()?;
        self.record_debug(&compiled, started.elapsed());
        Ok(compiled)
    }

    fn record_debug(&self, compiled: &Compiled, compile_time: Duration) {
        if let Some(slot) = &self.debug
            && let Ok(mut guard) = slot.lock()
        {
            *guard = Some(DebugCapture {
                sql: compiled.sql.clone(),
                bindings: compiled.bindings.clone(),
                dialect: self.dialect,
                compile_time,
            });
        }
    }

    fn run_rows(&self, compiled: &Compiled, context: &'static str) -> Result<Collection, Error> {
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&compiled.sql, &compiled.bindings)
        {
            tracing::trace!(sql = %compiled.sql, "query cache hit");
            return Ok(hit);
        }
        tracing::debug!(sql = %compiled.sql, dialect = %self.dialect, "executing query");
        let rows = self
            .driver
            .query(&compiled.sql, &compiled.bindings)
            .map_err(|e| Error::execute(context, e))?;
        let collection = Collection::materialize(rows)?;
        if let Some(cache) = &self.cache {
            cache.put(&compiled.sql, &compiled.bindings, collection.clone());
        }
        Ok(collection)
    }

    fn run_execute(&self, compiled: &Compiled, context: &'static str) -> Result<ExecResult, Error> {
        tracing::debug!(sql = %compiled.sql, dialect = %self.dialect, "executing statement");
        self.driver
            .execute(&compiled.sql, &compiled.bindings)
            .map_err(|e| Error::execute(context, e))
    }

    // ---- 检索 ----

    pub fn get(&self) -> Result<Collection, Error> {
        let compiled = self.compile_with(|| compiler::compile_select(&self.builder, self.dialect))?;
        self.run_rows(&compiled, "failed to execute query")
    }

    /// 取第一行；没有命中任何行返回 [`Error::NotFound`]。
    pub fn first(&self) -> Result<Row, Error> {
        let mut variant = self.builder.clone();
        variant.limit(1);
        let compiled = self.compile_with(|| compiler::compile_select(&variant, self.dialect))?;
        tracing::debug!(sql = %compiled.sql, dialect = %self.dialect, "executing query");
        let row = self
            .driver
            .query_row(&compiled.sql, &compiled.bindings)
            .map_err(|e| Error::execute("failed to execute query", e))?;
        match row {
            Some(row) => normalize_row(row),
            None => Err(Error::NotFound),
        }
    }

    /// 按主键列 `id` 取一行。
    pub fn find(&self, id: impl Into<Value>) -> Result<Row, Error> {
        let mut q = self.clone();
        q.builder.where_eq("id", id);
        q.first()
    }

    /// 取第一行的某一列。
    pub fn value(&self, column: &str) -> Result<Value, Error> {
        let row = self.first()?;
        row.get(column)
            .cloned()
            .ok_or_else(|| Error::Malformed(format!("column {column} is missing from the result row")))
    }

    pub fn pluck(&self, column: &str) -> Result<Vec<Value>, Error> {
        Ok(self.get()?.pluck(column))
    }

    pub fn exists(&self) -> Result<bool, Error> {
        let compiled = self.compile_with(|| compiler::compile_select(&self.builder, self.dialect))?;
        let wrapped = format!("SELECT EXISTS ({})", compiled.sql);
        tracing::debug!(sql = %wrapped, dialect = %self.dialect, "executing query");
        let row = self
            .driver
            .query_row(&wrapped, &compiled.bindings)
            .map_err(|e| Error::execute("failed to execute exists query", e))?;
        Ok(row
            .and_then(|r| r.values().next().and_then(Value::to_bool))
            .unwrap_or(false))
    }

    // ---- 聚合 ----

    fn aggregate(&self, func: &str, column: &str) -> Result<Option<Value>, Error> {
        let mut variant = self.builder.clone();
        variant.selects = vec![SelectItem::raw(format!("{func}({column}) AS aggregate"))];
        variant.select_bindings.clear();
        variant.orders.clear();
        variant.limit = None;
        variant.offset = None;
        variant.lock = None;
        let compiled = self.compile_with(|| compiler::compile_select(&variant, self.dialect))?;
        tracing::debug!(sql = %compiled.sql, dialect = %self.dialect, "executing query");
        let row = self
            .driver
            .query_row(&compiled.sql, &compiled.bindings)
            .map_err(|e| Error::execute("failed to execute aggregate query", e))?;
        Ok(row.and_then(|r| r.values().next().cloned()))
    }

    pub fn count(&self) -> Result<i64, Error> {
        match self.aggregate("COUNT", "*")? {
            None | Some(Value::Null) => Ok(0),
            Some(v) => v
                .to_i64()
                .ok_or_else(|| Error::Decode(format!("count returned a non-numeric value: {v:?}"))),
        }
    }

    fn numeric_aggregate(&self, func: &str, column: &str) -> Result<Option<f64>, Error> {
        match self.aggregate(func, column)? {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .to_f64()
                .map(Some)
                .ok_or_else(|| Error::Decode(format!("{func} returned a non-numeric value: {v:?}"))),
        }
    }

    pub fn sum(&self, column: &str) -> Result<Option<f64>, Error> {
        self.numeric_aggregate("SUM", column)
    }

    pub fn avg(&self, column: &str) -> Result<Option<f64>, Error> {
        self.numeric_aggregate("AVG", column)
    }

    pub fn min(&self, column: &str) -> Result<Option<f64>, Error> {
        self.numeric_aggregate("MIN", column)
    }

    pub fn max(&self, column: &str) -> Result<Option<f64>, Error> {
        self.numeric_aggregate("MAX", column)
    }

    // ---- 变更 ----

    pub fn insert(&self, values: Values) -> Result<ExecResult, Error> {
        if values.is_empty() {
            return Err(Error::Malformed("insert values are empty".into()));
        }
        let rows = [values];
        let compiled = self.compile_with(|| {
            compiler::compile_insert(self.builder.table(), &rows, self.dialect)
        })?;
        self.run_execute(&compiled, "failed to execute insert")
    }

    pub fn insert_batch(&self, rows: Vec<Values>) -> Result<ExecResult, Error> {
        if rows.is_empty() || rows.iter().any(|r| r.is_empty()) {
            return Err(Error::Malformed("insert values are empty".into()));
        }
        let compiled = self.compile_with(|| {
            compiler::compile_insert(self.builder.table(), &rows, self.dialect)
        })?;
        self.run_execute(&compiled, "failed to execute insert")
    }

    pub fn update(&self, values: Values) -> Result<ExecResult, Error> {
        if values.is_empty() {
            return Err(Error::Malformed("update values are empty".into()));
        }
        let compiled = self.compile_with(|| {
            compiler::compile_update(&self.builder, &values, self.dialect)
        })?;
        self.run_execute(&compiled, "failed to execute update")
    }

    pub fn delete(&self) -> Result<ExecResult, Error> {
        let compiled = self.compile_with(|| compiler::compile_delete(&self.builder, self.dialect))?;
        self.run_execute(&compiled, "failed to execute delete")
    }

    /// 插入或按冲突目标更新。`update` 缺省为“插入列里不在冲突目标中的列”。
    pub fn upsert(
        &self,
        rows: Vec<Values>,
        conflict: &[&str],
        update: Option<&[&str]>,
    ) -> Result<ExecResult, Error> {
        if rows.is_empty() || rows.iter().any(|r| r.is_empty()) {
            return Err(Error::Malformed("upsert values are empty".into()));
        }
        let conflict: Vec<String> = conflict.iter().map(|c| c.to_string()).collect();
        let update: Vec<String> = match update {
            Some(cols) => cols.iter().map(|c| c.to_string()).collect(),
            None => rows[0]
                .keys()
                .filter(|c| !conflict.iter().any(|k| k == *c))
                .cloned()
                .collect(),
        };
        let compiled = self.compile_with(|| {
            compiler::compile_upsert(self.builder.table(), &rows, &conflict, &update, self.dialect)
        })?;
        self.run_execute(&compiled, "failed to execute upsert")
    }

    // ---- 异步包装 ----

    pub(crate) async fn run_blocking<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(Query) -> Result<T, Error> + Send + 'static,
    {
        let permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire().await.map_err(|e| {
                Error::execute(
                    "failed to acquire concurrency permit",
                    DriverError::new(e.to_string()),
                )
            })?),
            None => None,
        };
        let q = self.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f(q)
        })
        .await
        .map_err(|e| Error::execute("failed to join async task", DriverError::new(e.to_string())))?
    }

    pub async fn get_async(&self) -> Result<Collection, Error> {
        self.run_blocking(|q| q.get()).await
    }

    pub async fn first_async(&self) -> Result<Row, Error> {
        self.run_blocking(|q| q.first()).await
    }

    pub async fn count_async(&self) -> Result<i64, Error> {
        self.run_blocking(|q| q.count()).await
    }
}

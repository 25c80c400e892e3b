//! fluent-query：链式 SQL 查询构建、方言编译与结果物化/分页库。
//!
//! 调用方在 [`QueryBuilder`] 上累积子句，编译器把描述渲染成方言正确的
//! SQL 文本与一份按占位符顺序排列的参数表，[`Query`] 把两者交给执行
//! 协作方并把返回的行物化为 [`Collection`]。

pub mod cache;
pub mod chunk;
pub mod clause;
pub mod collection;
pub mod compiler;
pub mod dialect;
pub mod engine;
#[cfg(test)]
mod engine_tests;
pub mod error;
pub mod executor;
pub mod interpolate;
pub mod limiter;
pub mod macros;
pub use crate::macros::*;
pub mod paginate;
pub mod query;
mod string_builder;
#[cfg(test)]
mod test_support;
pub mod value;

pub use crate::cache::QueryCache;
pub use crate::chunk::LazyRows;
pub use crate::clause::{
    Cond, CondKind, Connective, Direction, GroupItem, Join, JoinKind, LockMode, OrderItem,
    SelectItem, UnionBranch,
};
pub use crate::collection::{Collection, Row};
pub use crate::compiler::{
    CompileError, Compiled, compile_delete, compile_insert, compile_select, compile_update,
    compile_upsert, compile_where,
};
pub use crate::dialect::{
    DefaultDialectGuard, Dialect, default_dialect, set_default_dialect, set_default_dialect_scoped,
};
pub use crate::engine::{DebugCapture, Query};
pub use crate::error::Error;
pub use crate::executor::{Connection, Driver, DriverError, ExecResult, Transaction};
pub use crate::interpolate::InterpolateError;
pub use crate::limiter::ConcurrencyLimiter;
pub use crate::paginate::{CursorPage, PaginationMeta, Paginator, UNKNOWN_TOTAL};
pub use crate::query::QueryBuilder;
pub use crate::value::{Value, Values};

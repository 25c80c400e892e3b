//! SQL Dialect（方言）：控制占位符、Quote、锁/JSON/全文检索语法分支。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

/// 支持的两种方言：MySQL 输出不编号的 `?` 占位符，PostgreSQL 输出从 1 起连续编号的 `$n`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    MySQL,
    PostgreSQL,
}

static DEFAULT_DIALECT: AtomicU8 = AtomicU8::new(Dialect::MySQL as u8);
static DEFAULT_DIALECT_LOCK: Mutex<()> = Mutex::new(());

impl Dialect {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::PostgreSQL,
            _ => Self::MySQL,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    /// 为标识符加引号。
    pub fn quote(self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{name}`"),
            Self::PostgreSQL => format!("\"{name}\""),
        }
    }

    pub(crate) fn write_placeholder(self, index_1_based: usize, out: &mut String) {
        match self {
            Self::MySQL => out.push('?'),
            Self::PostgreSQL => {
                out.push('$');
                out.push_str(&index_1_based.to_string());
            }
        }
    }
}

/// 获取当前进程级默认方言。
pub fn default_dialect() -> Dialect {
    Dialect::from_u8(DEFAULT_DIALECT.load(Ordering::Relaxed))
}

/// 设置进程级默认方言，返回旧值。
pub fn set_default_dialect(dialect: Dialect) -> Dialect {
    let old = DEFAULT_DIALECT.swap(dialect.to_u8(), Ordering::Relaxed);
    Dialect::from_u8(old)
}

/// 修改默认方言的 RAII guard（持有一个全局锁，避免并行测试互相干扰）。
pub struct DefaultDialectGuard {
    _lock: MutexGuard<'static, ()>,
    old: Dialect,
}

impl Drop for DefaultDialectGuard {
    fn drop(&mut self) {
        set_default_dialect(self.old);
    }
}

/// 在一个作用域内临时设置默认方言，退出作用域后自动恢复。
pub fn set_default_dialect_scoped(dialect: Dialect) -> DefaultDialectGuard {
    let lock = DEFAULT_DIALECT_LOCK
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let old = set_default_dialect(dialect);
    DefaultDialectGuard { _lock: lock, old }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MySQL => "MySQL",
            Self::PostgreSQL => "PostgreSQL",
        };
        f.write_str(s)
    }
}

//! 错误分类：请求非法、编译失败、执行失败、未命中、行解码失败。
//!
//! 所有错误都带上下文返回给调用方，内部不记录也不吞掉；执行失败从不自动
//! 重试。

use crate::compiler::CompileError;
use crate::executor::DriverError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 发出任何 SQL 之前就被拒绝的请求：空的插入/更新值集、非正的分块
    /// 大小等。
    #[error("{0}")]
    Malformed(String),

    /// 当前方言不支持所请求的特性。
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// 执行协作方调用失败。
    #[error("{context}: {source}")]
    Execute {
        context: &'static str,
        source: DriverError,
    },

    /// `first`/`find` 没有命中任何行。与执行失败是两类条件，调用方可以
    /// 据此分支。
    #[error("query returned no rows")]
    NotFound,

    /// 扫描/物化某一行失败；整个结果集的物化会被中止。
    #[error("failed to decode row: {0}")]
    Decode(String),
}

impl Error {
    pub(crate) fn execute(context: &'static str, source: DriverError) -> Self {
        Self::Execute { context, source }
    }

    /// 是否为“未命中”而非真正的失败。
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

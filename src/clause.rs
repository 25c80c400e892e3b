//! 子句模型：每类子句一个带判别标签的枚举，编译器按标签分派渲染。

use crate::query::QueryBuilder;
use crate::value::Value;

/// 条件之间的连接词，默认 AND。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

/// SELECT 列表项。Raw 片段自身携带的参数记录在 builder 的附加参数表里。
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column {
        name: String,
        alias: Option<String>,
    },
    Raw {
        sql: String,
    },
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Column {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw { sql: sql.into() }
    }
}

/// 过滤/HAVING 条件的具体形态。
///
/// Between/In/Null/Exists 用 `negated` 标志表达否定极性，而不是为每种极性
/// 复制一个枚举项。结构化形态和 Raw 文本互斥，由构造函数保证。
#[derive(Debug, Clone, PartialEq)]
pub enum CondKind {
    Compare {
        column: String,
        op: String,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    InSub {
        column: String,
        query: Box<QueryBuilder>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Exists {
        query: Box<QueryBuilder>,
        negated: bool,
    },
    Sub {
        column: String,
        op: String,
        query: Box<QueryBuilder>,
    },
    JsonContains {
        column: String,
        value: Value,
    },
    JsonLength {
        column: String,
        op: String,
        value: Value,
    },
    FullText {
        columns: Vec<String>,
        term: String,
    },
    Nested(Vec<Cond>),
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

/// 一条过滤/HAVING 条件：形态 + 连接词。
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    pub kind: CondKind,
    pub connective: Connective,
}

impl Cond {
    pub fn new(kind: CondKind) -> Self {
        Self {
            kind,
            connective: Connective::And,
        }
    }

    pub fn or(kind: CondKind) -> Self {
        Self {
            kind,
            connective: Connective::Or,
        }
    }
}

/// JOIN 类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// JOIN 子句：标识符谓词（左列/比较符/右列）加可选的附加条件列表。
/// Cross join 没有谓词。
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Option<(String, String, String)>,
    pub extra: Vec<Cond>,
}

/// 排序方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// ORDER BY 项。
#[derive(Debug, Clone, PartialEq)]
pub enum OrderItem {
    Column {
        column: String,
        direction: Direction,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

/// GROUP BY 项。
#[derive(Debug, Clone, PartialEq)]
pub enum GroupItem {
    Column(String),
    Raw { sql: String, bindings: Vec<Value> },
}

/// UNION 分支：嵌套查询描述 + 是否 UNION ALL。
#[derive(Debug, Clone, PartialEq)]
pub struct UnionBranch {
    pub query: Box<QueryBuilder>,
    pub all: bool,
}

/// 行锁模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    ForUpdate,
    Shared,
}

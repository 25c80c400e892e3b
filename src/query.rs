//! QueryBuilder：查询描述聚合体与链式累积接口。
//!
//! 所有子句列表都是自有存储，`Clone` 即得到完全独立的深拷贝；分页、计数、
//! 分块都从同一个基础查询派生变体，相互之间不允许共享内部列表。
//! 跨任务并发使用前必须先 `clone()`，聚合体内部不做任何同步。

use crate::clause::{
    Cond, CondKind, Connective, Direction, GroupItem, Join, JoinKind, LockMode, OrderItem,
    SelectItem, UnionBranch,
};
use crate::value::Value;

/// 尚未渲染的完整查询描述。字段顺序即渲染顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    pub(crate) table: String,
    pub(crate) distinct: bool,
    pub(crate) selects: Vec<SelectItem>,
    /// Raw SELECT 片段携带的参数。编译时统一追加在所有子句参数之后。
    pub(crate) select_bindings: Vec<Value>,
    pub(crate) joins: Vec<Join>,
    pub(crate) wheres: Vec<Cond>,
    pub(crate) groups: Vec<GroupItem>,
    pub(crate) havings: Vec<Cond>,
    pub(crate) unions: Vec<UnionBranch>,
    pub(crate) orders: Vec<OrderItem>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) lock: Option<LockMode>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    // ---- SELECT ----

    /// 替换 SELECT 列表。
    pub fn select<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selects = cols
            .into_iter()
            .map(|c| SelectItem::column(c.into()))
            .collect();
        self
    }

    /// 追加 SELECT 列。
    pub fn add_select(&mut self, col: impl Into<String>) -> &mut Self {
        self.selects.push(SelectItem::column(col));
        self
    }

    pub fn select_as(&mut self, col: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.selects.push(SelectItem::aliased(col, alias));
        self
    }

    /// 追加 Raw SELECT 片段；片段参数延后追加（见编译器）。
    pub fn select_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.selects.push(SelectItem::raw(sql));
        self.select_bindings.extend(bindings);
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    // ---- JOIN ----

    fn push_join(
        &mut self,
        kind: JoinKind,
        table: impl Into<String>,
        on: Option<(String, String, String)>,
        extra: Vec<Cond>,
    ) -> &mut Self {
        self.joins.push(Join {
            kind,
            table: table.into(),
            on,
            extra,
        });
        self
    }

    pub fn join(
        &mut self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: impl Into<String>,
        right: impl Into<String>,
    ) -> &mut Self {
        self.push_join(
            JoinKind::Inner,
            table,
            Some((left.into(), op.into(), right.into())),
            Vec::new(),
        )
    }

    pub fn left_join(
        &mut self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: impl Into<String>,
        right: impl Into<String>,
    ) -> &mut Self {
        self.push_join(
            JoinKind::Left,
            table,
            Some((left.into(), op.into(), right.into())),
            Vec::new(),
        )
    }

    pub fn right_join(
        &mut self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: impl Into<String>,
        right: impl Into<String>,
    ) -> &mut Self {
        self.push_join(
            JoinKind::Right,
            table,
            Some((left.into(), op.into(), right.into())),
            Vec::new(),
        )
    }

    pub fn cross_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.push_join(JoinKind::Cross, table, None, Vec::new())
    }

    /// JOIN 并附加额外的绑定条件；闭包里累积的 WHERE 条件会成为 ON 的附加部分。
    pub fn join_on(
        &mut self,
        table: impl Into<String>,
        left: impl Into<String>,
        op: impl Into<String>,
        right: impl Into<String>,
        f: impl FnOnce(&mut QueryBuilder),
    ) -> &mut Self {
        let mut scratch = QueryBuilder::default();
        f(&mut scratch);
        self.push_join(
            JoinKind::Inner,
            table,
            Some((left.into(), op.into(), right.into())),
            scratch.wheres,
        )
    }

    // ---- WHERE ----

    pub fn where_(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Compare {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }));
        self
    }

    /// 两参数等值比较的简写。
    pub fn where_eq(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.where_(column, "=", value)
    }

    pub fn or_where(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::or(CondKind::Compare {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }));
        self
    }

    fn push_in(&mut self, column: String, values: Vec<Value>, negated: bool) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::In {
            column,
            values,
            negated,
        }));
        self
    }

    pub fn where_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in(column.into(), values, false)
    }

    pub fn where_not_in<I, V>(&mut self, column: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_in(column.into(), values, true)
    }

    pub fn where_in_sub(&mut self, column: impl Into<String>, query: QueryBuilder) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::InSub {
            column: column.into(),
            query: Box::new(query),
            negated: false,
        }));
        self
    }

    pub fn where_not_in_sub(
        &mut self,
        column: impl Into<String>,
        query: QueryBuilder,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::InSub {
            column: column.into(),
            query: Box::new(query),
            negated: true,
        }));
        self
    }

    pub fn where_between(
        &mut self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
        }));
        self
    }

    pub fn where_not_between(
        &mut self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: true,
        }));
        self
    }

    pub fn where_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Null {
            column: column.into(),
            negated: false,
        }));
        self
    }

    pub fn where_not_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Null {
            column: column.into(),
            negated: true,
        }));
        self
    }

    pub fn where_exists(&mut self, query: QueryBuilder) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Exists {
            query: Box::new(query),
            negated: false,
        }));
        self
    }

    pub fn where_not_exists(&mut self, query: QueryBuilder) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Exists {
            query: Box::new(query),
            negated: true,
        }));
        self
    }

    /// 列与子查询结果比较，如 `price >= (SELECT avg(price) ...)`。
    pub fn where_sub(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        query: QueryBuilder,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Sub {
            column: column.into(),
            op: op.into(),
            query: Box::new(query),
        }));
        self
    }

    pub fn where_json_contains(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::JsonContains {
            column: column.into(),
            value: value.into(),
        }));
        self
    }

    pub fn where_json_length(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::JsonLength {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }));
        self
    }

    pub fn where_full_text<I, S>(&mut self, columns: I, term: impl Into<String>) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wheres.push(Cond::new(CondKind::FullText {
            columns: columns.into_iter().map(Into::into).collect(),
            term: term.into(),
        }));
        self
    }

    /// 括号分组；闭包里没有累积任何条件时整组丢弃。
    pub fn where_nested(&mut self, f: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        self.push_nested(Connective::And, f)
    }

    pub fn or_where_nested(&mut self, f: impl FnOnce(&mut QueryBuilder)) -> &mut Self {
        self.push_nested(Connective::Or, f)
    }

    fn push_nested(
        &mut self,
        connective: Connective,
        f: impl FnOnce(&mut QueryBuilder),
    ) -> &mut Self {
        let mut scratch = QueryBuilder::default();
        f(&mut scratch);
        if !scratch.wheres.is_empty() {
            self.wheres.push(Cond {
                kind: CondKind::Nested(scratch.wheres),
                connective,
            });
        }
        self
    }

    /// Raw WHERE 片段；`?` 标记与 `bindings` 一一对应，参数按片段出现位置插入。
    pub fn where_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::new(CondKind::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().collect(),
        }));
        self
    }

    pub fn or_where_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.wheres.push(Cond::or(CondKind::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().collect(),
        }));
        self
    }

    // ---- GROUP BY / HAVING ----

    pub fn group_by<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .extend(cols.into_iter().map(|c| GroupItem::Column(c.into())));
        self
    }

    pub fn group_by_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.groups.push(GroupItem::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().collect(),
        });
        self
    }

    pub fn having(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.havings.push(Cond::new(CondKind::Compare {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }));
        self
    }

    pub fn or_having(
        &mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.havings.push(Cond::or(CondKind::Compare {
            column: column.into(),
            op: op.into(),
            value: value.into(),
        }));
        self
    }

    pub fn having_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.havings.push(Cond::new(CondKind::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().collect(),
        }));
        self
    }

    // ---- UNION ----

    pub fn union(&mut self, other: QueryBuilder) -> &mut Self {
        self.unions.push(UnionBranch {
            query: Box::new(other),
            all: false,
        });
        self
    }

    pub fn union_all(&mut self, other: QueryBuilder) -> &mut Self {
        self.unions.push(UnionBranch {
            query: Box::new(other),
            all: true,
        });
        self
    }

    // ---- ORDER / LIMIT / LOCK ----

    pub fn order_by(&mut self, column: impl Into<String>) -> &mut Self {
        self.orders.push(OrderItem::Column {
            column: column.into(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_by_desc(&mut self, column: impl Into<String>) -> &mut Self {
        self.orders.push(OrderItem::Column {
            column: column.into(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn order_by_raw(
        &mut self,
        sql: impl Into<String>,
        bindings: impl IntoIterator<Item = Value>,
    ) -> &mut Self {
        self.orders.push(OrderItem::Raw {
            sql: sql.into(),
            bindings: bindings.into_iter().collect(),
        });
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn clear_limit(&mut self) -> &mut Self {
        self.limit = None;
        self
    }

    pub fn clear_offset(&mut self) -> &mut Self {
        self.offset = None;
        self
    }

    pub fn lock_for_update(&mut self) -> &mut Self {
        self.lock = Some(LockMode::ForUpdate);
        self
    }

    pub fn shared_lock(&mut self) -> &mut Self {
        self.lock = Some(LockMode::Shared);
        self
    }

    // ---- 高阶组合 ----

    /// 条件为真时应用延迟变换。
    pub fn when(&mut self, apply: bool, f: impl FnOnce(&mut Self)) -> &mut Self {
        if apply {
            f(self);
        }
        self
    }

    /// 执行一次副作用变换并丢弃其结果。
    pub fn tap(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        f(self);
        self
    }
}

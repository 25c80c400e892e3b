//! 方言编译器：按固定段顺序渲染查询描述，同时按占位符出现顺序收集参数。
//!
//! 段顺序：SELECT、FROM、JOIN、WHERE、GROUP BY、HAVING、UNION、ORDER BY、
//! LIMIT、OFFSET、LOCK，以单个空格连接。PostgreSQL 的 `$n` 编号由一个贯穿
//! 整条语句（含 JOIN 附加条件、HAVING、UNION 分支与 Raw 片段）的计数器分配，
//! 中途不会重置。
//!
//! 参数顺序不变式：返回的参数列表与渲染文本中占位符的出现顺序逐个对应。
//! 唯一的例外是 Raw SELECT 片段的参数：它们被统一延后，追加在所有子句参数
//! 之后（见 `QueryBuilder::select_raw`）。

use crate::clause::{
    Cond, CondKind, Connective, GroupItem, Join, LockMode, OrderItem, SelectItem,
};
use crate::dialect::Dialect;
use crate::query::QueryBuilder;
use crate::string_builder::StringBuilder;
use crate::value::{Value, Values};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("query {feature} is not supported for dialect {dialect}")]
    Unsupported {
        feature: &'static str,
        dialect: Dialect,
    },
    #[error("query is missing a target table")]
    MissingTable,
}

/// 一次编译的产物：SQL 文本与按占位符顺序排列的参数。
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub bindings: Vec<Value>,
}

struct Ctx {
    buf: StringBuilder,
    dialect: Dialect,
    bindings: Vec<Value>,
    deferred: Vec<Value>,
    next: usize,
}

impl Ctx {
    fn new(dialect: Dialect) -> Self {
        Self {
            buf: StringBuilder::new(),
            dialect,
            bindings: Vec::new(),
            deferred: Vec::new(),
            next: 1,
        }
    }

    fn write_marker(&mut self) {
        self.dialect
            .write_placeholder(self.next, self.buf.as_mut_string());
        self.next += 1;
    }

    fn bind(&mut self, v: Value) {
        self.write_marker();
        self.bindings.push(v);
    }

    /// 渲染一个 Raw 片段：`?` 标记改写为当前方言的占位符（引号内的问号原样
    /// 保留）。`bindings` 为 `Some` 时参数在片段位置插入；`None` 表示参数
    /// 另行延后（Raw SELECT）。
    fn write_fragment(&mut self, sql: &str, bindings: Option<&[Value]>) {
        let mut k = 0usize;
        let mut quote: Option<char> = None;
        let mut escaping = false;

        for c in sql.chars() {
            if escaping {
                self.buf.write_char(c);
                escaping = false;
                continue;
            }
            match c {
                '\\' if quote.is_some() => {
                    self.buf.write_char(c);
                    escaping = true;
                }
                '\'' | '"' | '`' => {
                    if quote == Some(c) {
                        quote = None;
                    } else if quote.is_none() {
                        quote = Some(c);
                    }
                    self.buf.write_char(c);
                }
                '?' if quote.is_none() => {
                    self.write_marker();
                    if let Some(values) = bindings
                        && let Some(v) = values.get(k)
                    {
                        self.bindings.push(v.clone());
                    }
                    k += 1;
                }
                _ => self.buf.write_char(c),
            }
        }

        // 标记数少于参数数时，多出的参数仍按原顺序补进参数表
        if let Some(values) = bindings {
            for v in values.iter().skip(k) {
                self.bindings.push(v.clone());
            }
        }
    }

    fn finish(mut self) -> Compiled {
        self.bindings.append(&mut self.deferred);
        Compiled {
            sql: self.buf.into_string(),
            bindings: self.bindings,
        }
    }
}

/// 编译一条 SELECT 语句。
pub fn compile_select(q: &QueryBuilder, dialect: Dialect) -> Result<Compiled, CompileError> {
    let mut ctx = Ctx::new(dialect);
    render_select_stmt(q, &mut ctx)?;
    Ok(ctx.finish())
}

/// 只编译 WHERE 段（含前导关键字；无条件时产出为空）。
///
/// SELECT 与 UPDATE/DELETE 共用这一入口，变更语句不再从完整 SELECT 文本里
/// 截取 WHERE。
pub fn compile_where(q: &QueryBuilder, dialect: Dialect) -> Result<Compiled, CompileError> {
    let mut ctx = Ctx::new(dialect);
    render_cond_section(&q.wheres, "WHERE", &mut ctx)?;
    Ok(ctx.finish())
}

/// 编译 INSERT；多行批量插入时列集取第一行的列，后续行缺失的列补 NULL。
pub fn compile_insert(
    table: &str,
    rows: &[Values],
    dialect: Dialect,
) -> Result<Compiled, CompileError> {
    if table.is_empty() {
        return Err(CompileError::MissingTable);
    }
    let mut ctx = Ctx::new(dialect);
    render_insert(table, rows, &mut ctx);
    Ok(ctx.finish())
}

/// 编译 UPDATE。PostgreSQL 下 SET 的参数先于 WHERE 的参数编号。
pub fn compile_update(
    q: &QueryBuilder,
    values: &Values,
    dialect: Dialect,
) -> Result<Compiled, CompileError> {
    if q.table.is_empty() {
        return Err(CompileError::MissingTable);
    }
    let mut ctx = Ctx::new(dialect);
    ctx.buf.write_leading("UPDATE");
    ctx.buf.write_char(' ');
    ctx.buf.write_str(&q.table);
    ctx.buf.write_str(" SET ");
    for (i, (col, v)) in values.iter().enumerate() {
        if i > 0 {
            ctx.buf.write_str(", ");
        }
        ctx.buf.write_str(col);
        ctx.buf.write_str(" = ");
        ctx.bind(v.clone());
    }
    render_cond_section(&q.wheres, "WHERE", &mut ctx)?;
    Ok(ctx.finish())
}

/// 编译 DELETE。
pub fn compile_delete(q: &QueryBuilder, dialect: Dialect) -> Result<Compiled, CompileError> {
    if q.table.is_empty() {
        return Err(CompileError::MissingTable);
    }
    let mut ctx = Ctx::new(dialect);
    ctx.buf.write_leading("DELETE FROM");
    ctx.buf.write_char(' ');
    ctx.buf.write_str(&q.table);
    render_cond_section(&q.wheres, "WHERE", &mut ctx)?;
    Ok(ctx.finish())
}

/// 编译 Upsert。两种方言产出完全不同的语句：
/// MySQL 追加按列名引用插入值的 `ON DUPLICATE KEY UPDATE`；PostgreSQL 追加
/// 显式冲突列表和 `DO UPDATE SET col = excluded.col`（更新集为空时退化为
/// `DO NOTHING`）。
pub fn compile_upsert(
    table: &str,
    rows: &[Values],
    conflict: &[String],
    update: &[String],
    dialect: Dialect,
) -> Result<Compiled, CompileError> {
    if table.is_empty() {
        return Err(CompileError::MissingTable);
    }
    match dialect {
        Dialect::MySQL if update.is_empty() => {
            return Err(CompileError::Unsupported {
                feature: "upsert with an empty update set",
                dialect,
            });
        }
        Dialect::PostgreSQL if conflict.is_empty() => {
            return Err(CompileError::Unsupported {
                feature: "upsert without a conflict target",
                dialect,
            });
        }
        _ => {}
    }

    let mut ctx = Ctx::new(dialect);
    render_insert(table, rows, &mut ctx);

    match dialect {
        Dialect::MySQL => {
            ctx.buf.write_leading("ON DUPLICATE KEY UPDATE");
            ctx.buf.write_char(' ');
            for (i, col) in update.iter().enumerate() {
                if i > 0 {
                    ctx.buf.write_str(", ");
                }
                ctx.buf.write_str(col);
                ctx.buf.write_str(" = VALUES(");
                ctx.buf.write_str(col);
                ctx.buf.write_char(')');
            }
        }
        Dialect::PostgreSQL => {
            ctx.buf.write_leading("ON CONFLICT (");
            ctx.buf.write_str(&conflict.join(", "));
            ctx.buf.write_char(')');
            if update.is_empty() {
                ctx.buf.write_leading("DO NOTHING");
            } else {
                ctx.buf.write_leading("DO UPDATE SET");
                ctx.buf.write_char(' ');
                for (i, col) in update.iter().enumerate() {
                    if i > 0 {
                        ctx.buf.write_str(", ");
                    }
                    ctx.buf.write_str(col);
                    ctx.buf.write_str(" = excluded.");
                    ctx.buf.write_str(col);
                }
            }
        }
    }
    Ok(ctx.finish())
}

fn render_select_stmt(q: &QueryBuilder, ctx: &mut Ctx) -> Result<(), CompileError> {
    if q.table.is_empty() {
        return Err(CompileError::MissingTable);
    }

    ctx.buf.write_leading("SELECT");
    if q.distinct {
        ctx.buf.write_str(" DISTINCT");
    }
    ctx.buf.write_char(' ');
    if q.selects.is_empty() {
        ctx.buf.write_char('*');
    } else {
        for (i, item) in q.selects.iter().enumerate() {
            if i > 0 {
                ctx.buf.write_str(", ");
            }
            match item {
                SelectItem::Column { name, alias } => {
                    ctx.buf.write_str(name);
                    if let Some(alias) = alias {
                        ctx.buf.write_str(" AS ");
                        ctx.buf.write_str(alias);
                    }
                }
                SelectItem::Raw { sql } => ctx.write_fragment(sql, None),
            }
        }
    }
    ctx.deferred.extend(q.select_bindings.iter().cloned());

    ctx.buf.write_leading("FROM");
    ctx.buf.write_char(' ');
    ctx.buf.write_str(&q.table);

    for join in &q.joins {
        render_join(join, ctx)?;
    }

    render_cond_section(&q.wheres, "WHERE", ctx)?;

    if !q.groups.is_empty() {
        ctx.buf.write_leading("GROUP BY");
        ctx.buf.write_char(' ');
        for (i, item) in q.groups.iter().enumerate() {
            if i > 0 {
                ctx.buf.write_str(", ");
            }
            match item {
                GroupItem::Column(name) => ctx.buf.write_str(name),
                GroupItem::Raw { sql, bindings } => ctx.write_fragment(sql, Some(bindings)),
            }
        }
    }

    render_cond_section(&q.havings, "HAVING", ctx)?;

    for branch in &q.unions {
        ctx.buf
            .write_leading(if branch.all { "UNION ALL" } else { "UNION" });
        render_select_stmt(&branch.query, ctx)?;
    }

    if !q.orders.is_empty() {
        ctx.buf.write_leading("ORDER BY");
        ctx.buf.write_char(' ');
        for (i, item) in q.orders.iter().enumerate() {
            if i > 0 {
                ctx.buf.write_str(", ");
            }
            match item {
                OrderItem::Column { column, direction } => {
                    ctx.buf.write_str(column);
                    ctx.buf.write_char(' ');
                    ctx.buf.write_str(direction.as_str());
                }
                OrderItem::Raw { sql, bindings } => ctx.write_fragment(sql, Some(bindings)),
            }
        }
    }

    if let Some(limit) = q.limit {
        ctx.buf.write_leading("LIMIT");
        ctx.buf.write_char(' ');
        ctx.buf.write_str(&limit.to_string());
    }
    if let Some(offset) = q.offset {
        ctx.buf.write_leading("OFFSET");
        ctx.buf.write_char(' ');
        ctx.buf.write_str(&offset.to_string());
    }

    if let Some(lock) = q.lock {
        let sql = match (lock, ctx.dialect) {
            (LockMode::ForUpdate, _) => "FOR UPDATE",
            (LockMode::Shared, Dialect::MySQL) => "LOCK IN SHARE MODE",
            (LockMode::Shared, Dialect::PostgreSQL) => "FOR SHARE",
        };
        ctx.buf.write_leading(sql);
    }

    Ok(())
}

fn render_join(join: &Join, ctx: &mut Ctx) -> Result<(), CompileError> {
    ctx.buf.write_leading(join.kind.as_str());
    ctx.buf.write_char(' ');
    ctx.buf.write_str(&join.table);
    if let Some((left, op, right)) = &join.on {
        ctx.buf.write_str(" ON ");
        ctx.buf.write_str(left);
        ctx.buf.write_char(' ');
        ctx.buf.write_str(op);
        ctx.buf.write_char(' ');
        ctx.buf.write_str(right);
        for cond in &join.extra {
            ctx.buf.write_str(connective_str(cond.connective));
            render_cond(cond, ctx)?;
        }
    }
    Ok(())
}

fn render_cond_section(
    conds: &[Cond],
    keyword: &str,
    ctx: &mut Ctx,
) -> Result<(), CompileError> {
    if conds.is_empty() {
        return Ok(());
    }
    ctx.buf.write_leading(keyword);
    ctx.buf.write_char(' ');
    render_conds(conds, ctx)
}

fn render_conds(conds: &[Cond], ctx: &mut Ctx) -> Result<(), CompileError> {
    for (i, cond) in conds.iter().enumerate() {
        if i > 0 {
            ctx.buf.write_str(connective_str(cond.connective));
        }
        render_cond(cond, ctx)?;
    }
    Ok(())
}

fn connective_str(c: Connective) -> &'static str {
    match c {
        Connective::And => " AND ",
        Connective::Or => " OR ",
    }
}

fn render_cond(cond: &Cond, ctx: &mut Ctx) -> Result<(), CompileError> {
    match &cond.kind {
        CondKind::Compare { column, op, value } => {
            ctx.buf.write_str(column);
            ctx.buf.write_char(' ');
            ctx.buf.write_str(op);
            ctx.buf.write_char(' ');
            ctx.bind(value.clone());
        }
        CondKind::In {
            column,
            values,
            negated,
        } => {
            // 空集合退化为恒假/恒真，避免产出非法的 `IN ()`
            if values.is_empty() {
                ctx.buf.write_str(if *negated { "1 = 1" } else { "0 = 1" });
                return Ok(());
            }
            ctx.buf.write_str(column);
            ctx.buf.write_str(if *negated { " NOT IN (" } else { " IN (" });
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    ctx.buf.write_str(", ");
                }
                ctx.bind(v.clone());
            }
            ctx.buf.write_char(')');
        }
        CondKind::InSub {
            column,
            query,
            negated,
        } => {
            ctx.buf.write_str(column);
            ctx.buf.write_str(if *negated { " NOT IN (" } else { " IN (" });
            render_select_stmt(query, ctx)?;
            ctx.buf.write_char(')');
        }
        CondKind::Between {
            column,
            low,
            high,
            negated,
        } => {
            ctx.buf.write_str(column);
            ctx.buf
                .write_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
            ctx.bind(low.clone());
            ctx.buf.write_str(" AND ");
            ctx.bind(high.clone());
        }
        CondKind::Null { column, negated } => {
            ctx.buf.write_str(column);
            ctx.buf
                .write_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
        }
        CondKind::Exists { query, negated } => {
            ctx.buf
                .write_str(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
            render_select_stmt(query, ctx)?;
            ctx.buf.write_char(')');
        }
        CondKind::Sub { column, op, query } => {
            ctx.buf.write_str(column);
            ctx.buf.write_char(' ');
            ctx.buf.write_str(op);
            ctx.buf.write_str(" (");
            render_select_stmt(query, ctx)?;
            ctx.buf.write_char(')');
        }
        CondKind::JsonContains { column, value } => match ctx.dialect {
            Dialect::MySQL => {
                ctx.buf.write_str("json_contains(");
                ctx.buf.write_str(column);
                ctx.buf.write_str(", ");
                ctx.bind(value.clone());
                ctx.buf.write_char(')');
            }
            Dialect::PostgreSQL => {
                ctx.buf.write_str(column);
                ctx.buf.write_str(" @> ");
                ctx.bind(value.clone());
            }
        },
        CondKind::JsonLength { column, op, value } => {
            let func = match ctx.dialect {
                Dialect::MySQL => "json_length",
                Dialect::PostgreSQL => "jsonb_array_length",
            };
            ctx.buf.write_str(func);
            ctx.buf.write_char('(');
            ctx.buf.write_str(column);
            ctx.buf.write_str(") ");
            ctx.buf.write_str(op);
            ctx.buf.write_char(' ');
            ctx.bind(value.clone());
        }
        CondKind::FullText { columns, term } => {
            if columns.is_empty() {
                return Err(CompileError::Unsupported {
                    feature: "full-text search without columns",
                    dialect: ctx.dialect,
                });
            }
            match ctx.dialect {
                Dialect::MySQL => {
                    ctx.buf.write_str("MATCH (");
                    ctx.buf.write_str(&columns.join(", "));
                    ctx.buf.write_str(") AGAINST (");
                    ctx.bind(Value::Text(term.clone()));
                    ctx.buf.write_str(" IN NATURAL LANGUAGE MODE)");
                }
                Dialect::PostgreSQL => {
                    ctx.buf.write_str("to_tsvector('english', ");
                    ctx.buf.write_str(&columns.join(" || ' ' || "));
                    ctx.buf.write_str(") @@ plainto_tsquery('english', ");
                    ctx.bind(Value::Text(term.clone()));
                    ctx.buf.write_char(')');
                }
            }
        }
        CondKind::Nested(inner) => {
            ctx.buf.write_char('(');
            render_conds(inner, ctx)?;
            ctx.buf.write_char(')');
        }
        CondKind::Raw { sql, bindings } => ctx.write_fragment(sql, Some(bindings)),
    }
    Ok(())
}

fn render_insert(table: &str, rows: &[Values], ctx: &mut Ctx) {
    let cols: Vec<&String> = rows.first().map(|r| r.keys().collect()).unwrap_or_default();

    ctx.buf.write_leading("INSERT INTO");
    ctx.buf.write_char(' ');
    ctx.buf.write_str(table);
    ctx.buf.write_str(" (");
    for (i, col) in cols.iter().enumerate() {
        if i > 0 {
            ctx.buf.write_str(", ");
        }
        ctx.buf.write_str(col);
    }
    ctx.buf.write_str(") VALUES ");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            ctx.buf.write_str(", ");
        }
        ctx.buf.write_char('(');
        for (j, col) in cols.iter().enumerate() {
            if j > 0 {
                ctx.buf.write_str(", ");
            }
            ctx.bind(row.get(*col).cloned().unwrap_or(Value::Null));
        }
        ctx.buf.write_char(')');
    }
}

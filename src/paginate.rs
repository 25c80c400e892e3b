//! 分页：偏移分页、免计数的简单分页、游标分页。
//!
//! 三种分页都从基础查询 clone 出变体，互不干扰。元信息的形状可直接序列化
//! 为 API 响应体。

use serde::Serialize;

use crate::collection::Collection;
use crate::engine::Query;
use crate::error::Error;
use crate::value::Value;

/// total/last_page 未知时的哨兵值（简单分页与游标分页刻意不发计数查询）。
pub const UNKNOWN_TOTAL: i64 = -1;

/// 分页元信息。`from`/`to` 为 1 起的行边界，结果集为空时都是 0。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub current_page: u64,
    /// 已在最后一页时缺省。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<u64>,
    pub per_page: u64,
    pub total: i64,
    pub last_page: i64,
    pub from: u64,
    pub to: u64,
}

impl PaginationMeta {
    pub fn has_more_pages(&self) -> bool {
        self.next_page.is_some()
    }
}

/// 一页数据加元信息。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginator {
    pub data: Collection,
    pub meta: PaginationMeta,
}

/// 游标分页的一页：没有总数，只带下一页的游标值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorPage {
    pub data: Collection,
    pub per_page: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Value>,
}

fn bounds(offset: u64, len: usize) -> (u64, u64) {
    if len == 0 {
        (0, 0)
    } else {
        (offset + 1, offset + len as u64)
    }
}

impl Query {
    /// 偏移分页：先用并行的计数变体取总数，再取请求的那一页。
    /// 计数变体清掉 limit/offset/排序；带 GROUP BY 时同时剥离选择列。
    pub fn paginate(&self, page: u64, per_page: u64) -> Result<Paginator, Error> {
        if per_page == 0 {
            return Err(Error::Malformed("per-page must be positive".into()));
        }
        let page = page.max(1);

        let mut count_q = self.clone();
        count_q.builder.limit = None;
        count_q.builder.offset = None;
        count_q.builder.orders.clear();
        if !count_q.builder.groups.is_empty() {
            count_q.builder.selects.clear();
            count_q.builder.select_bindings.clear();
        }
        let total = count_q.count()?;

        let offset = (page - 1) * per_page;
        let data = if total == 0 {
            Collection::new()
        } else {
            let mut data_q = self.clone();
            data_q.builder.limit = Some(per_page);
            data_q.builder.offset = Some(offset);
            data_q.get()?
        };

        let last_page = (total as u64).div_ceil(per_page).max(1) as i64;
        let next_page = (page < last_page as u64).then(|| page + 1);
        let (from, to) = bounds(offset, data.len());

        Ok(Paginator {
            data,
            meta: PaginationMeta {
                current_page: page,
                next_page,
                per_page,
                total,
                last_page,
                from,
                to,
            },
        })
    }

    /// 简单分页：多取一行探测是否还有下一页，不发计数查询；total 与
    /// last_page 报告为未知哨兵。
    pub fn simple_paginate(&self, page: u64, per_page: u64) -> Result<Paginator, Error> {
        if per_page == 0 {
            return Err(Error::Malformed("per-page must be positive".into()));
        }
        let page = page.max(1);
        let offset = (page - 1) * per_page;

        let mut data_q = self.clone();
        data_q.builder.limit = Some(per_page + 1);
        data_q.builder.offset = Some(offset);
        let mut data = data_q.get()?;

        let has_more = data.len() as u64 > per_page;
        data.truncate(per_page as usize);
        let (from, to) = bounds(offset, data.len());

        Ok(Paginator {
            data,
            meta: PaginationMeta {
                current_page: page,
                next_page: has_more.then(|| page + 1),
                per_page,
                total: UNKNOWN_TOTAL,
                last_page: UNKNOWN_TOTAL,
                from,
                to,
            },
        })
    }

    /// 按主键列 `id` 做游标分页。
    pub fn cursor_paginate(
        &self,
        per_page: u64,
        cursor: Option<Value>,
    ) -> Result<CursorPage, Error> {
        self.cursor_paginate_by("id", per_page, cursor)
    }

    /// 按指定单调列做游标分页：过滤出大于游标的行，多取一行探测下一页，
    /// 返回最后一行的游标列值作为下一个游标。
    pub fn cursor_paginate_by(
        &self,
        column: &str,
        per_page: u64,
        cursor: Option<Value>,
    ) -> Result<CursorPage, Error> {
        if per_page == 0 {
            return Err(Error::Malformed("per-page must be positive".into()));
        }

        let mut data_q = self.clone();
        if let Some(cursor) = cursor {
            data_q.builder.where_(column, ">", cursor);
        }
        data_q.builder.order_by(column);
        data_q.builder.limit = Some(per_page + 1);
        let mut data = data_q.get()?;

        let has_more = data.len() as u64 > per_page;
        data.truncate(per_page as usize);
        let next_cursor = if has_more {
            data.last().and_then(|row| row.get(column)).cloned()
        } else {
            None
        };

        Ok(CursorPage {
            data,
            per_page,
            next_cursor,
        })
    }

    pub async fn paginate_async(&self, page: u64, per_page: u64) -> Result<Paginator, Error> {
        self.run_blocking(move |q| q.paginate(page, per_page)).await
    }
}

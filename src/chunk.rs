//! 分块与惰性迭代：按固定批量顺序取大结果集，内存有上界。
//!
//! 两种推进方式由调用方显式选择：偏移递增，或“大于最近一次见到的标识符”
//! 游标。后者在并发写入已访问区间时仍然安全，前者不是。批量不满或为空时
//! 迭代终止。

use std::collections::VecDeque;

use crate::collection::{Collection, Row};
use crate::engine::Query;
use crate::error::Error;
use crate::value::Value;

impl Query {
    /// 偏移分块：每批调用一次回调；回调返回错误时中止并原样上抛。
    pub fn chunk(
        &self,
        size: u64,
        mut f: impl FnMut(&Collection) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if size == 0 {
            return Err(Error::Malformed("chunk size must be positive".into()));
        }
        let mut page: u64 = 0;
        loop {
            let mut batch_q = self.clone();
            batch_q.builder.limit = Some(size);
            batch_q.builder.offset = Some(page * size);
            let batch = batch_q.get()?;
            if batch.is_empty() {
                return Ok(());
            }
            f(&batch)?;
            if (batch.len() as u64) < size {
                return Ok(());
            }
            page += 1;
        }
    }

    /// 标识符游标分块：按 `column` 升序，每批过滤出大于上一批末行游标值
    /// 的行。
    pub fn chunk_by_id(
        &self,
        size: u64,
        column: &str,
        mut f: impl FnMut(&Collection) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if size == 0 {
            return Err(Error::Malformed("chunk size must be positive".into()));
        }
        let mut last: Option<Value> = None;
        loop {
            let mut batch_q = self.clone();
            if let Some(cursor) = &last {
                batch_q.builder.where_(column, ">", cursor.clone());
            }
            batch_q.builder.order_by(column);
            batch_q.builder.limit = Some(size);
            let batch = batch_q.get()?;
            if batch.is_empty() {
                return Ok(());
            }
            let cursor = batch
                .last()
                .and_then(|row| row.get(column))
                .cloned()
                .ok_or_else(|| {
                    Error::Malformed(format!("chunk column {column} is missing from the result rows"))
                })?;
            f(&batch)?;
            if (batch.len() as u64) < size {
                return Ok(());
            }
            last = Some(cursor);
        }
    }

    /// 偏移推进的惰性行迭代器。
    pub fn lazy(&self, size: u64) -> Result<LazyRows, Error> {
        LazyRows::new(self.clone(), size, LazyMode::Offset)
    }

    /// 标识符游标推进的惰性行迭代器。
    pub fn lazy_by_id(&self, size: u64, column: &str) -> Result<LazyRows, Error> {
        LazyRows::new(self.clone(), size, LazyMode::Cursor(column.to_string()))
    }
}

#[derive(Debug, Clone)]
enum LazyMode {
    Offset,
    Cursor(String),
}

/// 逐行产出的惰性迭代器；内部按 `size` 批量取数。
/// 取批失败时产出一个 `Err` 并就此终止。
#[derive(Debug)]
pub struct LazyRows {
    query: Query,
    size: u64,
    mode: LazyMode,
    buffer: VecDeque<Row>,
    page: u64,
    last: Option<Value>,
    done: bool,
}

impl LazyRows {
    fn new(query: Query, size: u64, mode: LazyMode) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::Malformed("chunk size must be positive".into()));
        }
        Ok(Self {
            query,
            size,
            mode,
            buffer: VecDeque::new(),
            page: 0,
            last: None,
            done: false,
        })
    }

    fn fetch_next_batch(&mut self) -> Result<bool, Error> {
        let mut batch_q = self.query.clone();
        match &self.mode {
            LazyMode::Offset => {
                batch_q.builder.limit = Some(self.size);
                batch_q.builder.offset = Some(self.page * self.size);
                self.page += 1;
            }
            LazyMode::Cursor(column) => {
                if let Some(cursor) = &self.last {
                    batch_q.builder.where_(column.as_str(), ">", cursor.clone());
                }
                batch_q.builder.order_by(column.as_str());
                batch_q.builder.limit = Some(self.size);
            }
        }
        let batch = batch_q.get()?;
        if (batch.len() as u64) < self.size {
            self.done = true;
        }
        if let LazyMode::Cursor(column) = &self.mode
            && let Some(row) = batch.last()
        {
            let cursor = row.get(column).cloned().ok_or_else(|| {
                Error::Malformed(format!("chunk column {column} is missing from the result rows"))
            })?;
            self.last = Some(cursor);
        }
        let got_rows = !batch.is_empty();
        self.buffer.extend(batch);
        Ok(got_rows)
    }
}

impl Iterator for LazyRows {
    type Item = Result<Row, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.fetch_next_batch() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

//! Collection：物化后的有序结果集。
//!
//! 每次物化都创建全新实例；`filter`/`map` 不做原地修改，返回新的 Collection。

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Error;
use crate::value::Value;

/// 一行结果：列名到值的有序映射。
pub type Row = IndexMap<String, Value>;

/// 物化后的结果集。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Collection {
    rows: Vec<Row>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 物化驱动返回的行：字节串列统一归一为文本。任何一行失败都会中止整个
    /// 物化过程，不返回部分结果。
    pub fn materialize(rows: Vec<Row>) -> Result<Self, Error> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(normalize_row(row)?);
        }
        Ok(Self { rows: out })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// 返回保留满足谓词的行的新 Collection。
    pub fn filter(&self, pred: impl Fn(&Row) -> bool) -> Self {
        Self {
            rows: self.rows.iter().filter(|r| pred(r)).cloned().collect(),
        }
    }

    /// 逐行变换，返回新 Collection。
    pub fn map(&self, f: impl Fn(&Row) -> Row) -> Self {
        Self {
            rows: self.rows.iter().map(f).collect(),
        }
    }

    /// 抽取某一列的值；缺失该列的行产出 Null。
    pub fn pluck(&self, column: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|r| r.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// 截断到前 `len` 行。
    pub(crate) fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }
}

impl From<Vec<Row>> for Collection {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

impl IntoIterator for Collection {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

pub(crate) fn normalize_row(row: Row) -> Result<Row, Error> {
    let mut out = Row::with_capacity(row.len());
    for (col, value) in row {
        let value = value
            .normalized()
            .map_err(|e| Error::Decode(format!("column {col} holds invalid utf-8: {e}")))?;
        out.insert(col, value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn materialize_normalizes_bytes_to_text() {
        let rows = vec![row(&[("name", Value::Bytes(b"alice".to_vec()))])];
        let c = Collection::materialize(rows).unwrap();
        assert_eq!(c.first().unwrap()["name"], Value::Text("alice".into()));
    }

    #[test]
    fn materialize_aborts_on_any_bad_row() {
        let rows = vec![
            row(&[("name", Value::Text("ok".into()))]),
            row(&[("name", Value::Bytes(vec![0xff]))]),
        ];
        assert!(Collection::materialize(rows).is_err());
    }

    #[test]
    fn filter_and_map_return_new_collections() {
        let c = Collection::from(vec![
            row(&[("n", Value::Int(1))]),
            row(&[("n", Value::Int(2))]),
        ]);
        let only_even = c.filter(|r| r["n"].to_i64() == Some(2));
        assert_eq!(only_even.len(), 1);
        assert_eq!(c.len(), 2);

        let doubled = c.map(|r| {
            let mut r = r.clone();
            let n = r["n"].to_i64().unwrap();
            r.insert("n".into(), Value::Int(n * 2));
            r
        });
        assert_eq!(doubled.pluck("n"), vec![Value::Int(2), Value::Int(4)]);
        assert_eq!(c.pluck("n"), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn pluck_missing_column_yields_null() {
        let c = Collection::from(vec![row(&[("a", Value::Int(1))])]);
        assert_eq!(c.pluck("b"), vec![Value::Null]);
    }
}

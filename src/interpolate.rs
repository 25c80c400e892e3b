//! SQL 插值：把占位符替换为参数字面量，仅用于日志与调试展示。
//!
//! 安全警告：插值永远不如预编译参数安全；执行路径从不使用这里的输出。

use crate::dialect::Dialect;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolateError {
    #[error("query not enough bindings when interpolating")]
    MissingBindings,
    #[error("query invalid placeholder reference when interpolating")]
    InvalidPlaceholder,
    #[error("query failed to format a timestamp literal")]
    Format,
}

impl Dialect {
    pub fn interpolate(self, sql: &str, bindings: &[Value]) -> Result<String, InterpolateError> {
        match self {
            Dialect::MySQL => mysql_interpolate(sql, bindings),
            Dialect::PostgreSQL => postgresql_interpolate(sql, bindings),
        }
    }
}

fn mysql_interpolate(query: &str, bindings: &[Value]) -> Result<String, InterpolateError> {
    let mut out = String::with_capacity(query.len() + bindings.len() * 20);
    let mut quote: Option<char> = None;
    let mut escaping = false;
    let mut idx = 0usize;

    for c in query.chars() {
        if escaping {
            out.push(c);
            escaping = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => {
                out.push(c);
                escaping = true;
            }
            '\'' | '"' | '`' => {
                if quote == Some(c) {
                    quote = None;
                } else if quote.is_none() {
                    quote = Some(c);
                }
                out.push(c);
            }
            '?' if quote.is_none() => {
                if idx >= bindings.len() {
                    return Err(InterpolateError::MissingBindings);
                }
                encode_value(&mut out, &bindings[idx], Dialect::MySQL)?;
                idx += 1;
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn postgresql_interpolate(query: &str, bindings: &[Value]) -> Result<String, InterpolateError> {
    let mut out = String::with_capacity(query.len() + bindings.len() * 20);
    let mut quote: Option<char> = None; // '\'' | '"' | '$'(dollar-quote)
    let mut escaping = false;
    let mut dollar_quote: Option<String> = None;

    let bytes = query.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;

        if escaping {
            out.push(c);
            escaping = false;
            i += 1;
            continue;
        }

        match c {
            '\\' if matches!(quote, Some('\'') | Some('"')) => {
                out.push(c);
                escaping = true;
                i += 1;
            }
            '\'' => {
                if quote == Some('\'') {
                    // PostgreSQL: '' 表示一个 '
                    if i + 1 < bytes.len() && bytes[i + 1] as char == '\'' {
                        out.push_str("''");
                        i += 2;
                        continue;
                    }
                    quote = None;
                } else if quote.is_none() {
                    quote = Some('\'');
                }
                out.push('\'');
                i += 1;
            }
            '"' => {
                if quote == Some('"') {
                    quote = None;
                } else if quote.is_none() {
                    quote = Some('"');
                }
                out.push('"');
                i += 1;
            }
            '$' => {
                if quote == Some('$') {
                    if let Some(dq) = &dollar_quote
                        && query[i..].starts_with(dq)
                    {
                        out.push_str(dq);
                        i += dq.len();
                        quote = None;
                        dollar_quote = None;
                        continue;
                    }
                    out.push('$');
                    i += 1;
                    continue;
                }

                if quote.is_some() {
                    out.push('$');
                    i += 1;
                    continue;
                }

                // $n
                let mut j = i + 1;
                if j < bytes.len()
                    && (bytes[j] as char).is_ascii_digit()
                    && (bytes[j] as char) != '0'
                {
                    while j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        j += 1;
                    }
                    let n: usize = query[i + 1..j]
                        .parse()
                        .map_err(|_| InterpolateError::InvalidPlaceholder)?;
                    if n == 0 || n > bindings.len() {
                        return Err(InterpolateError::MissingBindings);
                    }
                    encode_value(&mut out, &bindings[n - 1], Dialect::PostgreSQL)?;
                    i = j;
                    continue;
                }

                // dollar quote begin: $tag$
                let mut k = i + 1;
                while k < bytes.len() && (bytes[k] as char).is_ascii_alphabetic() {
                    k += 1;
                }
                if k < bytes.len() && bytes[k] as char == '$' {
                    let dq = &query[i..=k];
                    out.push_str(dq);
                    quote = Some('$');
                    dollar_quote = Some(dq.to_string());
                    i = k + 1;
                    continue;
                }

                out.push('$');
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

fn encode_value(out: &mut String, v: &Value, dialect: Dialect) -> Result<(), InterpolateError> {
    match v {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::UInt(n) => out.push_str(&n.to_string()),
        Value::Float(n) => out.push_str(&n.to_string()),
        Value::Text(s) => quote_string(out, s, dialect),
        Value::Bytes(b) => encode_bytes(out, b, dialect),
        Value::DateTime(dt) => encode_datetime(out, dt, dialect)?,
        Value::Json(j) => {
            let s = serde_json::to_string(j).map_err(|_| InterpolateError::Format)?;
            quote_string(out, &s, dialect);
        }
    }
    Ok(())
}

fn encode_bytes(out: &mut String, data: &[u8], dialect: Dialect) {
    if data.is_empty() {
        out.push_str("NULL");
        return;
    }
    match dialect {
        Dialect::MySQL => {
            out.push_str("_binary");
            quote_string(out, &String::from_utf8_lossy(data), dialect);
        }
        Dialect::PostgreSQL => {
            out.push_str("E'\\\\x");
            push_hex(out, data);
            out.push_str("'::bytea");
        }
    }
}

fn push_hex(out: &mut String, data: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for &b in data {
        out.push(HEX[((b >> 4) & 0xF) as usize] as char);
        out.push(HEX[(b & 0xF) as usize] as char);
    }
}

fn quote_string(out: &mut String, s: &str, dialect: Dialect) {
    if dialect == Dialect::PostgreSQL {
        out.push('E');
    }
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\u{0000}' => out.push_str("\\0"),
            '\u{0008}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{001a}' => out.push_str("\\Z"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
}

fn encode_datetime(
    out: &mut String,
    dt: &time::OffsetDateTime,
    dialect: Dialect,
) -> Result<(), InterpolateError> {
    const FMT: &[time::format_description::FormatItem<'_>] = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]"
    );
    const FMT_TZ: &[time::format_description::FormatItem<'_>] = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6] \
         [offset_hour sign:mandatory]:[offset_minute]"
    );
    let fmt = match dialect {
        Dialect::MySQL => FMT,
        Dialect::PostgreSQL => FMT_TZ,
    };
    let s = dt.format(&fmt).map_err(|_| InterpolateError::Format)?;
    out.push('\'');
    out.push_str(&s);
    out.push('\'');
    Ok(())
}

//! 宏集合：为插入/更新提供列值映射的便捷构造。

/// 构造一个 [`Values`](crate::Values) 有序列值映射。
///
/// ```
/// use fluent_query::values;
///
/// let row = values! { "name" => "alice", "age" => 30 };
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        $crate::Values::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Values::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        map
    }};
}

pub use crate::values;

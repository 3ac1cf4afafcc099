use std::fmt;

/// 从页面中提取出的一条数据
///
/// 输出格式：菌株标记 `|名称`，字段 `;key:value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// 菌株标记，每页最多一条且排在最前
    Subject { name: String },
    /// 字段数据
    Field {
        subject: String,
        key: &'static str,
        value: String,
    },
}

impl Fact {
    pub fn subject(name: impl Into<String>) -> Self {
        Fact::Subject { name: name.into() }
    }

    /// 创建字段，value 会被规范化
    pub fn field(subject: impl Into<String>, key: &'static str, value: &str) -> Self {
        Fact::Field {
            subject: subject.into(),
            key,
            value: normalize_value(value),
        }
    }

    pub fn subject_name(&self) -> &str {
        match self {
            Fact::Subject { name } => name,
            Fact::Field { subject, .. } => subject,
        }
    }

    /// 字段 key，菌株标记返回 None
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Fact::Subject { .. } => None,
            Fact::Field { key, .. } => Some(key),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Fact::Subject { .. } => None,
            Fact::Field { value, .. } => Some(value),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fact::Subject { name } => write!(f, "|{}", name),
            Fact::Field { key, value, .. } => write!(f, ";{}:{}", key, value),
        }
    }
}

/// 去掉首尾空白后，删除所有换行和制表符
pub fn normalize_value(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

//! Command replies

use bson::{Bson, Document, doc};

/// Read a numeric field regardless of its BSON width
pub fn numeric(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        Bson::Boolean(v) => Some(i64::from(*v)),
        _ => None,
    }
}

/// Structured result of one administrative command.
///
/// Server-side failures are replies too (`ok: 0` with `code`); only transport
/// failures produce no reply at all.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply(Document);

impl CommandReply {
    pub fn new(doc: Document) -> Self {
        Self(doc)
    }

    /// Reply describing a command the server refused
    pub fn rejected(code: i32, code_name: &str, message: &str) -> Self {
        Self(doc! {
            "ok": 0.0,
            "code": code,
            "codeName": code_name,
            "errmsg": message,
        })
    }

    pub fn is_ok(&self) -> bool {
        numeric(&self.0, "ok") == Some(1)
    }

    pub fn code(&self) -> Option<i32> {
        numeric(&self.0, "code").and_then(|c| i32::try_from(c).ok())
    }

    pub fn message(&self) -> &str {
        self.0.get_str("errmsg").unwrap_or_default()
    }

    /// `ok: 1`, or a failure whose code is in `codes`
    pub fn is_ok_or_code(&self, codes: &[i32]) -> bool {
        self.is_ok() || self.code().is_some_and(|code| codes.contains(&code))
    }

    pub fn document(&self) -> &Document {
        &self.0
    }
}

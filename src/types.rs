use serde::{Deserialize, Serialize};

/// `{"code": 200, "info": "..."}`, the acknowledgement returned by batch and
/// admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInfo {
    pub code: u16,
    pub info: String,
}

impl CodeInfo {
    pub fn ok(info: impl Into<String>) -> Self {
        Self { code: 200, info: info.into() }
    }
}

/// One configured database as listed by `/dbs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbInfo {
    pub name: String,
    pub default: bool,
}

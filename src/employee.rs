//! Employee records.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Employee {
    pub fn new(name: impl Into<String>, role: Option<String>) -> Self {
        Self {
            id: format!("emp-{}", Ulid::new().to_string().to_lowercase()),
            name: name.into(),
            role,
        }
    }
}

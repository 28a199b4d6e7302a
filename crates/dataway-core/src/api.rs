//! Response envelope and dictionary values handed to the transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response envelope. The transport returns HTTP success and encodes
/// the outcome in `success`; the core never assumes transport status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: String::new(),
            data: Some(data),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// A display name / value pair used for discovery endpoints, e.g. the list
/// of supported backend types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dict {
    pub name: String,
    pub text: String,
    pub value: Value,
}

impl Dict {
    pub fn new(name: impl Into<String>, text: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            value: value.into(),
        }
    }
}

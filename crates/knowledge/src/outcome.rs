//! Transport-agnostic operation outcomes.
//!
//! Request handlers report an [`Outcome`] instead of a raw [`AppError`]:
//! a success flag, the error kind on failure, a short message and any
//! payload.

use qabase_core::{AppError, AppResult, ErrorKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            kind: None,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            ok: false,
            kind: Some(error.kind()),
            message: error.to_string(),
            data: None,
        }
    }

    /// Convert an operation result, using `message` on success.
    pub fn from_result(result: &AppResult<T>, message: impl Into<String>) -> Self
    where
        T: Clone,
    {
        match result {
            Ok(data) => Self::success(message, data.clone()),
            Err(e) => Self::failure(e),
        }
    }
}

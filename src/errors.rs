use axum::http::StatusCode;
use std::fmt;

/// Which kind of mutation ran into the daily budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Add,
    Update,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Add => f.write_str("add"),
            Mutation::Update => f.write_str("update"),
        }
    }
}

/// Failures of ledger operations. The `Display` output is meant to be shown
/// to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("Cannot {mutation}. Only {remaining} minutes left")]
    BudgetExceeded { mutation: Mutation, remaining: u32 },
    #[error("No data for day")]
    DayNotFound,
    #[error("Activity not found")]
    ActivityNotFound,
    #[error("The day was changed by another session {attempts} times in a row, try again")]
    Conflict { attempts: u32 },
    #[error("Storage unavailable: {message}")]
    Storage { message: String },
}

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation { .. } => "validation",
            LedgerError::BudgetExceeded { .. } => "budget_exceeded",
            LedgerError::DayNotFound | LedgerError::ActivityNotFound => "not_found",
            LedgerError::Conflict { .. } => "conflict",
            LedgerError::Storage { .. } => "storage",
        }
    }

    pub fn remaining_minutes(&self) -> Option<u32> {
        match self {
            LedgerError::BudgetExceeded { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub remaining_minutes: Option<u32>,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "validation",
            message: message.into(),
            remaining_minutes: None,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Validation { .. } => StatusCode::BAD_REQUEST,
            LedgerError::BudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::DayNotFound | LedgerError::ActivityNotFound => StatusCode::NOT_FOUND,
            LedgerError::Conflict { .. } => StatusCode::CONFLICT,
            LedgerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            remaining_minutes: err.remaining_minutes(),
            message: err.to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let mut body = serde_json::json!({
            "error": self.kind,
            "message": self.message,
        });
        if let Some(remaining) = self.remaining_minutes {
            body["remaining_minutes"] = remaining.into();
        }
        (self.status, axum::Json(body)).into_response()
    }
}

use serde_json::json;
use thiserror::Error;

/// Failures of the ledger write and read paths.
///
/// Validation and auth failures are raised before any write happens and are
/// meant to be shown to the user as-is. Database failures carry the upstream
/// message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadParams(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("{0}")]
    Database(#[from] rusqlite::Error),

    #[error("{source}")]
    Insert {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl AppError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn insert(table: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Insert { table, source }
    }

    /// Protocol error code reported to the dashboard.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::Validation(_) => "validation_failed",
            Self::Auth(_) => "auth_required",
            Self::NotFound(_) => "not_found",
            Self::NoWorkspace => "no_workspace",
            Self::Database(_) => "db_query_failed",
            Self::Insert { .. } => "db_insert_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Auth(_) => Some(json!({ "redirect": crate::session::SIGN_IN_ROUTE })),
            Self::Insert { table, .. } => Some(json!({ "table": table })),
            _ => None,
        }
    }

    /// Upstream failures get logged; user-input failures do not.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Insert { .. })
    }
}

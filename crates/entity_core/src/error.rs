use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EntityError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// Short machine-readable name, used as the `status` field of error bodies.
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_server_error",
        }
    }

    /// Domain errors are row-level outcomes in bulk operations; anything else
    /// aborts the whole batch.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

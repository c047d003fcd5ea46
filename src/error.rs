use actix_web::{http::StatusCode, ResponseError};
use log::error;
use sea_orm::DbErr;
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The addressed row does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// A unique or foreign-key constraint rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// A projection, aggregation or include named something the entity does not have.
    #[error("invalid field: {0}")]
    InvalidField(String),
    #[error("{msg}")]
    Biz { code: i32, msg: String },
}

impl AppError {
    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::Biz { code: 1, msg: msg.into() }
    }

    pub fn system_exception() -> Self {
        Self::Biz { code: 99, msg: "system_exception".to_string() }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 3,
            Self::ConstraintViolation(_) => 4,
            Self::InvalidField(_) => 5,
            Self::Biz { code, .. } => *code,
        }
    }

    pub fn msg(&self) -> String {
        self.to_string()
    }

    /// Attaches the foreign key a write depended on; sqlite does not name it.
    pub fn with_foreign_key(self, foreign_key: &str) -> Self {
        match self {
            Self::ConstraintViolation(msg) if msg.starts_with("FOREIGN KEY") => {
                Self::ConstraintViolation(format!("{} ({})", msg, foreign_key))
            }
            other => other,
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if matches!(err, DbErr::RecordNotUpdated) {
            return Self::NotFound("record".to_string());
        }
        let msg = err.to_string();
        if let Some(constraint) = constraint_message(&msg) {
            return Self::ConstraintViolation(constraint);
        }
        error!("database error: {}", msg);
        Self::system_exception()
    }
}

fn constraint_message(msg: &str) -> Option<String> {
    if let Some(idx) = msg.find("UNIQUE constraint failed") {
        return Some(msg[idx..].trim().to_string());
    }
    if msg.contains("FOREIGN KEY constraint failed") {
        return Some("FOREIGN KEY constraint failed".to_string());
    }
    None
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_failure_keeps_constraint_name() {
        let err = AppError::from(DbErr::Custom(
            "error returned from database: (code: 2067) UNIQUE constraint failed: users.email".to_string(),
        ));
        match err {
            AppError::ConstraintViolation(msg) => {
                assert_eq!(msg, "UNIQUE constraint failed: users.email")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn foreign_key_failure_is_annotated() {
        let err = AppError::from(DbErr::Custom(
            "error returned from database: (code: 787) FOREIGN KEY constraint failed".to_string(),
        ))
        .with_foreign_key("posts.user_id");
        assert_eq!(
            err.to_string(),
            "constraint violation: FOREIGN KEY constraint failed (posts.user_id)"
        );
        assert_eq!(err.code(), 4);
    }

    #[test]
    fn record_not_updated_is_not_found() {
        let err = AppError::from(DbErr::RecordNotUpdated);
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn other_errors_become_system_exception() {
        let err = AppError::from(DbErr::Custom("disk I/O error".to_string()));
        assert_eq!(err.code(), 99);
    }
}

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Blog post not found: {0}")]
    NotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("User '{username}' is not allowed to {action} blog posts")]
    Forbidden {
        username: String,
        action: &'static str,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Blog post {post_id} references missing user {user_id}")]
    MissingRoleHolder { post_id: Uuid, user_id: Uuid },

    #[error("Database error: {0}")]
    Database(String),
}

pub type BlogResult<T> = Result<T, BlogError>;

impl From<sea_orm::DbErr> for BlogError {
    fn from(err: sea_orm::DbErr) -> Self {
        BlogError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for BlogError {
    fn from(err: validator::ValidationErrors) -> Self {
        BlogError::Validation(err.to_string())
    }
}

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("access denied")]
    Forbidden,
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Unexpected(anyhow::Error),
}

/// An invariant the store refused to break. Each variant renders its own
/// message so clients can tell "event full" from "already registered".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("you are already registered for this event")]
    AlreadyRegistered,
    #[error("you have already applied for this event")]
    AlreadyApplied,
    #[error("event is at full capacity")]
    CapacityExceeded,
    #[error("event is not accepting applications")]
    EventClosed,
    #[error("booth {0} is already assigned at this event")]
    BoothTaken(String),
    #[error("email is already in use")]
    EmailTaken,
    #[error("venue is still referenced by events")]
    VenueInUse,
    #[error("user still organizes events")]
    OrganizerHasEvents,
    #[error("max capacity cannot drop below the {0} seats already taken")]
    CapacityBelowSeatsTaken(i64),
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("status changed to {0} while this request was in flight")]
    StatusChanged(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait OptionalExt<T> {
    /// Turns `NotFound` into `None`, passing every other error through.
    fn optional(self) -> AppResult<Option<T>>;
}

impl<T> OptionalExt<T> for AppResult<T> {
    fn optional(self) -> AppResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Unexpected(err) => {
                tracing::error!(error.cause_chain = ?err, error.message = %err, "Unexpected error");
                "Something went wrong".to_owned()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Unexpected(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(sqlx::migrate::MigrateError);
apperr_impl!(std::io::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        let err = AppError::from(Conflict::CapacityExceeded);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "event is at full capacity");
    }

    #[test]
    fn each_kind_has_its_own_status() {
        assert_eq!(AppError::NotFound("event").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("missing token").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::validation("title is required").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn optional_only_swallows_not_found() {
        let missing: AppResult<u8> = Err(AppError::NotFound("venue"));
        assert!(matches!(missing.optional(), Ok(None)));

        let denied: AppResult<u8> = Err(AppError::Forbidden);
        assert!(matches!(denied.optional(), Err(AppError::Forbidden)));
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(AppError::NotFound("registration").to_string(), "registration not found");
    }
}

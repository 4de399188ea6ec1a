use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use derive_more::Display;
use diesel::r2d2;
use diesel::result::Error as DieselError;

use super::api::ResponseStatus;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    ValidationFailure(String),

    #[display(fmt = "Unauthorized")]
    Unauthorized,

    #[display(fmt = "{}", _0)]
    Conflict(String),

    /// The beer was written but linking it into its brewery failed.
    /// `compensated` records whether the beer was deleted again.
    #[display(
        fmt = "beer {} could not be linked to brewery {} (compensated: {}): {}",
        beer_id,
        brewery_id,
        compensated,
        cause
    )]
    PartialWriteInconsistency {
        brewery_id: i32,
        beer_id: i32,
        compensated: bool,
        cause: Box<Error>,
    },

    #[display(fmt = "Configuration error: {}", _0)]
    Config(String),

    #[display(fmt = "Password hashing failed: {}", _0)]
    PasswordHash(String),

    #[display(fmt = "Store lock poisoned")]
    StorePoisoned,

    #[display(fmt = "Query timed out")]
    Timeout,

    #[display(fmt = "Blocking task canceled")]
    Canceled,

    #[display(fmt = "{}", _0)]
    DieselError(DieselError),

    #[display(fmt = "{}", _0)]
    PoolError(r2d2::PoolError),
}

impl Error {
    pub fn not_found<T: std::fmt::Display>(what: &str, id: T) -> Error {
        Error::NotFound(format!("{} {} not found", what, id))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PartialWriteInconsistency { cause, .. } => Some(cause.as_ref()),
            Self::DieselError(e) => Some(e),
            Self::PoolError(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: ResponseStatus,
    messages: Vec<String>,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let body = if status.is_server_error() {
            error!("{}", self);
            ErrorBody {
                status: ResponseStatus::Error,
                messages: vec![status
                    .canonical_reason()
                    .unwrap_or("Internal Server Error")
                    .to_owned()],
            }
        } else {
            ErrorBody {
                status: ResponseStatus::Fail,
                messages: vec![self.to_string()],
            }
        };

        HttpResponse::build(status).json(body)
    }
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Error {
        Error::DieselError(e)
    }
}

impl From<r2d2::PoolError> for Error {
    fn from(e: r2d2::PoolError) -> Error {
        Error::PoolError(e)
    }
}

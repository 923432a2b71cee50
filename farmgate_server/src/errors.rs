use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use farmgate_engine::MarketplaceError;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    MarketplaceError(#[from] MarketplaceError),
}

impl ServerError {
    /// A stable, machine-readable code for the error, returned alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MarketplaceError(e) => e.code(),
            Self::AuthenticationError(_) => "UNAUTHENTICATED",
            Self::InsufficientPermissions(_) => "FORBIDDEN",
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) => "INVALID_REQUEST",
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => "INTERNAL",
        }
    }
}

fn marketplace_status_code(e: &MarketplaceError) -> StatusCode {
    use MarketplaceError::*;
    match e {
        InsufficientStock { .. } => StatusCode::CONFLICT,
        InvalidStateTransition(_) => StatusCode::CONFLICT,
        InquiryExpired(_) => StatusCode::CONFLICT,
        MultiFarmCart(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BelowMinimumOrderQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MissingAgreedPrice(_) => StatusCode::UNPROCESSABLE_ENTITY,
        InvalidSignature(_) => StatusCode::UNAUTHORIZED,
        OrderNotFound(_) | ProductNotFound(_) | InquiryNotFound(_) | PaymentNotFound(_) => StatusCode::NOT_FOUND,
        ForbiddenAccess(_) => StatusCode::FORBIDDEN,
        EmptyCart | InvalidQuantity(_) | InvalidPrice(_) | MissingTrackingReference(_) | InvalidPaymentEvent(_) => {
            StatusCode::BAD_REQUEST
        },
        DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::MarketplaceError(e) => marketplace_status_code(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("💻️ Internal error while handling request. {self}");
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message, "code": self.code() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("The {0} header is missing.")]
    MissingHeader(&'static str),
    #[error("The {0} header is not valid. {1}")]
    InvalidHeader(&'static str, String),
    #[error("The {0} role cannot be claimed by a request.")]
    ReservedRole(String),
}

use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use settlement_engine::{traits::StoreError, AdminApiError, CheckoutError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("A valid admin token is required.")]
    Unauthorized,
    #[error("{0}")]
    Checkout(CheckoutError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Checkout(e) => checkout_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn checkout_status(e: &CheckoutError) -> StatusCode {
    use CheckoutError::*;
    match e {
        Validation(_) | Partition(_) | Currency(_) => StatusCode::BAD_REQUEST,
        InsufficientStock(_) => StatusCode::CONFLICT,
        PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
        PaymentInvalid(_) | FeePolicyViolation(_) | PaymentMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PaymentTransient(_) | ConcurrencyExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        OutcomeUnknown(_) => StatusCode::GATEWAY_TIMEOUT,
        Store(StoreError::Conflict(_)) => StatusCode::SERVICE_UNAVAILABLE,
        Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        if let CheckoutError::Store(StoreError::DatabaseError(s)) = &e {
            error!("💻️ Database error during checkout. {s}");
        }
        Self::Checkout(e)
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(s) => Self::NoRecordFound(s),
            StoreError::ForbiddenStatusChange { .. } => Self::InvalidRequestBody(e.to_string()),
            StoreError::Conflict(_) => Self::Checkout(CheckoutError::Store(e)),
            StoreError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
        }
    }
}

impl From<AdminApiError> for ServerError {
    fn from(e: AdminApiError) -> Self {
        match e {
            AdminApiError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            AdminApiError::Store(e) => e.into(),
            AdminApiError::ExchangeRate(e) => Self::BackendError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use settlement_engine::{partitioner::PartitionError, traits::StockShortfall};

    use super::*;

    #[test]
    fn checkout_errors_map_onto_status_codes() {
        let status = |e: CheckoutError| ServerError::from(e).status_code();
        assert_eq!(status(CheckoutError::Validation("x".into())), StatusCode::BAD_REQUEST);
        let overflow = PartitionError::AmountOverflow { product_id: "p".into() };
        assert_eq!(status(CheckoutError::Partition(overflow)), StatusCode::BAD_REQUEST);
        let shortfall = StockShortfall { product_id: "p".into(), requested: 2, available: 0 };
        assert_eq!(status(CheckoutError::InsufficientStock(vec![shortfall])), StatusCode::CONFLICT);
        assert_eq!(status(CheckoutError::PaymentDeclined("nsf".into())), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status(CheckoutError::PaymentTransient("502".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(CheckoutError::ConcurrencyExhausted(5)), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(CheckoutError::OutcomeUnknown("chk".into())), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn store_errors_map_onto_status_codes() {
        assert_eq!(ServerError::from(StoreError::NotFound("o1".into())).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServerError::from(StoreError::Conflict("busy".into())).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServerError::from(StoreError::DatabaseError("disk".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CreditCapitalError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown rating '{rating}' on position '{position}'")]
    UnknownRating { position: String, rating: String },

    #[error("Invalid PD {pd} on position '{position}': must be finite and in [0, 1)")]
    InvalidPd { position: String, pd: f64 },

    #[error("Malformed transition matrix '{matrix}' at row '{rating}': {reason}")]
    MalformedMatrix {
        matrix: String,
        rating: String,
        reason: String,
    },

    #[error("Unknown transition matrix '{0}'")]
    UnknownMatrix(String),

    #[error("Insufficient simulations: {actual} paths cannot resolve the {confidence} quantile (need at least {required})")]
    InsufficientSimulations {
        required: usize,
        actual: usize,
        confidence: f64,
    },

    #[error("Numerical error: {context}")]
    Numerical { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CreditCapitalError {
    fn from(e: serde_json::Error) -> Self {
        CreditCapitalError::SerializationError(e.to_string())
    }
}

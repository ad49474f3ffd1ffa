use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Synchronization store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl AppError {
    /// Status code handed back across the C ABI. Zero is reserved for success.
    pub fn status_code(&self) -> i32 {
        match self {
            AppError::InvalidCoordinates(_) => -2,
            AppError::InvalidRoute(_) => -3,
            AppError::Store(_) | AppError::Io(_) | AppError::Serialization(_) => -4,
            AppError::GeoJson(_) => -5,
            AppError::Config(_) => -6,
            AppError::Runtime(_) => -7,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_negative_and_distinct_per_family() {
        let errors = [
            AppError::InvalidCoordinates("x".into()),
            AppError::InvalidRoute("x".into()),
            AppError::Store("x".into()),
            AppError::Config("x".into()),
            AppError::Runtime("x".into()),
        ];
        let codes: Vec<i32> = errors.iter().map(AppError::status_code).collect();
        assert!(codes.iter().all(|c| *c < 0));

        let mut deduped = codes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }

    #[test]
    fn io_errors_convert() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(err.status_code(), -4);
    }
}

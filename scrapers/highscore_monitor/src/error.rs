// Error taxonomy shared by every stage of a poll cycle
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("request to {url} returned an empty body")]
    EmptyResponse { url: String },
    #[error("layout changed: {0}")]
    Layout(String),
    #[error("failed to extract {field} from {value:?}")]
    Extraction { field: &'static str, value: String },
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// Fetch and store failures may clear up on their own and are worth
    /// retrying. Anything else means the page contract broke.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MonitorError::Fetch { .. }
                | MonitorError::HttpStatus { .. }
                | MonitorError::EmptyResponse { .. }
                | MonitorError::Store(_)
        )
    }

    pub fn extraction(field: &'static str, value: &str) -> Self {
        MonitorError::Extraction {
            field,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let empty = MonitorError::EmptyResponse {
            url: "http://example.com".to_string(),
        };
        assert!(empty.is_transient());
        assert!(MonitorError::Store(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!MonitorError::Layout("expected 2 tables, found 3".to_string()).is_transient());
        assert!(!MonitorError::extraction("level", "abc").is_transient());
    }

    #[test]
    fn test_extraction_message_names_field() {
        let err = MonitorError::extraction("experience", "-5");
        assert_eq!(err.to_string(), "failed to extract experience from \"-5\"");
    }
}

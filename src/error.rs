use thiserror::Error;

/// Boxed error returned by collaborators (order query, persistence).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Message code attached to [`SliError::OrderNotFound`].
pub const ERR_ORDER_NOT_FOUND: &str = "ERR_ORDER_NOT_FOUND";

#[derive(Error, Debug)]
pub enum SliError {
    #[error("Order not found for bulk {bulk_id}")]
    OrderNotFound { bulk_id: String },

    #[error("Order query failed: {0}")]
    UpstreamFetch(#[source] BoxError),

    #[error("Failed to read template {path}: {source}")]
    TemplateRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Persisting {filename} failed: {source}")]
    Persistence {
        filename: String,
        #[source]
        source: BoxError,
    },
}

impl SliError {
    /// Stable code for callers that map domain errors to responses.
    pub fn code(&self) -> &'static str {
        match self {
            SliError::OrderNotFound { .. } => ERR_ORDER_NOT_FOUND,
            SliError::UpstreamFetch(_) => "ERR_UPSTREAM_FETCH",
            SliError::TemplateRead { .. } => "ERR_TEMPLATE_READ",
            SliError::Render(_) => "ERR_RENDER",
            SliError::Persistence { .. } => "ERR_PERSISTENCE",
        }
    }
}

pub type SliResult<T> = Result<T, SliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_not_found_carries_fixed_code() {
        let err = SliError::OrderNotFound {
            bulk_id: "bulk-1".into(),
        };
        assert_eq!(err.code(), ERR_ORDER_NOT_FOUND);
        assert!(err.to_string().contains("bulk-1"));
    }

    #[test]
    fn template_read_keeps_io_source() {
        let err = SliError::TemplateRead {
            path: "missing.html".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let source = std::error::Error::source(&err).expect("io source");
        assert_eq!(source.to_string(), "gone");
    }
}

//! Error types for the EiriniX test harness

use thiserror::Error;

/// Boxed cause carried by gateway failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the harness
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors surfaced by fixture construction and lifecycle operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// Transport, apply or delete failure reported by the cluster gateway
    #[error("{operation} failed for {target}: {source}{}", render_output(.output))]
    Gateway {
        operation: &'static str,
        target: String,
        output: Option<String>,
        #[source]
        source: BoxError,
    },

    /// The workload no longer exists in the cluster
    #[error("workload {namespace}/{name} not found")]
    NotFound { name: String, namespace: String },

    /// The harness could not be built (e.g. no free port)
    #[error("harness construction failed: {0}")]
    Construction(String),
}

fn render_output(output: &Option<String>) -> String {
    match output.as_deref().map(str::trim) {
        Some(out) if !out.is_empty() => format!(" (output: {})", out),
        _ => String::new(),
    }
}

impl HarnessError {
    /// Create a gateway error for `operation` on `target`
    pub fn gateway(
        operation: &'static str,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Gateway {
            operation,
            target: target.into(),
            output: None,
            source: source.into(),
        }
    }

    /// Create a gateway error that keeps the command output for diagnostics
    pub fn gateway_with_output(
        operation: &'static str,
        target: impl Into<String>,
        output: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Gateway {
            operation,
            target: target.into(),
            output: Some(output.into()),
            source: source.into(),
        }
    }

    /// Create a not-found error for `namespace/name`
    pub fn not_found(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a construction error with the given message
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway { .. })
    }

    /// Captured gateway output, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Gateway { output, .. } => output.as_deref(),
            _ => None,
        }
    }
}

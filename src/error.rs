//! Error taxonomy shared by every client and pipeline.
//!
//! Variants are keyed by recovery behavior, not by upstream. The orchestrator
//! renders any of these into a human-readable reply; nothing here ever
//! reaches the transport as a protocol error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// Missing/empty required parameter, out-of-range value, bad enum.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Package, repository, status page, or documentation not found.
    #[error("{0}")]
    NotFound(String),

    /// The upstream did not accept a connection or refused the request.
    #[error("Sorry, {service} is currently unavailable ({detail}). Please try again later.")]
    UpstreamUnavailable { service: String, detail: String },

    /// The upstream did not answer within its deadline.
    #[error("Sorry, {service} did not respond in time. Please try again later.")]
    UpstreamTimeout { service: String },

    /// The upstream answered with data we could not interpret.
    #[error("{service} returned unexpected data: {excerpt}")]
    UpstreamMalformed { service: String, excerpt: String },

    /// The upstream denied access (auth wall, robot block).
    #[error("{service} denied access to the requested resource")]
    UpstreamForbidden { service: String },

    /// HTTP 429 from an upstream, with its suggested wait when provided.
    #[error("{service} rate limit hit{}", retry_hint(.retry_after_secs))]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// Catch-all for bugs and unexpected states.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(", retry in {s}s"),
        None => String::new(),
    }
}

impl ResearchError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn malformed(service: &str, excerpt: &str) -> Self {
        // Keep a short excerpt only; upstream bodies can be huge.
        let excerpt: String = excerpt.chars().take(120).collect();
        Self::UpstreamMalformed {
            service: service.to_string(),
            excerpt,
        }
    }

    /// Map a transport-level reqwest failure onto the taxonomy.
    pub fn from_http(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout {
                service: service.to_string(),
            }
        } else {
            Self::UpstreamUnavailable {
                service: service.to_string(),
                detail: err.to_string(),
            }
        }
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(service: &str, status: reqwest::StatusCode, retry_after: Option<u64>) -> Self {
        match status.as_u16() {
            401 | 403 => Self::UpstreamForbidden {
                service: service.to_string(),
            },
            404 => Self::NotFound(format!("{service} has no entry for the requested item")),
            429 => Self::RateLimited {
                service: service.to_string(),
                retry_after_secs: retry_after,
            },
            _ => Self::UpstreamUnavailable {
                service: service.to_string(),
                detail: format!("HTTP {}", status.as_u16()),
            },
        }
    }
}

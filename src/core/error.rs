use crate::core::state::Stage;
use thiserror::Error;

/// Failure raised at the provider-call boundary.
///
/// Providers classify their own failures so the retry wrapper only has to
/// switch on this closed set.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rate limit reached: {message}")]
    RateLimited { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        ProviderError::RateLimited {
            message: message.into(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.status().map(|s| s.as_u16()) == Some(429) {
            ProviderError::rate_limited(e.to_string())
        } else {
            ProviderError::Other(e.into())
        }
    }
}

/// Errors surfaced by the generation workflow.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("could not parse the outline returned by the provider: {reason}")]
    Parse { reason: String, body: String },

    #[error("the provider returned an empty outline")]
    EmptyOutline,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cannot continue from the {stage} stage: {reason}")]
    Precondition { stage: Stage, reason: String },

    #[error("failed to compose the cover: {0}")]
    Cover(#[source] anyhow::Error),

    #[error("failed to save session: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("failed to render the document: {0}")]
    Layout(#[from] LayoutError),
}

impl GenerationError {
    pub fn precondition(stage: Stage, reason: impl Into<String>) -> Self {
        GenerationError::Precondition {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, GenerationError::Provider(p) if p.is_rate_limit())
    }

    /// Message meant for the person driving the wizard.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Provider(ProviderError::RateLimited { .. }) => {
                "The generation service is receiving too many requests right now (rate limit). \
                 Please wait a few minutes before trying again."
                    .to_string()
            }
            GenerationError::Provider(ProviderError::Other(e)) => format!(
                "The generation service failed: {}. Please check your connection and try again.",
                e
            ),
            GenerationError::Parse { .. } => {
                "The outline returned by the service could not be understood. Please try again."
                    .to_string()
            }
            GenerationError::EmptyOutline => {
                "The service returned no sections. Please adjust the topic and try again."
                    .to_string()
            }
            GenerationError::InvalidRequest(reason) => format!("Invalid request: {}.", reason),
            GenerationError::Precondition { reason, .. } => format!("Cannot continue: {}.", reason),
            GenerationError::Cover(e) => format!("The cover could not be composed: {}.", e),
            GenerationError::Storage(e) => format!("Your progress could not be saved: {}.", e),
            GenerationError::Layout(e) => format!("The book could not be rendered: {}.", e),
        }
    }
}

/// Errors raised while laying out or rendering the final document.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("PDF encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_is_distinct() {
        let limited = GenerationError::from(ProviderError::rate_limited("429"));
        let other = GenerationError::from(ProviderError::Other(anyhow::anyhow!("boom")));

        assert!(limited.is_rate_limit());
        assert!(!other.is_rate_limit());
        assert!(limited.user_message().contains("rate limit"));
        assert!(!other.user_message().contains("rate limit"));
        assert_ne!(limited.user_message(), other.user_message());
    }

    #[test]
    fn test_precondition_message_names_reason() {
        let err = GenerationError::precondition(Stage::Cover, "a cover image is required");
        assert!(err.user_message().contains("a cover image is required"));
        assert!(err.to_string().contains("Cover"));
    }
}

//! Model backend layer for Conduit.
//!
//! # Architecture
//!
//! - [`traits::ModelInvoker`]: trait that all model backends implement
//! - [`gemini::GeminiInvoker`]: Gemini `generateContent` HTTP client
//! - [`create_invoker`]: convenience builder from the loaded config

pub mod gemini;
pub mod traits;

// Re-export main types for convenience
pub use gemini::GeminiInvoker;
pub use traits::{ModelError, ModelInvoker, ModelReply, SamplingConfig};

use conduit_core::config::Config;
use tracing::debug;

/// Build the model invoker described by the configuration.
pub fn create_invoker(config: &Config) -> Result<GeminiInvoker, ModelError> {
    debug!(
        model = %config.agent.model,
        api_base = config.model.api_base.as_deref().unwrap_or("default"),
        "Creating model invoker"
    );
    GeminiInvoker::new(
        &config.model.api_key,
        config.model.api_base.as_deref(),
        &config.agent.model,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_invoker_requires_key() {
        let mut config = Config::default();
        config.model.api_key.clear();
        let err = create_invoker(&config).unwrap_err();
        assert!(err.to_string().contains("no API key"));
    }

    #[test]
    fn test_create_invoker_uses_agent_model() {
        let mut config = Config::default();
        config.model.api_key = "k".to_string();
        config.agent.model = "gemini-1.5-pro".to_string();
        let invoker = create_invoker(&config).unwrap();
        assert_eq!(invoker.model(), "gemini-1.5-pro");
    }
}

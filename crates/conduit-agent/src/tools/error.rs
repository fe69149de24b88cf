//! Tool provider errors.

/// Failure of a tool provider connection or call.
///
/// These are failures of the call itself. A tool that runs and reports an
/// error result is not a `ToolError`; it comes back as a
/// [`ToolCallResult`](super::provider::ToolCallResult) with `is_error` set.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool server '{server}' transport failure: {message}")]
    Transport { server: String, message: String },

    #[error("tool server '{server}' sent an invalid message: {message}")]
    Protocol { server: String, message: String },

    #[error("tool server '{server}' returned error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("tool server '{server}' closed its output")]
    Terminated { server: String },

    #[error("no tool server offers tool '{0}'")]
    ToolNotFound(String),
}

impl ToolError {
    /// Short error kind used in the text fed back to the model.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Spawn { .. } => "ProviderUnreachable",
            ToolError::Transport { .. } => "TransportError",
            ToolError::Protocol { .. } => "ProtocolError",
            ToolError::Rpc { .. } => "RpcError",
            ToolError::Terminated { .. } => "ProviderTerminated",
            ToolError::ToolNotFound(_) => "ToolNotFound",
        }
    }
}

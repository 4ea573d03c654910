//! Error type shared by every command.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad arguments or input, detected before any API call is made.
    #[error("{0}")]
    Validation(String),

    #[error(
        "no namespace present. Cannot continue. Please set the --namespace flag \
         or the KUBECTL_PLUGINS_CURRENT_NAMESPACE env var"
    )]
    MissingNamespace,

    /// An upstream API call failed.
    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: kube::Error,
    },

    #[error("{context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("watch failed: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),

    #[error("watch ended before the condition was met")]
    WatchClosed,

    #[error("timed out after {0:?} waiting for the condition")]
    Timeout(Duration),

    #[error("cancelled while waiting for the condition")]
    Cancelled,

    #[error("no {format:?} output registered for command {command:?}")]
    UnknownOutput { command: String, format: String },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("failed to infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("failed to create kubernetes client: {0}")]
    Client(#[source] kube::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the error is an upstream 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Api {
                source: kube::Error::Api(response),
                ..
            } if response.code == 404
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attaches a human readable description of the failed operation to an
/// upstream error.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> ResultExt<T> for kube::Result<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|source| Error::Api {
            context: context().into(),
            source,
        })
    }
}

impl<T> ResultExt<T> for serde_json::Result<T> {
    fn context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|source| Error::Serialization {
            context: context().into(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ResultExt as _};
    use crate::testing::not_found;

    #[test]
    fn api_errors_carry_context() {
        let err = Err::<(), _>(not_found("keycloak"))
            .context(|| "failed to get secret keycloak")
            .unwrap_err();

        assert!(err.is_not_found());
        let message = err.to_string();
        assert!(message.starts_with("failed to get secret keycloak: "));
        assert!(message.contains("not found"));
    }

    #[test]
    fn serialization_errors_carry_context() {
        let err = serde_json::from_str::<serde_json::Value>("{")
            .context(|| "failed to parse public_installation")
            .unwrap_err();

        assert!(matches!(err, Error::Serialization { .. }));
        assert!(err
            .to_string()
            .starts_with("failed to parse public_installation: "));
        assert!(!err.is_not_found());
    }
}

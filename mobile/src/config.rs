//! Namespace resolution and cluster client setup.

use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::debug;

use crate::error::{Error, Result};

/// Set by kubectl/oc when running us as a plugin. Takes precedence over
/// `--namespace`.
pub const NAMESPACE_ENV: &str = "KUBECTL_PLUGINS_CURRENT_NAMESPACE";

pub fn resolve_namespace(flag: Option<&str>, env: Option<String>) -> Result<String> {
    env.filter(|namespace| !namespace.is_empty())
        .or_else(|| flag.filter(|namespace| !namespace.is_empty()).map(String::from))
        .ok_or(Error::MissingNamespace)
}

/// A client for the selected kubeconfig context (or the inferred
/// configuration), along with the URL of the cluster it talks to.
pub async fn connect(context: Option<String>) -> Result<(Client, String)> {
    let config = match context {
        Some(context) => {
            let kubeconfig = Kubeconfig::read()?;
            Config::from_custom_kubeconfig(
                kubeconfig,
                &KubeConfigOptions {
                    context: Some(context),
                    ..KubeConfigOptions::default()
                },
            )
            .await?
        }
        None => Config::infer().await?,
    };

    let cluster_url = config.cluster_url.to_string();
    debug!("connecting to {cluster_url}");

    let client = Client::try_from(config).map_err(Error::Client)?;
    Ok((client, cluster_url))
}

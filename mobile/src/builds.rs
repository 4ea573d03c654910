//! Mobile client builds, run as OpenShift Jenkins pipeline builds.

use std::collections::BTreeMap;

use kube::ResourceExt as _;
use mobile_crds::{
    Build, BuildConfig, BuildConfigSpec, BuildSource, BuildStrategy, GitBuildSource,
    JenkinsPipelineStrategy, BUILD_CONFIG_LABEL, CLIENT_BUILD_LABEL, CLIENT_ID_LABEL,
};
use tracing::info;

use crate::{
    apis::Apis,
    clients::get_client,
    error::{Result, ResultExt as _},
};

#[derive(Debug, Clone)]
pub struct ClientBuildOptions {
    pub name: Option<String>,
    pub git_url: String,
    pub git_ref: String,
    pub jenkinsfile_path: String,
}

pub fn client_build_selector() -> String {
    format!("{CLIENT_BUILD_LABEL}=true")
}

pub fn new_build_config(namespace: &str, client_id: &str, options: ClientBuildOptions) -> BuildConfig {
    let name = options.name.unwrap_or_else(|| client_id.to_string());

    let mut build_config = BuildConfig::new(
        &name,
        BuildConfigSpec {
            source: BuildSource {
                type_: "Git".to_string(),
                git: Some(GitBuildSource {
                    uri: options.git_url,
                    ref_: Some(options.git_ref),
                }),
            },
            strategy: BuildStrategy {
                type_: "JenkinsPipeline".to_string(),
                jenkins_pipeline_strategy: Some(JenkinsPipelineStrategy {
                    jenkinsfile_path: Some(options.jenkinsfile_path),
                }),
            },
            run_policy: Some("Parallel".to_string()),
        },
    );
    build_config.metadata.namespace = Some(namespace.to_string());
    build_config.metadata.labels = Some(BTreeMap::from([
        (CLIENT_BUILD_LABEL.to_string(), "true".to_string()),
        (CLIENT_ID_LABEL.to_string(), client_id.to_string()),
    ]));
    build_config
}

/// Create a build config for an existing mobile client.
pub async fn create_client_build(
    apis: &Apis,
    client_id: &str,
    options: ClientBuildOptions,
) -> Result<BuildConfig> {
    get_client(apis, client_id).await?;

    let build_config = new_build_config(&apis.namespace, client_id, options);
    let name = build_config.name_any();
    let created = apis
        .cluster
        .create_build_config(&build_config)
        .await
        .context(|| format!("failed to create client build {name}"))?;
    info!("created client build {name} for {client_id}");

    Ok(created)
}

pub async fn list_client_builds(apis: &Apis) -> Result<Vec<BuildConfig>> {
    apis.cluster
        .list_build_configs(&client_build_selector())
        .await
        .context(|| format!("failed to list client builds in {}", apis.namespace))
}

pub async fn get_client_build(apis: &Apis, name: &str) -> Result<BuildConfig> {
    apis.cluster
        .get_build_config(name)
        .await
        .context(|| format!("failed to get client build {name}"))
}

pub async fn delete_client_build(apis: &Apis, name: &str) -> Result<()> {
    apis.cluster
        .delete_build_config(name)
        .await
        .context(|| format!("failed to delete client build {name}"))?;
    info!("deleted client build {name}");
    Ok(())
}

pub async fn start_client_build(apis: &Apis, name: &str) -> Result<Build> {
    let build = apis
        .cluster
        .instantiate_build_config(name)
        .await
        .context(|| format!("failed to start client build {name}"))?;
    info!("started build {} of {name}", build.name_any());
    Ok(build)
}

/// Cancel the build `name`, or with `all`, every unfinished build of the
/// build config `name`.
pub async fn stop_client_build(apis: &Apis, name: &str, all: bool) -> Result<Vec<Build>> {
    let names = if all {
        apis.cluster
            .list_builds(&format!("{BUILD_CONFIG_LABEL}={name}"))
            .await
            .context(|| format!("failed to list builds of {name}"))?
            .iter()
            .filter(|build| !build.is_finished())
            .map(|build| build.name_any())
            .collect()
    } else {
        vec![name.to_string()]
    };

    let mut cancelled = Vec::with_capacity(names.len());
    for build in names {
        cancelled.push(
            apis.cluster
                .cancel_build(&build)
                .await
                .context(|| format!("failed to cancel build {build}"))?,
        );
        info!("cancelled build {build}");
    }

    Ok(cancelled)
}

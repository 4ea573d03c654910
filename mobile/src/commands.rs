//! The `create|get|delete|start|stop <resource>` command tree.

use std::{io::Write, time::Duration};

use clap::Subcommand;
use serde::Serialize;

use crate::{
    apis::Apis,
    builds::{self, ClientBuildOptions},
    client_config, clients,
    error::{Error, Result, ResultExt as _},
    instances::{self, ProvisionOptions},
    integration,
    output::{Format, OutputRegistry},
    service::{self, ExternalService},
    wait,
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create clients, integrations, service instances, service configs and client builds
    #[command(subcommand)]
    Create(CreateCommand),
    /// Show clients, configs, integrations, services and client builds
    #[command(subcommand)]
    Get(GetCommand),
    /// Delete clients, integrations, service instances, service configs and client builds
    #[command(subcommand)]
    Delete(DeleteCommand),
    /// Start client builds
    #[command(subcommand)]
    Start(StartCommand),
    /// Stop running client builds
    #[command(subcommand)]
    Stop(StopCommand),
}

#[derive(Debug, Subcommand)]
pub enum CreateCommand {
    /// Register a mobile client and issue it an API key
    Client {
        name: String,
        /// One of android, iOS or cordova
        client_type: String,
        #[arg(long)]
        app_identifier: Option<String>,
    },
    /// Integrate the consumer service instance with the provider service instance
    Integration {
        consumer: String,
        provider: String,
        /// Redeploy the consumer so the integration takes effect immediately
        #[arg(long)]
        auto_redeploy: bool,
    },
    /// Provision a mobile service from the service catalog
    #[command(name = "serviceinstance")]
    ServiceInstance {
        service_name: String,
        /// Provisioning parameter, as key=value
        #[arg(short, long = "param")]
        params: Vec<String>,
        #[arg(long)]
        plan: Option<String>,
        /// Return as soon as the instance is created, instead of waiting for it to be ready
        #[arg(long)]
        no_wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
    /// Register a service running outside of the namespace
    #[command(name = "serviceconfig")]
    ServiceConfig {
        name: String,
        uri: String,
        #[arg(long = "type")]
        type_: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        /// Service parameter, as key=value
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Create a pipeline build for a mobile client
    #[command(name = "clientbuild")]
    ClientBuild {
        client_id: String,
        git_url: String,
        /// Name of the build, defaults to the client id
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "master")]
        git_ref: String,
        #[arg(long, default_value = "Jenkinsfile")]
        jenkinsfile_path: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum GetCommand {
    Client {
        id: String,
    },
    Clients,
    /// SDK configuration for a mobile client
    #[command(name = "clientconfig", visible_alias = "sdkconfig")]
    ClientConfig {
        client_id: String,
    },
    #[command(name = "serviceconfig")]
    ServiceConfig {
        name: String,
    },
    #[command(name = "serviceconfigs")]
    ServiceConfigs,
    Integration {
        consumer: String,
        provider: String,
    },
    Integrations,
    /// Instances of a mobile service
    #[command(name = "serviceinstances")]
    ServiceInstances {
        service_name: String,
    },
    /// Mobile services available from the service catalog
    Services,
    #[command(name = "clientbuild")]
    ClientBuild {
        name: String,
    },
    #[command(name = "clientbuilds")]
    ClientBuilds,
}

#[derive(Debug, Subcommand)]
pub enum DeleteCommand {
    Client {
        id: String,
    },
    Integration {
        consumer: String,
        provider: String,
        /// Redeploy the consumer so the integration is removed immediately
        #[arg(long)]
        auto_redeploy: bool,
    },
    #[command(name = "serviceinstance")]
    ServiceInstance {
        id: String,
    },
    #[command(name = "serviceconfig")]
    ServiceConfig {
        name: String,
    },
    #[command(name = "clientbuild")]
    ClientBuild {
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum StartCommand {
    /// Start a build of a client build config
    #[command(name = "clientbuild")]
    ClientBuild { name: String },
}

#[derive(Debug, Subcommand)]
pub enum StopCommand {
    /// Cancel a build, or with --all every running build of a build config
    #[command(name = "clientbuild")]
    ClientBuild {
        name: String,
        #[arg(long)]
        all: bool,
    },
}

/// Everything a command needs to run and print its result.
pub struct Session<'a> {
    pub apis: Apis,
    pub cluster_url: String,
    pub output: String,
    pub registry: &'a OutputRegistry,
}

impl Session<'_> {
    fn render<T: Serialize>(&self, command: &str, value: &T, out: &mut dyn Write) -> Result<()> {
        let value = serde_json::to_value(value)
            .context(|| format!("failed to encode output of {command}"))?;
        self.registry.render(command, &self.output, &value, out)
    }
}

fn parse_pairs(pairs: &[String]) -> Result<std::collections::BTreeMap<String, String>> {
    Ok(instances::parse_params(pairs)?
        .into_iter()
        .filter_map(|(key, value)| value.as_str().map(|value| (key, value.to_string())))
        .collect())
}

/// Run one command. Rendered results go to `out`; status lines and
/// follow-up instructions go to `notes` so that `out` stays machine-readable.
pub async fn run(
    command: Command,
    session: &Session<'_>,
    out: &mut dyn Write,
    notes: &mut dyn Write,
) -> Result<()> {
    if session.output.parse::<Format>().is_err() {
        return Err(Error::UnknownOutput {
            command: "mobile".to_string(),
            format: session.output.clone(),
        });
    }

    let apis = &session.apis;

    match command {
        Command::Create(create) => match create {
            CreateCommand::Client {
                name,
                client_type,
                app_identifier,
            } => {
                let client =
                    clients::create_client(apis, &name, &client_type, app_identifier).await?;
                session.render("create client", &client, out)
            }
            CreateCommand::Integration {
                consumer,
                provider,
                auto_redeploy,
            } => {
                let change =
                    integration::create_integration(apis, &consumer, &provider, auto_redeploy)
                        .await?;
                writeln!(notes, "created integration {}", change.binding)?;
                if let Some(instructions) = change.instructions() {
                    writeln!(notes, "{instructions}")?;
                }
                Ok(())
            }
            CreateCommand::ServiceInstance {
                service_name,
                params,
                plan,
                no_wait,
                timeout,
            } => {
                let options = ProvisionOptions {
                    plan,
                    params: instances::parse_params(&params)?,
                    wait: !no_wait,
                    timeout: timeout.map(Duration::from_secs),
                };
                let instance =
                    instances::create_instance(apis, &service_name, options, wait::ctrl_c())
                        .await?;
                session.render("create serviceinstance", &instance, out)
            }
            CreateCommand::ServiceConfig {
                name,
                uri,
                type_,
                display_name,
                params,
            } => {
                let registered = service::register_service(
                    apis,
                    ExternalService {
                        name,
                        uri,
                        type_,
                        display_name,
                        params: parse_pairs(&params)?,
                    },
                )
                .await?;
                session.render("create serviceconfig", &registered, out)
            }
            CreateCommand::ClientBuild {
                client_id,
                git_url,
                name,
                git_ref,
                jenkinsfile_path,
            } => {
                let build_config = builds::create_client_build(
                    apis,
                    &client_id,
                    ClientBuildOptions {
                        name,
                        git_url,
                        git_ref,
                        jenkinsfile_path,
                    },
                )
                .await?;
                session.render("create clientbuild", &build_config, out)
            }
        },
        Command::Get(get) => match get {
            GetCommand::Client { id } => {
                session.render("get client", &clients::get_client(apis, &id).await?, out)
            }
            GetCommand::Clients => {
                session.render("get clients", &clients::list_clients(apis).await?, out)
            }
            GetCommand::ClientConfig { client_id } => {
                let config =
                    client_config::client_config(apis, &session.cluster_url, &client_id).await?;
                session.render("get clientconfig", &config, out)
            }
            GetCommand::ServiceConfig { name } => {
                let config = client_config::service_config_for(apis, &name).await?;
                session.render("get serviceconfig", &config, out)
            }
            GetCommand::ServiceConfigs => {
                let configs = client_config::service_configs(apis).await?;
                session.render("get serviceconfigs", &configs, out)
            }
            GetCommand::Integration { consumer, provider } => {
                let binding = integration::get_integration(apis, &consumer, &provider).await?;
                session.render("get integration", &binding, out)
            }
            GetCommand::Integrations => {
                let integrations = integration::list_integrations(apis).await?;
                session.render("get integrations", &integrations, out)
            }
            GetCommand::ServiceInstances { service_name } => {
                let instances = instances::list_instances(apis, &service_name).await?;
                session.render("get serviceinstances", &instances, out)
            }
            GetCommand::Services => {
                let services = instances::list_mobile_services(apis).await?;
                session.render("get services", &services, out)
            }
            GetCommand::ClientBuild { name } => {
                let build_config = builds::get_client_build(apis, &name).await?;
                session.render("get clientbuild", &build_config, out)
            }
            GetCommand::ClientBuilds => {
                let build_configs = builds::list_client_builds(apis).await?;
                session.render("get clientbuilds", &build_configs, out)
            }
        },
        Command::Delete(delete) => {
            let deleted = match delete {
                DeleteCommand::Client { id } => {
                    clients::delete_client(apis, &id).await?;
                    format!("client {id}")
                }
                DeleteCommand::Integration {
                    consumer,
                    provider,
                    auto_redeploy,
                } => {
                    let change = integration::delete_integration(
                        apis,
                        &consumer,
                        &provider,
                        auto_redeploy,
                    )
                    .await?;
                    if let Some(instructions) = change.instructions() {
                        writeln!(notes, "{instructions}")?;
                    }
                    format!("integration {}", change.binding)
                }
                DeleteCommand::ServiceInstance { id } => {
                    instances::delete_instance(apis, &id).await?;
                    format!("service instance {id}")
                }
                DeleteCommand::ServiceConfig { name } => {
                    service::unregister_service(apis, &name).await?;
                    format!("service config {name}")
                }
                DeleteCommand::ClientBuild { name } => {
                    builds::delete_client_build(apis, &name).await?;
                    format!("client build {name}")
                }
            };
            writeln!(notes, "deleted {deleted}")?;
            Ok(())
        }
        Command::Start(StartCommand::ClientBuild { name }) => {
            let build = builds::start_client_build(apis, &name).await?;
            session.render("start clientbuild", &build, out)
        }
        Command::Stop(StopCommand::ClientBuild { name, all }) => {
            let cancelled = builds::stop_client_build(apis, &name, all).await?;
            session.render("stop clientbuild", &cancelled, out)
        }
    }
}

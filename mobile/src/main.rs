use std::process::ExitCode;

use clap::{error::ErrorKind, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod apis;
mod builds;
mod client_config;
mod clients;
mod commands;
mod config;
mod error;
mod instances;
mod integration;
mod output;
mod service;
#[cfg(test)]
mod testing;
mod wait;

use crate::{
    apis::Apis,
    commands::{Command, Session},
    config::NAMESPACE_ENV,
    error::Result,
    output::OutputRegistry,
};

#[derive(Debug, Parser)]
#[command(
    name = "mobile",
    author,
    version,
    about = "Manage mobile clients and integrate mobile services",
    long_about = None
)]
struct Args {
    /// Namespace to work in. Overridden by KUBECTL_PLUGINS_CURRENT_NAMESPACE.
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Output format, json or table
    #[arg(short, long, global = true, default_value = "table")]
    output: String,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    context: Option<String>,

    /// More logging, repeat for even more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args, registry: &OutputRegistry) -> Result<()> {
    let namespace =
        config::resolve_namespace(args.namespace.as_deref(), std::env::var(NAMESPACE_ENV).ok())?;
    debug!("using namespace {namespace}");

    let (client, cluster_url) = config::connect(args.context).await?;

    let session = Session {
        apis: Apis::live(client, &namespace),
        cluster_url,
        output: args.output,
        registry,
    };

    commands::run(
        args.command,
        &session,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
    .await
}

/// Exit status for an argument error: help and version requests succeed,
/// every other parse failure exits with 1 like any other error.
fn arg_error_status(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Printing only fails when stdout/stderr is gone.
            let _ = err.print();
            return ExitCode::from(arg_error_status(&err));
        }
    };
    init_logging(args.verbose);

    let registry = OutputRegistry::with_defaults();

    match run(args, &registry).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::{arg_error_status, Args};
    use crate::commands::{Command, CreateCommand, DeleteCommand, GetCommand, StopCommand};

    #[test]
    fn create_integration_flags() {
        let args = Args::try_parse_from([
            "mobile",
            "create",
            "integration",
            "sync-x",
            "kc-x",
            "--auto-redeploy",
            "--namespace",
            "myproject",
        ])
        .unwrap();

        assert_eq!(args.namespace.as_deref(), Some("myproject"));
        assert_eq!(args.output, "table");
        assert!(matches!(
            args.command,
            Command::Create(CreateCommand::Integration { auto_redeploy: true, .. })
        ));
    }

    #[test]
    fn sdkconfig_is_clientconfig() {
        let args =
            Args::try_parse_from(["mobile", "get", "sdkconfig", "myapp-android", "-o", "json"])
                .unwrap();

        assert_eq!(args.output, "json");
        assert!(matches!(
            args.command,
            Command::Get(GetCommand::ClientConfig { client_id }) if client_id == "myapp-android"
        ));
    }

    #[test]
    fn service_instance_params() {
        let args = Args::try_parse_from([
            "mobile",
            "create",
            "serviceinstance",
            "keycloak",
            "-p",
            "realm=myproject",
            "--param",
            "admin=admin",
            "--no-wait",
        ])
        .unwrap();

        match args.command {
            Command::Create(CreateCommand::ServiceInstance {
                service_name,
                params,
                no_wait,
                timeout,
                ..
            }) => {
                assert_eq!(service_name, "keycloak");
                assert_eq!(params, vec!["realm=myproject", "admin=admin"]);
                assert!(no_wait);
                assert_eq!(timeout, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn stop_all_builds() {
        let args =
            Args::try_parse_from(["mobile", "stop", "clientbuild", "myapp-android", "--all"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::Stop(StopCommand::ClientBuild { all: true, .. })
        ));
    }

    #[test]
    fn missing_positional_arguments() {
        assert!(Args::try_parse_from(["mobile", "delete", "integration", "sync-x"]).is_err());
        assert!(Args::try_parse_from(["mobile", "create", "client", "myapp"]).is_err());
        assert!(matches!(
            Args::try_parse_from(["mobile", "delete", "serviceconfig", "push"])
                .unwrap()
                .command,
            Command::Delete(DeleteCommand::ServiceConfig { .. })
        ));
    }

    #[test]
    fn argument_errors_exit_with_one() {
        let missing =
            Args::try_parse_from(["mobile", "delete", "integration", "sync-x"]).unwrap_err();
        assert_eq!(arg_error_status(&missing), 1);

        let unknown = Args::try_parse_from(["mobile", "get", "widgets"]).unwrap_err();
        assert_eq!(arg_error_status(&unknown), 1);

        let help = Args::try_parse_from(["mobile", "--help"]).unwrap_err();
        assert_eq!(arg_error_status(&help), 0);

        let version = Args::try_parse_from(["mobile", "--version"]).unwrap_err();
        assert_eq!(arg_error_status(&version), 0);
    }

    #[test]
    fn command_tree_is_valid() {
        use clap::CommandFactory as _;
        Args::command().debug_assert();
    }
}

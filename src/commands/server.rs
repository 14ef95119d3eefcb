use clap::{value_parser, Arg, ArgMatches, Command};
use std::sync::Arc;

use crate::api::server as ApiServer;
use crate::config::config::Config;
use crate::orchestrator::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::runtime::runtime::Runtime;

pub(crate) fn command_config() -> Command {
    Command::new("start")
        .about("Start the API server")
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Port to listen on, overrides [api] port")
                .value_parser(value_parser!(u16))
        )
}

pub(crate) async fn execute(args: &ArgMatches, mut configuration: Config) -> Result<(), String> {
    if let Some(port) = args.get_one::<u16>("port") {
        configuration.api.port = *port;
    }

    info!("Start server");

    let runtime = Runtime::docker(&configuration.docker)
        .map_err(|err| format!("Unable to reach the docker daemon: {}", err))?;
    let engine = Orchestrator::new(runtime, OrchestratorConfig::from(&configuration.docker));

    ApiServer::start(Arc::new(engine), configuration)
        .await
        .map_err(|err| format!("Server stopped: {}", err))
}

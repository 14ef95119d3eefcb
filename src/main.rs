use clap::Command;

#[macro_use]
extern crate log;
extern crate env_logger;

mod commands {
  pub(crate) mod server;
}

mod runtime {
  pub(crate) mod docker;
  pub(crate) mod error;
  pub(crate) mod runtime;
  #[cfg(test)]
  pub(crate) mod fake;
}

mod models {
  pub(crate) mod containers;
  pub(crate) mod error;
  pub(crate) mod images;
}

mod orchestrator {
  pub(crate) mod error;
  pub(crate) mod orchestrator;
  pub(crate) mod outcome;
  pub(crate) mod resolver;
}

mod api {
  pub(crate) mod server;
  pub(crate) mod action {
    pub(crate) mod hello;
    pub(crate) mod healthz;
    pub(crate) mod container;
    pub(crate) mod image;
  }
}

mod config {
    pub(crate) mod api;
    pub(crate) mod config;
    pub(crate) mod docker;
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let app = Command::new("dockyard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Image and container lifecycle in front of the docker daemon")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("server")
                .args_conflicts_with_subcommands(true)
                .flatten_help(true)
                .subcommand(
                    commands::server::command_config(),
                )
        );

    let matches = app.get_matches();
    let config = config::config::load_config();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            let server_command = sub_matches.subcommand().unwrap_or(("start", sub_matches));
            match server_command {
                ("start", sub_matches) => {
                    if let Err(err) = commands::server::execute(sub_matches, config).await {
                        error!("{}", err);
                        eprintln!("Error: {}", err);
                        std::process::exit(1);
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins; otherwise `-v` flags, otherwise the config's
/// `log_level` for `listen` and warnings only for one-shot commands.
fn init_tracing(cli: &Cli) {
    let default = match cli.global.verbose {
        0 if matches!(cli.command, Command::Listen(_)) => config::resolve(&cli.global)
            .map_or_else(|_| "info".to_owned(), |cfg| cfg.log_level),
        0 => "warn".to_owned(),
        1 => "info".to_owned(),
        2 => "debug".to_owned(),
        _ => "trace".to_owned(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Command::Listen(args) => commands::listen::handle(&args, &cli.global).await,
        Command::Parse(args) => commands::parse::handle(&args, &cli.global),
        Command::Encode(args) => commands::codec::encode(&args, &cli.global),
        Command::Decode(args) => commands::codec::decode(&args, &cli.global),
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "ecos", &mut std::io::stdout());
            Ok(())
        }
    }
}

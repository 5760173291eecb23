use anyhow::Context;
use clap::{value_parser, Arg, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use tuner_core::config::LoggingConfig;
use tuner_core::TunerConfig;
use tuner_server::{cli, telemetry, VERSION};

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Path to a TOML configuration file")
}

fn load_config(args: &ArgMatches) -> anyhow::Result<TunerConfig> {
    let path = args.get_one::<PathBuf>("config");
    TunerConfig::load(path.map(PathBuf::as_path)).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("llm-tuner")
        .version(VERSION)
        .about("LLM fine-tuning platform")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API")
                .arg(config_arg())
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, overrides the configuration"),
                ),
        )
        .subcommand(
            Command::new("normalize")
                .about("Normalize a dataset file and print a report")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Dataset file"),
                )
                .arg(
                    Arg::new("type")
                        .long("type")
                        .help("Type tag such as .csv, defaults to the file extension"),
                )
                .arg(
                    Arg::new("hyperparameters")
                        .long("hyperparameters")
                        .help("Hyperparameters as a JSON object"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration with secrets redacted")
                .arg(config_arg()),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("serve", args)) => {
            let mut config = load_config(args)?;
            if let Some(bind) = args.get_one::<SocketAddr>("bind") {
                config = config.with_bind(*bind);
            }
            telemetry::init(&config.logging)?;
            tuner_server::serve(config).await?;
        }
        Some(("normalize", args)) => {
            telemetry::init(&LoggingConfig::default())?;
            let file = args
                .get_one::<PathBuf>("file")
                .context("--file is required")?;
            let report = cli::normalize_file(
                file,
                args.get_one::<String>("type").map(String::as_str),
                args.get_one::<String>("hyperparameters").map(String::as_str),
            )?;
            print!("{report}");
        }
        Some(("config", args)) => {
            let config = load_config(args)?;
            print!("{}", config.to_redacted_toml()?);
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

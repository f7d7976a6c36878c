use std::io;
use std::path::Path;

use anviltile::{build, BuildOpts, ClientFetcher, Config};
use clap::{App, Arg, ArgMatches, SubCommand};
use env_logger::Env;
use log::error;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// The client archive is expected to be staged by hand; fetching it from
/// the version manifest is deliberately not built in.
struct StagedClient;

impl ClientFetcher for StagedClient {
    fn fetch(&self, version: &str, dest: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "client archive for {} is not cached; place the game jar at {}",
                version,
                dest.display()
            ),
        ))
    }
}

fn cmd_build(args: &ArgMatches) -> Result<()> {
    let config = Config::from_path(Path::new(args.value_of("config").unwrap()))?;

    build(
        &config,
        &StagedClient,
        &BuildOpts {
            force_clean: args.is_present("clean"),
        },
    )?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let matches = App::new("anviltile")
        .about("renders slippy-map tiles from a world save")
        .subcommand(
            SubCommand::with_name("build")
                .arg(
                    Arg::with_name("config")
                        .long("config")
                        .takes_value(true)
                        .required(false)
                        .default_value("config.json"),
                )
                .arg(
                    Arg::with_name("clean")
                        .long("clean")
                        .help("ignore chunk modification times and re-render everything")
                        .takes_value(false),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("build", Some(args)) => cmd_build(args)?,
        _ => error!("{}", matches.usage()),
    };

    Ok(())
}

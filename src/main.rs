use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Arg, ArgMatches, Command, arg, ArgAction};
use serde::Serialize;

use common::config::{find_config_file, parse_config_file, ConfigFile, CONFIG_FILE_NAME};
use common::logging::{setup_with_level, setup_with_level_location, FilterLevel, debug, error, info};

use crate::error::ObjectError;
use crate::service::{ObjectService, QueryInput, QueryRequest, ReferenceRequest, ResolveRequest};

mod error;
mod resolver;
mod endpoint;
mod catalogs;
mod index;
mod cone_search;
mod service;

fn source_arg() -> Arg {
    Arg::new("source").long("source").help("Catalog to query: simbad or ned").required(false).value_name("SOURCE")
}

/// Prints a successful result as JSON on stdout
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing the result")?);
    Ok( () )
}

fn values(matches: &ArgMatches, id: &str) -> Option<Vec<String>> {
    matches.get_many::<String>(id).map(|v| v.cloned().collect())
}

/// `objects` and `identifiers` share one request shape
fn resolve_request(command: &str, matches: &ArgMatches) -> ResolveRequest {
    ResolveRequest {
        source: matches.get_one::<String>("source").cloned(),
        objects: if command == "objects" { values(matches, "names") } else { None },
        identifiers: if command == "identifiers" { values(matches, "ids") } else { None },
        position: None,
    }
}

fn reference_request(matches: &ArgMatches) -> ReferenceRequest {
    ReferenceRequest {
        objects: values(matches, "names").unwrap_or_default(),
        start_year: matches.get_one::<i32>("start_year").copied(),
        end_year: matches.get_one::<i32>("end_year").copied(),
        journals: values(matches, "journal"),
        refereed_status: matches.get_one::<String>("refereed_status").cloned(),
    }
}

/// Runs the chosen subcommand; errors are printed as the error payload
async fn run_command(service: &ObjectService, command: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    let res: Result<(), ObjectError> = match command {
        "query" => {
            let query = values(matches, "query").unwrap_or_default().join(" ");

            match service.translate(QueryRequest { query: QueryInput::Single(query) }).await {
                Ok(response) => return print_json(&response),
                Err(e) => Err(e),
            }
        }
        "objects" | "identifiers" => {
            match service.resolve(resolve_request(command, matches)).await {
                Ok(response) => return print_json(&response),
                Err(e) => Err(e),
            }
        }
        "position" => {
            let position = values(matches, "position").unwrap_or_default().join(" ");

            match service.position_search(position.as_str()).await {
                Ok(outcome) => return print_json(&outcome),
                Err(e) => Err(e),
            }
        }
        "classic" => {
            match service.ned_references(reference_request(matches)).await {
                Ok(response) => return print_json(&response),
                Err(e) => Err(e),
            }
        }
        _ => bail!("Unknown command: {}", command),
    };

    if let Err(e) = res {
        error!("{} failed ({}): {}", command, e.status_class().status_code(), e);
        print_json(&e.payload())?;
        bail!(e);
    }

    Ok( () )
}

fn cli() -> Command {
    Command::new("object-service")
        .about("Resolves astronomical object names and positions into catalog identifiers")
        .arg(Arg::new("debug").long("debug").hide(true).required(false).action(ArgAction::SetTrue))
        .arg(Arg::new("log_file").long("log-file").help("Optional log file location").required(false).value_name("LOG_FILE"))
        .arg(Arg::new("config_file").long("config-file").help("Optional config file location").required(false).value_name("CONFIG_FILE"))
        .arg(arg!(--check "Check the config file, and print the resolved configuration").action(ArgAction::SetTrue))
        .subcommand(Command::new("query")
            .about("Translate the object: clauses of a search query")
            .arg(Arg::new("query").required(true).num_args(1..).value_name("QUERY")))
        .subcommand(Command::new("objects")
            .about("Look up catalog identifiers for object names")
            .arg(source_arg())
            .arg(Arg::new("names").required(true).num_args(1..).value_name("NAME")))
        .subcommand(Command::new("identifiers")
            .about("Look up canonical names for catalog identifiers")
            .arg(source_arg())
            .arg(Arg::new("ids").required(true).num_args(1..).value_name("ID")))
        .subcommand(Command::new("position")
            .about("Cone search around <position>[:<radius>]")
            .arg(Arg::new("position").required(true).num_args(1..).value_name("POSITION")))
        .subcommand(Command::new("classic")
            .about("Bibcodes of the publications about objects known to NED")
            .arg(Arg::new("start_year").long("start-year").value_parser(clap::value_parser!(i32)).required(false).value_name("YEAR"))
            .arg(Arg::new("end_year").long("end-year").value_parser(clap::value_parser!(i32)).required(false).value_name("YEAR"))
            .arg(Arg::new("journal").long("journal").help("Bibstem to restrict to; may be repeated").action(ArgAction::Append).value_name("BIBSTEM"))
            .arg(Arg::new("refereed_status").long("refereed-status").help("e.g. refereed").required(false).value_name("STATUS"))
            .arg(Arg::new("names").required(true).num_args(1..).value_name("NAME")))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // setup the args
    let args = cli().get_matches();

    // first figure out if we've enabled debug logging
    let log_level = if args.get_flag("debug") {
        FilterLevel::Debug
    } else {
        FilterLevel::Info
    };

    // see if a config-file was specified on the command line
    let config_file_path = if let Some(config_file_arg) = args.get_one::<String>("config_file") {
        let config_file_path = PathBuf::from(config_file_arg);

        if !config_file_path.exists() || !config_file_path.is_file() {
            bail!("The configuration file specified on the command line ({}) was not found", config_file_path.display());
        }

        Some(config_file_path)
    } else {
        match find_config_file(CONFIG_FILE_NAME) {
            Ok(path) => Some(path),
            Err(checked_paths) => {
                eprintln!("The configuration file ({}) was not found, using the defaults", CONFIG_FILE_NAME);
                eprintln!("The following places were checked:");

                for path in checked_paths {
                    eprintln!("\t{}", path.display());
                }

                None
            }
        }
    };

    // parse the config file
    let config_file: ConfigFile = match &config_file_path {
        Some(path) => parse_config_file(path.clone())?,
        None => ConfigFile::default(),
    };

    // get the log_file
    let op_log_file = if let Some(log_file_arg) = args.get_one::<String>("log_file") {
        Some(PathBuf::from(log_file_arg))
    } else {
        config_file.log_file.clone()
    };

    // setup the logging
    let _logger = if let Some(ref log_file_path) = op_log_file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)
            .with_context(|| format!("opening log_file: {}", log_file_path.display()))
            ?;

        setup_with_level_location(log_level, log_file)
    } else {
        setup_with_level(log_level)
    };

    debug!("CONFIG: {:#?}", config_file);

    // sanity check the config file
    if let Err(e) = config_file.sanity_check() {
        error!("Error checking the config file: {}", e);
        bail!(e);
    }

    if args.get_flag("check") {
        println!("{}", toml::to_string_pretty(&config_file).context("serializing the configuration")?);
        return Ok( () );
    }

    let (command, matches) = match args.subcommand() {
        Some(sub) => sub,
        None => bail!("No command given; use one of: query, objects, identifiers, position, classic"),
    };

    match &config_file_path {
        Some(path) => info!("Starting object-service with config file: {}", path.display()),
        None => info!("Starting object-service with the default configuration"),
    }

    let service = ObjectService::from_config(&config_file)?;

    run_command(&service, command, matches).await
}

#[cfg(test)]
mod main_tests {
    use crate::{cli, reference_request, resolve_request};

    #[test]
    fn resolve_requests() {
        let args = cli().try_get_matches_from(["object-service", "objects", "--source", "ned", "M31", "LMC"]).unwrap();
        let (command, matches) = args.subcommand().unwrap();
        let request = resolve_request(command, matches);

        assert_eq!(Some("ned".to_string()), request.source);
        assert_eq!(Some(vec!["M31".to_string(), "LMC".to_string()]), request.objects);
        assert_eq!(None, request.identifiers);
        assert_eq!(None, request.position);

        let args = cli().try_get_matches_from(["object-service", "identifiers", "1575544"]).unwrap();
        let (command, matches) = args.subcommand().unwrap();
        let request = resolve_request(command, matches);

        assert_eq!(None, request.source);
        assert_eq!(None, request.objects);
        assert_eq!(Some(vec!["1575544".to_string()]), request.identifiers);
    }

    #[test]
    fn classic_request() {
        let args = cli().try_get_matches_from([
            "object-service", "classic", "--start-year", "2016", "--journal", "ApJ", "--journal", "A&A", "--refereed-status", "refereed", "3C 273",
        ]).unwrap();
        let (_, matches) = args.subcommand().unwrap();
        let request = reference_request(matches);

        assert_eq!(vec!["3C 273"], request.objects);
        assert_eq!(Some(2016), request.start_year);
        assert_eq!(None, request.end_year);
        assert_eq!(Some(vec!["ApJ".to_string(), "A&A".to_string()]), request.journals);
        assert_eq!(Some("refereed".to_string()), request.refereed_status);

        let args = cli().try_get_matches_from(["object-service", "classic", "M31"]).unwrap();
        let (_, matches) = args.subcommand().unwrap();
        assert_eq!(None, reference_request(matches).journals);

        assert!(cli().try_get_matches_from(["object-service", "classic", "--start-year", "soon", "M31"]).is_err());
    }
}

use clap::{Parser as ClapParser, Subcommand};
use spl_toolkit::cli::{self, CliError, DiscoverOptions, MapOptions};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

#[derive(ClapParser)]
#[command(name = "spl-toolkit")]
#[command(about = "Parse, analyze and rewrite field names in SPL queries")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite field names in a query
    Map {
        /// The query (reads from stdin if not provided)
        query: Option<String>,

        /// Mapping configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Extra mappings file, a JSON list of {source, target}
        #[arg(short, long)]
        mappings: Option<PathBuf>,

        /// Context fact used by conditional rules, KEY=VALUE (repeatable)
        #[arg(long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },

    /// Show data models, datasets, lookups, macros, sources and input fields
    Discover {
        /// The query (reads from stdin if not provided)
        query: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// List the fields a query reads from raw events
    InputFields {
        /// The query (reads from stdin if not provided)
        query: Option<String>,
    },

    /// Check query syntax
    Validate {
        /// The query (reads from stdin if not provided)
        query: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Map {
            query,
            config,
            mappings,
            context,
        } => run_map(query, config, mappings, context),
        Commands::Discover { query, pretty } => read_query(query).and_then(|query| {
            let json = cli::execute_discover(&DiscoverOptions { query, pretty })?;
            println!("{}", json);
            Ok(())
        }),
        Commands::InputFields { query } => read_query(query).and_then(|query| {
            for field in cli::execute_input_fields(&query)? {
                println!("{}", field);
            }
            Ok(())
        }),
        Commands::Validate { query } => read_query(query).and_then(|query| {
            cli::execute_validate(&query)?;
            println!("Valid");
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new().filter_level(log_level).init();
}

fn read_query(query: Option<String>) -> Result<String, CliError> {
    match query {
        Some(q) => Ok(q),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim().to_string())
        }
        None => Err(CliError::NoQuery),
    }
}

fn run_map(
    query: Option<String>,
    config: Option<PathBuf>,
    mappings: Option<PathBuf>,
    context: Vec<String>,
) -> Result<(), CliError> {
    let options = MapOptions {
        query: read_query(query)?,
        config: config.map(fs::read_to_string).transpose()?,
        mappings: mappings.map(fs::read_to_string).transpose()?,
        context,
    };

    println!("{}", cli::execute_map(&options)?);
    Ok(())
}

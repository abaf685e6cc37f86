use clap::{value_parser, Arg, ArgAction, ArgMatches, Command as ClapCommand};
use console::Term;
use itertools::Itertools;
use std::{path::PathBuf, str::FromStr};
use tracing::*;
use tracing_subscriber::EnvFilter;
use zyra_core::{
    config::{Config, ZYRA_LOG_ENV},
    runner::Options,
    token, Client, Error, ListReporter, NullReporter, Registry, Reporter, ReporterType,
    Runner, TableReporter,
};

use crate::list::{self, ListOptions};

/// Build the CLI with clap's builder pattern
fn build_cli() -> ClapCommand {
    let reporter_choices = [ReporterType::List, ReporterType::Table, ReporterType::Null];
    ClapCommand::new("zyra")
        .about("zyra runs plain-text HTTP request files and checks their responses")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .subcommand(
            ClapCommand::new("run")
                .about("Run a request file or every *.zyra file under a directory")
                .arg(Arg::new("path")
                    .help("Request file or directory")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("config")
                    .long("config")
                    .help("Path to the config file. Defaults to $ZYRA_CONFIG, then zyra.config next to the requests")
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("no-test")
                    .long("no-test")
                    .help("Send the requests without evaluating assertions")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("concurrent")
                    .long("concurrent")
                    .help("Run request files concurrently. Results are still reported in file order")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("concurrency")
                    .short('c')
                    .long("concurrency")
                    .help("Specify the maximum number of requests in flight with --concurrent. When unspecified, the \"concurrency\" option of the config applies, otherwise all files run at once")
                    .value_parser(value_parser!(usize)))
                .arg(Arg::new("capture-http")
                    .long("capture-http")
                    .help("Print the requests and responses")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("no-mask")
                    .long("no-mask")
                    .help("Do not mask credentials in captured requests")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("capture-rust")
                    .long("capture-rust")
                    .help(format!("Print zyra's internal logs. Filter with the {ZYRA_LOG_ENV} environment variable"))
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("reporters")
                    .long("reporters")
                    .help(format!("Specify the reporters to use in comma-separated string. Default is \"list\". [possible values: {}]", reporter_choices.iter().join(", ")))
                    .value_delimiter(',')
                    .action(ArgAction::Append))
                .arg(Arg::new("color")
                    .long("color")
                    .help("Produce color output. Default is \"auto\" [env: CARGO_TERM_COLOR]")
                    .value_parser(["auto", "always", "never"]))
        )
        .subcommand(
            ClapCommand::new("list")
                .about("List request files")
                .arg(Arg::new("path")
                    .help("Request file or directory")
                    .default_value(".")
                    .value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("count")
                    .long("count")
                    .help("Print only the number of request files")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("json")
                    .long("json")
                    .help("Output as JSON")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("abs")
                    .long("abs")
                    .help("Show absolute paths")
                    .action(ArgAction::SetTrue))
                .arg(Arg::new("pattern")
                    .long("pattern")
                    .help("Keep files whose path or request path contains the pattern"))
        )
        .subcommand(
            ClapCommand::new("tokens")
                .about("Print the tokens of a request file")
                .arg(Arg::new("file")
                    .required(true)
                    .value_parser(value_parser!(PathBuf)))
        )
}

/// zyra CLI.
#[derive(Default)]
pub struct App;

impl App {
    pub fn new() -> App {
        App
    }

    /// Parse command-line args and run zyra CLI sub command.
    pub async fn run(self) -> eyre::Result<()> {
        let matches = build_cli().get_matches();
        color_eyre::install()?;

        match matches.subcommand() {
            Some(("run", run_matches)) => run(run_matches).await,
            Some(("list", list_matches)) => {
                let path = list_matches
                    .get_one::<PathBuf>("path")
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from("."));
                list::run(
                    path,
                    ListOptions {
                        count: list_matches.get_flag("count"),
                        json: list_matches.get_flag("json"),
                        absolute: list_matches.get_flag("abs"),
                        pattern: list_matches.get_one::<String>("pattern").cloned(),
                    },
                )
            }
            Some(("tokens", tokens_matches)) => {
                let file = tokens_matches
                    .get_one::<PathBuf>("file")
                    .ok_or_else(|| eyre::eyre!("file is required"))?;
                let src = std::fs::read_to_string(file).map_err(|source| Error::Io {
                    path: file.clone(),
                    source,
                })?;
                let term = Term::stdout();
                for token in token::tokenize(&src) {
                    term.write_line(&format!(
                        "{}:{} {} {:?}",
                        token.line, token.column, token.kind, token.literal
                    ))?;
                }
                Ok(())
            }
            _ => unreachable!("Subcommand required is set to true"),
        }
    }
}

async fn run(matches: &ArgMatches) -> eyre::Result<()> {
    let path = matches
        .get_one::<PathBuf>("path")
        .cloned()
        .ok_or_else(|| eyre::eyre!("path is required"))?;
    let capture_http = matches.get_flag("capture-http");
    let no_mask = matches.get_flag("no-mask");
    let reporters_arg = matches
        .get_many::<String>("reporters")
        .map(|vals| vals.cloned().collect::<Vec<_>>());
    let color_command = matches
        .get_one::<String>("color")
        .and_then(|s| Color::from_str(s).ok());

    if matches.get_flag("capture-rust") {
        init_tracing();
    }

    let config_dir = if path.is_dir() {
        Some(path.as_path())
    } else {
        path.parent()
    };
    let cfg = Config::load(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        config_dir,
    )?;
    let concurrency = match matches.get_one::<usize>("concurrency") {
        Some(n) => Some(*n),
        None => cfg.concurrency()?,
    };
    let client = Client::with_timeout(cfg.timeout()?)?;
    let registry = Registry::with_builtins()?;

    let options = Options {
        concurrent: matches.get_flag("concurrent"),
        concurrency,
        no_test: matches.get_flag("no-test"),
    };
    debug!("running {} with {options:?}", path.display());

    let mut runner = Runner::new(cfg, registry, client);
    runner.set_options(options);

    let reporter_names = reporters_arg.unwrap_or_else(|| vec![ReporterType::List.to_string()]);
    for name in reporter_names {
        let reporter_type =
            ReporterType::from_str(&name).map_err(|_| Error::UnknownReporter(name.clone()))?;
        let reporter: Box<dyn Reporter + Send> = match reporter_type {
            ReporterType::List if no_mask => Box::new(ListReporter::new(capture_http).no_mask()),
            ReporterType::List => Box::new(ListReporter::new(capture_http)),
            ReporterType::Table => Box::new(TableReporter::new()),
            ReporterType::Null => Box::new(NullReporter),
        };
        runner.add_boxed_reporter(reporter);
    }

    let color_env = std::env::var("CARGO_TERM_COLOR");
    let color = match (color_command, color_env) {
        (color @ Some(Color::Always), _) => color,
        (color @ Some(Color::Never), _) => color,
        (None, Ok(color)) => Color::from_str(&color).ok(),
        _ => None,
    };
    match color {
        Some(Color::Always) => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        }
        Some(Color::Never) => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        _ => {}
    }

    let results = runner.run_path(&path).await?;
    if results.iter().any(|result| !result.passed()) {
        eyre::bail!("one or more request files failed");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(ZYRA_LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("zyra_core=debug,zyra=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Clone, Default, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use sql_completer::completion::{KeywordCasing, QualifyColumns};
use sql_completer::CompleterSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

const HISTORY_FILE: &str = ".sql_completer_history";

fn main() -> anyhow::Result<()> {
    let matches = Command::new("sql-completer")
        .version("0.1.0")
        .about("An interactive SQL prompt with context-sensitive completion")
        .arg(
            Arg::new("schema")
                .short('s')
                .long("schema")
                .value_name("FILE")
                .help("JSON metadata snapshot with tables, views, functions and procedures"),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .value_name("FILE")
                .help("History file (default ~/.sql_completer_history)"),
        )
        .arg(
            Arg::new("keyword-casing")
                .long("keyword-casing")
                .value_name("CASING")
                .help("Keyword casing: upper, lower or auto")
                .default_value("auto"),
        )
        .arg(
            Arg::new("qualify-columns")
                .long("qualify-columns")
                .value_name("WHEN")
                .help("Qualify columns: always, never or if_more_than_one_table")
                .default_value("if_more_than_one_table"),
        )
        .arg(
            Arg::new("no-smart")
                .long("no-smart")
                .help("Start with smart completion disabled")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("history-seed")
                .long("history-seed")
                .value_name("N")
                .help("Number of history entries used to seed keyword ranking")
                .value_parser(clap::value_parser!(usize))
                .default_value("100"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log completion decisions to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let keyword_casing: KeywordCasing = matches
        .get_one::<String>("keyword-casing")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_default();
    let qualify_columns: QualifyColumns = matches
        .get_one::<String>("qualify-columns")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or_default();
    let settings = CompleterSettings {
        smart_completion: !matches.get_flag("no-smart"),
        keyword_casing,
        qualify_columns,
        history_seed_size: matches.get_one::<usize>("history-seed").copied().unwrap_or(100),
    };

    let schema = matches.get_one::<String>("schema").map(PathBuf::from);
    let history = matches
        .get_one::<String>("history")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE)));

    let mut cli = Cli::new(settings, schema, history).context("failed to start the prompt")?;
    cli.run()?;

    Ok(())
}

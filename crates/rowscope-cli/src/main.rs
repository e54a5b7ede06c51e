use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rowscope_condition::ParameterType;
use rowscope_rls::SqlOperation;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "rowscope", version, about = "Row-level data scope for SQL")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite a statement under a data scope and print the result.
    Rewrite {
        /// Configuration file. Defaults apply when omitted.
        #[arg(long, short = 'c', env = "ROWSCOPE_CONFIG")]
        config: Option<PathBuf>,

        /// Data scope file (YAML or JSON).
        #[arg(long, short = 's')]
        scope: PathBuf,

        /// SQL to rewrite. Read from stdin when omitted.
        #[arg(long)]
        sql: Option<String>,

        /// Statement identifier, checked against the ignore list.
        #[arg(long, default_value = "cli.statement")]
        statement_id: String,

        /// Command type of the statement.
        #[arg(long, value_parser = commands::rewrite::parse_command_type, default_value = "select")]
        command: SqlOperation,

        /// Print the full decision report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List condition operators and their default groups as JSON.
    Operators {
        /// Only operators usable with this parameter type
        /// (scalar, list, range, datetime, none).
        #[arg(long = "type", value_parser = commands::operators::parse_parameter_type)]
        parameter_type: Option<ParameterType>,
    },

    /// Validate a configuration file and, optionally, a rules file.
    Check {
        #[arg(long, short = 'c', env = "ROWSCOPE_CONFIG")]
        config: PathBuf,

        /// Field operator sets and conditions to validate.
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so rewritten SQL and JSON on stdout stay pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Rewrite {
            config,
            scope,
            sql,
            statement_id,
            command,
            json,
        } => commands::rewrite::run(commands::rewrite::RewriteArgs {
            config,
            scope,
            sql,
            statement_id,
            command,
            json,
        })?,
        Command::Operators { parameter_type } => commands::operators::run(parameter_type)?,
        Command::Check { config, rules } => commands::check::run(&config, rules.as_deref())?,
    }

    Ok(())
}

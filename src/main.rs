//! cmdframe - run the demo command sets from a terminal.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmdframe::Result;
use cmdframe::config::Config;
use cmdframe::console::{CONSOLE_NAME, ConsoleHost, ConsoleResolver};
use cmdframe::demo::{RegionStore, build_manager};
use cmdframe::{CommandError, CommandRequest};

#[derive(Parser, Debug)]
#[command(
    name = "cmdframe",
    version,
    about = "Declarative command dispatch demo",
    disable_help_subcommand = true
)]
struct Cli {
    /// Config file layered over the global one
    #[arg(long, global = true, env = "CMDFRAME_CONFIG")]
    config: Option<PathBuf>,

    /// Issue commands as this user instead of the console
    #[arg(long = "as", global = true, default_value = CONSOLE_NAME)]
    issuer: String,

    /// Permission held by non-console users (repeatable)
    #[arg(long = "grant", global = true)]
    grants: Vec<String>,

    /// Default locale for rendered messages
    #[arg(long, global = true)]
    locale: Option<String>,

    /// Machine-readable output
    #[arg(long, global = true)]
    robot: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one command, e.g. `run region create spawn 32`
    Run(LineArgs),
    /// Print completions; the last argument is the partial token
    Complete(LineArgs),
    /// Show help for a root command
    Help(HelpArgs),
    /// Read commands from stdin, one per line
    Repl,
}

#[derive(Args, Debug)]
struct LineArgs {
    /// Root command label
    label: String,

    /// Arguments after the label
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct HelpArgs {
    /// Root command label
    root: String,

    /// Search terms
    search: Vec<String>,

    /// Page to show
    #[arg(long, default_value = "1")]
    page: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);
    if cli.no_color || cli.robot {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                let error_json = serde_json::json!({
                    "error": true,
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(locale) = &cli.locale {
        config.locale.default.clone_from(locale);
    }
    let manager = build_manager(&config, RegionStore::new())?;
    let ansi = !(cli.no_color || cli.robot);
    let host = ConsoleHost::new(manager, ConsoleResolver::new(cli.grants.clone(), ansi));

    match &cli.command {
        Commands::Run(line) => execute(&host, &cli.issuer, &line.label, &line.args),
        Commands::Complete(line) => {
            let (partial, preceding) = line
                .args
                .split_last()
                .map_or(("", &[][..]), |(last, rest)| (last.as_str(), rest));
            let found = host.complete(&cli.issuer, &line.label, partial, preceding);
            print_completions(cli.robot, &found);
            Ok(())
        }
        Commands::Help(args) => {
            let mut help = host.generate_help(&cli.issuer, &args.root)?;
            help.search(&args.search);
            help.set_page(args.page);
            help.show();
            Ok(())
        }
        Commands::Repl => repl(cli, &host),
    }
}

fn execute(host: &ConsoleHost, issuer: &str, label: &str, args: &[String]) -> Result<()> {
    if host.execute(issuer, label, args) {
        Ok(())
    } else {
        Err(CommandError::UnknownCommand(label.to_string()))
    }
}

fn print_completions(robot: bool, found: &[String]) {
    if robot {
        println!("{}", serde_json::to_string(found).unwrap_or_default());
    } else {
        for candidate in found {
            println!("{candidate}");
        }
    }
}

/// `:complete <line>` prints completions for the line's last token;
/// `exit` or end of input stops.
fn repl(cli: &Cli, host: &ConsoleHost) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let raw = line?;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        if let Some(rest) = raw.trim_start().strip_prefix(":complete") {
            let mut words: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if rest.ends_with(' ') || words.len() < 2 {
                words.push(String::new());
            }
            if let Some((label, tokens)) = words.split_first() {
                if let Some((partial, preceding)) = tokens.split_last() {
                    let found = host.complete(&cli.issuer, label, partial, preceding);
                    print_completions(cli.robot, &found);
                }
            }
            continue;
        }
        let issuer = host.issuer(&cli.issuer);
        let Some(request) = CommandRequest::parse(issuer, line) else {
            continue;
        };
        let label = request.label.clone();
        if !host.manager().dispatch(request) {
            eprintln!("Unknown command: {label}");
        }
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,cmdframe=warn",
        1 => "info,cmdframe=debug",
        2 => "debug,cmdframe=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

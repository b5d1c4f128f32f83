use std::fs;
use std::path::{Path, PathBuf};

use clap::ArgAction;
use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;
use minimus::{Fault, FaultKind, Interpreter, Lexer, Limits, Stdout};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(version, about = "Tokenize, parse or run Minimus programs")]
struct Args {
    /// Deepest nesting the parser accepts before giving up.
    #[arg(long, global = true, default_value_t = Limits::default().max_depth)]
    max_depth: usize,

    /// Log more; repeat for trace output. `MINIMUS_LOG` overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Tokenize {
        filename: PathBuf,
    },
    Parse {
        filename: PathBuf,
    },
    Run {
        filename: PathBuf,
        /// Also print the value of the top-level statement.
        #[arg(long)]
        show_value: bool,
    },
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let limits = Limits {
        max_depth: args.max_depth,
    };

    match args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(&filename)?;
            for token in Lexer::new(filename.to_str(), &file_contents) {
                let token = token.unwrap_or_else(|e| fail(e));
                println!("{token}");
            }
            println!("EOF  null");
        }
        Commands::Parse { filename } => {
            let file_contents = read(&filename)?;
            let program = minimus::Parser::with_limits(filename.to_str(), &file_contents, limits)
                .parse()
                .unwrap_or_else(|e| fail(e));
            println!("{program}");
        }
        Commands::Run {
            filename,
            show_value,
        } => {
            let file_contents = read(&filename)?;
            let execution =
                Interpreter::with_limits(filename.to_str(), &file_contents, Stdout, limits)
                    .run()
                    .unwrap_or_else(|e| fail(e));
            info!(value = execution.value, "execution finished");
            if show_value {
                println!("Execution result: {}", execution.value);
            }
        }
    }
    Ok(())
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

fn init_tracing(verbose: u8) {
    let level = log_level(std::env::var("MINIMUS_LOG").ok().as_deref(), verbose);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// `MINIMUS_LOG` names a level (`warn`, `debug`, ...) and wins over `-v`.
fn log_level(env: Option<&str>, verbose: u8) -> Level {
    env.and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        })
}

/// Reports `fault` and exits: 65 for malformed programs, 70 for runtime faults.
fn fail(fault: Fault) -> ! {
    match fault.line() {
        Some(line) => eprintln!("[line {line}] Error: {fault}"),
        None => eprintln!("Error: {fault}"),
    }
    let code = match fault.kind() {
        FaultKind::Lexical | FaultKind::Syntax => 65,
        FaultKind::Semantic | FaultKind::Internal => 70,
    };
    eprintln!("{:?}", miette::Report::new(fault));
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(log_level(None, 0), Level::WARN);
        assert_eq!(log_level(None, 1), Level::DEBUG);
        assert_eq!(log_level(None, 5), Level::TRACE);
    }

    #[test]
    fn environment_overrides_verbosity() {
        assert_eq!(log_level(Some("info"), 2), Level::INFO);
        assert_eq!(log_level(Some("error"), 0), Level::ERROR);
        assert_eq!(log_level(Some("loud"), 1), Level::DEBUG);
    }
}

//! retloc CLI - コマンドラインインターフェース
//!
//! 64-bit PowerPC バイナリの関数が戻り値をどこに返すかを
//! DWARF の型情報から表示する

mod command;
mod inspector;
mod parse;

use anyhow::Result;
use clap::{Parser, Subcommand};
use command::Command;
use inspector::{FunctionReport, Inspector};
use retloc_ppc64::ClassifierConfig;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// retloc - PPC64 return value locator
#[derive(Parser)]
#[command(name = "retloc")]
#[command(version = "0.1.0")]
#[command(about = "Locate function return values from DWARF type information (PPC64 ABI)", long_about = None)]
struct Cli {
    /// Maximum number of typedef/qualifier levels to follow
    #[arg(long, default_value_t = ClassifierConfig::default().max_type_depth)]
    max_depth: usize,

    /// Also print the DWARF location expression and DIE offsets
    #[arg(long)]
    expr: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: InspectCommand,
}

#[derive(Subcommand)]
enum InspectCommand {
    /// Show where the named functions return their value
    Query {
        /// Path to the binary
        binary: String,

        /// Function names (DW_AT_name or demangled linkage name)
        #[arg(required = true)]
        functions: Vec<String>,
    },

    /// Show the return location of the function containing an address
    At {
        /// Path to the binary
        binary: String,

        /// Code address (hex with 0x prefix, or decimal)
        address: String,
    },

    /// Resolve the concrete return location given r3 right after the call
    Eval {
        /// Path to the binary
        binary: String,

        /// Function name
        function: String,

        /// Value of r3 after the call returned (hex with 0x prefix, or decimal)
        r3: String,
    },

    /// Classify every function, optionally filtered by a name pattern
    List {
        /// Path to the binary
        binary: String,

        /// Substring to match against function names
        pattern: Option<String>,
    },

    /// Load a binary and query it interactively
    Repl {
        /// Path to the binary
        binary: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ClassifierConfig {
        max_type_depth: cli.max_depth,
    };
    let show_expr = cli.expr;

    match cli.command {
        InspectCommand::Query { binary, functions } => {
            let inspector = Inspector::load(&binary, config)?;
            for name in &functions {
                handle_query(&inspector, name, show_expr)?;
            }
        }
        InspectCommand::At { binary, address } => {
            let inspector = Inspector::load(&binary, config)?;
            handle_at(&inspector, &address, show_expr)?;
        }
        InspectCommand::Eval {
            binary,
            function,
            r3,
        } => {
            let inspector = Inspector::load(&binary, config)?;
            handle_eval(&inspector, &function, &r3, show_expr)?;
        }
        InspectCommand::List { binary, pattern } => {
            let inspector = Inspector::load(&binary, config)?;
            handle_list(&inspector, pattern.as_deref(), show_expr)?;
        }
        InspectCommand::Repl { binary } => {
            println!("Loading binary: {}", binary);
            let inspector = Inspector::load(&binary, config)?;
            println!("Loaded DWARF information from {}", binary);
            println!();
            run_repl(&inspector, show_expr)?;
        }
    }

    Ok(())
}

/// ログ出力を初期化する（RUST_LOG があればそれを優先）
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// REPLループを実行する
fn run_repl(inspector: &Inspector, show_expr: bool) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(retloc) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match Command::parse(line) {
                    Some(Command::Quit) => {
                        println!("Goodbye!");
                        break;
                    }
                    Some(command) => {
                        if let Err(e) = handle_command(inspector, command, show_expr) {
                            eprintln!("Error: {}", e);
                        }
                    }
                    None => {
                        println!("Unknown command: {}", line);
                        println!("Type 'help' for available commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

fn handle_command(inspector: &Inspector, command: Command, show_expr: bool) -> Result<()> {
    match command {
        Command::Query(name) => handle_query(inspector, &name, show_expr),
        Command::At(address) => handle_at(inspector, &address, show_expr),
        Command::Eval(name, r3) => handle_eval(inspector, &name, &r3, show_expr),
        Command::List(pattern) => handle_list(inspector, pattern.as_deref(), show_expr),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Quit => Ok(()),
    }
}

/// 分類結果を表示する
fn print_report(report: &FunctionReport, show_expr: bool) {
    println!("{}", report);
    if show_expr {
        println!("    {}", report.offset_text());
        if let Some(expr) = report.expression_text() {
            println!("    {}", expr);
        }
    }
}

/// Queryコマンドを処理する
fn handle_query(inspector: &Inspector, name: &str, show_expr: bool) -> Result<()> {
    let reports = inspector.query(name)?;
    if reports.is_empty() {
        println!("No function named '{}' found", name);
    }
    for report in &reports {
        print_report(report, show_expr);
    }
    Ok(())
}

/// Atコマンドを処理する
fn handle_at(inspector: &Inspector, address: &str, show_expr: bool) -> Result<()> {
    let pc = parse::parse_address(address)?;
    match inspector.at(pc)? {
        Some(report) => print_report(&report, show_expr),
        None => println!("No function contains 0x{:x}", pc),
    }
    Ok(())
}

/// Evalコマンドを処理する
fn handle_eval(inspector: &Inspector, name: &str, r3: &str, show_expr: bool) -> Result<()> {
    let r3 = parse::parse_address(r3)?;
    let reports = inspector.query(name)?;
    if reports.is_empty() {
        println!("No function named '{}' found", name);
    }
    for report in &reports {
        print_report(report, show_expr);
        match inspector.evaluate(report, r3)? {
            Some(loc) => println!("    value is in {}", inspector::format_loc(&loc)),
            None => println!("    no return value location"),
        }
    }
    Ok(())
}

/// Listコマンドを処理する
fn handle_list(inspector: &Inspector, pattern: Option<&str>, show_expr: bool) -> Result<()> {
    let reports = inspector.list(pattern)?;
    println!("Functions ({} found):", reports.len());
    for report in &reports {
        print_report(report, show_expr);
    }
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  help              - Show this help message");
    println!("  quit/exit         - Exit");
    println!();
    println!("Query commands:");
    println!("  query (q) <name>  - Show where the function returns its value");
    println!("  at (a) <address>  - Same, for the function containing an address");
    println!("  eval (e) <name> <r3>");
    println!("                    - Resolve the location using r3 after the call");
    println!("  list (ls) [pat]   - Classify all functions matching a pattern");
    println!();
    println!("Locations:");
    println!("  r3                - general purpose register");
    println!("  f1, f1:f2, ...    - floating point register(s), 8 bytes each");
    println!("  [r3]              - memory whose address is returned in r3");
    println!();
    println!("Examples:");
    println!("  query main");
    println!("  at 0x10000a0c");
    println!("  eval get_point 0x3ffffff0");
    println!("  list get_");
}

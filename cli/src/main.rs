use clap::{error::ErrorKind, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use brine_capnp::schema_to_json;
use brine_capnp_compiler::{generate, GenerateOptions};
use brine_capnp_compiler::gen_cpp::{include_prefix, DEFAULT_CAPNP_HEADER};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bcapnp")]
#[command(about = "Generate a Cap'n Proto schema and C++ wrapper classes from a message DSL file", long_about = None)]
#[command(after_help = "\
Examples:
  bcapnp -i schema.dsl -ocapnp output/
  bcapnp -i schema.dsl -ocapnp output/ -ohpp include/messages/ -ocpp src/messages/

If -ohpp is 'include/network/', generated files include headers as \"network/MessageName.hpp\".")]
struct Cli {
    /// Input DSL schema file
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the Cap'n Proto schema (a `.capnp` file or a directory); alias -ocapnp
    #[arg(long)]
    out_capnp: PathBuf,

    /// Output directory for C++ headers; alias -ohpp
    #[arg(long, requires = "out_cpp")]
    out_hpp: Option<PathBuf>,

    /// Output directory for C++ sources; alias -ocpp
    #[arg(long, requires = "out_hpp")]
    out_cpp: Option<PathBuf>,

    /// Header generated by `capnp compile` that the wrappers include
    #[arg(long = "capnp-header", default_value = DEFAULT_CAPNP_HEADER)]
    capnp_header: String,

    /// Namespace for the C++ wrapper classes (dotted or `::`-separated)
    #[arg(long)]
    wrapper_namespace: Option<String>,

    /// Print the parsed schema as JSON after generating
    #[arg(long)]
    dump_json: bool,
}

impl From<Cli> for GenerateOptions {
    fn from(cli: Cli) -> Self {
        GenerateOptions {
            input:             cli.input,
            out_capnp:         cli.out_capnp,
            out_hpp:           cli.out_hpp,
            out_cpp:           cli.out_cpp,
            capnp_header_name: cli.capnp_header,
            wrapper_namespace: cli.wrapper_namespace,
        }
    }
}

/// Rewrite the single-dash spellings `-ocapnp`, `-ohpp` and `-ocpp` to their long flags.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-ocapnp") => OsString::from("--out-capnp"),
            Some("-ohpp") => OsString::from("--out-hpp"),
            Some("-ocpp") => OsString::from("--out-cpp"),
            _ => arg,
        })
        .collect()
}

/// Log filter from `RUST_LOG`-style directives, falling back to `warn` when
/// they are unset, empty or malformed.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let args = normalize_args(std::env::args_os());
    if args.len() <= 1 {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    let dump_json = cli.dump_json;
    let options = GenerateOptions::from(cli);

    println!("Parsing DSL file: {}", options.input.display());
    let report = match generate(&options) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    println!(
        "Parsed {} message(s) and {} enum(s)",
        report.message_count(),
        report.enum_count()
    );
    println!("Generated Cap'n Proto schema: {}", report.capnp_file.display());
    if let Some(hpp) = &options.out_hpp {
        println!("Generated {} C++ file(s)", report.cpp_files.len());
        let prefix = include_prefix(hpp);
        if !prefix.is_empty() {
            println!("  Include prefix: {}", prefix);
        }
    }

    if dump_json {
        match schema_to_json(&report.schema) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::SUCCESS
}

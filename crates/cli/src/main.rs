mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modkit_lib::assemble::AssembleError;
use modkit_lib::consts::DEFAULT_PARALLELISM;
use modkit_lib::trace::{DEFAULT_PREFIX_WIDTH, DEFAULT_TOP};

use crate::cmd::{AssembleArgs, cmd_assemble, cmd_repo_list, cmd_repo_search, cmd_repo_update, cmd_trace};
use crate::output::{OutputFormat, print_error};

/// modkit - fetch modules and assemble build manifests
#[derive(Parser)]
#[command(name = "modkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Assemble <BUILD_TYPE>.manifest from the skeleton and every module's fragment
  Assemble {
    /// Build type selecting the skeleton and fragment names (e.g. usr, fs)
    build_type: String,

    /// Module tree holding fetched modules and cache markers
    /// [default: $MODKIT_WORK_DIR or the current directory]
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Configuration file [default: <work-dir>/../config.json]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding <BUILD_TYPE>.manifest.skel [default: <work-dir>/..]
    #[arg(long)]
    skeleton_dir: Option<PathBuf>,

    /// Directory receiving <BUILD_TYPE>.manifest [default: <work-dir>/..]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Modules fetched or built concurrently
    #[arg(short, long, default_value_t = DEFAULT_PARALLELISM)]
    jobs: usize,

    /// Command run in a module directory to build its fragments
    #[arg(long)]
    build_command: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Manage the local mirror of the module index
  Repo {
    #[command(subcommand)]
    command: RepoCommands,
  },

  /// Report the most common stacks in a debugger sample log
  Trace {
    /// Sample log, one stack per line
    log: PathBuf,

    /// Number of distinct stacks to report
    #[arg(long, default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Characters of per-line prefix to drop before comparing samples
    #[arg(long, default_value_t = DEFAULT_PREFIX_WIDTH)]
    prefix_width: usize,

    /// Binary used to resolve program counters to function names
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

#[derive(Subcommand)]
enum RepoCommands {
  /// Clone the module index, or refresh an existing mirror
  Update {
    /// Index repository URL [default: $MODKIT_INDEX_URL or the public index]
    #[arg(long)]
    url: Option<String>,

    /// Local mirror [default: $MODKIT_INDEX_PATH or build/repository]
    #[arg(long)]
    path: Option<PathBuf>,
  },

  /// Show the first module whose name contains NAME
  Search {
    name: String,

    /// Local mirror [default: $MODKIT_INDEX_PATH or build/repository]
    #[arg(long)]
    path: Option<PathBuf>,
  },

  /// List every module in the index
  List {
    /// Local mirror [default: $MODKIT_INDEX_PATH or build/repository]
    #[arg(long)]
    path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Assemble {
      build_type,
      work_dir,
      config,
      skeleton_dir,
      output_dir,
      jobs,
      build_command,
      output,
    } => cmd_assemble(AssembleArgs {
      build_type,
      work_dir,
      config,
      skeleton_dir,
      output_dir,
      jobs,
      build_command,
      output,
    }),
    Commands::Repo { command } => match command {
      RepoCommands::Update { url, path } => cmd_repo_update(url, path),
      RepoCommands::Search { name, path } => cmd_repo_search(&name, path),
      RepoCommands::List { path, output } => cmd_repo_list(path, output),
    },
    Commands::Trace {
      log,
      top,
      prefix_width,
      binary,
      output,
    } => cmd_trace(&log, top, prefix_width, binary, output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      let code = err.downcast_ref::<AssembleError>().map(AssembleError::exit_code).unwrap_or(1);
      ExitCode::from(u8::try_from(code).unwrap_or(1))
    }
  }
}

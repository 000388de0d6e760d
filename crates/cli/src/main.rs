// concord CLI - reconcile human-coded labels with zero-shot model predictions

mod exit_codes;
mod oracle;
mod render;
mod run;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};
use render::RenderArgs;
use run::{InputArgs, RunArgs};

#[derive(Parser)]
#[command(name = "concord")]
#[command(about = "Score zero-shot construct labels against human coding")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors (CONCORD_LOG overrides)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the inputs, label every row through the model, write artifacts
    #[command(after_help = "\
Examples:
  concord run --raw Raw_Data.xlsx --coded coded.csv --id-col sid
  concord run -c run.toml --model gpt-4o-mini -o out/zeroshot
  concord run -c run.toml --unparsed exclude --json > report.json

The API key is read from --api-key, OPENAI_API_KEY or CONCORD_OPENAI_KEY.")]
    Run(RunArgs),

    /// Show column coercions, merge keys and join diagnostics without labeling
    #[command(after_help = "\
Examples:
  concord plan --raw Raw_Data.xlsx --coded coded.csv
  concord plan -c run.toml --json")]
    Plan {
        #[command(flatten)]
        input: InputArgs,

        /// Print the plan as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Render per-construct metrics as Markdown, LaTeX and SVG tables
    #[command(after_help = "\
Examples:
  concord render zeroshot_per_construct_metrics.json
  concord render metrics.csv --title 'Zero-shot agreement' --wrap 20
  concord render metrics.json --md table.md --tex table.tex --svg table.svg")]
    Render(RenderArgs),
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_env("CONCORD_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // Also installs the `log` bridge, so library records reach the same writer.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args),
        Commands::Plan { input, json } => run::cmd_plan(input, json),
        Commands::Render(args) => render::cmd_render(args),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

//! `concord run` and `concord plan`.

use std::path::{Path, PathBuf};

use clap::Args;
use concord_io::{artifacts, read_table};
use concord_recon::config::SheetSelector;
use concord_recon::merge::{MergeDiagnostics, MergeKeys};
use concord_recon::model::ColumnsReport;
use concord_recon::{Codebook, Reconciliation, RunConfig, Similarity, Table, UnparsedPolicy};
use serde::Serialize;

use crate::exit_codes::{
    io_exit_code, recon_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_INPUT, EXIT_ORACLE_MISSING_KEY,
    EXIT_ORACLE_SETUP,
};
use crate::oracle::{resolve_api_key, OpenAiOracle};
use crate::CliError;

/// Inputs and column roles shared by `run` and `plan`.
#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// TOML run config; flags override its values
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Raw spreadsheet (.xlsx, .xls, .xlsb, .ods, .csv, .tsv)
    #[arg(long)]
    pub raw: Option<PathBuf>,

    /// Coded labels (delimiter is sniffed)
    #[arg(long)]
    pub coded: Option<PathBuf>,

    /// Raw sheet, by name or zero-based index
    #[arg(long)]
    pub sheet: Option<SheetSelector>,

    /// Identifier column shared by both inputs
    #[arg(long)]
    pub id_col: Option<String>,

    /// Text snippet column [default: code_change_text]
    #[arg(long)]
    pub text_col: Option<String>,

    /// Construct name column [default: construct_name]
    #[arg(long)]
    pub construct_col: Option<String>,

    /// Coded column holding a single binary label per row (skips the wide reshape)
    #[arg(long)]
    pub label_col: Option<String>,

    /// Fuzzy matching metric: gestalt, levenshtein, jaro_winkler
    #[arg(long)]
    pub similarity: Option<Similarity>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Model id sent to the oracle [default: gpt-4o]
    #[arg(long)]
    pub model: Option<String>,

    /// Artifact path prefix [default: zeroshot]
    #[arg(long, short = 'o')]
    pub out_prefix: Option<String>,

    /// What an unparseable or failed reply becomes: zero, exclude
    #[arg(long)]
    pub unparsed: Option<UnparsedPolicy>,

    /// TOML codebook replacing the built-in construct definitions
    #[arg(long)]
    pub codebook: Option<PathBuf>,

    /// Chat-completions base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// API key (falls back to OPENAI_API_KEY, then CONCORD_OPENAI_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    pub json: bool,
}

fn config_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_CONFIG, message: msg.into(), hint: None }
}

// ============================================================================
// Config assembly
// ============================================================================

/// Config file (paths resolved against its directory), then flag overrides.
fn build_config(input: &InputArgs) -> Result<RunConfig, CliError> {
    let mut config = match &input.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| CliError {
                code: EXIT_INPUT,
                message: format!("cannot read config {}: {e}", path.display()),
                hint: None,
            })?;
            let mut config = RunConfig::from_toml(&text).map_err(|e| config_err(e.to_string()))?;
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            for p in [&mut config.raw_path, &mut config.coded_path, &mut config.codebook]
                .into_iter()
                .flatten()
            {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
            config
        }
        None => RunConfig::default(),
    };

    if let Some(p) = &input.raw {
        config.raw_path = Some(p.clone());
    }
    if let Some(p) = &input.coded {
        config.coded_path = Some(p.clone());
    }
    if let Some(s) = &input.sheet {
        config.sheet = s.clone();
    }
    if let Some(c) = &input.id_col {
        config.id_col = Some(c.clone());
    }
    if let Some(c) = &input.text_col {
        config.text_col = c.clone();
    }
    if let Some(c) = &input.construct_col {
        config.construct_col = c.clone();
    }
    if let Some(c) = &input.label_col {
        config.label_col = Some(c.clone());
    }
    if let Some(m) = input.similarity {
        config.similarity = m;
    }
    Ok(config)
}

fn apply_run_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(m) = &args.model {
        config.model = m.clone();
    }
    if let Some(p) = &args.out_prefix {
        config.out_prefix = p.clone();
    }
    if let Some(u) = args.unparsed {
        config.unparsed_policy = u;
    }
    if let Some(c) = &args.codebook {
        config.codebook = Some(c.clone());
    }
    if let Some(b) = &args.api_base {
        config.oracle.api_base = b.clone();
    }
    if let Some(t) = args.timeout {
        config.oracle.timeout_secs = t;
    }
}

fn load_codebook(config: &RunConfig) -> Result<Codebook, CliError> {
    let Some(path) = &config.codebook else {
        return Ok(Codebook::builtin());
    };
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_INPUT,
        message: format!("cannot read codebook {}: {e}", path.display()),
        hint: None,
    })?;
    let codebook = Codebook::from_toml(&text).map_err(|e| config_err(e.to_string()))?;
    tracing::info!("codebook {} ({} constructs)", path.display(), codebook.len());
    Ok(codebook)
}

fn read_inputs(config: &RunConfig) -> Result<(Table, Table), CliError> {
    let (Some(raw_path), Some(coded_path)) = (&config.raw_path, &config.coded_path) else {
        return Err(CliError::args("both a raw and a coded input are required")
            .with_hint("pass --raw and --coded, or set raw_path and coded_path in --config"));
    };
    let io_err = |e: concord_io::IoError| CliError {
        code: io_exit_code(&e),
        message: e.to_string(),
        hint: None,
    };
    let raw = read_table(raw_path, &config.sheet).map_err(io_err)?;
    let coded = read_table(coded_path, &SheetSelector::default()).map_err(io_err)?;
    Ok((raw, coded))
}

fn reconcile(raw: Table, coded: &Table, config: &RunConfig) -> Result<Reconciliation, CliError> {
    concord_recon::reconcile(raw, coded, config).map_err(|e| {
        let hint = match &e {
            concord_recon::ReconError::CannotExpand { .. } => {
                Some("set --id-col to the identifier column present in both inputs".to_string())
            }
            concord_recon::ReconError::MissingTextColumn { .. } => {
                Some("set --text-col to the raw column holding the snippets".to_string())
            }
            _ => None,
        };
        CliError { code: recon_exit_code(&e), message: e.to_string(), hint }
    })
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = build_config(&args.input)?;
    apply_run_overrides(&mut config, &args);
    config.validate().map_err(|e| config_err(e.to_string()))?;

    let codebook = load_codebook(&config)?;
    let api_key = resolve_api_key(args.api_key.clone(), |name| std::env::var(name).ok())
        .ok_or_else(|| CliError {
            code: EXIT_ORACLE_MISSING_KEY,
            message: "no API key for the oracle".into(),
            hint: Some("pass --api-key or set OPENAI_API_KEY".into()),
        })?;

    let (raw, coded) = read_inputs(&config)?;
    let reconciliation = reconcile(raw, &coded, &config)?;

    let oracle = OpenAiOracle::new(&config.oracle, &config.model, api_key).map_err(|e| CliError {
        code: EXIT_ORACLE_SETUP,
        message: format!("cannot set up oracle client: {e}"),
        hint: None,
    })?;

    let result = concord_recon::label_and_score(reconciliation, &config, &codebook, &oracle);
    let paths = artifacts::write_all(&result).map_err(|e| CliError {
        code: io_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&result.report).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json}");
    }

    // Human summary to stderr
    let report = &result.report;
    let kappa = report
        .overall_kappa
        .map(|k| format!("{k:.3}"))
        .unwrap_or_else(|| "n/a".into());
    eprintln!(
        "{} rows ({} evaluable), overall kappa {kappa}, merge on [{}]",
        report.n_rows,
        report.n_eval_overall,
        report.merge_keys.columns().join(", "),
    );
    let l = &report.labeling;
    if l.unparseable + l.failed > 0 {
        eprintln!(
            "{} unparseable and {} failed replies ({} policy)",
            l.unparseable, l.failed, report.unparsed_policy
        );
    }
    for p in paths.all() {
        eprintln!("wrote {p}");
    }
    Ok(())
}

// ============================================================================
// plan
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub rows: usize,
    pub label_rows: usize,
    pub merge_keys: MergeKeys,
    pub merge: MergeDiagnostics,
    pub columns: ColumnsReport,
    pub expanded_with: Option<Vec<String>>,
    pub warnings: Vec<String>,
}

impl PlanReport {
    fn new(r: Reconciliation, config: &RunConfig) -> Self {
        Self {
            rows: r.merged.len(),
            label_rows: r.label_rows,
            merge_keys: r.merged.keys,
            merge: r.merged.diagnostics,
            columns: ColumnsReport {
                id_col: r.roles.id,
                text_col: r.roles.text,
                construct_col: r.roles.construct,
                label_col: config.label_col.clone(),
                coercions: r.coercions,
            },
            expanded_with: r.expanded_with,
            warnings: r.warnings,
        }
    }
}

/// Reconcile only: show how the inputs line up without calling the oracle.
pub fn cmd_plan(input: InputArgs, json: bool) -> Result<(), CliError> {
    let config = build_config(&input)?;
    config.validate().map_err(|e| config_err(e.to_string()))?;

    let (raw, coded) = read_inputs(&config)?;
    let plan = PlanReport::new(reconcile(raw, &coded, &config)?, &config);

    if json {
        let out = serde_json::to_string_pretty(&plan).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{out}");
        return Ok(());
    }

    for r in &plan.columns.coercions {
        eprintln!("renamed column {} '{}' -> '{}' ({})", r.column, r.from, r.to, r.rule.as_str());
    }
    if let Some(constructs) = &plan.expanded_with {
        eprintln!("expanded raw rows by {} constructs", constructs.len());
    }
    let d = &plan.merge;
    eprintln!(
        "{} rows, {} label rows, merge on [{}]{}",
        plan.rows,
        plan.label_rows,
        plan.merge_keys.columns().join(", "),
        if plan.merge_keys.is_degraded() { " (degraded)" } else { "" },
    );
    eprintln!(
        "matched {}, unmatched {}, unused labels {}, shadowed {}, empty text {}",
        d.matched, d.unmatched_raw, d.unused_labels, d.shadowed, d.empty_text
    );
    Ok(())
}

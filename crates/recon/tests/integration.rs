use std::cell::RefCell;
use std::path::PathBuf;

use concord_recon::coerce::CoercionRule;
use concord_recon::merge::MergeKeys;
use concord_recon::{
    reconcile, run, Cell, Codebook, Oracle, OracleError, RunConfig, Table, UnparsedPolicy,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_config() -> RunConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("run.toml")).unwrap();
    RunConfig::from_toml(&toml).unwrap()
}

/// Replies with a fixed string and keeps every prompt it was sent.
struct Recording {
    reply: &'static str,
    prompts: RefCell<Vec<String>>,
}

impl Recording {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            prompts: RefCell::default(),
        }
    }
}

impl Oracle for Recording {
    fn model(&self) -> &str {
        "stub-model"
    }

    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.reply.to_string())
    }
}

fn table(cols: &[&str], rows: Vec<Vec<Cell>>) -> Table {
    Table::from_rows(cols.iter().map(|c| c.to_string()).collect(), rows)
}

fn raw_two_columns() -> Table {
    table(
        &["sid", "code_change_text"],
        vec![
            vec![Cell::Int(101), "if (score > 90) {".into()],
            vec![Cell::Int(102), "// check bounds".into()],
        ],
    )
}

fn coded_wide() -> Table {
    table(
        &["sid", "If Header", "Comment"],
        vec![
            vec![Cell::Int(101), Cell::Int(1), Cell::Int(0)],
            vec![Cell::Float(102.0), Cell::Int(0), Cell::Int(1)],
        ],
    )
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn two_entities_by_two_constructs_unparseable_defaults_to_zero() {
    let config = fixture_config();
    let oracle = Recording::new("I am not sure.");
    let result = run(raw_two_columns(), &coded_wide(), &config, &Codebook::builtin(), &oracle).unwrap();

    assert_eq!(result.merged.len(), 4);
    assert_eq!(result.merged.keys, MergeKeys::IdAndConstruct);
    assert!(result.merged.rows.iter().all(|r| r.prediction == Some(0)));
    assert_eq!(result.report.labeling.unparseable, 4);
    assert_eq!(result.report.labeling.parsed, 0);
    assert_eq!(oracle.prompts.borrow().len(), 4);

    let labels: Vec<_> = result.merged.rows.iter().map(|r| r.human_label).collect();
    assert_eq!(labels, vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]);

    let overall = result.metrics.overall.unwrap();
    assert_eq!(overall.n_eval, 4);
    assert_eq!(overall.freq, 0.5);
    assert_eq!(overall.precision, 0.0);
    assert_eq!(overall.recall, 0.0);
    assert_eq!(overall.kappa, Some(0.0));

    let names: Vec<_> = result
        .metrics
        .per_construct
        .iter()
        .map(|c| c.construct.as_str())
        .collect();
    assert_eq!(names, ["Comment", "If Header"]);
}

#[test]
fn bare_text_header_is_coerced_before_expansion() {
    let config = fixture_config();
    let raw = table(
        &["sid", "text"],
        vec![
            vec![Cell::Int(101), "if (score > 90) {".into()],
            vec![Cell::Int(102), "// check bounds".into()],
        ],
    );
    let oracle = Recording::new("hmm");
    let result = run(raw, &coded_wide(), &config, &Codebook::builtin(), &oracle).unwrap();

    assert_eq!(result.merged.len(), 4);
    assert_eq!(result.report.merge_keys, MergeKeys::IdAndConstruct);
    assert_eq!(result.merged.predictions(), vec![Some(0); 4]);
    assert!(result
        .report
        .columns
        .coercions
        .iter()
        .any(|r| r.rule == CoercionRule::LongestText && r.from == "text" && r.to == "code_change_text"));

    let labels: Vec<_> = result.merged.rows.iter().map(|r| r.human_label).collect();
    assert_eq!(labels, vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]);
    assert!(oracle.prompts.borrow()[0].contains("TEXT:\nif (score > 90) {\nAnswer:"));
}

#[test]
fn prompts_carry_verbatim_construct_and_snippet() {
    let config = fixture_config();
    let oracle = Recording::new("1");
    run(raw_two_columns(), &coded_wide(), &config, &Codebook::builtin(), &oracle).unwrap();

    let prompts = oracle.prompts.borrow();
    assert!(prompts[0].contains("construct: If Header."));
    assert!(prompts[0].contains("Modifications to the if condition/header."));
    assert!(prompts[0].contains("TEXT:\nif (score > 90) {\nAnswer:"));
    assert!(prompts[1].contains("construct: Comment."));
}

#[test]
fn construct_only_fallback_is_reported() {
    let config = fixture_config();
    let raw = table(
        &["code_change_text", "construct_name"],
        vec![
            vec!["x = 1".into(), "If Header".into()],
            vec!["y = 2".into(), "Comment".into()],
            vec!["z = 3".into(), "Operator".into()],
        ],
    );
    let r = reconcile(raw, &coded_wide(), &config).unwrap();
    assert_eq!(r.merged.keys, MergeKeys::ConstructOnly);
    assert!(r.warnings.iter().any(|w| w.contains("construct-only")));
    assert_eq!(r.merged.len(), 3);
    assert_eq!(r.merged.rows[2].human_label, None);
    assert_eq!(r.merged.diagnostics.shadowed, 2);
}

#[test]
fn ids_match_across_numeric_representations() {
    let config = fixture_config();
    let raw = table(
        &["sid", "code_change_text", "construct_name"],
        vec![
            vec![Cell::Float(12345.0), "a".into(), "If-Header".into()],
            vec![Cell::Text(" 678 ".into()), "b".into(), "comment".into()],
        ],
    );
    let coded = table(
        &["sid", "If Header", "Comment"],
        vec![
            vec![Cell::Text("12345.00".into()), Cell::Int(1), Cell::Int(0)],
            vec![Cell::Int(678), Cell::Int(0), Cell::Int(1)],
        ],
    );
    let r = reconcile(raw, &coded, &config).unwrap();
    let labels: Vec<_> = r.merged.rows.iter().map(|m| m.human_label).collect();
    assert_eq!(labels, vec![Some(1.0), Some(1.0)]);
    assert_eq!(r.merged.diagnostics.unmatched_raw, 0);
}

#[test]
fn exclude_policy_keeps_rows_but_skips_them_in_metrics() {
    let config = RunConfig {
        unparsed_policy: UnparsedPolicy::Exclude,
        ..fixture_config()
    };
    let oracle = Recording::new("n/a");
    let result = run(raw_two_columns(), &coded_wide(), &config, &Codebook::builtin(), &oracle).unwrap();
    assert_eq!(result.merged.len(), 4);
    assert!(result.merged.rows.iter().all(|r| r.prediction.is_none()));
    assert_eq!(result.metrics.overall, None);
    assert_eq!(result.report.n_eval_overall, 0);
    assert_eq!(result.report.overall_kappa, None);
}

#[test]
fn custom_codebook_definitions_reach_the_prompt() {
    let source = std::fs::read_to_string(fixtures_dir().join("codebook.toml")).unwrap();
    let codebook = Codebook::from_toml(&source).unwrap();
    let oracle = Recording::new("0");
    run(raw_two_columns(), &coded_wide(), &fixture_config(), &codebook, &oracle).unwrap();
    let prompts = oracle.prompts.borrow();
    assert!(prompts[0].contains("Changes to the condition of an if statement."));
    assert!(prompts[1].contains("Adds, removes or edits a comment."));
}

#[test]
fn report_serializes_to_metrics_layout() {
    let oracle = Recording::new("1");
    let result = run(
        raw_two_columns(),
        &coded_wide(),
        &fixture_config(),
        &Codebook::builtin(),
        &oracle,
    )
    .unwrap();
    let json = serde_json::to_value(&result.report).unwrap();

    assert_eq!(json["model"], "stub-model");
    assert_eq!(json["n_rows"], 4);
    assert_eq!(json["merge_keys"], serde_json::json!(["_id_key", "_construct_canon"]));
    assert_eq!(json["columns"]["id_col"], "sid");
    assert_eq!(json["columns"]["text_col"], "code_change_text");
    assert_eq!(json["merge"]["matched"], 4);
    assert_eq!(json["artifacts"]["preds_npy"], "out/zeroshot_preds.npy");
    assert_eq!(json["unparsed_policy"], "zero");
    // all-ones predictions against mixed truth: pe = 0.5, po = 0.5
    assert_eq!(json["overall_kappa"], 0.0);
    assert!(json["engine_version"].is_string());
}

#[test]
fn config_errors_come_before_any_oracle_call() {
    let oracle = Recording::new("1");
    let raw = table(&["code_change_text"], vec![vec!["x".into()]]);
    let config = RunConfig {
        id_col: None,
        ..fixture_config()
    };
    let err = run(raw, &coded_wide(), &config, &Codebook::builtin(), &oracle).unwrap_err();
    assert!(err.to_string().contains("construct column 'construct_name'"));
    assert!(oracle.prompts.borrow().is_empty());
}

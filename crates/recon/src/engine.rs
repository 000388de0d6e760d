use crate::codebook::Codebook;
use crate::coerce::coerce;
use crate::config::RunConfig;
use crate::error::ReconError;
use crate::expand::expand;
use crate::labeling::{label_rows, Oracle};
use crate::merge::{merge, plan};
use crate::model::{ArtifactPaths, ColumnsReport, Reconciliation, RunReport, RunResult};
use crate::reshape::{construct_columns, from_label_column, melt, LongLabels};
use crate::scoring::score_table;
use crate::table::Table;

/// Align, reshape and join the inputs. Every configuration error surfaces
/// here, before any oracle call.
pub fn reconcile(raw: Table, coded: &Table, config: &RunConfig) -> Result<Reconciliation, ReconError> {
    let roles = config.roles();
    let mut warnings = Vec::new();

    let coerced = coerce(raw, &roles, config.similarity)?;
    let mut raw = coerced.table;

    let (long, from_wide) = prepare_labels(coded, config, &mut warnings)?;

    let mut expanded_with = None;
    if !raw.has_column(&roles.construct) {
        let id = roles
            .id
            .as_deref()
            .filter(|c| raw.has_column(c))
            .ok_or_else(|| ReconError::CannotExpand {
                construct: roles.construct.clone(),
                id: roles.id.clone(),
                available: raw.columns().to_vec(),
            })?;
        let constructs = if from_wide {
            construct_columns(coded, Some(id))
        } else if long.has_construct {
            distinct_constructs(&long)
        } else {
            return Err(ReconError::MissingColumn {
                table: "coded".into(),
                column: roles.construct.clone(),
            });
        };
        log::info!(
            "raw data has no '{}' column; expanding {} rows by {} constructs",
            roles.construct,
            raw.len(),
            constructs.len()
        );
        raw = expand(&raw, &constructs, id, &roles.text, &roles.construct)?;
        expanded_with = Some(constructs);
    }

    let merge_plan = plan(&raw, &roles, &long)?;
    warnings.extend(merge_plan.warnings.iter().cloned());
    let merged = merge(&raw, &long, &merge_plan);

    Ok(Reconciliation {
        roles,
        coercions: coerced.renames,
        expanded_with,
        label_rows: long.len(),
        warnings,
        merged,
    })
}

/// Full run: reconcile, label every row through `oracle`, score.
pub fn run(
    raw: Table,
    coded: &Table,
    config: &RunConfig,
    codebook: &Codebook,
    oracle: &dyn Oracle,
) -> Result<RunResult, ReconError> {
    let reconciliation = reconcile(raw, coded, config)?;
    Ok(label_and_score(reconciliation, config, codebook, oracle))
}

/// Predict and score an existing reconciliation.
pub fn label_and_score(
    reconciliation: Reconciliation,
    config: &RunConfig,
    codebook: &Codebook,
    oracle: &dyn Oracle,
) -> RunResult {
    let Reconciliation {
        roles,
        coercions,
        mut warnings,
        mut merged,
        ..
    } = reconciliation;

    log::info!("labeling {} rows with {}", merged.len(), oracle.model());
    let labeling = label_rows(
        &mut merged,
        codebook,
        oracle,
        config.unparsed_policy,
        config.similarity,
    );
    for name in &labeling.unresolved_names {
        warnings.push(format!("no codebook definition for construct '{name}'"));
    }

    let metrics = score_table(&merged);
    if metrics.invalid_labels > 0 {
        warnings.push(format!(
            "{} human labels are not 0 or 1 and were treated as missing",
            metrics.invalid_labels
        ));
    }

    let report = RunReport {
        model: oracle.model().to_string(),
        overall_kappa: metrics.overall.and_then(|s| s.kappa),
        overall: metrics.overall,
        n_rows: merged.len(),
        n_eval_overall: metrics.n_eval(),
        merge_keys: merged.keys,
        merge: merged.diagnostics,
        columns: ColumnsReport {
            id_col: roles.id,
            text_col: roles.text,
            construct_col: roles.construct,
            label_col: config.label_col.clone(),
            coercions,
        },
        unparsed_policy: config.unparsed_policy,
        labeling,
        warnings,
        artifacts: ArtifactPaths::for_prefix(&config.out_prefix),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        run_at: chrono::Utc::now().to_rfc3339(),
    };

    RunResult {
        merged,
        metrics,
        report,
    }
}

/// Long labels plus whether they came from a wide table.
fn prepare_labels(
    coded: &Table,
    config: &RunConfig,
    warnings: &mut Vec<String>,
) -> Result<(LongLabels, bool), ReconError> {
    let id = config.id_col.as_deref();
    match config.label_col.as_deref() {
        Some(col) if coded.has_column(col) => {
            let long = from_label_column(coded, col, id, &config.construct_col)?;
            if !long.has_construct {
                warnings.push(format!(
                    "'{}' not found in coded data; labels merged by id only",
                    config.construct_col
                ));
            }
            Ok((long, false))
        }
        Some(col) => {
            let msg = format!("label column '{col}' not in coded data; reading coded data as wide");
            log::warn!("{msg}");
            warnings.push(msg);
            Ok((melt(coded, id), true))
        }
        None => Ok((melt(coded, id), true)),
    }
}

fn distinct_constructs(long: &LongLabels) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    long.rows
        .iter()
        .filter(|r| !r.construct.is_empty() && seen.insert(r.construct_key.clone()))
        .map(|r| r.construct.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::OracleError;
    use crate::merge::MergeKeys;
    use crate::table::Cell;

    struct Always(&'static str);

    impl Oracle for Always {
        fn model(&self) -> &str {
            "stub"
        }

        fn complete(&self, _prompt: &str) -> Result<String, OracleError> {
            Ok(self.0.to_string())
        }
    }

    fn config(id: Option<&str>) -> RunConfig {
        RunConfig {
            id_col: id.map(String::from),
            ..RunConfig::default()
        }
    }

    #[test]
    fn expands_raw_without_constructs() {
        let raw = Table::from_rows(
            vec!["sid".into(), "code_change_text".into()],
            vec![
                vec![Cell::Int(1), "a".into()],
                vec![Cell::Int(2), "b".into()],
            ],
        );
        let coded = Table::from_rows(
            vec!["sid".into(), "If Header".into(), "Comment".into()],
            vec![vec![Cell::Int(1), Cell::Int(1), Cell::Int(0)]],
        );
        let r = reconcile(raw, &coded, &config(Some("sid"))).unwrap();
        assert_eq!(r.merged.len(), 4);
        assert_eq!(r.expanded_with.as_deref().map(|c| c.len()), Some(2));
        assert_eq!(r.merged.keys, MergeKeys::IdAndConstruct);
        assert_eq!(r.label_rows, 2);
    }

    #[test]
    fn cannot_expand_without_id() {
        let raw = Table::from_rows(
            vec!["code_change_text".into()],
            vec![vec!["a".into()]],
        );
        let coded = Table::from_rows(vec!["sid".into(), "Comment".into()], vec![]);
        let err = reconcile(raw, &coded, &config(None)).unwrap_err();
        assert!(matches!(err, ReconError::CannotExpand { .. }));
    }

    #[test]
    fn label_override_supplies_constructs() {
        let raw = Table::from_rows(
            vec!["sid".into(), "code_change_text".into()],
            vec![vec![Cell::Int(7), "x".into()]],
        );
        let coded = Table::from_rows(
            vec!["sid".into(), "construct_name".into(), "label".into()],
            vec![
                vec![Cell::Int(7), "Comment".into(), Cell::Int(1)],
                vec![Cell::Int(7), "Operator".into(), Cell::Int(0)],
                vec![Cell::Int(8), "comment".into(), Cell::Int(0)],
            ],
        );
        let cfg = RunConfig {
            label_col: Some("label".into()),
            ..config(Some("sid"))
        };
        let r = reconcile(raw, &coded, &cfg).unwrap();
        assert_eq!(
            r.expanded_with,
            Some(vec!["Comment".to_string(), "Operator".to_string()])
        );
        let labels: Vec<_> = r.merged.rows.iter().map(|m| m.human_label).collect();
        assert_eq!(labels, vec![Some(1.0), Some(0.0)]);
    }

    #[test]
    fn missing_label_column_falls_back_to_wide() {
        let raw = Table::from_rows(
            vec!["sid".into(), "code_change_text".into(), "construct_name".into()],
            vec![vec![Cell::Int(1), "x".into(), "Comment".into()]],
        );
        let coded = Table::from_rows(
            vec!["sid".into(), "Comment".into()],
            vec![vec![Cell::Int(1), Cell::Int(1)]],
        );
        let cfg = RunConfig {
            label_col: Some("label".into()),
            ..config(Some("sid"))
        };
        let r = reconcile(raw, &coded, &cfg).unwrap();
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.merged.rows[0].human_label, Some(1.0));
    }

    #[test]
    fn run_reports_model_and_counts() {
        let raw = Table::from_rows(
            vec!["sid".into(), "code_change_text".into(), "construct_name".into()],
            vec![
                vec![Cell::Int(1), "x".into(), "Comment".into()],
                vec![Cell::Int(2), "y".into(), "Comment".into()],
            ],
        );
        let coded = Table::from_rows(
            vec!["sid".into(), "Comment".into()],
            vec![
                vec![Cell::Int(1), Cell::Int(1)],
                vec![Cell::Int(2), Cell::Int(0)],
            ],
        );
        let out = run(raw, &coded, &config(Some("sid")), &Codebook::builtin(), &Always("1")).unwrap();
        assert_eq!(out.report.model, "stub");
        assert_eq!(out.report.n_rows, 2);
        assert_eq!(out.report.n_eval_overall, 2);
        assert_eq!(out.report.labeling.parsed, 2);
        let overall = out.metrics.overall.unwrap();
        assert_eq!(overall.precision, 0.5);
        assert_eq!(overall.recall, 1.0);
        assert_eq!(out.report.artifacts.metrics_json, "zeroshot_metrics.json");
    }

    #[test]
    fn unknown_constructs_are_reported_once_each() {
        let raw = Table::from_rows(
            vec!["sid".into(), "code_change_text".into()],
            vec![
                vec![Cell::Int(1), "x".into()],
                vec![Cell::Int(2), "y".into()],
            ],
        );
        let coded = Table::from_rows(
            vec!["sid".into(), "Loop Structure".into(), "Comment".into()],
            vec![
                vec![Cell::Int(1), Cell::Int(1), Cell::Int(0)],
                vec![Cell::Int(2), Cell::Int(0), Cell::Int(1)],
            ],
        );
        let out = run(raw, &coded, &config(Some("sid")), &Codebook::builtin(), &Always("0")).unwrap();
        assert_eq!(out.report.labeling.unresolved_constructs, 2);
        assert_eq!(out.report.labeling.unresolved_names, ["Loop Structure"]);
        let mentions = out
            .report
            .warnings
            .iter()
            .filter(|w| w.contains("'Loop Structure'"))
            .count();
        assert_eq!(mentions, 1);
    }
}

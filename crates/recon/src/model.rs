use serde::Serialize;

use crate::coerce::{ColumnRoles, Rename};
use crate::labeling::{LabelingStats, UnparsedPolicy};
use crate::merge::{MergeDiagnostics, MergeKeys, MergedTable};
use crate::scoring::{Metrics, Score};

// ---------------------------------------------------------------------------
// Artifact paths
// ---------------------------------------------------------------------------

/// Files written for one run, all derived from the output prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub merged_with_preds_csv: String,
    pub preds_npy: String,
    pub preds_csv: String,
    pub metrics_json: String,
    pub per_construct_csv: String,
    pub per_construct_json: String,
}

impl ArtifactPaths {
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            merged_with_preds_csv: format!("{prefix}_merged_with_preds.csv"),
            preds_npy: format!("{prefix}_preds.npy"),
            preds_csv: format!("{prefix}_preds.csv"),
            metrics_json: format!("{prefix}_metrics.json"),
            per_construct_csv: format!("{prefix}_per_construct_metrics.csv"),
            per_construct_json: format!("{prefix}_per_construct_metrics.json"),
        }
    }

    pub fn all(&self) -> [&str; 6] {
        [
            &self.merged_with_preds_csv,
            &self.preds_npy,
            &self.preds_csv,
            &self.metrics_json,
            &self.per_construct_csv,
            &self.per_construct_json,
        ]
    }
}

// ---------------------------------------------------------------------------
// Reconciliation (before labeling)
// ---------------------------------------------------------------------------

/// Raw entities joined to human labels, ready for prediction.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub roles: ColumnRoles,
    pub coercions: Vec<Rename>,
    /// Constructs the raw rows were crossed with, if expansion happened.
    pub expanded_with: Option<Vec<String>>,
    pub label_rows: usize,
    pub warnings: Vec<String>,
    pub merged: MergedTable,
}

// ---------------------------------------------------------------------------
// Run report (metrics.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ColumnsReport {
    pub id_col: Option<String>,
    pub text_col: String,
    pub construct_col: String,
    pub label_col: Option<String>,
    pub coercions: Vec<Rename>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub model: String,
    pub overall_kappa: Option<f64>,
    pub overall: Option<Score>,
    pub n_rows: usize,
    pub n_eval_overall: usize,
    pub merge_keys: MergeKeys,
    pub merge: MergeDiagnostics,
    pub columns: ColumnsReport,
    pub unparsed_policy: UnparsedPolicy,
    pub labeling: LabelingStats,
    pub warnings: Vec<String>,
    pub artifacts: ArtifactPaths,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub merged: MergedTable,
    pub metrics: Metrics,
    pub report: RunReport,
}

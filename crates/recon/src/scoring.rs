//! Agreement statistics between human labels and model predictions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::merge::MergedTable;

/// Binary agreement statistics over evaluable pairs. Label 1 is positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    /// Cohen's kappa; `None` when there are no pairs or chance agreement is 1.
    pub kappa: Option<f64>,
    pub precision: f64,
    pub recall: f64,
    /// Share of pairs whose true label is 1.
    pub freq: f64,
    pub n_eval: usize,
}

/// One per-construct metrics record, field names as written to disk.
/// Also reads files that use the older `hum_gpt_*` field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructMetrics {
    pub construct: String,
    pub freq_in_data: Option<f64>,
    #[serde(alias = "hum_gpt_kappa")]
    pub hum_model_kappa: Option<f64>,
    #[serde(alias = "hum_gpt_precision")]
    pub hum_model_precision: Option<f64>,
    #[serde(alias = "hum_gpt_recall")]
    pub hum_model_recall: Option<f64>,
    #[serde(default)]
    pub n_eval: usize,
}

impl ConstructMetrics {
    pub fn new(construct: String, score: Option<Score>) -> Self {
        match score {
            Some(s) if s.n_eval > 0 => Self {
                construct,
                freq_in_data: Some(s.freq),
                hum_model_kappa: s.kappa,
                hum_model_precision: Some(s.precision),
                hum_model_recall: Some(s.recall),
                n_eval: s.n_eval,
            },
            _ => Self {
                construct,
                freq_in_data: None,
                hum_model_kappa: None,
                hum_model_precision: None,
                hum_model_recall: None,
                n_eval: 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub overall: Option<Score>,
    pub per_construct: Vec<ConstructMetrics>,
    /// Human labels present but not exactly 0 or 1.
    pub invalid_labels: usize,
}

impl Metrics {
    pub fn n_eval(&self) -> usize {
        self.overall.map_or(0, |s| s.n_eval)
    }
}

/// Score `(truth, prediction)` pairs.
pub fn score(pairs: &[(u8, u8)]) -> Score {
    let n = pairs.len();
    let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
    for &(t, p) in pairs {
        match (t == 1, p == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    let kappa = if n == 0 {
        None
    } else {
        let nf = n as f64;
        let po = (tp + tn) as f64 / nf;
        let true_pos = (tp + fn_) as f64 / nf;
        let pred_pos = (tp + fp) as f64 / nf;
        let pe = true_pos * pred_pos + (1.0 - true_pos) * (1.0 - pred_pos);
        if (1.0 - pe).abs() < f64::EPSILON {
            None
        } else {
            Some((po - pe) / (1.0 - pe))
        }
    };

    Score {
        kappa,
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
        freq: ratio(tp + fn_, n),
        n_eval: n,
    }
}

fn binary(label: f64) -> Option<u8> {
    if label == 0.0 {
        Some(0)
    } else if label == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Overall and per-construct scores for a predicted merged table.
///
/// A row is evaluable when its human label is 0 or 1 and it has a
/// prediction. Per-construct groups use the raw construct name, sorted.
pub fn score_table(merged: &MergedTable) -> Metrics {
    let mut invalid_labels = 0;
    let mut all = Vec::with_capacity(merged.len());
    let mut groups: BTreeMap<&str, Vec<(u8, u8)>> = BTreeMap::new();

    for row in &merged.rows {
        let group = (!row.construct.is_empty()).then(|| groups.entry(row.construct.as_str()).or_default());
        let Some(label) = row.human_label else { continue };
        let Some(truth) = binary(label) else {
            invalid_labels += 1;
            continue;
        };
        let Some(pred) = row.prediction else { continue };
        all.push((truth, pred));
        if let Some(g) = group {
            g.push((truth, pred));
        }
    }

    if invalid_labels > 0 {
        log::warn!("{invalid_labels} human labels are not 0 or 1 and were treated as missing");
    }

    let overall = if all.is_empty() {
        log::warn!("no human labels found for evaluation after merge (check id/construct alignment)");
        None
    } else {
        Some(score(&all))
    };

    let per_construct = groups
        .into_iter()
        .map(|(name, pairs)| {
            let s = (!pairs.is_empty()).then(|| score(&pairs));
            ConstructMetrics::new(name.to_string(), s)
        })
        .collect();

    Metrics {
        overall,
        per_construct,
        invalid_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergeDiagnostics, MergeKeys, MergedRow};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fixed_pairs() {
        let s = score(&[(1, 1), (1, 0), (0, 0), (0, 0)]);
        assert!(close(s.precision, 1.0));
        assert!(close(s.recall, 0.5));
        assert!(close(s.freq, 0.5));
        assert_eq!(s.n_eval, 4);
        // po = 0.75, pe = 0.5*0.25 + 0.5*0.75 = 0.5
        assert!(close(s.kappa.unwrap(), 0.5));
    }

    #[test]
    fn degenerate_kappa_is_absent() {
        let s = score(&[(1, 1), (1, 1), (1, 1)]);
        assert_eq!(s.kappa, None);
        assert!(close(s.precision, 1.0));
        assert!(close(s.freq, 1.0));
    }

    #[test]
    fn empty_input() {
        let s = score(&[]);
        assert_eq!(s.kappa, None);
        assert_eq!(s.n_eval, 0);
        assert!(close(s.precision, 0.0));
    }

    #[test]
    fn zero_division_gives_zero() {
        let s = score(&[(0, 0), (1, 0)]);
        assert!(close(s.precision, 0.0));
        assert!(close(s.recall, 0.0));
        assert!(close(s.kappa.unwrap(), 0.0));
    }

    fn row(construct: &str, label: Option<f64>, pred: Option<u8>) -> MergedRow {
        MergedRow {
            values: Vec::new(),
            id_key: None,
            construct: construct.into(),
            construct_key: construct.to_lowercase(),
            text: String::new(),
            human_label: label,
            prediction: pred,
        }
    }

    fn table(rows: Vec<MergedRow>) -> MergedTable {
        MergedTable {
            columns: Vec::new(),
            keys: MergeKeys::IdAndConstruct,
            has_raw_id: false,
            rows,
            diagnostics: MergeDiagnostics::default(),
        }
    }

    #[test]
    fn per_construct_groups_sorted_by_name() {
        let m = score_table(&table(vec![
            row("Operator", Some(1.0), Some(1)),
            row("Comment", Some(1.0), Some(0)),
            row("Comment", Some(0.0), Some(0)),
            row("If Header", None, Some(1)),
            row("Operator", Some(2.0), Some(1)),
            row("Comment", Some(1.0), None),
        ]));
        let names: Vec<_> = m.per_construct.iter().map(|c| c.construct.as_str()).collect();
        assert_eq!(names, ["Comment", "If Header", "Operator"]);

        let comment = &m.per_construct[0];
        assert_eq!(comment.n_eval, 2);
        assert_eq!(comment.freq_in_data, Some(0.5));

        let if_header = &m.per_construct[1];
        assert_eq!(if_header.n_eval, 0);
        assert_eq!(if_header.hum_model_kappa, None);
        assert_eq!(if_header.freq_in_data, None);

        assert_eq!(m.invalid_labels, 1);
        assert_eq!(m.n_eval(), 3);
    }

    #[test]
    fn no_labels_skips_overall() {
        let m = score_table(&table(vec![row("Comment", None, Some(0))]));
        assert_eq!(m.overall, None);
        assert_eq!(m.per_construct.len(), 1);
    }

    #[test]
    fn metrics_record_serializes_nulls() {
        let rec = ConstructMetrics::new("Comment".into(), None);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json["hum_model_kappa"].is_null());
        assert_eq!(json["n_eval"], 0);
    }
}

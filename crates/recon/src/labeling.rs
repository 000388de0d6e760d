//! Zero-shot labeling through an injected oracle.
//!
//! Rows are labeled strictly in order, one call each. Neither an
//! unparseable reply nor a failed call stops the run: both fall back
//! according to [`UnparsedPolicy`] and are counted.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codebook::Codebook;
use crate::merge::MergedTable;
use crate::similarity::Similarity;

pub const ZERO_SHOT_TEMPLATE: &str = "Please review the provided text and code it based on the construct: {construct}. \
The definition of this construct is: {definition} \
After reviewing the text, assign a code of '1' if you believe the text exemplifies {construct}, \
or a '0' if it does not. Your response should only be '1' or '0'.\n\n\
TEXT:\n{snippet}\n\
Answer:";

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Response(String),
}

/// A text-completion backend. Calls are blocking.
pub trait Oracle {
    fn model(&self) -> &str;

    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// What an unparseable or failed reply becomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparsedPolicy {
    /// Predict 0.
    #[default]
    Zero,
    /// Leave the prediction missing; the row is kept but not scored.
    Exclude,
}

impl UnparsedPolicy {
    pub fn fallback(&self) -> Option<u8> {
        match self {
            Self::Zero => Some(0),
            Self::Exclude => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Exclude => "exclude",
        }
    }
}

impl fmt::Display for UnparsedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnparsedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero" => Ok(Self::Zero),
            "exclude" => Ok(Self::Exclude),
            other => Err(format!("unknown unparsed policy '{other}' (expected zero or exclude)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelingStats {
    pub rows: usize,
    pub parsed: usize,
    pub unparseable: usize,
    pub failed: usize,
    /// Rows whose construct had no codebook definition.
    pub unresolved_constructs: usize,
    /// Distinct construct names that got the placeholder, sorted.
    pub unresolved_names: Vec<String>,
}

pub fn build_prompt(construct: &str, definition: &str, snippet: &str) -> String {
    ZERO_SHOT_TEMPLATE
        .replace("{construct}", construct)
        .replace("{definition}", definition)
        .replace("{snippet}", snippet)
}

fn standalone_digit() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([01])\b").ok()).as_ref()
}

fn leading_digit() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([01])").ok()).as_ref()
}

/// Binary label from a model reply: a standalone `0`/`1` token, else a leading digit.
pub fn parse_binary_label(reply: &str) -> Option<u8> {
    let caps = standalone_digit()?
        .captures(reply)
        .or_else(|| leading_digit()?.captures(reply))?;
    match &caps[1] {
        "1" => Some(1),
        _ => Some(0),
    }
}

/// Predict every row of `merged` in place.
pub fn label_rows(
    merged: &mut MergedTable,
    codebook: &Codebook,
    oracle: &dyn Oracle,
    policy: UnparsedPolicy,
    metric: Similarity,
) -> LabelingStats {
    let mut stats = LabelingStats {
        rows: merged.len(),
        ..LabelingStats::default()
    };
    let mut definitions: HashMap<String, (&str, bool)> = HashMap::new();
    let total = merged.len();

    for (i, row) in merged.rows.iter_mut().enumerate() {
        let (definition, resolved) = *definitions.entry(row.construct.clone()).or_insert_with(|| {
            let r = codebook.resolve(&row.construct, metric);
            if r.entry.is_none() {
                log::warn!(
                    "no codebook definition for construct '{}'; using placeholder",
                    row.construct
                );
                stats.unresolved_names.push(row.construct.clone());
            }
            (r.definition, r.entry.is_some())
        });
        if !resolved {
            stats.unresolved_constructs += 1;
        }

        let prompt = build_prompt(&row.construct, definition, &row.text);
        row.prediction = match oracle.complete(&prompt) {
            Ok(reply) => match parse_binary_label(&reply) {
                Some(label) => {
                    stats.parsed += 1;
                    Some(label)
                }
                None => {
                    stats.unparseable += 1;
                    log::warn!(
                        "row {i}: could not parse a binary label from {reply:?}; using fallback ({policy})"
                    );
                    policy.fallback()
                }
            },
            Err(e) => {
                stats.failed += 1;
                log::warn!("row {i}: oracle call failed: {e}; using fallback ({policy})");
                policy.fallback()
            }
        };

        if (i + 1) % 100 == 0 {
            log::info!("labeled {}/{total} rows", i + 1);
        }
    }

    stats.unresolved_names.sort();
    log::info!(
        "labeling done: {} parsed, {} unparseable, {} failed",
        stats.parsed,
        stats.unparseable,
        stats.failed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergeDiagnostics, MergeKeys, MergedRow};
    use std::cell::RefCell;

    struct Scripted {
        replies: RefCell<Vec<Result<String, OracleError>>>,
        prompts: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, OracleError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into_iter().rev().collect()),
                prompts: RefCell::default(),
            }
        }
    }

    impl Oracle for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        fn complete(&self, prompt: &str) -> Result<String, OracleError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn merged(constructs: &[&str]) -> MergedTable {
        MergedTable {
            columns: Vec::new(),
            keys: MergeKeys::IdAndConstruct,
            has_raw_id: false,
            rows: constructs
                .iter()
                .map(|c| MergedRow {
                    values: Vec::new(),
                    id_key: None,
                    construct: c.to_string(),
                    construct_key: c.to_lowercase(),
                    text: "x = x + 1;".into(),
                    human_label: Some(1.0),
                    prediction: None,
                })
                .collect(),
            diagnostics: MergeDiagnostics::default(),
        }
    }

    #[test]
    fn parse_replies() {
        assert_eq!(parse_binary_label("1"), Some(1));
        assert_eq!(parse_binary_label(" 0\n"), Some(0));
        assert_eq!(parse_binary_label("Answer: 1."), Some(1));
        assert_eq!(parse_binary_label("'0'"), Some(0));
        assert_eq!(parse_binary_label("1a"), Some(1));
        assert_eq!(parse_binary_label("10"), Some(1));
        assert_eq!(parse_binary_label("2 or 3"), None);
        assert_eq!(parse_binary_label("yes"), None);
        assert_eq!(parse_binary_label(""), None);
    }

    #[test]
    fn prompt_embeds_fields() {
        let p = build_prompt("If Header", "Modifications to the if condition/header.", "if (a > b)");
        assert!(p.starts_with("Please review the provided text and code it based on the construct: If Header. "));
        assert!(p.contains("exemplifies If Header,"));
        assert!(p.contains("The definition of this construct is: Modifications to the if condition/header. After"));
        assert!(p.ends_with("TEXT:\nif (a > b)\nAnswer:"));
    }

    #[test]
    fn unparseable_defaults_to_zero() {
        let mut m = merged(&["If Header", "Comment"]);
        let oracle = Scripted::new(vec![Ok("maybe".into()), Ok("1".into())]);
        let stats = label_rows(&mut m, &Codebook::builtin(), &oracle, UnparsedPolicy::Zero, Similarity::Gestalt);
        assert_eq!(m.predictions(), vec![Some(0), Some(1)]);
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.unparseable, 1);
    }

    #[test]
    fn exclude_policy_leaves_prediction_missing() {
        let mut m = merged(&["If Header", "Comment"]);
        let oracle = Scripted::new(vec![
            Err(OracleError::Request("connection reset".into())),
            Ok("0".into()),
        ]);
        let stats = label_rows(&mut m, &Codebook::builtin(), &oracle, UnparsedPolicy::Exclude, Similarity::Gestalt);
        assert_eq!(m.predictions(), vec![None, Some(0)]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.rows, 2);
    }

    #[test]
    fn unknown_construct_uses_placeholder() {
        let mut m = merged(&["Loop Structure", "If Header", "Loop Structure", "Error Handling"]);
        let oracle = Scripted::new((0..4).map(|_| Ok("1".into())).collect());
        let stats = label_rows(&mut m, &Codebook::builtin(), &oracle, UnparsedPolicy::Zero, Similarity::Gestalt);
        assert_eq!(stats.unresolved_constructs, 3);
        assert_eq!(stats.unresolved_names, ["Error Handling", "Loop Structure"]);
        let prompts = oracle.prompts.borrow();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].contains(crate::codebook::PLACEHOLDER_DEFINITION));
        assert!(prompts[0].contains("construct: Loop Structure."));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("exclude".parse::<UnparsedPolicy>(), Ok(UnparsedPolicy::Exclude));
        assert!("drop".parse::<UnparsedPolicy>().is_err());
        assert_eq!(UnparsedPolicy::default().fallback(), Some(0));
    }
}

//! Construct definitions.
//!
//! A [`Codebook`] is built once per run and passed by reference. Resolution
//! goes exact canonical key, then fuzzy match, then a placeholder.

use serde::Serialize;

use crate::canon::canonicalize;
use crate::error::ReconError;
use crate::similarity::Similarity;

/// Minimum similarity for a fuzzy codebook hit.
pub const DEFINITION_CUTOFF: f64 = 0.72;

pub const PLACEHOLDER_DEFINITION: &str =
    "No definition available for this construct. Decide as best as you can.";

const BUILTIN: &[(&str, &str)] = &[
    ("If Header", "Modifications to the if condition/header."),
    ("If Body", "Modifications to the lines enabled by the if condition/header."),
    ("Function Return", "Modifications inside the return statement."),
    (
        "Function Body",
        "Modifications inside the body of the function. These modifications include adding more conditional statements, auxiliary variables, and others.",
    ),
    (
        "Comment",
        "A new commented line or a deletion or modification of an already existing comment.",
    ),
    (
        "Testing",
        "Modifications inside the Main function (section of the code used for testing), such as adding a line to print results in the console and testing the correct functioning of their code.",
    ),
    ("Added Lines", "Contains at least one completely new code line."),
    ("Removed Lines", "Student removed code lines in the submission."),
    (
        "Variable Usage & Assignment",
        "Student submission adds a new variable or deletes or modifies the value assignment of an already existing variable.",
    ),
    (
        "Variable-type Change",
        "A modification of the type of variable on its initial declaration.",
    ),
    (
        "Variable-type Conversion Change",
        "Modification in the conversion of the type of variable after its initial declaration or a conversion in the type of variable obtained after using an already existing method.",
    ),
    (
        "Value Change",
        "Modification of any value. It can be in the if header/condition, in the coefficient in an equation, or in the assignment of a variable.",
    ),
    (
        "Operator",
        "Modification of an operator, such as changing the \u{201c}greater than\u{201d} operator to \u{201c}equal to\u{201d} in a conditional statement.",
    ),
    (
        "Syntax Change",
        "A modification in the syntax of a code line to correct a compiler error.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    key: String,
    definition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Codebook entry name, `None` when unresolved.
    pub entry: Option<&'a str>,
    pub definition: &'a str,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook {
    entries: Vec<Entry>,
}

impl Codebook {
    /// The fourteen code-change constructs.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN.iter().map(|(n, d)| (n.to_string(), d.to_string())))
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let entries = pairs
            .into_iter()
            .map(|(name, definition)| Entry {
                key: canonicalize(&name),
                name,
                definition,
            })
            .collect();
        Self { entries }
    }

    /// Parse a TOML table of `"Construct Name" = "definition"` pairs.
    pub fn from_toml(source: &str) -> Result<Self, ReconError> {
        let table: toml::Table =
            toml::from_str(source).map_err(|e| ReconError::Codebook(e.to_string()))?;
        let mut pairs = Vec::with_capacity(table.len());
        for (name, value) in table {
            let Some(definition) = value.as_str() else {
                return Err(ReconError::Codebook(format!(
                    "definition for '{name}' must be a string"
                )));
            };
            if canonicalize(&name).is_empty() {
                return Err(ReconError::Codebook(format!(
                    "construct name '{name}' has no usable characters"
                )));
            }
            pairs.push((name, definition.to_string()));
        }
        if pairs.is_empty() {
            return Err(ReconError::Codebook("codebook defines no constructs".into()));
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Definition for a construct name as written in the data. Unresolved
    /// names get [`PLACEHOLDER_DEFINITION`]; reporting them is up to the caller.
    pub fn resolve(&self, name: &str, metric: Similarity) -> Resolution<'_> {
        let target = canonicalize(name);
        if !target.is_empty() {
            if let Some(e) = self.entries.iter().find(|e| e.key == target) {
                return Resolution {
                    entry: Some(&e.name),
                    definition: &e.definition,
                    kind: MatchKind::Exact,
                };
            }
            let hit = metric.best_match(
                &target,
                self.entries.iter().map(|e| e.key.as_str()),
                DEFINITION_CUTOFF,
            );
            if let Some(e) = hit.and_then(|k| self.entries.iter().find(|e| e.key == k)) {
                log::debug!("construct '{name}' resolved to '{}' by similarity", e.name);
                return Resolution {
                    entry: Some(&e.name),
                    definition: &e.definition,
                    kind: MatchKind::Fuzzy,
                };
            }
        }

        Resolution {
            entry: None,
            definition: PLACEHOLDER_DEFINITION,
            kind: MatchKind::Unresolved,
        }
    }
}

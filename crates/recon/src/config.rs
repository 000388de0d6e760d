use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::coerce::ColumnRoles;
use crate::error::ReconError;
use crate::labeling::UnparsedPolicy;
use crate::similarity::Similarity;

pub const DEFAULT_TEXT_COL: &str = "code_change_text";
pub const DEFAULT_CONSTRUCT_COL: &str = "construct_name";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OUT_PREFIX: &str = "zeroshot";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// One reconciliation run. Every field has a default so a config file only
/// needs what differs; command-line flags are applied on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub raw_path: Option<PathBuf>,
    pub coded_path: Option<PathBuf>,
    pub sheet: SheetSelector,
    /// Id column present in both files. `None` forces a construct-only merge.
    pub id_col: Option<String>,
    pub text_col: String,
    pub construct_col: String,
    /// Coded data already in long form with this label column.
    pub label_col: Option<String>,
    pub model: String,
    pub out_prefix: String,
    pub unparsed_policy: UnparsedPolicy,
    pub similarity: Similarity,
    /// TOML file of `"Construct" = "definition"` pairs replacing the built-in codebook.
    pub codebook: Option<PathBuf>,
    pub oracle: OracleConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            raw_path: None,
            coded_path: None,
            sheet: SheetSelector::default(),
            id_col: None,
            text_col: DEFAULT_TEXT_COL.into(),
            construct_col: DEFAULT_CONSTRUCT_COL.into(),
            label_col: None,
            model: DEFAULT_MODEL.into(),
            out_prefix: DEFAULT_OUT_PREFIX.into(),
            unparsed_policy: UnparsedPolicy::default(),
            similarity: Similarity::default(),
            codebook: None,
            oracle: OracleConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Connection settings for the chat-completions endpoint. The API key is
/// never part of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            timeout_secs: 60,
            max_tokens: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Sheet selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(n) => write!(f, "'{n}'"),
        }
    }
}

impl FromStr for SheetSelector {
    type Err = std::convert::Infallible;

    /// All-digit input selects by index; anything else by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<usize>() {
            Ok(i) => Self::Index(i),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing & validation
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));

        for (field, value) in [
            ("text_col", Some(&self.text_col)),
            ("construct_col", Some(&self.construct_col)),
            ("id_col", self.id_col.as_ref()),
            ("label_col", self.label_col.as_ref()),
        ] {
            if value.is_some_and(|v| v.trim().is_empty()) {
                return invalid(format!("{field} must not be empty"));
            }
        }

        if self.text_col == self.construct_col {
            return invalid(format!(
                "text_col and construct_col are both '{}'",
                self.text_col
            ));
        }
        if let Some(id) = &self.id_col {
            if id == &self.text_col || id == &self.construct_col {
                return invalid(format!("id_col '{id}' collides with another column role"));
            }
        }

        if self.model.trim().is_empty() {
            return invalid("model must not be empty".into());
        }
        if self.out_prefix.trim().is_empty() {
            return invalid("out_prefix must not be empty".into());
        }

        let base = &self.oracle.api_base;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return invalid(format!("oracle.api_base must be an http(s) URL, got '{base}'"));
        }
        if self.oracle.timeout_secs == 0 {
            return invalid("oracle.timeout_secs must be positive".into());
        }
        if self.oracle.max_tokens == 0 {
            return invalid("oracle.max_tokens must be positive".into());
        }

        Ok(())
    }

    pub fn roles(&self) -> ColumnRoles {
        ColumnRoles {
            id: self.id_col.clone(),
            text: self.text_col.clone(),
            construct: self.construct_col.clone(),
        }
    }
}

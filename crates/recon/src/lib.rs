//! `concord-recon`: reconciliation of human-coded labels with model predictions.
//!
//! Pure engine crate: receives pre-loaded tables, returns merged rows and
//! agreement metrics. No CLI, network or file IO dependencies; the oracle is
//! injected through the [`Oracle`] trait.

pub mod canon;
pub mod codebook;
pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod expand;
pub mod labeling;
pub mod merge;
pub mod model;
pub mod reshape;
pub mod scoring;
pub mod similarity;
pub mod table;

pub use codebook::Codebook;
pub use config::{RunConfig, SheetSelector};
pub use engine::{label_and_score, reconcile, run};
pub use error::ReconError;
pub use labeling::{Oracle, OracleError, UnparsedPolicy};
pub use model::{ArtifactPaths, Reconciliation, RunReport, RunResult};
pub use similarity::Similarity;
pub use table::{Cell, Table};

//! Core pipeline orchestration and domain logic for docsmith.
//!
//! This crate ties together discovery, enrichment, categorization,
//! materialization and translation into the `build` workflow. External
//! services are reached only through the traits in [`collaborators`].

pub mod categorize;
pub mod collaborators;
pub mod enrichment;
pub mod materialize;
mod output;
pub mod pipeline;
pub mod translate;

#[cfg(test)]
mod testing;

pub use collaborators::{
    Classification, Classifier, ClassifyDocument, Extraction, Extractor, TranslationBackend,
};
pub use output::{PruneReport, prune_content};
pub use pipeline::{BuildReport, Collaborators, ProgressReporter, SilentProgress, StageReport, build};

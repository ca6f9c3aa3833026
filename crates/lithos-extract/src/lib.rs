//! lithos-extract - Entity extraction and relation linking
//!
//! Consumes annotated sentences and produces the document's entity set and
//! its "contains" relations:
//! - [`EntityExtractor`] merges adjacent same-label tokens (and
//!   hyphen/underscore-joined fragments) into multi-word entity spans;
//! - [`RelationLinker`] forms directed contains relations by
//!   nearest-neighbor matching over classifier-flagged entities;
//! - [`PairwiseLinker`] is the alternative relation source driven by a
//!   pairwise classifier subprocess.

pub mod classifier;
pub mod entity;
pub mod linker;
pub mod pairwise;

pub use classifier::{encode_pair_record, encode_span_record, ContainsClassifier, SubprocessClassifier};
pub use entity::EntityExtractor;
pub use linker::{LinkCandidate, LinkMethod, RelationLinker, RoleTagger};
pub use pairwise::PairwiseLinker;

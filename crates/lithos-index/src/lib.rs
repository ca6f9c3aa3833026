//! lithos-index - Search-index records and client
//!
//! Flattens a processed document into one parent record plus one child
//! record per entity and relation, and posts record batches to the search
//! index over its JSON update endpoint.

pub mod builder;
pub mod client;

pub use builder::{document_id, primary_author, AnnotationIndexBuilder};
pub use client::{merge_with_existing, IndexClient, IndexError};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lithos_core::MetadataValue;

/// A record in the search index. The `record_type` tag distinguishes the
/// parent document record (depth 0) from entity and relation children
/// (depth 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum IndexRecord {
    Doc(DocRecord),
    Entity(EntityRecord),
    Relation(RelationRecord),
}

impl IndexRecord {
    pub fn id(&self) -> &str {
        match self {
            Self::Doc(r) => &r.id,
            Self::Entity(r) => &r.id,
            Self::Relation(r) => &r.id,
        }
    }

    pub fn depth(&self) -> u8 {
        match self {
            Self::Doc(r) => r.depth,
            Self::Entity(r) => r.depth,
            Self::Relation(r) => r.depth,
        }
    }
}

/// Parent document record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocRecord {
    pub id: String,
    pub depth: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affiliations: Vec<String>,

    /// Cleaned text content
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub main_type: String,
    #[serde(default)]
    pub sub_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    /// Remaining metadata fields, carried through as-is
    #[serde(flatten)]
    pub extra: HashMap<String, MetadataValue>,
}

/// Entity child record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub p_id: String,
    pub depth: u8,

    pub label: String,
    pub name: String,
    pub canonical_name: String,
    pub span_begin: usize,
    pub span_end: usize,
    pub sentence: usize,
}

/// Relation child record. Endpoint names and ids are denormalized for the
/// index's read model; `excerpt` carries the sentence surface text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: String,
    pub p_id: String,
    pub depth: u8,

    pub label: String,
    pub target_ids: Vec<String>,
    pub target_names: Vec<String>,
    pub cont_ids: Vec<String>,
    pub cont_names: Vec<String>,
    pub excerpt: String,
    pub sentence: usize,
    pub source: String,
}

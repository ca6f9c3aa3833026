//! lithos-core - Domain models, errors, and shared configuration
//!
//! This crate defines the core abstractions used throughout the lithos
//! pipeline:
//! - Document models (documents, sentences, tokens, entities, relations)
//! - Common error types with the pipeline's recover/skip/abort taxonomy
//! - Configuration management
//! - The immutable domain lexicon and canonical-name resolution

pub mod canonical;
pub mod config;
pub mod lexicon;

pub use canonical::{
    canonical_component_name, canonical_element_name, canonical_target_name,
    canonical_target_name_with_aliases, AliasRelation, TargetAnnotation,
};
pub use config::{
    AppConfig, ClassifierConfig, ConfigError, IndexingConfig, LinkerConfig, LoggingConfig,
    ServiceConfig,
};
pub use lexicon::Lexicon;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for pipeline operations.
///
/// The taxonomy matters: service and malformed-document failures are
/// recoverable (the document is skipped and the pipeline continues), while
/// data-integrity violations indicate a broken contract between stages and
/// abort the run. Configuration errors are fatal at startup.
#[derive(Error, Debug)]
pub enum LithosError {
    #[error("{service} service failed: {message}")]
    Service { service: String, message: String },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LithosError {
    /// Convenience constructor for external-service failures.
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the current document should be skipped and the pipeline
    /// continued, as opposed to aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Service { .. } | Self::MalformedDocument(_))
    }
}

pub type Result<T> = std::result::Result<T, LithosError>;

// ============================================================================
// Labels and Spans
// ============================================================================

/// Entity labels recognized by the domain NER model.
///
/// `Component` is the generalization of `Mineral` and `Element` used during
/// relation inference; it never comes directly from the annotation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityLabel {
    Target,
    Element,
    Mineral,
    Component,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "Target",
            Self::Element => "Element",
            Self::Mineral => "Mineral",
            Self::Component => "Component",
        }
    }

    /// Parse an annotation-service NER label. "O" and any label outside the
    /// domain set map to `None` (no entity).
    pub fn from_service_label(label: &str) -> Option<Self> {
        match label {
            "Target" => Some(Self::Target),
            "Element" => Some(Self::Element),
            "Mineral" => Some(Self::Mineral),
            "Component" => Some(Self::Component),
            _ => None,
        }
    }

    /// Whether this label generalizes to `Component` for relation inference.
    pub fn is_component_kind(&self) -> bool {
        matches!(self, Self::Element | Self::Mineral | Self::Component)
    }

    /// The label used during relation inference: `Mineral` and `Element`
    /// generalize to `Component`, everything else is unchanged.
    pub fn generalized(self) -> Self {
        match self {
            Self::Element | Self::Mineral => Self::Component,
            other => other,
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A half-open character-offset span [begin, end) into the cleaned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharSpan {
    pub begin: usize,
    pub end: usize,
}

impl CharSpan {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn is_valid(&self) -> bool {
        self.begin < self.end
    }
}

/// A half-open sentence-local token-index span [begin, end), 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    pub begin: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn is_valid(&self) -> bool {
        self.begin < self.end
    }

    /// Whether `other` starts exactly where this span ends.
    pub fn is_adjacent_to(&self, other: &TokenSpan) -> bool {
        self.end == other.begin
    }

    pub fn contains(&self, other: &TokenSpan) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

// ============================================================================
// Sentences and Tokens
// ============================================================================

/// A single token as produced by the annotation service, with its index
/// converted to 0-based at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Surface word
    pub word: String,

    /// Lemma
    pub lemma: String,

    /// Part-of-speech tag
    pub pos: String,

    /// NER label; `None` for tokens outside any entity
    pub ner: Option<EntityLabel>,

    /// Character offsets into the cleaned document text
    pub span: CharSpan,

    /// 0-based position within the sentence
    pub index: usize,
}

/// A sentence: its 0-based index within the document and its tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub index: usize,
    pub tokens: Vec<Token>,
}

impl Sentence {
    /// Surface text reconstructed by joining token words with spaces. Used
    /// as the excerpt field on relation index records.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// Entities and Relations
// ============================================================================

/// A merged entity span covering one or more tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub label: EntityLabel,

    /// Surface text as it appears in the document
    pub text: String,

    /// Canonical (normalized) name used as a join key
    pub canonical_text: String,

    /// Character span in the cleaned document text
    pub span: CharSpan,

    /// Index of the containing sentence
    pub sentence: usize,

    /// Sentence-local token span
    pub tokens: TokenSpan,
}

impl Entity {
    /// Stable entity id within a document: `{label}_{begin}_{end}` with the
    /// label lowercased and offsets taken from the character span.
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.label.as_str().to_lowercase(),
            self.span.begin,
            self.span.end
        )
    }

    /// Derived copy with the label generalized for relation inference.
    /// The original entity is left untouched since both labelings may be
    /// needed downstream.
    pub fn generalized(&self) -> Entity {
        Entity {
            label: self.label.generalized(),
            ..self.clone()
        }
    }
}

/// The relation label. Only containment is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationLabel {
    Contains,
}

impl RelationLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
        }
    }
}

impl std::fmt::Display for RelationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed containment relation between two entities of the same
/// document. Entities are referenced by id, never owned; endpoints must
/// resolve through [`Document::entity_map`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub label: RelationLabel,

    /// Id of the containing (target) entity
    pub target_id: String,

    /// Id of the contained (component) entity
    pub containee_id: String,

    /// Index of the sentence the relation was inferred from
    pub sentence: usize,

    /// Tag naming the linking strategy that produced this relation
    pub source: String,
}

// ============================================================================
// Documents
// ============================================================================

/// A metadata value from the conversion service: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    One(String),
    Many(Vec<String>),
}

impl MetadataValue {
    /// First value, regardless of arity.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s.as_str()),
            Self::Many(v) => v.first().map(String::as_str),
        }
    }

    /// Whether any value equals `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Self::One(s) => s == needle,
            Self::Many(v) => v.iter().any(|s| s == needle),
        }
    }
}

/// Bibliographic and format metadata attached to a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub content_type: String,

    pub title: Option<String>,
    pub primary_author: Option<String>,
    pub authors: Vec<String>,
    pub affiliations: Vec<String>,
    pub venue: Option<String>,
    pub year: Option<String>,
    pub date: Option<String>,

    /// Remaining conversion-service metadata, keyed by normalized name
    pub extra: HashMap<String, MetadataValue>,
}

/// A bibliographic reference extracted from the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Bracket number keying the reference
    pub number: u32,

    /// Full reference text, including the bracket marker
    pub text: String,
}

/// A fully processed document: the unit of pipeline work and of JSON-lines
/// output. Each stage appends its derived fields; the document is treated as
/// immutable once indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable document id derived from the source path
    pub id: String,

    /// Path of the source file
    pub source_path: String,

    pub metadata: DocumentMetadata,

    /// Text as returned by the conversion service
    pub raw_text: String,

    /// Cleaned text; all entity offsets point into this
    pub cleaned_text: String,

    pub references: Vec<Reference>,
    pub sentences: Vec<Sentence>,
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl Document {
    /// Id-to-entity lookup for resolving relation endpoints.
    pub fn entity_map(&self) -> HashMap<String, &Entity> {
        self.entities.iter().map(|e| (e.id(), e)).collect()
    }

    /// Resolve an entity id, or fail with a data-integrity error: a
    /// dangling endpoint means the extractor and linker disagree about the
    /// entity set.
    pub fn resolve_entity(&self, id: &str) -> Result<&Entity> {
        self.entities
            .iter()
            .find(|e| e.id() == id)
            .ok_or_else(|| {
                LithosError::DataIntegrity(format!(
                    "relation endpoint {id} does not resolve in document {}",
                    self.id
                ))
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(label: EntityLabel, begin: usize, end: usize) -> Entity {
        Entity {
            label,
            text: "x".to_string(),
            canonical_text: "X".to_string(),
            span: CharSpan::new(begin, end),
            sentence: 0,
            tokens: TokenSpan::new(0, 1),
        }
    }

    #[test]
    fn test_entity_id_format() {
        let e = entity(EntityLabel::Target, 12, 19);
        assert_eq!(e.id(), "target_12_19");
    }

    #[test]
    fn test_label_generalization() {
        assert_eq!(EntityLabel::Element.generalized(), EntityLabel::Component);
        assert_eq!(EntityLabel::Mineral.generalized(), EntityLabel::Component);
        assert_eq!(EntityLabel::Target.generalized(), EntityLabel::Target);
    }

    #[test]
    fn test_generalized_entity_is_a_copy() {
        let e = entity(EntityLabel::Mineral, 3, 10);
        let g = e.generalized();
        assert_eq!(e.label, EntityLabel::Mineral);
        assert_eq!(g.label, EntityLabel::Component);
        assert_eq!(g.span, e.span);
    }

    #[test]
    fn test_service_label_mapping() {
        assert_eq!(
            EntityLabel::from_service_label("Target"),
            Some(EntityLabel::Target)
        );
        assert_eq!(EntityLabel::from_service_label("O"), None);
        assert_eq!(EntityLabel::from_service_label("PERSON"), None);
    }

    #[test]
    fn test_resolve_entity() {
        let e = entity(EntityLabel::Target, 0, 4);
        let id = e.id();
        let doc = Document {
            id: "lpsc_2015_1681".to_string(),
            source_path: "lpsc/2015/1681.pdf".to_string(),
            metadata: DocumentMetadata::default(),
            raw_text: String::new(),
            cleaned_text: String::new(),
            references: Vec::new(),
            sentences: Vec::new(),
            entities: vec![e],
            relations: Vec::new(),
        };

        assert!(doc.resolve_entity(&id).is_ok());
        let err = doc.resolve_entity("mineral_9_12").unwrap_err();
        assert!(matches!(err, LithosError::DataIntegrity(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_taxonomy() {
        assert!(LithosError::service("annotation", "connection refused").is_recoverable());
        assert!(LithosError::MalformedDocument("no content type".into()).is_recoverable());
        assert!(!LithosError::DataIntegrity("dup id".into()).is_recoverable());
    }

    #[test]
    fn test_metadata_value() {
        let one = MetadataValue::One("application/pdf".into());
        let many = MetadataValue::Many(vec!["text/plain".into(), "application/pdf".into()]);
        assert!(one.contains("application/pdf"));
        assert!(many.contains("application/pdf"));
        assert_eq!(many.first(), Some("text/plain"));
    }

    #[test]
    fn test_sentence_text() {
        let s = Sentence {
            index: 0,
            tokens: vec![
                Token {
                    word: "Gale".into(),
                    lemma: "Gale".into(),
                    pos: "NNP".into(),
                    ner: Some(EntityLabel::Target),
                    span: CharSpan::new(0, 4),
                    index: 0,
                },
                Token {
                    word: "contains".into(),
                    lemma: "contain".into(),
                    pos: "VBZ".into(),
                    ner: None,
                    span: CharSpan::new(5, 13),
                    index: 1,
                },
            ],
        };
        assert_eq!(s.text(), "Gale contains");
    }
}

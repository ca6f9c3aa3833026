//! Flattening a processed document into index records.
//!
//! One parent record (depth 0) carries the document's cleaned text and
//! bibliographic fields; each entity and relation becomes a depth-1 child
//! with a synthetic id under the parent's id. Relation children
//! denormalize both endpoints' ids and canonical names so the index can be
//! queried without joins.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use lithos_core::{Document, LithosError, Result};

use crate::{DocRecord, EntityRecord, IndexRecord, RelationRecord};

/// Source paths shaped `.../{venue}/{year}/{name}.pdf` yield stable ids.
static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-z][a-z0-9-]*)[/\\]((?:19|20)[0-9]{2})[/\\]([a-z0-9_-]+)\.(?:pdf|txt)$")
        .unwrap()
});

/// Derive a stable document id from a source path: `{venue}_{year}_{name}`
/// when the path matches the venue/year layout, otherwise the file stem.
pub fn document_id(path: &str) -> String {
    if let Some(caps) = PATH_PATTERN.captures(path) {
        return format!(
            "{}_{}_{}",
            caps[1].to_lowercase(),
            &caps[2],
            caps[3].to_lowercase()
        );
    }
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| path.to_lowercase())
}

/// Primary-author heuristic: the first maximal run of words with two or
/// more alphabetic characters (initials break the run), title-cased.
pub fn primary_author(author_line: &str) -> Option<String> {
    let mut run: Vec<String> = Vec::new();
    for word in author_line.split_whitespace() {
        let stripped: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if stripped.chars().count() >= 2 {
            run.push(title_word(&stripped));
        } else if !run.is_empty() {
            break;
        }
    }
    if run.is_empty() {
        None
    } else {
        Some(run.join(" "))
    }
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Builds the flattened record set for one document.
#[derive(Debug, Default)]
pub struct AnnotationIndexBuilder;

impl AnnotationIndexBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Flatten a document into its parent record followed by entity and
    /// relation children.
    ///
    /// Child ids must be unique within the document; a duplicate entity id
    /// means two entities share a label and exact offsets, which the
    /// extractor's dedup is supposed to prevent.
    pub fn flatten(&self, doc: &Document) -> Result<Vec<IndexRecord>> {
        let mut records = Vec::with_capacity(1 + doc.entities.len() + doc.relations.len());
        records.push(IndexRecord::Doc(self.doc_record(doc)));

        let mut seen_ids = HashSet::new();
        for entity in &doc.entities {
            let id = format!("{}_{}", doc.id, entity.id());
            if !seen_ids.insert(id.clone()) {
                return Err(LithosError::DataIntegrity(format!(
                    "duplicate entity record id {id}"
                )));
            }
            records.push(IndexRecord::Entity(EntityRecord {
                id,
                p_id: doc.id.clone(),
                depth: 1,
                label: entity.label.as_str().to_string(),
                name: entity.text.clone(),
                canonical_name: entity.canonical_text.clone(),
                span_begin: entity.span.begin,
                span_end: entity.span.end,
                sentence: entity.sentence,
            }));
        }

        for (index, relation) in doc.relations.iter().enumerate() {
            let target = doc.resolve_entity(&relation.target_id)?;
            let containee = doc.resolve_entity(&relation.containee_id)?;
            let sentence = doc.sentences.get(relation.sentence).ok_or_else(|| {
                LithosError::DataIntegrity(format!(
                    "relation references missing sentence {} in {}",
                    relation.sentence, doc.id
                ))
            })?;

            records.push(IndexRecord::Relation(RelationRecord {
                id: format!("{}_{}_{}", doc.id, relation.label, index),
                p_id: doc.id.clone(),
                depth: 1,
                label: relation.label.as_str().to_string(),
                target_ids: vec![format!("{}_{}", doc.id, relation.target_id)],
                target_names: vec![target.canonical_text.clone()],
                cont_ids: vec![format!("{}_{}", doc.id, relation.containee_id)],
                cont_names: vec![containee.canonical_text.clone()],
                excerpt: sentence.text(),
                sentence: relation.sentence,
                source: relation.source.clone(),
            }));
        }

        Ok(records)
    }

    fn doc_record(&self, doc: &Document) -> DocRecord {
        let md = &doc.metadata;
        let (main_type, sub_type) = split_content_type(&md.content_type);

        let primary = md.primary_author.clone().or_else(|| {
            let joined = md.authors.join(" and ");
            primary_author(&joined)
        });

        DocRecord {
            id: doc.id.clone(),
            depth: 0,
            venue: md.venue.clone(),
            year: md.year.clone(),
            title: md.title.clone(),
            primary_author: primary,
            authors: md.authors.clone(),
            affiliations: md.affiliations.clone(),
            content: doc.cleaned_text.clone(),
            content_type: md.content_type.clone(),
            main_type,
            sub_type,
            references: doc.references.iter().map(|r| r.text.clone()).collect(),
            extra: md.extra.clone(),
        }
    }
}

/// Split "application/pdf" into ("application", "pdf").
fn split_content_type(content_type: &str) -> (String, String) {
    match content_type.split_once('/') {
        Some((main, sub)) => (main.to_string(), sub.to_string()),
        None => (content_type.to_string(), String::new()),
    }
}

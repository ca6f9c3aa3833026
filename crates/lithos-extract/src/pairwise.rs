//! Pairwise classifier relation mode.
//!
//! Every (target token, element-or-mineral token) combination within a
//! sentence becomes one feature record; the external classifier labels each
//! pair. Only the target-contains-component direction (label 1.0) is kept,
//! since the index schema has no place for the reverse. Adjacent pairs that
//! share a component and whose target tokens are consecutive are merged
//! into one relation over the concatenated target span, mirroring the
//! entity extractor's merge but applied post-hoc to relation records.

use std::collections::BTreeMap;

use lithos_core::{
    Entity, EntityLabel, LithosError, Relation, RelationLabel, Result, Sentence, TokenSpan,
};

use crate::classifier::{encode_pair_record, ContainsClassifier};

/// Source tag on relations produced by this mode.
pub const PAIRWISE_SOURCE: &str = "pairwise";

#[derive(Debug, Clone, Copy)]
struct PairCandidate {
    sentence: usize,
    target_token: usize,
    component_token: usize,
}

/// Relation linker driven by the pairwise classifier.
pub struct PairwiseLinker<C: ContainsClassifier> {
    classifier: C,
}

impl<C: ContainsClassifier> PairwiseLinker<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    /// Form relations for one document.
    ///
    /// A failed classifier invocation yields an empty relation set, not an
    /// error: the document is still emitted with its entities intact.
    pub fn link(&self, sentences: &[Sentence], entities: &[Entity]) -> Result<Vec<Relation>> {
        let (records, candidates) = build_records(sentences);
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let labels = match self.classifier.predict(&records) {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!(error = %e, "pairwise classifier failed; no relations for this document");
                return Ok(Vec::new());
            }
        };

        let positive: Vec<PairCandidate> = candidates
            .into_iter()
            .zip(labels)
            .filter(|(_, label)| (*label - 1.0).abs() < f32::EPSILON)
            .map(|(cand, _)| cand)
            .collect();

        let merged = merge_adjacent_targets(positive);
        resolve_relations(&merged, entities)
    }
}

/// Build one record per target x component token pair, per sentence.
/// Element and mineral pairings are batched under separate record-id
/// prefixes.
fn build_records(sentences: &[Sentence]) -> (Vec<String>, Vec<PairCandidate>) {
    let mut records = Vec::new();
    let mut candidates = Vec::new();

    for sentence in sentences {
        let targets: Vec<usize> = token_indices(sentence, EntityLabel::Target);
        let elements: Vec<usize> = token_indices(sentence, EntityLabel::Element);
        let minerals: Vec<usize> = token_indices(sentence, EntityLabel::Mineral);

        if targets.is_empty() || (elements.is_empty() && minerals.is_empty()) {
            continue;
        }

        for (prefix, components) in [("te", &elements), ("tm", &minerals)] {
            for (pair_idx, (target, component)) in targets
                .iter()
                .flat_map(|t| components.iter().map(move |c| (*t, *c)))
                .enumerate()
            {
                let record_id = format!("{prefix}_{}_{pair_idx}", sentence.index);
                records.push(encode_pair_record(&record_id, 0, sentence, target, component));
                candidates.push(PairCandidate {
                    sentence: sentence.index,
                    target_token: target,
                    component_token: component,
                });
            }
        }
    }

    (records, candidates)
}

fn token_indices(sentence: &Sentence, label: EntityLabel) -> Vec<usize> {
    sentence
        .tokens
        .iter()
        .filter(|t| t.ner == Some(label))
        .map(|t| t.index)
        .collect()
}

/// A positive pair after merging: a target token span and a component
/// token span within one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MergedPair {
    sentence: usize,
    target: TokenSpan,
    component: TokenSpan,
}

/// Merge positive pairs that share a component and whose target tokens are
/// consecutive into a single pair covering the run.
fn merge_adjacent_targets(positive: Vec<PairCandidate>) -> Vec<MergedPair> {
    let mut by_component: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    for p in &positive {
        by_component
            .entry((p.sentence, p.component_token))
            .or_default()
            .push(p.target_token);
    }

    let mut merged = Vec::new();
    for ((sentence, component_token), mut target_tokens) in by_component {
        target_tokens.sort_unstable();
        target_tokens.dedup();

        let mut run_start = target_tokens[0];
        let mut run_end = target_tokens[0] + 1;
        for &t in &target_tokens[1..] {
            if t == run_end {
                run_end = t + 1;
            } else {
                merged.push(MergedPair {
                    sentence,
                    target: TokenSpan::new(run_start, run_end),
                    component: TokenSpan::new(component_token, component_token + 1),
                });
                run_start = t;
                run_end = t + 1;
            }
        }
        merged.push(MergedPair {
            sentence,
            target: TokenSpan::new(run_start, run_end),
            component: TokenSpan::new(component_token, component_token + 1),
        });
    }
    merged
}

/// Resolve merged token spans to entities from the document set and emit
/// relations. A span with no covering entity is a broken contract between
/// the extractor and this linker.
fn resolve_relations(pairs: &[MergedPair], entities: &[Entity]) -> Result<Vec<Relation>> {
    let mut relations = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for pair in pairs {
        let target = covering_entity(entities, pair.sentence, pair.target, |l| {
            l == EntityLabel::Target
        })
        .ok_or_else(|| {
            LithosError::DataIntegrity(format!(
                "no target entity covers tokens {}..{} in sentence {}",
                pair.target.begin, pair.target.end, pair.sentence
            ))
        })?;

        let component = covering_entity(entities, pair.sentence, pair.component, |l| {
            l.is_component_kind()
        })
        .ok_or_else(|| {
            LithosError::DataIntegrity(format!(
                "no component entity covers token {} in sentence {}",
                pair.component.begin, pair.sentence
            ))
        })?;

        if seen.insert((target.id(), component.id())) {
            relations.push(Relation {
                label: RelationLabel::Contains,
                target_id: target.id(),
                containee_id: component.id(),
                sentence: pair.sentence,
                source: PAIRWISE_SOURCE.to_string(),
            });
        }
    }
    Ok(relations)
}

/// The narrowest entity of the accepted label kind covering `span`. Ties on
/// width fall to the more specific label (Element/Mineral before
/// Component).
fn covering_entity<'a>(
    entities: &'a [Entity],
    sentence: usize,
    span: TokenSpan,
    accept: impl Fn(EntityLabel) -> bool,
) -> Option<&'a Entity> {
    entities
        .iter()
        .filter(|e| e.sentence == sentence && accept(e.label) && e.tokens.contains(&span))
        .min_by_key(|e| {
            let width = e.tokens.end - e.tokens.begin;
            let specificity = if e.label == EntityLabel::Component { 1 } else { 0 };
            (width, specificity)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_core::{CharSpan, Token};

    struct StaticClassifier {
        labels: Vec<f32>,
    }

    impl ContainsClassifier for StaticClassifier {
        fn predict(&self, records: &[String]) -> Result<Vec<f32>> {
            assert_eq!(records.len(), self.labels.len());
            Ok(self.labels.clone())
        }
    }

    struct FailingClassifier;

    impl ContainsClassifier for FailingClassifier {
        fn predict(&self, _records: &[String]) -> Result<Vec<f32>> {
            Err(LithosError::service("classifier", "process unavailable"))
        }
    }

    fn token(word: &str, ner: Option<EntityLabel>, idx: usize) -> Token {
        Token {
            word: word.to_string(),
            lemma: word.to_lowercase(),
            pos: "NN".to_string(),
            ner,
            span: CharSpan::new(idx * 10, idx * 10 + word.len()),
            index: idx,
        }
    }

    fn entity(label: EntityLabel, sentence: usize, toks: TokenSpan) -> Entity {
        Entity {
            label,
            text: format!("{label}@{}", toks.begin),
            canonical_text: format!("{label}@{}", toks.begin),
            span: CharSpan::new(toks.begin * 10, toks.end * 10),
            sentence,
            tokens: toks,
        }
    }

    /// "Gale Crater contains hematite" with a two-token target.
    fn sample() -> (Vec<Sentence>, Vec<Entity>) {
        let sentences = vec![Sentence {
            index: 0,
            tokens: vec![
                token("Gale", Some(EntityLabel::Target), 0),
                token("Crater", Some(EntityLabel::Target), 1),
                token("contains", None, 2),
                token("hematite", Some(EntityLabel::Mineral), 3),
            ],
        }];
        let entities = vec![
            entity(EntityLabel::Target, 0, TokenSpan::new(0, 2)),
            entity(EntityLabel::Mineral, 0, TokenSpan::new(3, 4)),
        ];
        (sentences, entities)
    }

    #[test]
    fn test_only_forward_direction_kept() {
        let (sentences, entities) = sample();
        // Pairs: (Gale, hematite) and (Crater, hematite).
        let linker = PairwiseLinker::new(StaticClassifier {
            labels: vec![0.0, 2.0],
        });
        let rels = linker.link(&sentences, &entities).unwrap();
        assert!(rels.is_empty());
    }

    #[test]
    fn test_adjacent_targets_merge_into_one_relation() {
        let (sentences, entities) = sample();
        let linker = PairwiseLinker::new(StaticClassifier {
            labels: vec![1.0, 1.0],
        });
        let rels = linker.link(&sentences, &entities).unwrap();

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target_id, entities[0].id());
        assert_eq!(rels[0].containee_id, entities[1].id());
        assert_eq!(rels[0].source, "pairwise");
        assert_eq!(rels[0].label, RelationLabel::Contains);
    }

    #[test]
    fn test_classifier_failure_yields_empty_set() {
        let (sentences, entities) = sample();
        let linker = PairwiseLinker::new(FailingClassifier);
        let rels = linker.link(&sentences, &entities).unwrap();
        assert!(rels.is_empty());
    }

    #[test]
    fn test_sentence_without_both_kinds_is_skipped() {
        let sentences = vec![Sentence {
            index: 0,
            tokens: vec![
                token("Windjana", Some(EntityLabel::Target), 0),
                token("sampled", None, 1),
            ],
        }];
        let linker = PairwiseLinker::new(StaticClassifier { labels: vec![] });
        let rels = linker.link(&sentences, &[]).unwrap();
        assert!(rels.is_empty());
    }

    #[test]
    fn test_unresolvable_span_is_data_integrity_error() {
        let (sentences, _) = sample();
        // Entity set missing the target entity.
        let entities = vec![entity(EntityLabel::Mineral, 0, TokenSpan::new(3, 4))];
        let linker = PairwiseLinker::new(StaticClassifier {
            labels: vec![1.0, 0.0],
        });
        let err = linker.link(&sentences, &entities).unwrap_err();
        assert!(matches!(err, LithosError::DataIntegrity(_)));
    }

    #[test]
    fn test_covering_entity_prefers_specific_label() {
        let entities = vec![
            entity(EntityLabel::Component, 0, TokenSpan::new(3, 4)),
            entity(EntityLabel::Mineral, 0, TokenSpan::new(3, 4)),
        ];
        let chosen = covering_entity(&entities, 0, TokenSpan::new(3, 4), |l| {
            l.is_component_kind()
        })
        .unwrap();
        assert_eq!(chosen.label, EntityLabel::Mineral);
    }

    #[test]
    fn test_record_and_candidate_counts_match() {
        let (sentences, _) = sample();
        let (records, candidates) = build_records(&sentences);
        assert_eq!(records.len(), 2);
        assert_eq!(candidates.len(), 2);
        assert!(records[0].starts_with("0\ttm_0_0\t"));
    }
}

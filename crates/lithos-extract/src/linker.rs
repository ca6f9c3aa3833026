//! Nearest-neighbor relation linking.
//!
//! Entities carry a classifier-predicted flag saying whether they
//! participate in a contains relation. Within each sentence, a qualifying
//! entity on one side is linked to the closest entity on the other side by
//! word distance. The two directions break distance ties differently:
//! linking toward targets prefers the earlier candidate, linking toward
//! components prefers the later one. Containers tend to be named before
//! their contents in this literature, and the asymmetry reflects that.

use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use lithos_core::{
    ConfigError, Entity, LithosError, Relation, RelationLabel, Result, Sentence, TokenSpan,
};

use crate::classifier::{encode_span_record, ContainsClassifier};

/// Strategy for forming contains relations from flagged entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    /// Each container links to its closest containee instance
    ClosestContainee,
    /// Each containee links to its closest container instance
    ClosestContainer,
    /// Each container links to its closest component instance
    ClosestComponent,
    /// Each containee links to its closest target instance
    ClosestTarget,
    /// Union of closest_containee and closest_container
    ClosestContainerClosestContainee,
    /// Union of closest_component and closest_target
    ClosestTargetClosestComponent,
}

impl LinkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClosestContainee => "closest_containee",
            Self::ClosestContainer => "closest_container",
            Self::ClosestComponent => "closest_component",
            Self::ClosestTarget => "closest_target",
            Self::ClosestContainerClosestContainee => "closest_container_closest_containee",
            Self::ClosestTargetClosestComponent => "closest_target_closest_component",
        }
    }
}

impl std::fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LinkMethod {
    type Err = LithosError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "closest_containee" => Ok(Self::ClosestContainee),
            "closest_container" => Ok(Self::ClosestContainer),
            "closest_component" => Ok(Self::ClosestComponent),
            "closest_target" => Ok(Self::ClosestTarget),
            "closest_container_closest_containee" => Ok(Self::ClosestContainerClosestContainee),
            "closest_target_closest_component" => Ok(Self::ClosestTargetClosestComponent),
            _ => Err(ConfigError::InvalidValue {
                key: "link_method".to_string(),
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// An entity plus its predicted participates-in-contains flag.
#[derive(Debug, Clone)]
pub struct LinkCandidate {
    pub entity: Entity,
    pub predicted_contains: bool,
}

/// Word distance between two token spans: the minimum absolute difference
/// over all pairs of their span endpoints.
fn word_distance(a: TokenSpan, b: TokenSpan) -> usize {
    [a.begin, a.end]
        .into_iter()
        .flat_map(|x| [b.begin, b.end].into_iter().map(move |y| x.abs_diff(y)))
        .min()
        .expect("endpoint pairs are never empty")
}

/// Forms contains relations by nearest-neighbor matching.
#[derive(Debug, Default)]
pub struct RelationLinker;

impl RelationLinker {
    pub fn new() -> Self {
        Self
    }

    /// Link flagged targets and components into relations using `method`.
    /// Purely functional over the candidate set.
    pub fn link(
        &self,
        method: LinkMethod,
        targets: &[LinkCandidate],
        components: &[LinkCandidate],
    ) -> Vec<Relation> {
        let source = method.as_str();
        match method {
            LinkMethod::ClosestContainee => {
                self.closest_component_side(targets, components, true, source)
            }
            LinkMethod::ClosestComponent => {
                self.closest_component_side(targets, components, false, source)
            }
            LinkMethod::ClosestContainer => {
                self.closest_target_side(targets, components, true, source)
            }
            LinkMethod::ClosestTarget => {
                self.closest_target_side(targets, components, false, source)
            }
            LinkMethod::ClosestContainerClosestContainee => dedup_pairs(
                self.closest_component_side(targets, components, true, source)
                    .into_iter()
                    .chain(self.closest_target_side(targets, components, true, source)),
            ),
            LinkMethod::ClosestTargetClosestComponent => dedup_pairs(
                self.closest_component_side(targets, components, false, source)
                    .into_iter()
                    .chain(self.closest_target_side(targets, components, false, source)),
            ),
        }
    }

    /// For each flagged target, link to the closest component in the same
    /// sentence. When `require_component_flag` is set, only flagged
    /// components are candidates. Distance ties pick the later candidate.
    fn closest_component_side(
        &self,
        targets: &[LinkCandidate],
        components: &[LinkCandidate],
        require_component_flag: bool,
        source: &str,
    ) -> Vec<Relation> {
        let mut relations = Vec::new();
        for (_, (sent_targets, sent_components)) in group_by_sentence(targets, components) {
            for target in sent_targets.iter().filter(|t| t.predicted_contains) {
                let mut best: Option<(&LinkCandidate, usize)> = None;
                for component in sent_components.iter().copied() {
                    if require_component_flag && !component.predicted_contains {
                        continue;
                    }
                    let dist = word_distance(target.entity.tokens, component.entity.tokens);
                    let closer = match best {
                        None => true,
                        Some((_, best_dist)) if dist < best_dist => true,
                        Some((best_cand, best_dist)) if dist == best_dist => {
                            best_cand.entity.tokens.begin < component.entity.tokens.begin
                        }
                        _ => false,
                    };
                    if closer {
                        best = Some((component, dist));
                    }
                }
                if let Some((component, _)) = best {
                    relations.push(make_relation(&target.entity, &component.entity, source));
                }
            }
        }
        relations
    }

    /// For each flagged component, link to the closest target in the same
    /// sentence. When `require_target_flag` is set, only flagged targets
    /// are candidates. Distance ties pick the earlier candidate.
    fn closest_target_side(
        &self,
        targets: &[LinkCandidate],
        components: &[LinkCandidate],
        require_target_flag: bool,
        source: &str,
    ) -> Vec<Relation> {
        let mut relations = Vec::new();
        for (_, (sent_targets, sent_components)) in group_by_sentence(targets, components) {
            for component in sent_components.iter().filter(|c| c.predicted_contains) {
                let mut best: Option<(&LinkCandidate, usize)> = None;
                for target in sent_targets.iter().copied() {
                    if require_target_flag && !target.predicted_contains {
                        continue;
                    }
                    let dist = word_distance(component.entity.tokens, target.entity.tokens);
                    let closer = match best {
                        None => true,
                        Some((_, best_dist)) if dist < best_dist => true,
                        Some((best_cand, best_dist)) if dist == best_dist => {
                            best_cand.entity.tokens.begin > target.entity.tokens.begin
                        }
                        _ => false,
                    };
                    if closer {
                        best = Some((target, dist));
                    }
                }
                if let Some((target, _)) = best {
                    relations.push(make_relation(&target.entity, &component.entity, source));
                }
            }
        }
        relations
    }
}

fn make_relation(target: &Entity, component: &Entity, source: &str) -> Relation {
    Relation {
        label: RelationLabel::Contains,
        target_id: target.id(),
        containee_id: component.id(),
        sentence: target.sentence,
        source: source.to_string(),
    }
}

/// Group candidates by sentence index, deterministically ordered.
fn group_by_sentence<'a>(
    targets: &'a [LinkCandidate],
    components: &'a [LinkCandidate],
) -> BTreeMap<usize, (Vec<&'a LinkCandidate>, Vec<&'a LinkCandidate>)> {
    let mut map: BTreeMap<usize, (Vec<&LinkCandidate>, Vec<&LinkCandidate>)> = BTreeMap::new();
    for t in targets {
        map.entry(t.entity.sentence).or_default().0.push(t);
    }
    for c in components {
        map.entry(c.entity.sentence).or_default().1.push(c);
    }
    map
}

/// Drop duplicate (target, containee) pairs, keeping first occurrence.
fn dedup_pairs(relations: impl IntoIterator<Item = Relation>) -> Vec<Relation> {
    let mut seen = HashSet::new();
    relations
        .into_iter()
        .filter(|r| seen.insert((r.target_id.clone(), r.containee_id.clone())))
        .collect()
}

// ============================================================================
// Role tagging
// ============================================================================

/// Predicts the participates-in-contains flag for targets and components
/// using the two trained role models.
///
/// Only entities that co-occur with the opposite kind in the same sentence
/// are sent for inference; a sentence with only targets or only components
/// cannot produce a within-sentence relation, so its entities are flagged
/// false without a classifier call.
pub struct RoleTagger<C: ContainsClassifier> {
    container: C,
    containee: C,
}

impl<C: ContainsClassifier> RoleTagger<C> {
    pub fn new(container: C, containee: C) -> Self {
        Self {
            container,
            containee,
        }
    }

    /// Tag targets and components with predicted participation flags.
    pub fn tag(
        &self,
        sentences: &[Sentence],
        targets: Vec<Entity>,
        components: Vec<Entity>,
    ) -> Result<(Vec<LinkCandidate>, Vec<LinkCandidate>)> {
        let cooccurring: HashSet<usize> = {
            let target_sents: HashSet<usize> = targets.iter().map(|e| e.sentence).collect();
            components
                .iter()
                .map(|e| e.sentence)
                .filter(|s| target_sents.contains(s))
                .collect()
        };

        let tagged_targets = self.tag_side(&self.container, sentences, targets, &cooccurring)?;
        let tagged_components =
            self.tag_side(&self.containee, sentences, components, &cooccurring)?;

        tracing::info!(
            targets = tagged_targets.iter().filter(|c| c.predicted_contains).count(),
            components = tagged_components
                .iter()
                .filter(|c| c.predicted_contains)
                .count(),
            "role tagging complete"
        );

        Ok((tagged_targets, tagged_components))
    }

    fn tag_side(
        &self,
        model: &C,
        sentences: &[Sentence],
        entities: Vec<Entity>,
        cooccurring: &HashSet<usize>,
    ) -> Result<Vec<LinkCandidate>> {
        let mut records = Vec::new();
        let mut record_slots = Vec::new();

        for (i, entity) in entities.iter().enumerate() {
            if !cooccurring.contains(&entity.sentence) {
                continue;
            }
            let sentence = sentences.get(entity.sentence).ok_or_else(|| {
                LithosError::DataIntegrity(format!(
                    "entity {} references missing sentence {}",
                    entity.id(),
                    entity.sentence
                ))
            })?;
            records.push(encode_span_record(&entity.id(), 0, sentence, entity.tokens));
            record_slots.push(i);
        }

        let mut flags = vec![false; entities.len()];
        if !records.is_empty() {
            let labels = model.predict(&records)?;
            for (slot, label) in record_slots.into_iter().zip(labels) {
                flags[slot] = label > 0.0;
            }
        }

        Ok(entities
            .into_iter()
            .zip(flags)
            .map(|(entity, predicted_contains)| LinkCandidate {
                entity,
                predicted_contains,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_core::{CharSpan, EntityLabel};

    fn entity(label: EntityLabel, sentence: usize, tok_begin: usize, tok_end: usize) -> Entity {
        // Character offsets derived from token offsets; only uniqueness
        // matters for ids here.
        Entity {
            label,
            text: format!("e{tok_begin}"),
            canonical_text: format!("E{tok_begin}"),
            span: CharSpan::new(tok_begin * 10, tok_begin * 10 + 5),
            sentence,
            tokens: TokenSpan::new(tok_begin, tok_end),
        }
    }

    fn candidate(label: EntityLabel, tok_begin: usize, flagged: bool) -> LinkCandidate {
        LinkCandidate {
            entity: entity(label, 0, tok_begin, tok_begin + 1),
            predicted_contains: flagged,
        }
    }

    #[test]
    fn test_word_distance_uses_closest_endpoints() {
        assert_eq!(word_distance(TokenSpan::new(0, 2), TokenSpan::new(5, 6)), 3);
        assert_eq!(word_distance(TokenSpan::new(5, 6), TokenSpan::new(0, 2)), 3);
        assert_eq!(word_distance(TokenSpan::new(3, 4), TokenSpan::new(3, 4)), 0);
    }

    #[test]
    fn test_closest_containee_picks_nearest() {
        let linker = RelationLinker::new();
        let targets = vec![candidate(EntityLabel::Target, 5, true)];
        let components = vec![
            candidate(EntityLabel::Component, 0, true),
            candidate(EntityLabel::Component, 7, true),
        ];
        let rels = linker.link(LinkMethod::ClosestContainee, &targets, &components);

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].containee_id, components[1].entity.id());
        assert_eq!(rels[0].source, "closest_containee");
    }

    #[test]
    fn test_containee_tie_break_prefers_later() {
        let linker = RelationLinker::new();
        // Components at tokens 0 and 4 are equidistant from the target
        // span [2,3).
        let targets = vec![candidate(EntityLabel::Target, 2, true)];
        let components = vec![
            candidate(EntityLabel::Component, 0, true),
            candidate(EntityLabel::Component, 4, true),
        ];
        let rels = linker.link(LinkMethod::ClosestContainee, &targets, &components);

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].containee_id, components[1].entity.id());
    }

    #[test]
    fn test_container_tie_break_prefers_earlier() {
        let linker = RelationLinker::new();
        let targets = vec![
            candidate(EntityLabel::Target, 0, true),
            candidate(EntityLabel::Target, 4, true),
        ];
        let components = vec![candidate(EntityLabel::Component, 2, true)];
        let rels = linker.link(LinkMethod::ClosestContainer, &targets, &components);

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target_id, targets[0].entity.id());
    }

    #[test]
    fn test_containee_mode_requires_component_flag() {
        let linker = RelationLinker::new();
        let targets = vec![candidate(EntityLabel::Target, 0, true)];
        let components = vec![
            candidate(EntityLabel::Component, 1, false),
            candidate(EntityLabel::Component, 6, true),
        ];
        let rels = linker.link(LinkMethod::ClosestContainee, &targets, &components);

        // The nearer, unflagged component is not a candidate.
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].containee_id, components[1].entity.id());
    }

    #[test]
    fn test_component_mode_ignores_component_flag() {
        let linker = RelationLinker::new();
        let targets = vec![candidate(EntityLabel::Target, 0, true)];
        let components = vec![candidate(EntityLabel::Component, 1, false)];
        let rels = linker.link(LinkMethod::ClosestComponent, &targets, &components);

        assert_eq!(rels.len(), 1);
    }

    #[test]
    fn test_unflagged_anchor_produces_nothing() {
        let linker = RelationLinker::new();
        let targets = vec![candidate(EntityLabel::Target, 0, false)];
        let components = vec![candidate(EntityLabel::Component, 1, true)];
        assert!(linker
            .link(LinkMethod::ClosestContainee, &targets, &components)
            .is_empty());
    }

    #[test]
    fn test_union_dedups_pairs() {
        let linker = RelationLinker::new();
        // One flagged pair: both directions find the same relation.
        let targets = vec![candidate(EntityLabel::Target, 0, true)];
        let components = vec![candidate(EntityLabel::Component, 2, true)];
        let rels = linker.link(
            LinkMethod::ClosestContainerClosestContainee,
            &targets,
            &components,
        );

        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source, "closest_container_closest_containee");
    }

    #[test]
    fn test_no_cross_sentence_links() {
        let linker = RelationLinker::new();
        let targets = vec![LinkCandidate {
            entity: entity(EntityLabel::Target, 0, 0, 1),
            predicted_contains: true,
        }];
        let components = vec![LinkCandidate {
            entity: entity(EntityLabel::Component, 1, 0, 1),
            predicted_contains: true,
        }];
        assert!(linker
            .link(LinkMethod::ClosestContainee, &targets, &components)
            .is_empty());
    }

    #[test]
    fn test_method_parse_round_trip() {
        for method in [
            LinkMethod::ClosestContainee,
            LinkMethod::ClosestContainer,
            LinkMethod::ClosestComponent,
            LinkMethod::ClosestTarget,
            LinkMethod::ClosestContainerClosestContainee,
            LinkMethod::ClosestTargetClosestComponent,
        ] {
            assert_eq!(method.as_str().parse::<LinkMethod>().unwrap(), method);
        }
        assert!("nearest_thing".parse::<LinkMethod>().is_err());
    }
}

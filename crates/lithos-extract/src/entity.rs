//! Entity span extraction from per-token NER labels.
//!
//! Tokens are scanned in order and merged into multi-word spans: a token
//! whose label matches the pending span's label extends it, and a span
//! split by a bare "-" or "_" token is folded back together. With component
//! merging enabled, a second pass generalizes Mineral/Element to Component
//! so adjacent mineral and element tokens merge into one Component span;
//! the two passes are reconciled by span-offset dedup with the component
//! pass preferred. Merging adjacent same-label words loses the smaller
//! constituent entities ("Iron-Feldspar" hides "Iron" and "Feldspar" when
//! their spans coincide), which is accepted.

use std::collections::HashSet;
use std::sync::Arc;

use lithos_core::{
    canonical_component_name, canonical_target_name, CharSpan, Entity, EntityLabel, Lexicon,
    Sentence, TokenSpan,
};

/// A span being grown during the scan. `ner` is `None` for tokens outside
/// any entity; those stay in the queue because the joiner fold needs to see
/// them, and are dropped at the end.
#[derive(Debug, Clone)]
struct PendingSpan {
    ner: Option<EntityLabel>,
    text: String,
    span: CharSpan,
    tokens: TokenSpan,
}

/// Merges annotated tokens into entity spans.
pub struct EntityExtractor {
    lexicon: Arc<Lexicon>,
}

impl EntityExtractor {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Extract entities from the given sentences, in document order.
    ///
    /// With `merge_components` set, Mineral/Element spans are re-labeled
    /// Component and adjacent ones merge into single Component spans; the
    /// result may contain both a merged span and its surviving
    /// sub-spans when their offsets differ. No returned entity has an
    /// empty label.
    pub fn extract(&self, sentences: &[Sentence], merge_components: bool) -> Vec<Entity> {
        let mut entities = Vec::new();

        for sentence in sentences {
            let base = scan_sentence(sentence, false);

            let spans = if merge_components {
                let general = scan_sentence(sentence, true);
                // The base pass is generalized too, then appended after the
                // component pass so dedup prefers the component-pass span.
                let base = base.into_iter().map(|mut p| {
                    p.ner = p.ner.map(EntityLabel::generalized);
                    p
                });

                let mut seen: HashSet<(usize, usize)> = HashSet::new();
                let mut merged: Vec<PendingSpan> = Vec::new();
                for p in general.into_iter().chain(base) {
                    if seen.insert((p.span.begin, p.span.end)) {
                        merged.push(p);
                    }
                }
                merged.sort_by_key(|p| (p.span.begin, p.span.end));
                merged
            } else {
                base
            };

            for p in spans {
                let Some(label) = p.ner else { continue };
                entities.push(Entity {
                    label,
                    canonical_text: self.canonicalize(label, &p.text),
                    text: p.text,
                    span: p.span,
                    sentence: sentence.index,
                    tokens: p.tokens,
                });
            }
        }

        entities
    }

    fn canonicalize(&self, label: EntityLabel, text: &str) -> String {
        match label {
            EntityLabel::Target => canonical_target_name(&self.lexicon, text),
            EntityLabel::Element | EntityLabel::Mineral | EntityLabel::Component => {
                canonical_component_name(&self.lexicon, text)
            }
        }
    }
}

/// Scan one sentence's tokens into merged pending spans.
fn scan_sentence(sentence: &Sentence, generalize: bool) -> Vec<PendingSpan> {
    let mut queue: Vec<PendingSpan> = Vec::new();
    for (tokidx, token) in sentence.tokens.iter().enumerate() {
        let ner = token
            .ner
            .map(|l| if generalize { l.generalized() } else { l });
        push_merged(
            &mut queue,
            PendingSpan {
                ner,
                text: token.word.clone(),
                span: token.span,
                tokens: TokenSpan::new(tokidx, tokidx + 1),
            },
        );
    }
    queue
}

/// Append a token's span to the queue, merging where possible.
fn push_merged(queue: &mut Vec<PendingSpan>, e: PendingSpan) {
    if queue.is_empty() || e.ner.is_none() {
        queue.push(e);
        return;
    }

    let n = queue.len();
    if queue[n - 1].ner == e.ner {
        // Same label as the pending span: extend it.
        let last = &mut queue[n - 1];
        last.text.push(' ');
        last.text.push_str(&e.text);
        last.span.end = e.span.end;
        last.tokens.end = e.tokens.end;
    } else if n > 1
        && matches!(queue[n - 1].text.as_str(), "-" | "_")
        && queue[n - 2].ner == e.ner
    {
        // "Fe - rich": fold the joiner and this token back into the span
        // two entries back, without inserting spaces.
        let joiner = queue.pop().expect("queue has at least two entries");
        let host = queue.last_mut().expect("queue has at least one entry");
        host.text.push_str(&joiner.text);
        host.text.push_str(&e.text);
        host.span.end = e.span.end;
        host.tokens.end = e.tokens.end;
    } else {
        queue.push(e);
    }
}

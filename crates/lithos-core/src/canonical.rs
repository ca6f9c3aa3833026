//! Canonical-name resolution.
//!
//! Maps raw entity surface text to the normalized form used as the join key
//! across entities, relations, and index records. Element symbols expand to
//! full element names; target names go through the alias table; everything
//! is title-cased with separators collapsed.
//!
//! All functions here are pure over (text, lexicon) and perform no I/O.

use crate::lexicon::Lexicon;

/// A target annotation visible to alias resolution: its annotation id and
/// surface name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAnnotation {
    pub annotation_id: String,
    pub name: String,
}

/// An alias edge between two target annotations: `alias_id` names an alias
/// of the annotation `antecedent_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRelation {
    pub alias_id: String,
    pub antecedent_id: String,
}

/// Collapse runs of whitespace, hyphens, and underscores into single spaces.
fn collapse_separators(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_sep = false;
    for c in name.chars() {
        if c.is_whitespace() || c == '-' || c == '_' {
            in_sep = true;
        } else {
            if in_sep && !out.is_empty() {
                out.push(' ');
            }
            in_sep = false;
            out.push(c);
        }
    }
    out
}

/// Uppercase the first character of a word, lowercase the rest. Interior
/// punctuation is left alone so "Bear's" does not become "Bear'S".
fn capword(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Title-case each whitespace-delimited word.
fn title_case_words(s: &str) -> String {
    s.split_whitespace().map(capword).collect::<Vec<_>>().join(" ")
}

/// Generic normalization: collapse separators to spaces, title-case each
/// word, and join with underscores.
fn normalize(name: &str) -> String {
    title_case_words(&collapse_separators(name)).replace(' ', "_")
}

/// Canonical name for an element-like surface form.
///
/// Short strings (three characters or fewer) that title-case to a known
/// chemical symbol expand to the full element name ("Fe" -> "Iron");
/// everything else gets generic normalization.
pub fn canonical_element_name(lexicon: &Lexicon, name: &str) -> String {
    let collapsed = collapse_separators(name.trim());
    if collapsed.chars().count() <= 3 {
        let titled = title_case_words(&collapsed);
        if let Some(full) = lexicon.element(&titled) {
            return full.to_string();
        }
    }
    title_case_words(&collapsed).replace(' ', "_")
}

/// Canonical name for a component (element or mineral, possibly multi-word).
///
/// Hyphens and underscores become spaces, then each word is resolved as an
/// element-like form and the words are rejoined with spaces, so
/// "Fe-sulfate" becomes "Iron Sulfate".
pub fn canonical_component_name(lexicon: &Lexicon, name: &str) -> String {
    let spaced = name.replace(['-', '_'], " ");
    spaced
        .split_whitespace()
        .map(|w| canonical_element_name(lexicon, w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical name for a target: generic normalization followed by alias
/// table substitution ("Scooby" -> "Scooby_Doo").
pub fn canonical_target_name(lexicon: &Lexicon, name: &str) -> String {
    let canon = normalize(name.trim());
    match lexicon.target_alias(&canon) {
        Some(resolved) => resolved.to_string(),
        None => canon,
    }
}

/// Canonical name for a target, consulting a set of alias relations from a
/// prior annotation pass.
///
/// The entity's own id, and the ids of any other target annotation sharing
/// the identical surface text, are looked up among the alias relations. The
/// relations are scanned in slice order and the first match wins; its
/// antecedent's surface text replaces `name` before normalization.
pub fn canonical_target_name_with_aliases(
    lexicon: &Lexicon,
    name: &str,
    entity_id: &str,
    targets: &[TargetAnnotation],
    aliases: &[AliasRelation],
) -> String {
    let name = name.trim();

    let same_text_ids: Vec<&str> = targets
        .iter()
        .filter(|t| t.name == name)
        .map(|t| t.annotation_id.as_str())
        .collect();

    let antecedent = aliases
        .iter()
        .find(|a| a.alias_id == entity_id || same_text_ids.contains(&a.alias_id.as_str()))
        .and_then(|a| targets.iter().find(|t| t.annotation_id == a.antecedent_id));

    match antecedent {
        Some(t) => {
            tracing::debug!(alias = name, antecedent = %t.name, "resolved target alias");
            canonical_target_name(lexicon, &t.name)
        }
        None => canonical_target_name(lexicon, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex() -> Lexicon {
        Lexicon::builtin()
    }

    #[test]
    fn test_element_symbol_expansion() {
        assert_eq!(canonical_element_name(&lex(), "Fe"), "Iron");
        assert_eq!(canonical_element_name(&lex(), "fe"), "Iron");
        assert_eq!(canonical_element_name(&lex(), " K "), "Potassium");
    }

    #[test]
    fn test_element_generic_normalization() {
        assert_eq!(
            canonical_element_name(&lex(), "magnesium_sulfate"),
            "Magnesium_Sulfate"
        );
        assert_eq!(canonical_element_name(&lex(), "olivine"), "Olivine");
        assert_eq!(canonical_element_name(&lex(), "opaline  silica"), "Opaline_Silica");
    }

    #[test]
    fn test_element_idempotence() {
        for input in ["Fe", "magnesium_sulfate", "olivine", "Sn", "Tin"] {
            let once = canonical_element_name(&lex(), input);
            let twice = canonical_element_name(&lex(), &once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_component_multiword() {
        assert_eq!(canonical_component_name(&lex(), "Fe-sulfate"), "Iron Sulfate");
        assert_eq!(canonical_component_name(&lex(), "ca_mg carbonate"), "Calcium Magnesium Carbonate");
        assert_eq!(canonical_component_name(&lex(), "hematite"), "Hematite");
    }

    #[test]
    fn test_target_alias_table() {
        assert_eq!(canonical_target_name(&lex(), "scooby"), "Scooby_Doo");
        assert_eq!(canonical_target_name(&lex(), "gale crater"), "Gale_Crater");
        assert_eq!(canonical_target_name(&lex(), "bear's lodge"), "Bear's_Lodge");
    }

    #[test]
    fn test_target_alias_relations_first_match_wins() {
        let targets = vec![
            TargetAnnotation {
                annotation_id: "T1".into(),
                name: "Mt. Sharp".into(),
            },
            TargetAnnotation {
                annotation_id: "T2".into(),
                name: "Aeolis Mons".into(),
            },
            TargetAnnotation {
                annotation_id: "T3".into(),
                name: "Sharp".into(),
            },
        ];
        let aliases = vec![
            AliasRelation {
                alias_id: "T1".into(),
                antecedent_id: "T2".into(),
            },
            AliasRelation {
                alias_id: "T1".into(),
                antecedent_id: "T3".into(),
            },
        ];

        let canon = canonical_target_name_with_aliases(&lex(), "Mt. Sharp", "T1", &targets, &aliases);
        assert_eq!(canon, "Aeolis_Mons");
    }

    #[test]
    fn test_target_alias_relations_by_shared_text() {
        // T5 shares its surface text with T1, which carries the alias edge.
        let targets = vec![
            TargetAnnotation {
                annotation_id: "T1".into(),
                name: "Big Sky".into(),
            },
            TargetAnnotation {
                annotation_id: "T4".into(),
                name: "Big Sky Drill Site".into(),
            },
        ];
        let aliases = vec![AliasRelation {
            alias_id: "T1".into(),
            antecedent_id: "T4".into(),
        }];

        let canon =
            canonical_target_name_with_aliases(&lex(), "Big Sky", "T5", &targets, &aliases);
        assert_eq!(canon, "Big_Sky_Drill_Site");
    }

    #[test]
    fn test_target_no_alias_falls_through() {
        let canon = canonical_target_name_with_aliases(&lex(), "Windjana", "T9", &[], &[]);
        assert_eq!(canon, "Windjana");
    }

    proptest! {
        #[test]
        fn prop_element_canonicalization_idempotent(input in "[A-Za-z _-]{0,12}") {
            let lexicon = Lexicon::builtin();
            let once = canonical_element_name(&lexicon, &input);
            let twice = canonical_element_name(&lexicon, &once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_component_canonicalization_idempotent(input in "[A-Za-z _-]{0,16}") {
            let lexicon = Lexicon::builtin();
            let once = canonical_component_name(&lexicon, &input);
            let twice = canonical_component_name(&lexicon, &once);
            prop_assert_eq!(once, twice);
        }
    }
}

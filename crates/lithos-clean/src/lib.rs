//! Text cleaning for extracted document text.
//!
//! Turns the raw text returned by the document-conversion service into a
//! form the annotation service can work with: punctuation is normalized,
//! wrapped lines are joined, conference boilerplate is stripped, and the
//! reference block is moved to a side channel.
//!
//! Offset discipline: steps that run character-for-character (punctuation
//! translation, reference blanking) preserve character length exactly, so
//! offsets computed against the cleaned text stay valid. Line joining,
//! de-hyphenation, and boilerplate removal are not length-preserving; all
//! downstream offsets are therefore relative to the cleaned text, not the
//! raw file.

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use lithos_core::Reference;

/// Result of cleaning one document's raw text.
#[derive(Debug, Clone)]
pub struct CleanedText {
    /// Cleaned text; reference regions are blanked with equal-length spaces
    pub text: String,

    /// Extracted references, ordered by bracket number
    pub references: Vec<Reference>,
}

/// One-to-one punctuation substitutions. Each entry maps a single character
/// to a single character, so this table never changes text length.
const PUNCTUATION: &[(char, char)] = &[
    // single quotes
    ('\u{2018}', '\''),
    ('\u{2019}', '\''),
    // double quotes
    ('\u{201C}', '"'),
    ('\u{201D}', '"'),
    // hyphens
    ('\u{2010}', '-'),
    ('\u{2011}', '-'),
    ('\u{2012}', '-'),
    ('\u{2013}', '-'),
    // comma
    ('\u{FF0C}', ','),
    // space
    ('\u{00A0}', ' '),
    // bullets
    ('\u{2219}', '.'),
    ('\u{2022}', '.'),
];

static WRAPPED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s-])[\r\n]+([^\s])").unwrap());

static NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n]+").unwrap());

static PDF_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[0-9]{4}\.PDF").unwrap());

static CONFERENCE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[0-9]{2}.{2} Lunar and Planetary Science Conference \((19|20)[0-9]{2}\) ?")
        .unwrap()
});

static CONFERENCE_HEADER_ROMAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Lunar and Planetary Science [CDILVXM]+( \((19|20)[0-9]{2}\))? ?").unwrap()
});

static MAILTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"mailto:[^\s]+").unwrap());

static REF_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([0-9]+)\]").unwrap());

/// Section heading that terminates the reference block.
const REFERENCE_STOP: &str = "Acknowledg";

/// Cleans raw extracted text into annotation-ready form.
#[derive(Debug, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Run the full cleaning pipeline.
    pub fn normalize(&self, raw: &str) -> CleanedText {
        let text = self.translate_punctuation(raw);
        let text = self.join_wrapped_lines(&text);
        let text = self.strip_line_end_hyphens(&text);
        let text = self.strip_newlines(&text);
        let text = self.strip_boilerplate(&text);

        let spans = self.reference_spans(&text);

        let mut references: BTreeMap<u32, String> = BTreeMap::new();
        for (number, range) in &spans {
            // Same bracket number reused: the later match wins.
            references.insert(*number, text[range.clone()].to_string());
        }

        let text = blank_spans(&text, &spans);

        tracing::debug!(references = references.len(), "cleaned document text");

        CleanedText {
            text,
            references: references
                .into_iter()
                .map(|(number, text)| Reference { number, text })
                .collect(),
        }
    }

    /// Step 1: character-for-character punctuation normalization.
    pub fn translate_punctuation(&self, text: &str) -> String {
        text.chars()
            .map(|c| {
                PUNCTUATION
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| *to)
                    .unwrap_or(c)
            })
            .collect()
    }

    /// Step 2: a newline run separating two non-whitespace, non-hyphen
    /// characters marks a wrapped line; replace it with a single space.
    pub fn join_wrapped_lines(&self, text: &str) -> String {
        WRAPPED_LINE.replace_all(text, "$1 $2").into_owned()
    }

    /// Step 3: delete a hyphen that ends a line. The word was split across
    /// lines; the residual newline falls to the next step. Legitimate
    /// hyphenated compounds split at a line break ("Fe-\nrich") lose their
    /// hyphen here, a known limitation.
    pub fn strip_line_end_hyphens(&self, text: &str) -> String {
        text.replace("-\n", "\n")
    }

    /// Step 4: remove all remaining newlines.
    pub fn strip_newlines(&self, text: &str) -> String {
        NEWLINES.replace_all(text, "").into_owned()
    }

    /// Step 5: remove conference boilerplate and mailto links.
    pub fn strip_boilerplate(&self, text: &str) -> String {
        let text = PDF_TOKEN.replace_all(text, "");
        let text = CONFERENCE_HEADER.replace_all(&text, "");
        let text = CONFERENCE_HEADER_ROMAN.replace_all(&text, "");
        MAILTO.replace_all(&text, "").into_owned()
    }

    /// Step 6: locate numbered reference blocks.
    ///
    /// A reference runs from its `[N]` marker to the next marker, an
    /// "Acknowledg…" heading, or the end of text. Bracket contents that do
    /// not parse as a number are skipped silently.
    pub fn reference_spans(&self, text: &str) -> Vec<(u32, Range<usize>)> {
        let markers: Vec<(u32, usize)> = REF_MARKER
            .captures_iter(text)
            .filter_map(|caps| {
                let number: u32 = caps.get(1)?.as_str().parse().ok()?;
                Some((number, caps.get(0)?.start()))
            })
            .collect();

        let mut spans = Vec::with_capacity(markers.len());
        for (i, (number, start)) in markers.iter().enumerate() {
            let mut end = markers
                .get(i + 1)
                .map(|(_, next_start)| *next_start)
                .unwrap_or(text.len());
            if let Some(stop) = text[*start..end].find(REFERENCE_STOP) {
                end = start + stop;
            }
            spans.push((*number, *start..end));
        }
        spans
    }
}

/// Step 7: blank the given spans with spaces of identical character length,
/// preserving every other character's offset.
fn blank_spans(text: &str, spans: &[(u32, Range<usize>)]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }
    text.char_indices()
        .map(|(pos, c)| {
            if spans.iter().any(|(_, range)| range.contains(&pos)) {
                ' '
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_punctuation_translation() {
        let n = TextNormalizer::new();
        let raw = "\u{201C}Fe\u{2013}rich\u{201D} spots\u{00A0}\u{2022}";
        let cleaned = n.translate_punctuation(raw);
        assert_eq!(cleaned, "\"Fe-rich\" spots .");
    }

    #[test]
    fn test_punctuation_preserves_char_length() {
        let n = TextNormalizer::new();
        let raw = "a\u{2018}b\u{2019}c \u{2010}\u{2011}\u{2012}\u{2013} \u{FF0C}\u{2219}";
        assert_eq!(char_len(&n.translate_punctuation(raw)), char_len(raw));
    }

    #[test]
    fn test_join_wrapped_lines() {
        let n = TextNormalizer::new();
        assert_eq!(
            n.join_wrapped_lines("planetary\nscience"),
            "planetary science"
        );
        assert_eq!(n.join_wrapped_lines("one\r\n\r\ntwo"), "one two");
        // Trailing hyphen blocks the join; the de-hyphenation step owns it.
        assert_eq!(n.join_wrapped_lines("Fe-\nrich"), "Fe-\nrich");
        // Newline before whitespace is left alone.
        assert_eq!(n.join_wrapped_lines("end.\n  indent"), "end.\n  indent");
    }

    #[test]
    fn test_hyphenated_line_break_dehyphenates() {
        let n = TextNormalizer::new();
        let text = n.strip_line_end_hyphens("Fe-\nrich");
        let text = n.strip_newlines(&text);
        assert_eq!(text, "Ferich");
    }

    #[test]
    fn test_strip_newlines() {
        let n = TextNormalizer::new();
        assert_eq!(n.strip_newlines("a\n\r\nb\rc"), "abc");
    }

    #[test]
    fn test_boilerplate_removal() {
        let n = TextNormalizer::new();
        assert_eq!(n.strip_boilerplate("see 1234.PDF for details"), "see  for details");
        assert_eq!(
            n.strip_boilerplate("46th Lunar and Planetary Science Conference (2015) Abstract"),
            "Abstract"
        );
        assert_eq!(
            n.strip_boilerplate("Lunar and Planetary Science XXXIII (2002) Abstract"),
            "Abstract"
        );
        assert_eq!(
            n.strip_boilerplate("contact mailto:author@example.edu here"),
            "contact  here"
        );
    }

    #[test]
    fn test_reference_extraction_scenario() {
        let n = TextNormalizer::new();
        let cleaned = n.normalize("  The rock contains Ca.\n[1] Smith et al.\n");

        assert_eq!(cleaned.references.len(), 1);
        assert_eq!(cleaned.references[0].number, 1);
        assert_eq!(cleaned.references[0].text, "[1] Smith et al.");

        // The body stays at its original offsets; the reference region is
        // space-padded to identical length.
        assert_eq!(&cleaned.text[2..23], "The rock contains Ca.");
        assert!(cleaned.text[24..].chars().all(|c| c == ' '));
        assert_eq!(char_len(&cleaned.text), char_len("  The rock contains Ca. [1] Smith et al."));
    }

    #[test]
    fn test_reference_blanking_preserves_length() {
        let n = TextNormalizer::new();
        let text = "Results here. [1] First ref. [2] Second ref.";
        let spans = n.reference_spans(text);
        let blanked = blank_spans(text, &spans);
        assert_eq!(char_len(&blanked), char_len(text));
        assert!(blanked.starts_with("Results here. "));
    }

    #[test]
    fn test_reference_number_collision_later_wins() {
        let n = TextNormalizer::new();
        let cleaned = n.normalize("Body. [1] First entry. [1] Second entry.");
        assert_eq!(cleaned.references.len(), 1);
        assert_eq!(cleaned.references[0].text, "[1] Second entry.");
    }

    #[test]
    fn test_reference_stops_at_acknowledgments() {
        let n = TextNormalizer::new();
        let text = "Body. [1] Smith 2014. Acknowledgments: funded by X.";
        let spans = n.reference_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(&text[spans[0].1.clone()], "[1] Smith 2014. ");
    }

    #[test]
    fn test_malformed_bracket_numbers_skipped() {
        let n = TextNormalizer::new();
        // 99999999999 overflows u32 and is skipped, not an error.
        let spans = n.reference_spans("[99999999999] huge [2] fine");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].0, 2);
    }

    #[test]
    fn test_full_normalize_keeps_body() {
        let n = TextNormalizer::new();
        let raw = "44th Lunar and Planetary Science Conference (2013) 1681.PDF\n\
                   The Cumberland target con-\ntains hematite\nand Fe.\n";
        let cleaned = n.normalize(raw);
        assert!(cleaned.text.contains("The Cumberland target contains hematite and Fe."));
        assert!(!cleaned.text.contains("Lunar and Planetary"));
        assert!(!cleaned.text.contains('\n'));
    }
}

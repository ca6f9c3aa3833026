//! Annotation service client.
//!
//! Sends cleaned text to the sentence/token/NER annotation service and
//! converts its wire format into the typed core model. Conversion rules:
//! the service's 1-based token indices become 0-based, the "O" NER label
//! becomes `None`, and token offsets are validated (begin < end, monotonic
//! across the sentence) before anything downstream sees them.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use lithos_core::{CharSpan, ConfigError, EntityLabel, LithosError, Result, Sentence, Token};

const SERVICE: &str = "annotation";

/// Wire format of an annotated document.
#[derive(Debug, Deserialize)]
pub struct WireAnnotation {
    pub sentences: Vec<WireSentence>,
}

/// Wire format of a sentence.
#[derive(Debug, Deserialize)]
pub struct WireSentence {
    pub index: usize,
    pub tokens: Vec<WireToken>,
}

/// Wire format of a token. Offsets are character offsets into the text
/// that was sent; `index` is 1-based.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireToken {
    pub word: String,
    #[serde(default)]
    pub lemma: Option<String>,
    pub pos: String,
    pub ner: String,
    pub character_offset_begin: usize,
    pub character_offset_end: usize,
    pub index: usize,
    #[serde(default)]
    pub original_text: Option<String>,
}

/// HTTP client for the annotation service.
pub struct AnnotationClient {
    client: reqwest::Client,
    base_url: String,
    properties: String,
}

impl AnnotationClient {
    /// Create a client. A configured NER model path must exist; a missing
    /// model is a fatal configuration error.
    pub fn new(
        base_url: impl Into<String>,
        ner_model: Option<&Path>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut properties = serde_json::json!({
            "annotators": "tokenize,ssplit,lemma,pos,ner",
            "outputFormat": "json",
            "ner.useSUTime": false,
            "ner.applyNumericClassifiers": false,
        });
        if let Some(model) = ner_model {
            if !model.exists() {
                return Err(ConfigError::ModelNotFound(model.to_path_buf()).into());
            }
            properties["ner.model"] = serde_json::json!(model.display().to_string());
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LithosError::service(SERVICE, format!("client setup failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            properties: properties.to_string(),
        })
    }

    /// Annotate cleaned text into sentences with tokens and NER labels.
    pub async fn annotate(&self, text: &str) -> Result<Vec<Sentence>> {
        // The service strips leading whitespace, which would shift every
        // offset. Substituting a period for a leading whitespace character
        // keeps lengths identical.
        let text = match text.chars().next() {
            Some(first) if first.is_whitespace() => {
                let mut patched = String::with_capacity(text.len());
                patched.push('.');
                patched.push_str(&text[first.len_utf8()..]);
                patched
            }
            _ => text.to_string(),
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("properties", self.properties.as_str())])
            .body(text)
            .send()
            .await
            .map_err(|e| LithosError::service(SERVICE, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LithosError::service(
                SERVICE,
                format!("HTTP {}", response.status()),
            ));
        }

        let wire: WireAnnotation = response
            .json()
            .await
            .map_err(|e| LithosError::service(SERVICE, format!("invalid response: {e}")))?;

        let sentences = convert_sentences(wire)?;
        tracing::debug!(sentences = sentences.len(), "annotated text");
        Ok(sentences)
    }
}

/// Validate a wire annotation and convert it into core sentences.
pub fn convert_sentences(wire: WireAnnotation) -> Result<Vec<Sentence>> {
    let mut sentences = Vec::with_capacity(wire.sentences.len());
    for wire_sentence in wire.sentences {
        let mut tokens = Vec::with_capacity(wire_sentence.tokens.len());
        let mut prev_begin = 0usize;
        for wire_token in wire_sentence.tokens {
            if wire_token.character_offset_begin >= wire_token.character_offset_end {
                return Err(LithosError::MalformedDocument(format!(
                    "token {:?} has empty span {}..{}",
                    wire_token.word,
                    wire_token.character_offset_begin,
                    wire_token.character_offset_end
                )));
            }
            if wire_token.character_offset_begin < prev_begin {
                return Err(LithosError::MalformedDocument(format!(
                    "token offsets go backwards at {:?} in sentence {}",
                    wire_token.word, wire_sentence.index
                )));
            }
            if wire_token.index == 0 {
                return Err(LithosError::MalformedDocument(format!(
                    "token {:?} has index 0; the service indexes from 1",
                    wire_token.word
                )));
            }
            prev_begin = wire_token.character_offset_begin;

            tokens.push(Token {
                lemma: wire_token.lemma.unwrap_or_else(|| wire_token.word.clone()),
                ner: EntityLabel::from_service_label(&wire_token.ner),
                span: CharSpan::new(
                    wire_token.character_offset_begin,
                    wire_token.character_offset_end,
                ),
                index: wire_token.index - 1,
                pos: wire_token.pos,
                word: wire_token.word,
            });
        }
        sentences.push(Sentence {
            index: wire_sentence.index,
            tokens,
        });
    }
    Ok(sentences)
}

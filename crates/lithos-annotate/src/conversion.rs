//! Document-conversion service client.
//!
//! Sends a source file to the conversion service and returns the extracted
//! text plus the service's metadata map. Metadata values arrive as either a
//! single string or a list of strings depending on the field.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use lithos_core::{DocumentMetadata, LithosError, MetadataValue, Result};

const SERVICE: &str = "conversion";

/// Raw output of the conversion service for one file.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    /// Extracted text content
    pub content: String,

    /// Metadata map as returned by the service
    pub metadata: HashMap<String, MetadataValue>,
}

impl ConvertedDocument {
    /// Check that the document's content type matches `expected`.
    /// The content-type field may be single- or multi-valued.
    pub fn require_content_type(&self, expected: &str) -> Result<()> {
        match self.metadata.get("Content-Type") {
            Some(value) if value.contains(expected) => Ok(()),
            Some(value) => Err(LithosError::MalformedDocument(format!(
                "content type {:?} is not {expected}",
                value.first().unwrap_or("")
            ))),
            None => Err(LithosError::MalformedDocument(
                "missing Content-Type metadata".to_string(),
            )),
        }
    }
}

/// HTTP client for the conversion service.
pub struct ConversionClient {
    client: reqwest::Client,
    base_url: String,
}

impl ConversionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LithosError::service(SERVICE, format!("client setup failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Convert one file into text plus metadata.
    pub async fn convert(&self, path: &Path) -> Result<ConvertedDocument> {
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .client
            .put(format!("{}/rmeta/text", self.base_url))
            .header("Accept", "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| LithosError::service(SERVICE, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LithosError::service(
                SERVICE,
                format!("HTTP {} for {}", response.status(), path.display()),
            ));
        }

        let records: Vec<serde_json::Map<String, Value>> = response
            .json()
            .await
            .map_err(|e| LithosError::service(SERVICE, format!("invalid response: {e}")))?;

        let record = records.into_iter().next().ok_or_else(|| {
            LithosError::MalformedDocument(format!("empty conversion result for {}", path.display()))
        })?;

        let converted = parse_record(record);
        tracing::debug!(
            path = %path.display(),
            content_len = converted.content.len(),
            metadata_keys = converted.metadata.len(),
            "converted document"
        );
        Ok(converted)
    }
}

/// Split a wire record into content and typed metadata values. Non-string
/// values other than string lists are dropped.
fn parse_record(record: serde_json::Map<String, Value>) -> ConvertedDocument {
    let mut content = String::new();
    let mut metadata = HashMap::new();

    for (key, value) in record {
        if key == "X-TIKA:content" {
            if let Value::String(text) = value {
                content = text;
            }
            continue;
        }
        match value {
            Value::String(s) => {
                metadata.insert(key, MetadataValue::One(s));
            }
            Value::Array(items) => {
                let strings: Vec<String> = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                if !strings.is_empty() {
                    metadata.insert(key, MetadataValue::Many(strings));
                }
            }
            _ => {}
        }
    }

    ConvertedDocument { content, metadata }
}

/// Map the conversion-service metadata into the document metadata schema.
///
/// Bibliographic fields are pulled out under their known keys; everything
/// else lands in `extra` with normalized key names (lowercased, spaces
/// stripped).
pub fn document_metadata_from_map(map: &HashMap<String, MetadataValue>) -> Result<DocumentMetadata> {
    let content_type = map
        .get("Content-Type")
        .and_then(|v| v.first())
        .ok_or_else(|| {
            LithosError::MalformedDocument("missing Content-Type metadata".to_string())
        })?
        .to_string();

    let first_of = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| map.get(*k))
            .and_then(|v| v.first())
            .map(str::to_string)
    };
    let all_of = |keys: &[&str]| -> Vec<String> {
        keys.iter()
            .find_map(|k| map.get(*k))
            .map(|v| match v {
                MetadataValue::One(s) => vec![s.clone()],
                MetadataValue::Many(items) => items.clone(),
            })
            .unwrap_or_default()
    };

    let known = [
        "Content-Type",
        "title",
        "dc:title",
        "grobid:header_Title",
        "primary_author",
        "ads:primary_author",
        "author",
        "ads:author",
        "affiliation",
        "ads:affiliation",
        "pub_venue",
        "ads:pub_venue",
        "pub_year",
        "ads:pub_year",
        "pub_date",
        "ads:pub_date",
    ];

    let extra = map
        .iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.to_lowercase().replace(' ', ""), v.clone()))
        .collect();

    Ok(DocumentMetadata {
        content_type,
        title: first_of(&["title", "dc:title", "grobid:header_Title"]),
        primary_author: first_of(&["primary_author", "ads:primary_author"]),
        authors: all_of(&["author", "ads:author"]),
        affiliations: all_of(&["affiliation", "ads:affiliation"]),
        venue: first_of(&["pub_venue", "ads:pub_venue"]),
        year: first_of(&["pub_year", "ads:pub_year"]),
        date: first_of(&["pub_date", "ads:pub_date"]),
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> HashMap<String, MetadataValue> {
        let mut map = HashMap::new();
        map.insert(
            "Content-Type".to_string(),
            MetadataValue::One("application/pdf".to_string()),
        );
        map.insert(
            "grobid:header_Title".to_string(),
            MetadataValue::One("Mineralogy of Gale Crater".to_string()),
        );
        map.insert(
            "ads:author".to_string(),
            MetadataValue::Many(vec!["Smith, J.".to_string(), "Jones, T.".to_string()]),
        );
        map.insert(
            "ads:pub_year".to_string(),
            MetadataValue::One("2015".to_string()),
        );
        map.insert(
            "X-Parsed By".to_string(),
            MetadataValue::One("pdf".to_string()),
        );
        map
    }

    #[test]
    fn test_metadata_mapping() {
        let md = document_metadata_from_map(&sample_map()).unwrap();
        assert_eq!(md.content_type, "application/pdf");
        assert_eq!(md.title.as_deref(), Some("Mineralogy of Gale Crater"));
        assert_eq!(md.authors.len(), 2);
        assert_eq!(md.year.as_deref(), Some("2015"));
        // Unknown keys land in extra with normalized names.
        assert!(md.extra.contains_key("x-parsedby"));
    }

    #[test]
    fn test_missing_content_type_is_malformed() {
        let mut map = sample_map();
        map.remove("Content-Type");
        let err = document_metadata_from_map(&map).unwrap_err();
        assert!(matches!(err, LithosError::MalformedDocument(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_content_type_check_multivalued() {
        let mut metadata = HashMap::new();
        metadata.insert(
            "Content-Type".to_string(),
            MetadataValue::Many(vec![
                "text/plain".to_string(),
                "application/pdf".to_string(),
            ]),
        );
        let doc = ConvertedDocument {
            content: String::new(),
            metadata,
        };
        assert!(doc.require_content_type("application/pdf").is_ok());
        assert!(doc.require_content_type("image/png").is_err());
    }

    #[test]
    fn test_parse_record_splits_content_and_metadata() {
        let mut record = serde_json::Map::new();
        record.insert(
            "X-TIKA:content".to_string(),
            Value::String("body text".to_string()),
        );
        record.insert(
            "Content-Type".to_string(),
            Value::String("application/pdf".to_string()),
        );
        record.insert("pages".to_string(), Value::from(2));

        let doc = parse_record(record);
        assert_eq!(doc.content, "body text");
        assert!(doc.metadata.contains_key("Content-Type"));
        // Non-string values are dropped.
        assert!(!doc.metadata.contains_key("pages"));
    }
}

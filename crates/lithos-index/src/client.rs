//! Search-index HTTP client.
//!
//! Thin client over the index's JSON update and select endpoints: batch
//! posting with optional commit, lookup by id, and a child query used by
//! update-mode indexing. Batches are flushed whole; a failed flush aborts
//! the remaining batches and reports how many records made it.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use lithos_core::LithosError;

use crate::IndexRecord;

/// Index client errors.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index post failed after {flushed} records: {message}")]
    Flush { flushed: usize, message: String },

    #[error("index request failed: {0}")]
    Http(String),

    #[error("index client setup failed: {0}")]
    Setup(String),
}

impl From<IndexError> for LithosError {
    fn from(e: IndexError) -> Self {
        LithosError::service("index", e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    #[allow(dead_code)]
    num_found: u64,
    docs: Vec<IndexRecord>,
}

/// HTTP client for one index core.
pub struct IndexClient {
    client: reqwest::Client,
    update_url: String,
    query_url: String,
}

impl IndexClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Setup(e.to_string()))?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            update_url: format!("{base}/update/json"),
            query_url: format!("{base}/select"),
        })
    }

    /// Post one batch of records, optionally committing.
    pub async fn post(&self, records: &[IndexRecord], commit: bool) -> Result<(), IndexError> {
        let mut url = self.update_url.clone();
        if commit {
            url.push_str("?commit=true");
        }

        let response = self
            .client
            .post(&url)
            .json(records)
            .send()
            .await
            .map_err(|e| IndexError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndexError::Http(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    /// Post records in batches of `batch_size`. Returns the number of
    /// records flushed. The first failed flush aborts the remainder; the
    /// error carries the flushed count.
    pub async fn post_batched(
        &self,
        records: &[IndexRecord],
        batch_size: usize,
        commit: bool,
    ) -> Result<usize, IndexError> {
        let batch_size = batch_size.max(1);
        let mut flushed = 0;
        for (batch_number, batch) in records.chunks(batch_size).enumerate() {
            if let Err(e) = self.post(batch, commit).await {
                tracing::error!(batch = batch_number, flushed, error = %e, "index flush failed");
                return Err(IndexError::Flush {
                    flushed,
                    message: e.to_string(),
                });
            }
            flushed += batch.len();
            tracing::debug!(batch = batch_number, flushed, "index batch flushed");
        }
        Ok(flushed)
    }

    /// Fetch one record by id, or `None` when it is not indexed.
    pub async fn get(&self, id: &str) -> Result<Option<IndexRecord>, IndexError> {
        let body = self
            .select(&format!("id:\"{}\"", escape_query(id)), 1)
            .await?;
        Ok(body.docs.into_iter().next())
    }

    /// Fetch a parent record's children.
    pub async fn children(&self, parent_id: &str) -> Result<Vec<IndexRecord>, IndexError> {
        let body = self
            .select(&format!("p_id:\"{}\"", escape_query(parent_id)), 1000)
            .await?;
        Ok(body.docs)
    }

    async fn select(&self, query: &str, rows: usize) -> Result<SelectBody, IndexError> {
        let response = self
            .client
            .get(&self.query_url)
            .query(&[
                ("q", query),
                ("wt", "json"),
                ("rows", &rows.to_string()),
            ])
            .send()
            .await
            .map_err(|e| IndexError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IndexError::Http(format!("HTTP {}", response.status())));
        }

        let parsed: SelectResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Http(format!("invalid select response: {e}")))?;
        Ok(parsed.response)
    }
}

/// Escape characters with query syntax meaning inside a quoted term.
fn escape_query(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Merge freshly flattened records with what the index already holds for
/// the same parent id.
///
/// Prior children are kept and the new ones appended rather than replacing
/// them, and a prior non-empty text content field wins over the new one.
/// Everything else on the parent is last-write-wins.
pub async fn merge_with_existing(
    client: &IndexClient,
    mut records: Vec<IndexRecord>,
) -> Result<Vec<IndexRecord>, IndexError> {
    let parent_id = match records.first() {
        Some(IndexRecord::Doc(d)) => d.id.clone(),
        _ => return Ok(records),
    };

    let prior = match client.get(&parent_id).await? {
        Some(IndexRecord::Doc(d)) => d,
        _ => return Ok(records),
    };

    if !prior.content.is_empty() {
        if let Some(IndexRecord::Doc(parent)) = records.first_mut() {
            parent.content = prior.content;
        }
    }

    let prior_children = client.children(&parent_id).await?;
    tracing::info!(
        prior = prior_children.len(),
        new = records.len() - 1,
        "merging children with existing index records"
    );

    let mut merged = vec![records.remove(0)];
    merged.extend(prior_children);
    merged.extend(records);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_response_parsing() {
        let json = r#"{
            "response": {
                "numFound": 1,
                "docs": [{
                    "record_type": "doc",
                    "id": "lpsc_2015_1681",
                    "depth": 0,
                    "content": "text",
                    "content_type": "application/pdf",
                    "main_type": "application",
                    "sub_type": "pdf"
                }]
            }
        }"#;
        let parsed: SelectResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.response.docs.len(), 1);
        assert_eq!(parsed.response.docs[0].id(), "lpsc_2015_1681");
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_query(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_flush_error_reports_count() {
        let err = IndexError::Flush {
            flushed: 40,
            message: "HTTP 503".to_string(),
        };
        assert!(err.to_string().contains("40"));
        let core: LithosError = err.into();
        assert!(core.is_recoverable());
    }
}

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use common::config::IndexConfig;
use common::logging::{debug, info};

use crate::error::IndexError;

pub type IndexType = dyn SearchIndex + Send + Sync;

/// The downstream search index
#[async_trait]
pub trait SearchIndex {
    /// True when at least one document carries one of the identifiers in `field`
    async fn verify_identifiers_indexed(&self, field: &str, identifiers: &[String]) -> Result<bool, IndexError>;

    /// Bibcodes of the documents matching `query`
    async fn search_bibcodes(&self, query: &str) -> Result<Vec<String>, IndexError>;
}

/// Index backed by the Solr search API
pub struct SolrIndex {
    client: reqwest::Client,
    config: IndexConfig,
}

impl SolrIndex {
    pub fn new(config: &IndexConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Building the search index HTTP client")?;

        Ok(SolrIndex { client, config: config.clone() })
    }

    async fn search(&self, query: &str, fl: &str, rows: usize) -> Result<Value, IndexError> {
        let rows = rows.to_string();
        let mut request = self.client.get(self.config.query_url.as_str())
            .query(&[("q", query), ("fl", fl), ("rows", rows.as_str()), ("wt", "json")]);

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()
            .await
            .map_err(|e| IndexError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            info!("Index query failed with status {}", response.status());
            return Err(IndexError::HttpStatus(response.status().as_u16()));
        }

        response.json::<Value>()
            .await
            .map_err(|e| IndexError::BadResponse(e.to_string()))
    }
}

/// `field:(a OR b OR ...)`
fn identifiers_query(field: &str, identifiers: &[String]) -> String {
    format!("{}:({})", field, identifiers.join(" OR "))
}

fn has_documents(payload: &Value) -> bool {
    payload.pointer("/response/docs")
        .and_then(|docs| docs.as_array())
        .map(|docs| !docs.is_empty())
        .unwrap_or(false)
}

/// A payload without a document list is an error; documents without a bibcode are skipped
fn decode_bibcodes(query: &str, payload: &Value) -> Result<Vec<String>, IndexError> {
    let docs = payload.pointer("/response/docs")
        .and_then(|docs| docs.as_array())
        .ok_or_else(|| IndexError::BadResponse(format!("No bibcodes returned for query: {}", query)))?;

    Ok(docs.iter()
        .filter_map(|doc| doc.get("bibcode").and_then(|b| b.as_str()))
        .map(|b| b.to_string())
        .collect())
}

#[async_trait]
impl SearchIndex for SolrIndex {
    async fn verify_identifiers_indexed(&self, field: &str, identifiers: &[String]) -> Result<bool, IndexError> {
        if identifiers.is_empty() {
            return Ok(false);
        }

        let query = identifiers_query(field, identifiers);
        debug!("Verifying identifiers with index query {}", query);

        let payload = self.search(query.as_str(), "id", 10).await?;

        Ok(has_documents(&payload))
    }

    async fn search_bibcodes(&self, query: &str) -> Result<Vec<String>, IndexError> {
        debug!("Searching the index for bibcodes: {}", query);

        let payload = self.search(query, "bibcode", self.config.max_hits).await?;

        decode_bibcodes(query, &payload)
    }
}

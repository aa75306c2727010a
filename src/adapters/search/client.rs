//! HTTP client for the cohort search service
//!
//! Speaks the `_search` JSON API: a `bool` query filtering on the patient id
//! field plus a `query_string` clause, with `_source` restricted to the fields
//! the data type needs. Each hit's `_source` becomes one table row.

use super::traits::{CohortSearch, SearchRequest};
use crate::config::{SearchConfig, SecretString};
use crate::domain::{Cell, Result, SearchError, Table};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

/// Search service client
pub struct SearchClient {
    base_url: String,
    client: Client,
    username: Option<String>,
    password: Option<SecretString>,
    page_size: usize,
}

impl SearchClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));
        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for search service");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
        })
    }

    fn auth_header_value(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                let credentials = format!("{username}:{}", password.expose_secret().as_ref());
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Some(format!("Basic {encoded}"))
            }
            _ => None,
        }
    }

    fn request_body(&self, request: &SearchRequest) -> Value {
        let mut terms = Map::new();
        terms.insert(request.id_field.clone(), json!(request.id_values));
        let mut filters = vec![json!({ "terms": terms })];
        if !request.query.trim().is_empty() {
            filters.push(json!({ "query_string": { "query": request.query } }));
        }
        json!({
            "size": self.page_size,
            "_source": request.fields,
            "query": { "bool": { "filter": filters } }
        })
    }
}

fn cell_from_json(value: Option<&Value>) -> Cell {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn hits_to_table(fields: &[String], hits: Vec<Hit>) -> Result<Table> {
    let mut table = Table::new(fields.iter().cloned());
    for hit in hits {
        let row = fields
            .iter()
            .map(|f| cell_from_json(hit.source.get(f)))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

#[async_trait]
impl CohortSearch for SearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<Table> {
        if request.index.is_empty() {
            return Err(SearchError::InvalidQuery("index name cannot be empty".to_string()).into());
        }
        let url = format!("{}/{}/_search", self.base_url, request.index);
        tracing::debug!(index = %request.index, query = %request.query, "Executing search");

        let mut http = self.client.post(&url).json(&self.request_body(request));
        if let Some(auth) = self.auth_header_value() {
            http = http.header("Authorization", auth);
        }

        let resp = http
            .send()
            .await
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed { status, message }.into());
        }

        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        hits_to_table(&request.fields, body.hits.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use crate::domain::SextantError;
    use mockito::Matcher;

    fn config(base_url: String) -> SearchConfig {
        SearchConfig {
            base_url,
            username: Some("reader".to_string()),
            password: Some(secret_string("pw".to_string())),
            page_size: 100,
            timeout_seconds: 5,
            tls_verify: true,
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            index: "epr_documents".to_string(),
            fields: vec![
                "client_idcode".to_string(),
                "updatetime".to_string(),
                "score".to_string(),
            ],
            id_field: "client_idcode".to_string(),
            id_values: vec!["V1".to_string()],
            query: "updatetime:[2020-01-01 TO 2020-12-31]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_search_maps_hits_to_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/epr_documents/_search")
            .match_header("authorization", "Basic cmVhZGVyOnB3")
            .match_body(Matcher::PartialJson(json!({
                "_source": ["client_idcode", "updatetime", "score"],
                "size": 100
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "hits": {"hits": [
                        {"_source": {"client_idcode": "V1", "updatetime": "2020-03-01T10:00:00", "score": 4}},
                        {"_source": {"client_idcode": "V1", "updatetime": null}}
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = SearchClient::new(&config(server.url())).unwrap();
        let table = client.search(&request()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(table.columns(), &["client_idcode", "updatetime", "score"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "score"), Some("4"));
        assert_eq!(table.value(1, "updatetime"), None);
        assert_eq!(table.value(1, "score"), None);
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/epr_documents/_search")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let client = SearchClient::new(&config(server.url())).unwrap();
        let err = client.search(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            SextantError::Search(SearchError::RequestFailed { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_search_invalid_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/epr_documents/_search")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = SearchClient::new(&config(server.url())).unwrap();
        let err = client.search(&request()).await.unwrap_err();
        assert!(matches!(err, SextantError::Search(SearchError::InvalidResponse(_))));
    }

    #[test]
    fn test_request_body_omits_empty_query() {
        let client = SearchClient::new(&config("http://localhost:9200".to_string())).unwrap();
        let mut req = request();
        req.query = "  ".to_string();
        let body = client.request_body(&req);
        let filters = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0]["terms"]["client_idcode"][0], "V1");
    }

    #[test]
    fn test_no_auth_without_credentials() {
        let mut cfg = config("http://localhost:9200".to_string());
        cfg.username = None;
        cfg.password = None;
        let client = SearchClient::new(&cfg).unwrap();
        assert!(client.auth_header_value().is_none());
    }
}

//! Request/response schemas for the HTTP API

use crate::config::RerankConfig;
use crate::error::{Error, Result};
use crate::rerank::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Body of `POST /rerank`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub documents: Vec<Document>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl RerankRequest {
    /// Check the request against configured limits and return the effective
    /// max_results
    pub fn validate(&self, limits: &RerankConfig) -> Result<usize> {
        if self.query.trim().is_empty() {
            return Err(Error::Validation("Query cannot be empty".to_string()));
        }

        if self.documents.is_empty() {
            return Err(Error::Validation(
                "Documents list cannot be empty".to_string(),
            ));
        }

        let max_results = self.max_results.unwrap_or(limits.default_max_results);
        if max_results < 1 || max_results > limits.max_allowed_results {
            return Err(Error::Validation(format!(
                "max_results must be between 1 and {}",
                limits.max_allowed_results
            )));
        }

        let mut seen = HashSet::with_capacity(self.documents.len());
        for doc in &self.documents {
            if doc.id.is_empty() {
                return Err(Error::Validation("Document id cannot be empty".to_string()));
            }
            if !seen.insert(doc.id.as_str()) {
                return Err(Error::Validation(format!(
                    "Duplicate document id '{}'",
                    doc.id
                )));
            }
            if doc.content.chars().count() > limits.max_document_chars {
                return Err(Error::Validation(format!(
                    "Document '{}' exceeds {} characters",
                    doc.id, limits.max_document_chars
                )));
            }
        }

        Ok(max_results)
    }
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Static descriptor returned by `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub health: String,
    pub rerank: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "Code Reranker API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "online".to_string(),
            endpoints: Endpoints {
                health: "/health".to_string(),
                rerank: "/rerank".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str, documents: Vec<Document>, max_results: Option<usize>) -> RerankRequest {
        RerankRequest {
            query: query.to_string(),
            documents,
            max_results,
        }
    }

    #[test]
    fn test_defaults_max_results() {
        let limits = RerankConfig::default();
        let req = request("sort a list", vec![Document::new("a", "def sort()")], None);
        assert_eq!(req.validate(&limits).unwrap(), limits.default_max_results);
    }

    #[test]
    fn test_rejects_empty_query_and_documents() {
        let limits = RerankConfig::default();
        assert!(request("", vec![Document::new("a", "x")], None)
            .validate(&limits)
            .is_err());
        assert!(request("   ", vec![Document::new("a", "x")], None)
            .validate(&limits)
            .is_err());
        assert!(request("q", vec![], None).validate(&limits).is_err());
    }

    #[test]
    fn test_max_results_bounds() {
        let limits = RerankConfig::default();
        let docs = vec![Document::new("a", "x")];
        assert!(request("q", docs.clone(), Some(0)).validate(&limits).is_err());
        assert!(request("q", docs.clone(), Some(101)).validate(&limits).is_err());
        assert_eq!(request("q", docs, Some(100)).validate(&limits).unwrap(), 100);
    }

    #[test]
    fn test_rejects_bad_documents() {
        let limits = RerankConfig::default();

        let dup = vec![Document::new("a", "x"), Document::new("a", "y")];
        assert!(matches!(
            request("q", dup, None).validate(&limits),
            Err(Error::Validation(_))
        ));

        let unnamed = vec![Document::new("", "x")];
        assert!(request("q", unnamed, None).validate(&limits).is_err());

        let huge = vec![Document::new("a", "x".repeat(limits.max_document_chars + 1))];
        assert!(request("q", huge, None).validate(&limits).is_err());
    }

    #[test]
    fn test_request_parses_metadata() {
        let body = r#"{
            "query": "implement user authentication",
            "documents": [
                {"id": "doc1", "content": "def authenticate_user(u, p):",
                 "metadata": {"filePath": "src/auth.py", "startLine": 10}},
                {"id": "doc2", "content": "class UserAuth:"}
            ],
            "max_results": 10
        }"#;
        let req: RerankRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.documents.len(), 2);
        assert_eq!(req.max_results, Some(10));
        let meta = req.documents[0].metadata.as_ref().unwrap();
        assert_eq!(meta["filePath"], "src/auth.py");
        assert!(req.documents[1].metadata.is_none());
    }
}

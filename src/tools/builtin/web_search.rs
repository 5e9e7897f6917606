// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Web search tool
//!
//! Queries the Brave Search API and formats the top results for the model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

const DEFAULT_BASE_URL: &str = "https://api.search.brave.com/res/v1";
const RESULT_COUNT: usize = 5;

/// Tool for web search via Brave
pub struct WebSearchTool {
    base_url: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint, used by tests
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web and return the top results with titles, URLs and \
                          snippets."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("query", "The search query", true)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let Some(query) = args["query"]
            .as_str()
            .or_else(|| args["q"].as_str())
            .or_else(|| args["search"].as_str())
        else {
            return Ok(ToolOutcome::failure("'query' argument is required"));
        };

        let Some(api_key) = context.search_api_key.as_deref() else {
            return Ok(ToolOutcome::failure(
                "Web search is not configured. Set BRAVE_SEARCH_API_KEY in the environment.",
            ));
        };

        let url = format!("{}/web/search", self.base_url);
        let response = match context
            .http_client
            .get(&url)
            .query(&[("q", query), ("count", &RESULT_COUNT.to_string())])
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(ToolOutcome::failure(format!("Search request failed: {}", e))),
        };

        if !response.status().is_success() {
            return Ok(ToolOutcome::failure(format!(
                "Search API returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!(
                    "Could not parse search response: {}",
                    e
                )))
            }
        };

        let results = parsed.web.map(|w| w.results).unwrap_or_default();
        if results.is_empty() {
            return Ok(ToolOutcome::success(format!(
                "No results found for '{}'",
                query
            )));
        }

        let formatted: Vec<String> = results
            .iter()
            .take(RESULT_COUNT)
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n   {}\n   {}", i + 1, r.title, r.url, r.description))
            .collect();

        Ok(ToolOutcome::success(formatted.join("\n\n")))
    }
}

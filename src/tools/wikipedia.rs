//! Wikipedia lookup through the MediaWiki API.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{truncate_chars, Tool};
use crate::sanitize::clean_input;

const TOP_K_RESULTS: usize = 3;
const MAX_CONTENT_CHARS: usize = 4_000;

pub struct WikipediaSearch {
    client: reqwest::Client,
    api_url: String,
}

impl WikipediaSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_api_url(client, "https://en.wikipedia.org/w/api.php".to_string())
    }

    pub fn with_api_url(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    async fn search(&self, topic: &str) -> anyhow::Result<Vec<SearchHit>> {
        let limit = TOP_K_RESULTS.to_string();
        let response: SearchResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.query.map(|q| q.search).unwrap_or_default())
    }

    async fn extracts(&self, hits: &[SearchHit]) -> anyhow::Result<HashMap<String, String>> {
        let ids = hits
            .iter()
            .map(|h| h.pageid.to_string())
            .collect::<Vec<_>>()
            .join("|");
        let response: ExtractResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("pageids", ids.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .query
            .map(|q| {
                q.pages
                    .into_iter()
                    .filter_map(|(id, page)| page.extract.map(|e| (id, e)))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    extract: Option<String>,
}

#[async_trait]
impl Tool for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        "Useful for when you need to look up a topic, country, coaching methods or person on wikipedia. Input is the topic."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let topic = clean_input(input);
        if topic.is_empty() {
            anyhow::bail!("wikipedia topic is empty");
        }
        tracing::info!("Wikipedia search: {}", topic);

        let hits = self.search(&topic).await?;
        if hits.is_empty() {
            return Ok("No good Wikipedia Search Result was found".to_string());
        }

        let extracts = self.extracts(&hits).await?;
        Ok(format_summaries(&hits, &extracts))
    }
}

/// `Page: / Summary:` blocks in search order, capped in total length.
fn format_summaries(hits: &[SearchHit], extracts: &HashMap<String, String>) -> String {
    let summaries: Vec<String> = hits
        .iter()
        .filter_map(|hit| {
            let extract = extracts.get(&hit.pageid.to_string())?.trim();
            if extract.is_empty() {
                return None;
            }
            Some(format!("Page: {}\nSummary: {}", hit.title, extract))
        })
        .collect();

    if summaries.is_empty() {
        return "No good Wikipedia Search Result was found".to_string();
    }

    truncate_chars(&summaries.join("\n\n"), MAX_CONTENT_CHARS, "")
}

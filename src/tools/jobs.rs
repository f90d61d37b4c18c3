//! Job postings search through SerpAPI's Google Jobs engine.

use async_trait::async_trait;
use serde::Deserialize;

use super::{truncate_chars, Tool};
use crate::sanitize::clean_input;

const TOP_K_RESULTS: usize = 3;
const MAX_DESCRIPTION_CHARS: usize = 1_000;
const SEPARATOR: &str = "_______________________________________________";

pub struct GoogleJobSearch {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl GoogleJobSearch {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            api_url: "https://serpapi.com/search.json".to_string(),
        }
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<JobResult>> {
        let response: JobsResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("engine", "google_jobs"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            // SerpAPI reports "no results" as an error string
            if error.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            anyhow::bail!("SerpAPI error: {}", error);
        }
        Ok(response.jobs_results)
    }
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs_results: Vec<JobResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    title: Option<String>,
    company_name: Option<String>,
    location: Option<String>,
    description: Option<String>,
    via: Option<String>,
    share_link: Option<String>,
}

#[async_trait]
impl Tool for GoogleJobSearch {
    fn name(&self) -> &str {
        "google_job_search"
    }

    fn description(&self) -> &str {
        "Performs a search for actual jobs and job posts on the internet using Google Jobs. Use when asked to provide jobs, job ads or job posts. Input is the search query, e.g. 'rust developer Berlin'."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let query = clean_input(input);
        tracing::info!("Google job search: {}", query);

        match self.search(&query).await {
            Ok(jobs) if jobs.is_empty() => Ok(format!(
                "No job results found for query: '{}'. Try using different keywords or location terms.",
                query
            )),
            Ok(jobs) => Ok(format_jobs(&jobs)),
            Err(e) => {
                tracing::warn!("Error in google_job_search: {}", e);
                Ok(format!(
                    "I'm unable to search for jobs right now due to a technical issue. Please try searching manually on Google Jobs, LinkedIn, Indeed, or other job boards for '{}'.",
                    query
                ))
            }
        }
    }
}

fn format_jobs(jobs: &[JobResult]) -> String {
    let field = |v: &Option<String>| v.as_deref().unwrap_or("N/A").trim().to_string();

    jobs.iter()
        .take(TOP_K_RESULTS)
        .map(|job| {
            let mut entry = format!(
                "\n{}\nJob Title: {}\nCompany Name: {}\nLocation: {}",
                SEPARATOR,
                field(&job.title),
                field(&job.company_name),
                field(&job.location),
            );
            if let Some(via) = &job.via {
                entry.push_str(&format!("\nPosted: {}", via.trim()));
            }
            if let Some(link) = &job.share_link {
                entry.push_str(&format!("\nLink: {}", link));
            }
            entry.push_str(&format!(
                "\nDescription: {}",
                truncate_chars(&field(&job.description), MAX_DESCRIPTION_CHARS, "...")
            ));
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_top_results() {
        let payload: JobsResponse = serde_json::from_str(
            r#"{"jobs_results":[
                {"title":"Rust Engineer","company_name":"Ferrous","location":"Berlin","via":"via LinkedIn","description":"Build things."},
                {"title":"Backend Dev","company_name":"Acme","location":"Remote","description":"APIs."},
                {"title":"SRE","company_name":"Ops Inc","location":"Athens"},
                {"title":"Skipped","company_name":"X","location":"Y"}
            ]}"#,
        )
        .unwrap();

        let out = format_jobs(&payload.jobs_results);
        assert_eq!(out.matches(SEPARATOR).count(), 3);
        assert!(out.contains("Job Title: Rust Engineer\nCompany Name: Ferrous\nLocation: Berlin\nPosted: via LinkedIn\nDescription: Build things."));
        assert!(out.contains("Job Title: SRE\nCompany Name: Ops Inc\nLocation: Athens\nDescription: N/A"));
        assert!(!out.contains("Skipped"));
    }

    #[test]
    fn error_payload_is_deserialized() {
        let payload: JobsResponse =
            serde_json::from_str(r#"{"error":"Google hasn't returned any results for this query."}"#)
                .unwrap();
        assert!(payload.jobs_results.is_empty());
        assert!(payload.error.is_some());
    }

    #[tokio::test]
    async fn unreachable_api_yields_friendly_message() {
        let mut tool = GoogleJobSearch::new(reqwest::Client::new(), "key".to_string());
        tool.api_url = "http://127.0.0.1:9/search.json".to_string();
        let out = tool.execute("rust developer").await.unwrap();
        assert!(out.starts_with("I'm unable to search for jobs right now"));
        assert!(out.contains("'rust developer'"));
    }
}

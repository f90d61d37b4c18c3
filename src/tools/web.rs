//! Web access tools: search and webpage reading.

use std::sync::LazyLock;

use async_trait::async_trait;
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;
use regex::Regex;
use url::Url;

use super::{truncate_chars, Tool};
use crate::sanitize::clean_input;

const MAX_SEARCH_RESULTS: usize = 5;
const MAX_PAGE_CHARS: usize = 10_000;

/// Search the web through DuckDuckGo's HTML endpoint (no API key needed).
pub struct InternetSearch {
    client: reqwest::Client,
    base_url: String,
}

impl InternetSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: "https://html.duckduckgo.com/html/".to_string(),
        }
    }
}

#[async_trait]
impl Tool for InternetSearch {
    fn name(&self) -> &str {
        "internet_search"
    }

    fn description(&self) -> &str {
        "Useful for when you need to do a search on the internet to find information that another tool can't find. Be specific with your input."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let query = clean_input(input);
        if query.is_empty() {
            anyhow::bail!("search query is empty");
        }
        tracing::info!("Internet search: {}", query);

        let url = format!("{}?q={}", self.base_url, urlencoding::encode(&query));
        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let results = extract_ddg_results(&html);
        if results.is_empty() {
            Ok(format!("No results found for: {}", query))
        } else {
            Ok(results.join("\n"))
        }
    }
}

/// Extract `snippet / title / link` entries from DuckDuckGo HTML.
fn extract_ddg_results(html: &str) -> Vec<String> {
    html.split("result__body\"")
        .skip(1)
        .take(MAX_SEARCH_RESULTS)
        .filter_map(|chunk| {
            let anchor = chunk.split("class=\"result__a\"").nth(1)?;
            let title = element_text(anchor, "</a>");
            if title.is_empty() {
                return None;
            }

            let snippet = chunk
                .split("class=\"result__snippet\"")
                .nth(1)
                .map(|s| element_text(s, "</a>"))
                .unwrap_or_default();

            let link = attribute(anchor, "href")
                .map(|href| resolve_ddg_link(&href))
                .unwrap_or_default();

            Some(format!("[snippet: {}, title: {}, link: {}]", snippet, title, link))
        })
        .collect()
}

/// Text of an element whose opening tag starts somewhere in `fragment`.
fn element_text(fragment: &str, closing: &str) -> String {
    let inner = fragment.split_once('>').map(|(_, rest)| rest).unwrap_or("");
    let inner = inner.split(closing).next().unwrap_or("");
    html_decode(&TAG_RE.replace_all(inner, "")).trim().to_string()
}

fn attribute(fragment: &str, name: &str) -> Option<String> {
    let tag = fragment.split('>').next()?;
    let start = tag.find(&format!("{}=\"", name))? + name.len() + 2;
    let len = tag[start..].find('"')?;
    Some(html_decode(&tag[start..start + len]))
}

/// DuckDuckGo wraps result links in a redirect carrying the target in `uddg`.
fn resolve_ddg_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

/// Visit a webpage and return its content as markdown-ish text.
pub struct VisitWebpage {
    client: reqwest::Client,
}

impl VisitWebpage {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for VisitWebpage {
    fn name(&self) -> &str {
        "visit_webpage"
    }

    fn description(&self) -> &str {
        "Visits a webpage at the given url and reads its content as a markdown string. Input is the url of the webpage to visit."
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let raw = clean_input(input);
        let url = Url::parse(raw.trim_matches(|c| c == '"' || c == '\''))
            .map_err(|e| anyhow::anyhow!("invalid url '{}': {}", raw, e))?;
        tracing::info!("Visiting webpage: {}", url);

        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Ok(
                    "The request timed out. Please try again later or check the URL.".to_string(),
                )
            }
            Err(e) => return Err(anyhow::anyhow!("Error fetching the webpage: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Error fetching the webpage: HTTP {}", status);
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let body = response.text().await?;

        let content = if content_type.contains("text/html") || body.trim_start().starts_with('<') {
            html_to_markdown(&body)?
        } else {
            body.trim().to_string()
        };

        Ok(truncate_chars(
            &content,
            MAX_PAGE_CHARS,
            "...(content truncated)",
        ))
    }
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Convert a page to markdown, leaving out scripts, styles and the document head.
fn html_to_markdown(html: &str) -> anyhow::Result<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| anyhow::anyhow!("Error converting the webpage: {}", e))?;

    Ok(BLANK_LINES_RE
        .replace_all(&markdown, "\n\n")
        .trim()
        .to_string())
}

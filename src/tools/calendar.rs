//! Google Calendar event creation.
//!
//! The OAuth consent flow is handled outside this service; the tool is given
//! an access token through configuration.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;

use super::Tool;
use crate::sanitize::{clean_input, strip_code_fences};

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub struct CreateCalendarEvent {
    client: reqwest::Client,
    token: String,
    calendar_id: String,
    api_base: String,
}

impl CreateCalendarEvent {
    pub fn new(client: reqwest::Client, token: String, calendar_id: String) -> Self {
        Self {
            client,
            token,
            calendar_id,
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// What the model asks for.
#[derive(Debug, Deserialize)]
struct EventRequest {
    summary: String,
    start: String,
    end: Option<String>,
    timezone: Option<String>,
    description: Option<String>,
    location: Option<String>,
}

/// A validated event with local times in `tz`.
#[derive(Debug, PartialEq)]
struct EventPlan {
    summary: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    tz: Tz,
    description: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
}

#[async_trait]
impl Tool for CreateCalendarEvent {
    fn name(&self) -> &str {
        "create_calendar_event"
    }

    fn description(&self) -> &str {
        r#"Creates an event in the user's Google Calendar. Input is JSON such as {"summary": "Team sync", "start": "2025-03-01T10:00", "end": "2025-03-01T11:00", "timezone": "Europe/Athens", "description": "optional"}; end defaults to one hour after start."#
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        let plan = plan_event(&clean_input(input))?;
        tracing::info!(
            "Creating calendar event '{}' at {} ({})",
            plan.summary,
            plan.start,
            plan.tz.name()
        );

        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&event_body(&plan))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Calendar API returned {}: {}", status, body);
        }

        let created: CreatedEvent = response.json().await?;
        let mut message = format!(
            "Event '{}' created for {} - {} ({}).",
            plan.summary,
            plan.start.format("%Y-%m-%d %H:%M"),
            plan.end.format("%Y-%m-%d %H:%M"),
            plan.tz.name()
        );
        if let Some(link) = created.html_link {
            message.push_str(&format!(" Link: {}", link));
        }
        Ok(message)
    }
}

/// Parse and validate the model's request.
///
/// Accepts a JSON object (optionally fenced) or `summary | start | end`.
fn plan_event(input: &str) -> anyhow::Result<EventPlan> {
    let request = parse_request(input)?;

    let tz: Tz = match request.timezone.as_deref().map(str::trim) {
        None | Some("") => Tz::UTC,
        Some(name) => name
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown timezone '{}'", name))?,
    };

    let start = parse_time(&request.start, tz)?;
    let end = match request.end.as_deref().map(str::trim) {
        None | Some("") => start + Duration::hours(1),
        Some(end) => parse_time(end, tz)?,
    };
    if end <= start {
        anyhow::bail!("event end {} is not after start {}", end, start);
    }

    let summary = request.summary.trim().to_string();
    if summary.is_empty() {
        anyhow::bail!("event summary is empty");
    }

    Ok(EventPlan {
        summary,
        start,
        end,
        tz,
        description: request.description.filter(|d| !d.trim().is_empty()),
        location: request.location.filter(|l| !l.trim().is_empty()),
    })
}

fn parse_request(input: &str) -> anyhow::Result<EventRequest> {
    let text = strip_code_fences(input);
    let text = text.trim().trim_start_matches("json").trim();

    if let (Some(open), Some(close)) = (text.find('{'), text.rfind('}')) {
        if open < close {
            return serde_json::from_str(&text[open..=close])
                .map_err(|e| anyhow::anyhow!("invalid event JSON: {}", e));
        }
    }

    let parts: Vec<&str> = text.split('|').map(str::trim).collect();
    match parts.as_slice() {
        [summary, start] => Ok(EventRequest {
            summary: summary.to_string(),
            start: start.to_string(),
            end: None,
            timezone: None,
            description: None,
            location: None,
        }),
        [summary, start, end, rest @ ..] => Ok(EventRequest {
            summary: summary.to_string(),
            start: start.to_string(),
            end: Some(end.to_string()),
            timezone: rest.first().map(|s| s.to_string()),
            description: None,
            location: None,
        }),
        _ => anyhow::bail!(
            "expected a JSON object with summary and start, or 'summary | start | end'"
        ),
    }
}

/// Local wall-clock time in `tz`; RFC 3339 inputs are converted into `tz`.
fn parse_time(value: &str, tz: Tz) -> anyhow::Result<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&tz).naive_local());
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| anyhow::anyhow!("unrecognised date/time '{}', use YYYY-MM-DDTHH:MM", value))
}

fn event_body(plan: &EventPlan) -> serde_json::Value {
    let mut body = json!({
        "summary": plan.summary,
        "start": {
            "dateTime": plan.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": plan.tz.name(),
        },
        "end": {
            "dateTime": plan.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": plan.tz.name(),
        },
    });
    if let Some(description) = &plan.description {
        body["description"] = json!(description);
    }
    if let Some(location) = &plan.location {
        body["location"] = json!(location);
    }
    body
}

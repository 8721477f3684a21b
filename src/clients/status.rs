//! Service-status probing: locate a status page, then parse whatever it
//! speaks — the Atlassian Statuspage JSON API where available, HTML cues
//! otherwise, and a bare reachability check as the last resort.
//!
//! Coverage is best effort; unrecognized pages report `unknown` rather than
//! failing the call.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ResearchError;

const SERVICE: &str = "the status page";
const TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(4);

// ── Records ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Operational,
    DegradedPerformance,
    PartialOutage,
    MajorOutage,
    UnderMaintenance,
    Unknown,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::DegradedPerformance => "degraded_performance",
            Self::PartialOutage => "partial_outage",
            Self::MajorOutage => "major_outage",
            Self::UnderMaintenance => "under_maintenance",
            Self::Unknown => "unknown",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Operational => "✅",
            Self::DegradedPerformance => "⚠️",
            Self::PartialOutage => "🟠",
            Self::MajorOutage => "🔴",
            Self::UnderMaintenance => "🔧",
            Self::Unknown => "❓",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentState {
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl IncidentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Investigating => "investigating",
            Self::Identified => "identified",
            Self::Monitoring => "monitoring",
            Self::Resolved => "resolved",
        }
    }

    fn from_str(raw: &str) -> Self {
        match raw {
            "identified" => Self::Identified,
            "monitoring" => Self::Monitoring,
            "resolved" | "postmortem" => Self::Resolved,
            _ => Self::Investigating,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceIncident {
    pub title: String,
    pub status: IncidentState,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub impact: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub status: StatusState,
    pub status_page_url: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub current_incidents: Vec<ServiceIncident>,
    pub components: Vec<ComponentStatus>,
    pub recent_incidents: Option<Vec<ServiceIncident>>,
    pub uptime_percentage: Option<f64>,
}

// ── Known status pages ──────────────────────────────────────────────────
// Curated aliases for popular developer services. Keeping this table fresh
// beats guessing; the pattern fallback below covers the long tail.

const KNOWN_STATUS_PAGES: &[(&str, &str)] = &[
    ("github", "https://www.githubstatus.com"),
    ("github actions", "https://www.githubstatus.com"),
    ("codespaces", "https://www.githubstatus.com"),
    ("gitlab", "https://status.gitlab.com"),
    ("bitbucket", "https://bitbucket.status.atlassian.com"),
    ("stripe", "https://status.stripe.com"),
    ("paypal", "https://www.paypal-status.com"),
    ("openai", "https://status.openai.com"),
    ("chatgpt", "https://status.openai.com"),
    ("anthropic", "https://status.anthropic.com"),
    ("claude", "https://status.anthropic.com"),
    ("cloudflare", "https://www.cloudflarestatus.com"),
    ("aws", "https://health.aws.amazon.com/health/status"),
    ("gcp", "https://status.cloud.google.com"),
    ("google cloud", "https://status.cloud.google.com"),
    ("azure", "https://status.azure.com"),
    ("digitalocean", "https://status.digitalocean.com"),
    ("heroku", "https://status.heroku.com"),
    ("netlify", "https://www.netlifystatus.com"),
    ("vercel", "https://www.vercel-status.com"),
    ("npm", "https://status.npmjs.org"),
    ("npmjs", "https://status.npmjs.org"),
    ("pypi", "https://status.python.org"),
    ("rubygems", "https://status.rubygems.org"),
    ("slack", "https://status.slack.com"),
    ("discord", "https://discordstatus.com"),
    ("zoom", "https://status.zoom.us"),
    ("twilio", "https://status.twilio.com"),
    ("sendgrid", "https://status.sendgrid.com"),
    ("mailgun", "https://status.mailgun.com"),
    ("postmark", "https://status.postmarkapp.com"),
    ("datadog", "https://status.datadoghq.com"),
    ("new relic", "https://status.newrelic.com"),
    ("newrelic", "https://status.newrelic.com"),
    ("sentry", "https://status.sentry.io"),
    ("pagerduty", "https://status.pagerduty.com"),
    ("opsgenie", "https://status.opsgenie.com"),
    ("atlassian", "https://status.atlassian.com"),
    ("jira", "https://jira-software.status.atlassian.com"),
    ("confluence", "https://confluence.status.atlassian.com"),
    ("trello", "https://trello.status.atlassian.com"),
    ("dropbox", "https://status.dropbox.com"),
    ("box", "https://status.box.com"),
    ("shopify", "https://status.shopify.com"),
    ("squarespace", "https://status.squarespace.com"),
    ("salesforce", "https://status.salesforce.com"),
    ("hubspot", "https://status.hubspot.com"),
    ("zendesk", "https://status.zendesk.com"),
    ("intercom", "https://www.intercomstatus.com"),
    ("segment", "https://status.segment.com"),
    ("mixpanel", "https://status.mixpanel.com"),
    ("amplitude", "https://status.amplitude.com"),
    ("auth0", "https://status.auth0.com"),
    ("okta", "https://status.okta.com"),
    ("firebase", "https://status.firebase.google.com"),
    ("supabase", "https://status.supabase.com"),
    ("planetscale", "https://www.planetscalestatus.com"),
    ("mongodb", "https://status.cloud.mongodb.com"),
    ("mongodb atlas", "https://status.cloud.mongodb.com"),
    ("redis", "https://status.redis.io"),
    ("elastic", "https://status.elastic.co"),
    ("algolia", "https://status.algolia.com"),
    ("fastly", "https://status.fastly.com"),
    ("akamai", "https://www.akamaistatus.com"),
    ("linode", "https://status.linode.com"),
    ("vultr", "https://status.vultr.com"),
    ("render", "https://status.render.com"),
    ("railway", "https://status.railway.app"),
    ("fly", "https://status.flyio.net"),
    ("fly.io", "https://status.flyio.net"),
    ("docker", "https://www.dockerstatus.com"),
    ("docker hub", "https://www.dockerstatus.com"),
    ("circleci", "https://status.circleci.com"),
    ("travis", "https://www.traviscistatus.com"),
    ("codecov", "https://status.codecov.com"),
    ("jfrog", "https://status.jfrog.io"),
    ("figma", "https://status.figma.com"),
    ("notion", "https://status.notion.so"),
    ("airtable", "https://status.airtable.com"),
    ("asana", "https://status.asana.com"),
    ("monday", "https://status.monday.com"),
    ("clickup", "https://status.clickup.com"),
    ("linear", "https://status.linear.app"),
    ("meta", "https://metastatus.com"),
    ("facebook", "https://metastatus.com"),
    ("instagram", "https://metastatus.com"),
    ("reddit", "https://www.redditstatus.com"),
    ("cloudinary", "https://status.cloudinary.com"),
    ("imgix", "https://status.imgix.com"),
    ("plaid", "https://status.plaid.com"),
    ("coinbase", "https://status.coinbase.com"),
    ("snowflake", "https://status.snowflake.com"),
    ("databricks", "https://status.databricks.com"),
    ("hugging face", "https://status.huggingface.co"),
    ("huggingface", "https://status.huggingface.co"),
    ("replicate", "https://status.replicate.com"),
    ("cohere", "https://status.cohere.com"),
    ("expo", "https://status.expo.dev"),
    ("quay", "https://status.quay.io"),
    ("gitpod", "https://www.gitpodstatus.com"),
    ("bitwarden", "https://status.bitwarden.com"),
    ("1password", "https://status.1password.com"),
    ("lastpass", "https://status.lastpass.com"),
    ("tailscale", "https://status.tailscale.com"),
    ("ngrok", "https://status.ngrok.com"),
    ("postman", "https://status.postman.com"),
    ("grafana", "https://status.grafana.com"),
    ("influxdata", "https://status.influxdata.com"),
    ("timescale", "https://status.timescale.com"),
    ("neon", "https://neonstatus.com"),
    ("upstash", "https://status.upstash.com"),
    ("pusher", "https://status.pusher.com"),
    ("ably", "https://status.ably.com"),
    ("onesignal", "https://status.onesignal.com"),
    ("launchdarkly", "https://status.launchdarkly.com"),
    ("split", "https://status.split.io"),
    ("optimizely", "https://status.optimizely.com"),
    ("contentful", "https://www.contentfulstatus.com"),
    ("strapi", "https://status.strapi.io"),
    ("prismic", "https://status.prismic.io"),
    ("statuspage", "https://metastatuspage.com"),
    ("browserstack", "https://status.browserstack.com"),
    ("sauce labs", "https://status.saucelabs.com"),
    ("cypress", "https://status.cypress.io"),
    ("percy", "https://status.percy.io"),
    ("chromatic", "https://status.chromatic.com"),
    ("snyk", "https://status.snyk.io"),
    ("kagi", "https://status.kagi.com"),
    ("deno", "https://status.deno.com"),
    ("bun", "https://status.bun.sh"),
];

/// Map free-form status text onto the closed state set. Pure function.
pub fn normalize_status(text: &str) -> StatusState {
    let lower = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["major outage", "major service outage", "all systems down", "widespread outage"]) {
        StatusState::MajorOutage
    } else if has(&["partial outage", "partial system outage", "partial service disruption"]) {
        StatusState::PartialOutage
    } else if has(&["degraded", "performance issues", "minor outage", "minor service outage", "elevated error"]) {
        StatusState::DegradedPerformance
    } else if has(&["under maintenance", "scheduled maintenance", "maintenance in progress"]) {
        StatusState::UnderMaintenance
    } else if has(&["all systems operational", "fully operational", "operational", "all systems go", "no known issues"]) {
        StatusState::Operational
    } else {
        StatusState::Unknown
    }
}

fn state_from_indicator(indicator: &str) -> StatusState {
    match indicator {
        "none" => StatusState::Operational,
        "minor" => StatusState::DegradedPerformance,
        "major" => StatusState::PartialOutage,
        "critical" => StatusState::MajorOutage,
        "maintenance" => StatusState::UnderMaintenance,
        _ => StatusState::Unknown,
    }
}

// ── Client ──────────────────────────────────────────────────────────────

pub struct StatusClient {
    client: reqwest::Client,
}

impl StatusClient {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: super::http_client(user_agent, TIMEOUT),
        }
    }

    /// Resolve candidate status-page URLs for a service name, curated table
    /// first, generic patterns second.
    pub fn candidate_urls(service: &str) -> Vec<String> {
        let slug = service.trim().to_lowercase();
        if let Some((_, url)) = KNOWN_STATUS_PAGES.iter().find(|(alias, _)| *alias == slug) {
            return vec![(*url).to_string()];
        }
        let compact: String = slug.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        vec![
            format!("https://status.{compact}.com"),
            format!("https://{compact}.statuspage.io"),
            format!("https://{compact}.com/status"),
            format!("https://status.{compact}.io"),
            format!("https://health.{compact}.com"),
        ]
    }

    /// Probe a known status page URL for a service, parse its state.
    pub async fn check(
        &self,
        service: &str,
        include_history: bool,
        history_days: i64,
    ) -> Result<ServiceStatus, ResearchError> {
        self.check_candidates(service, &Self::candidate_urls(service), include_history, history_days)
            .await
    }

    /// As [`check`] but against an explicit candidate list (used by tests and
    /// by resource lookups with a pre-resolved URL).
    pub async fn check_candidates(
        &self,
        service: &str,
        candidates: &[String],
        include_history: bool,
        history_days: i64,
    ) -> Result<ServiceStatus, ResearchError> {
        let mut reachable: Option<String> = None;

        for base in candidates {
            // Statuspage-style JSON first: highest signal, cheapest to parse.
            if let Ok(status) = self
                .statuspage_json(service, base, include_history, history_days)
                .await
            {
                return Ok(status);
            }

            match self.html_probe(service, base).await {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => reachable = reachable.or_else(|| Some(base.clone())),
                Err(_) => {}
            }
        }

        // HEAD-level fallback: a page exists but we could not read a state.
        if let Some(url) = reachable {
            return Ok(ServiceStatus {
                service: service.to_string(),
                status: StatusState::Unknown,
                status_page_url: Some(url),
                checked_at: Utc::now(),
                current_incidents: Vec::new(),
                components: Vec::new(),
                recent_incidents: None,
                uptime_percentage: None,
            });
        }

        Err(ResearchError::not_found(format!(
            "Could not locate a status page for '{service}'. \
             Try the exact product name (e.g. 'github', 'stripe') or pass the vendor's status URL as the service."
        )))
    }

    async fn statuspage_json(
        &self,
        service: &str,
        base: &str,
        include_history: bool,
        history_days: i64,
    ) -> Result<ServiceStatus, ResearchError> {
        let summary = self.get_json(&format!("{base}/api/v2/status.json")).await?;
        let description = summary["status"]["description"].as_str().unwrap_or("");
        let indicator = summary["status"]["indicator"].as_str().unwrap_or("");

        let mut status = normalize_status(description);
        if status == StatusState::Unknown {
            status = state_from_indicator(indicator);
        }

        let current_incidents = self
            .get_json(&format!("{base}/api/v2/incidents/unresolved.json"))
            .await
            .ok()
            .map(|doc| parse_incidents(&doc["incidents"], usize::MAX))
            .unwrap_or_default();

        let components = self
            .get_json(&format!("{base}/api/v2/components.json"))
            .await
            .ok()
            .map(|doc| parse_components(&doc["components"]))
            .unwrap_or_default();

        let recent_incidents = if include_history {
            let cutoff = Utc::now() - chrono::Duration::days(history_days.max(1));
            self.get_json(&format!("{base}/api/v2/incidents.json"))
                .await
                .ok()
                .map(|doc| {
                    parse_incidents(&doc["incidents"], 25)
                        .into_iter()
                        .filter(|i| i.started_at.map(|t| t >= cutoff).unwrap_or(false))
                        .take(5)
                        .collect()
                })
        } else {
            None
        };

        Ok(ServiceStatus {
            service: service.to_string(),
            status,
            status_page_url: Some(base.to_string()),
            checked_at: Utc::now(),
            current_incidents,
            components,
            recent_incidents,
            uptime_percentage: None,
        })
    }

    /// Returns `Ok(None)` when the page is reachable but no state could be
    /// read from its markup.
    async fn html_probe(
        &self,
        service: &str,
        url: &str,
    ) -> Result<Option<ServiceStatus>, ResearchError> {
        let response = self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        if !response.status().is_success() {
            return Err(ResearchError::from_status(SERVICE, response.status(), None));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        Ok(parse_status_html(service, url, &body))
    }

    async fn get_json(&self, url: &str) -> Result<Value, ResearchError> {
        let response = self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::from_status(SERVICE, status, None));
        }
        response
            .json()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))
    }
}

fn parse_incidents(raw: &Value, limit: usize) -> Vec<ServiceIncident> {
    raw.as_array()
        .map(|incidents| {
            incidents
                .iter()
                .take(limit)
                .map(|i| ServiceIncident {
                    title: i["name"].as_str().unwrap_or("(unnamed incident)").to_string(),
                    status: IncidentState::from_str(i["status"].as_str().unwrap_or("")),
                    started_at: i["created_at"].as_str().and_then(crate::text::parse_iso),
                    resolved_at: i["resolved_at"].as_str().and_then(crate::text::parse_iso),
                    impact: i["impact"]
                        .as_str()
                        .filter(|s| matches!(*s, "minor" | "major" | "critical"))
                        .map(str::to_string),
                    summary: i["incident_updates"][0]["body"]
                        .as_str()
                        .map(|s| s.chars().take(200).collect()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_components(raw: &Value) -> Vec<ComponentStatus> {
    raw.as_array()
        .map(|components| {
            components
                .iter()
                .filter(|c| !c["group"].as_bool().unwrap_or(false))
                .take(10)
                .map(|c| ComponentStatus {
                    name: c["name"].as_str().unwrap_or("").to_string(),
                    status: c["status"].as_str().unwrap_or("unknown").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Best-effort read of a status page's markup. Statuspage-style class names
/// are tried for the banner, incidents, and components; the page's full text
/// is the last resort for the overall state.
fn parse_status_html(service: &str, url: &str, html: &str) -> Option<ServiceStatus> {
    let document = scraper::Html::parse_document(html);
    let text_of = |el: scraper::ElementRef| -> String {
        crate::text::clean_cell(&el.text().collect::<Vec<_>>().join(" "))
    };

    let banner_sel = scraper::Selector::parse(
        ".page-status, .status-banner, .overall-status, [class*=page-status]",
    )
    .unwrap();
    let mut status = document
        .select(&banner_sel)
        .next()
        .map(|banner| normalize_status(&text_of(banner)))
        .unwrap_or(StatusState::Unknown);
    if status == StatusState::Unknown {
        let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");
        status = normalize_status(&page_text);
    }

    let incident_sel = scraper::Selector::parse(".unresolved-incident").unwrap();
    let incident_title_sel = scraper::Selector::parse(".incident-title, .actual-title, h3").unwrap();
    let current_incidents: Vec<ServiceIncident> = document
        .select(&incident_sel)
        .take(10)
        .filter_map(|incident| {
            let title = incident.select(&incident_title_sel).next().map(&text_of)?;
            if title.is_empty() {
                return None;
            }
            let classes = incident.value().attr("class").unwrap_or("");
            Some(ServiceIncident {
                title,
                status: IncidentState::Investigating,
                started_at: None,
                resolved_at: None,
                impact: ["critical", "major", "minor"]
                    .iter()
                    .find(|level| classes.contains(&format!("impact-{level}")))
                    .map(|level| level.to_string()),
                summary: None,
            })
        })
        .collect();

    let component_sel = scraper::Selector::parse(".component-inner-container").unwrap();
    let name_sel = scraper::Selector::parse(".name").unwrap();
    let component_status_sel = scraper::Selector::parse(".component-status").unwrap();
    let components: Vec<ComponentStatus> = document
        .select(&component_sel)
        .take(10)
        .filter_map(|component| {
            let name = component.select(&name_sel).next().map(&text_of)?;
            let state = component
                .select(&component_status_sel)
                .next()
                .map(&text_of)
                .unwrap_or_else(|| "unknown".into());
            Some(ComponentStatus {
                name,
                status: state.to_lowercase(),
            })
        })
        .collect();

    // An incident listing implies trouble even when the banner is unreadable.
    if status == StatusState::Unknown && !current_incidents.is_empty() {
        status = StatusState::DegradedPerformance;
    }
    if status == StatusState::Unknown && components.is_empty() {
        return None;
    }

    Some(ServiceStatus {
        service: service.to_string(),
        status,
        status_page_url: Some(url.to_string()),
        checked_at: Utc::now(),
        current_incidents,
        components,
        recent_incidents: None,
        uptime_percentage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizer_reads_common_phrasings() {
        assert_eq!(normalize_status("All Systems Operational"), StatusState::Operational);
        assert_eq!(normalize_status("Minor Service Outage"), StatusState::DegradedPerformance);
        assert_eq!(normalize_status("Partial System Outage"), StatusState::PartialOutage);
        assert_eq!(normalize_status("Major Service Outage"), StatusState::MajorOutage);
        assert_eq!(normalize_status("Scheduled maintenance underway"), StatusState::UnderMaintenance);
        assert_eq!(normalize_status("lorem ipsum"), StatusState::Unknown);
    }

    #[test]
    fn outage_wins_over_operational_wording() {
        // Pages often list healthy components next to the headline outage.
        let text = "Partial outage — most systems operational";
        assert_eq!(normalize_status(text), StatusState::PartialOutage);
    }

    #[test]
    fn known_table_short_circuits_patterns() {
        assert_eq!(
            StatusClient::candidate_urls("stripe"),
            vec!["https://status.stripe.com".to_string()]
        );
        let guessed = StatusClient::candidate_urls("exampleco");
        assert_eq!(guessed.len(), 5);
        assert!(guessed[0].contains("status.exampleco.com"));
    }

    #[test]
    fn statuspage_markup_yields_incidents_and_components() {
        let html = r#"
            <div class="page-status status-none"><span class="status">All Systems Operational</span></div>
            <div class="unresolved-incident impact-major">
              <div class="incident-title"><a>Elevated queue latency</a></div>
            </div>
            <div class="components-section">
              <div class="component-inner-container">
                <span class="name">API</span><span class="component-status">Operational</span>
              </div>
              <div class="component-inner-container">
                <span class="name">Dashboard</span><span class="component-status">Degraded Performance</span>
              </div>
            </div>"#;
        let status = parse_status_html("demo", "https://status.demo.com", html).unwrap();
        assert_eq!(status.status, StatusState::Operational);
        assert_eq!(status.current_incidents.len(), 1);
        assert_eq!(status.current_incidents[0].title, "Elevated queue latency");
        assert_eq!(status.current_incidents[0].impact.as_deref(), Some("major"));
        assert_eq!(status.components.len(), 2);
        assert_eq!(status.components[1].status, "degraded performance");
    }

    #[test]
    fn unreadable_markup_is_none() {
        assert!(parse_status_html("demo", "https://x", "<html><body><p>hello</p></body></html>").is_none());
    }

    #[test]
    fn emoji_is_total_over_states() {
        for state in [
            StatusState::Operational,
            StatusState::DegradedPerformance,
            StatusState::PartialOutage,
            StatusState::MajorOutage,
            StatusState::UnderMaintenance,
            StatusState::Unknown,
        ] {
            assert!(!state.emoji().is_empty());
            assert!(!state.as_str().is_empty());
        }
    }
}

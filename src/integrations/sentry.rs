//! Sentry integration: organizations, projects, issues, events and releases.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::Value;

use super::http::ApiClient;
use super::IntegrationError;
use crate::actions::{Action, ActionArgs, ActionRegistry, ActionRouter};
use crate::utilities::config::SentryConfig;
use crate::utilities::time_window::TimeWindow;

const DEFAULT_LIMIT: u32 = 100;

type Query = Vec<(&'static str, String)>;

struct SentryApi {
    api: ApiClient,
    organization_slug: String,
}

/// Optional filters accepted by `get_issues`.
#[derive(Debug, Default)]
struct IssueFilter {
    project_slug: Option<String>,
    query: Option<String>,
    status: Option<String>,
    environment: Option<String>,
    limit: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
}

impl IssueFilter {
    fn from_args(args: &ActionArgs) -> anyhow::Result<Self> {
        Ok(Self {
            project_slug: args.optional("project_slug")?,
            query: args.optional("query")?,
            status: args.optional("status")?,
            environment: args.optional("environment")?,
            limit: args.optional("limit")?,
            start_date: args.optional("start_date")?,
            end_date: args.optional("end_date")?,
        })
    }
}

fn push_window(query: &mut Query, start: Option<&str>, end: Option<&str>, format: &str) -> anyhow::Result<()> {
    let window = TimeWindow::parse(start, end, None)?;
    let render = |dt: NaiveDateTime| dt.format(format).to_string();
    if let Some(start) = window.start {
        query.push(("start", render(start)));
    }
    if let Some(end) = window.end {
        query.push(("end", render(end)));
    }
    Ok(())
}

impl SentryApi {
    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        Ok(self.api.get_json(endpoint, query).await?)
    }

    fn issues_endpoint(&self, project_slug: Option<&str>) -> String {
        match project_slug {
            Some(project) => format!("projects/{}/{}/issues/", self.organization_slug, project),
            None => format!("organizations/{}/issues/", self.organization_slug),
        }
    }

    fn issues_query(filter: &IssueFilter) -> anyhow::Result<Query> {
        let mut query: Query = vec![("limit", filter.limit.unwrap_or(DEFAULT_LIMIT).to_string())];
        if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            query.push(("query", q.to_string()));
        }
        if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
            query.push(("status", status.to_string()));
        }
        if let Some(env) = filter.environment.as_deref().filter(|e| !e.is_empty()) {
            query.push(("environment", env.to_string()));
        }
        push_window(
            &mut query,
            filter.start_date.as_deref(),
            filter.end_date.as_deref(),
            "%Y-%m-%dT%H:%M:%S",
        )?;
        Ok(query)
    }

    async fn get_issues(&self, filter: IssueFilter) -> anyhow::Result<Value> {
        let query = Self::issues_query(&filter)?;
        let endpoint = self.issues_endpoint(filter.project_slug.as_deref());
        self.get(&endpoint, &query).await
    }

    async fn get_issue_events(
        &self,
        issue_id: &str,
        limit: u32,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> anyhow::Result<Value> {
        let mut query: Query = vec![("limit", limit.to_string())];
        if start_date.is_some() || end_date.is_some() {
            query.push(("statsPeriod", String::new()));
        }
        push_window(&mut query, start_date, end_date, "%Y-%m-%d")?;
        self.get(&format!("issues/{}/events/", issue_id), &query).await
    }

    /// Releases, optionally restricted to a project and to those created in
    /// the last `days_back` days.
    async fn get_releases(&self, project_slug: Option<&str>, days_back: Option<i64>) -> anyhow::Result<Value> {
        let mut query: Query = Vec::new();
        if let Some(project) = project_slug {
            query.push(("project", project.to_string()));
        }
        let releases = self
            .get(&format!("organizations/{}/releases/", self.organization_slug), &query)
            .await?;

        let Some(days) = days_back else {
            return Ok(releases);
        };
        let cutoff = Utc::now() - Duration::days(days);
        let recent: Vec<Value> = releases
            .as_array()
            .map(|list| {
                list.iter()
                    .filter(|r| {
                        r.get("dateCreated")
                            .and_then(Value::as_str)
                            .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                            .map_or(false, |d| d >= cutoff)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(recent))
    }
}

/// Sentry client scoped to one organization.
pub struct SentryClient {
    organization_slug: String,
    actions: ActionRegistry,
}

impl fmt::Debug for SentryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryClient")
            .field("organization_slug", &self.organization_slug)
            .field("actions", &self.actions.names().collect::<Vec<_>>())
            .finish()
    }
}

impl SentryClient {
    pub fn new(config: &SentryConfig) -> Result<Self, IntegrationError> {
        let api = ApiClient::new(
            config.api_url.clone(),
            &[
                ("Authorization", format!("Bearer {}", config.auth_token)),
                ("Content-Type", "application/json".to_string()),
            ],
        )?;
        let inner = Arc::new(SentryApi {
            api,
            organization_slug: config.organization_slug.clone(),
        });
        Ok(Self {
            organization_slug: config.organization_slug.clone(),
            actions: Self::register(&inner)?,
        })
    }

    pub fn organization_slug(&self) -> &str {
        &self.organization_slug
    }

    fn register(inner: &Arc<SentryApi>) -> Result<ActionRegistry, IntegrationError> {
        let mut actions = Vec::new();

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_organization", "Get details about the specific organization")
                .handler(move |_| {
                    let api = Arc::clone(&api);
                    async move {
                        api.get(&format!("organizations/{}/", api.organization_slug), &[])
                            .await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_organizations", "Get all organizations available to user")
                .handler(move |_| {
                    let api = Arc::clone(&api);
                    async move { api.get("organizations/", &[]).await }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_projects", "Get all projects in the organization slug").handler(
                move |_| {
                    let api = Arc::clone(&api);
                    async move {
                        api.get(
                            &format!("organizations/{}/projects/", api.organization_slug),
                            &[],
                        )
                        .await
                    }
                },
            ),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_project", "Get details for a project")
                .param("project_slug")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let project: String = args.require("project_slug")?;
                        api.get(
                            &format!("projects/{}/{}/", api.organization_slug, project),
                            &[],
                        )
                        .await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_issues", "Get issues")
                .nullable("project_slug")
                .nullable("query")
                .nullable("status")
                .nullable("environment")
                .defaulted("limit")
                .nullable("start_date")
                .nullable("end_date")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let filter = IssueFilter::from_args(&args)?;
                        api.get_issues(filter).await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_issue", "Get a particular issue")
                .param("issue_id")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let issue_id: String = args.require("issue_id")?;
                        api.get(&format!("issues/{}/", issue_id), &[]).await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_issue_events", "Get events related to an issue")
                .param("issue_id")
                .defaulted("limit")
                .nullable("start_date")
                .nullable("end_date")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let issue_id: String = args.require("issue_id")?;
                        let limit: u32 = args.optional("limit")?.unwrap_or(DEFAULT_LIMIT);
                        let start: Option<String> = args.optional("start_date")?;
                        let end: Option<String> = args.optional("end_date")?;
                        api.get_issue_events(&issue_id, limit, start.as_deref(), end.as_deref())
                            .await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_issue_tags", "Get tags for an issue")
                .param("issue_id")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let issue_id: String = args.require("issue_id")?;
                        api.get(&format!("issues/{}/tags/", issue_id), &[]).await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder("get_event", "Get a particular event")
                .param("project_slug")
                .param("event_id")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let project: String = args.require("project_slug")?;
                        let event_id: String = args.require("event_id")?;
                        api.get(
                            &format!(
                                "projects/{}/{}/events/{}/",
                                api.organization_slug, project, event_id
                            ),
                            &[],
                        )
                        .await
                    }
                }),
        );

        let api = Arc::clone(inner);
        actions.push(
            Action::builder(
                "get_releases",
                "Get all releases for the organization or project with optional time filtering.",
            )
            .nullable("project_slug")
            .nullable("days_back")
            .handler(move |args| {
                let api = Arc::clone(&api);
                async move {
                    let project: Option<String> = args.optional("project_slug")?;
                    let days_back: Option<i64> = args.optional("days_back")?;
                    api.get_releases(project.as_deref(), days_back).await
                }
            }),
        );

        Ok(ActionRegistry::builder().actions(actions).build()?)
    }
}

impl ActionRouter for SentryClient {
    fn registry(&self) -> &ActionRegistry {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Params;
    use serde_json::json;

    fn api() -> SentryApi {
        SentryApi {
            api: ApiClient::new("https://sentry.invalid/api/0/", &[]).unwrap(),
            organization_slug: "acme".into(),
        }
    }

    #[test]
    fn test_issues_endpoint() {
        let api = api();
        assert_eq!(api.issues_endpoint(None), "organizations/acme/issues/");
        assert_eq!(api.issues_endpoint(Some("web")), "projects/acme/web/issues/");
    }

    #[test]
    fn test_issues_query_defaults_limit() {
        let query = SentryApi::issues_query(&IssueFilter::default()).unwrap();
        assert_eq!(query, vec![("limit", "100".to_string())]);
    }

    #[test]
    fn test_issues_query_with_filters_and_dates() {
        let filter = IssueFilter {
            query: Some("is:unresolved".into()),
            status: Some("unresolved".into()),
            limit: Some(5),
            start_date: Some("2024-03-01".into()),
            end_date: Some("2024-03-02T12:00:00Z".into()),
            ..Default::default()
        };
        let query = SentryApi::issues_query(&filter).unwrap();
        assert_eq!(
            query,
            vec![
                ("limit", "5".to_string()),
                ("query", "is:unresolved".to_string()),
                ("status", "unresolved".to_string()),
                ("start", "2024-03-01T00:00:00".to_string()),
                ("end", "2024-03-02T12:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn test_registered_parameter_split() {
        let client = SentryClient::new(&SentryConfig::new("token", "acme")).unwrap();
        let listing = serde_json::to_value(client.available_actions()).unwrap();
        let get_event = listing
            .as_array()
            .unwrap()
            .iter()
            .find_map(|entry| entry.get("get_event"))
            .unwrap();
        assert_eq!(
            get_event["params"],
            json!([{"name": "project_slug"}, {"name": "event_id"}])
        );

        let get_projects = listing
            .as_array()
            .unwrap()
            .iter()
            .find_map(|entry| entry.get("get_projects"))
            .unwrap();
        assert!(get_projects.get("params").is_none());
    }

    #[tokio::test]
    async fn test_bad_date_fails_before_any_request() {
        let client = SentryClient::new(&SentryConfig::new("token", "acme")).unwrap();
        let mut params = Params::new();
        params.insert("start_date".into(), json!("yesterday-ish"));
        let result = client.execute_action("get_issues", params).await;
        assert_eq!(
            result.message(),
            Some("Invalid ISO-8601 timestamp: yesterday-ish")
        );
    }
}

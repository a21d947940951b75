//! GitHub integration: repositories, commits, code search and file contents.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use base64::Engine;
use serde_json::{json, Value};

use super::http::ApiClient;
use super::IntegrationError;
use crate::actions::{Action, ActionRegistry, ActionRouter};
use crate::utilities::config::GitHubConfig;

const DEFAULT_COMMIT_LIMIT: u32 = 10;

/// Split `owner/repo` or fall back to `org_name` as the owner.
pub fn resolve_repo(org_name: Option<&str>, repo_name: &str) -> anyhow::Result<(String, String)> {
    match repo_name.split_once('/') {
        Some((owner, repo)) => Ok((owner.to_string(), repo.rsplit('/').next().unwrap_or(repo).to_string())),
        None => {
            let owner = org_name
                .filter(|o| !o.is_empty())
                .ok_or_else(|| anyhow!("Repository {} needs an owner: pass org_name or owner/repo", repo_name))?;
            Ok((owner.to_string(), repo_name.to_string()))
        }
    }
}

/// Scope a code search to a repository or user unless the query already is.
pub fn scoped_query(query: &str, org_name: Option<&str>, repo_name: Option<&str>) -> String {
    if query.contains("repo:") || query.contains("user:") {
        return query.to_string();
    }
    let org = org_name.filter(|o| !o.is_empty());
    match (org, repo_name.filter(|r| !r.is_empty())) {
        (Some(org), Some(repo)) => {
            let (owner, repo) = match repo.split_once('/') {
                Some((owner, repo)) => (owner, repo),
                None => (org, repo),
            };
            format!("{} repo:{}/{}", query, owner, repo)
        }
        (Some(org), None) => format!("{} user:{}", query, org),
        _ => query.to_string(),
    }
}

fn str_field(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

struct GitHubApi {
    api: ApiClient,
}

impl GitHubApi {
    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        Ok(self.api.get_json(endpoint, query).await?)
    }

    async fn list_repositories(&self, org_name: Option<&str>) -> anyhow::Result<Value> {
        let endpoint = match org_name.filter(|o| !o.is_empty()) {
            Some(org) => format!("/orgs/{}/repos", org),
            None => "/user/repos".to_string(),
        };
        let response = self.get(&endpoint, &[]).await?;

        let repos: Vec<Value> = response
            .as_array()
            .map(|list| {
                list.iter()
                    .filter(|r| {
                        !r.get("archived").and_then(Value::as_bool).unwrap_or(false)
                            && !r.get("disabled").and_then(Value::as_bool).unwrap_or(false)
                    })
                    .map(|r| {
                        json!({
                            "name": str_field(r, "name"),
                            "url": str_field(r, "url"),
                            "language": str_field(r, "language"),
                            "description": str_field(r, "description"),
                            "pushed_at": str_field(r, "pushed_at"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(repos))
    }

    async fn get_repository(&self, owner: &str, repo: &str) -> anyhow::Result<Value> {
        let r = self.get(&format!("/repos/{}/{}", owner, repo), &[]).await?;
        let archived = r.get("archived").and_then(Value::as_bool).unwrap_or(false)
            || r.get("disabled").and_then(Value::as_bool).unwrap_or(false);
        Ok(json!({
            "name": str_field(&r, "full_name"),
            "private": str_field(&r, "private"),
            "archived": archived,
            "language": str_field(&r, "language"),
            "size": str_field(&r, "size"),
            "url": str_field(&r, "url"),
            "description": str_field(&r, "description"),
            "updated_at": str_field(&r, "updated_at"),
            "pushed_at": str_field(&r, "pushed_at"),
        }))
    }

    async fn get_recent_commits(&self, owner: &str, repo: &str, limit: u32) -> anyhow::Result<Value> {
        let response = self
            .get(
                &format!("/repos/{}/{}/commits", owner, repo),
                &[("per_page", limit.to_string())],
            )
            .await?;

        let commits: Vec<Value> = response
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|c| {
                        let commit = c.get("commit").cloned().unwrap_or(Value::Null);
                        let parents: Vec<Value> = c
                            .get("parents")
                            .and_then(Value::as_array)
                            .map(|ps| ps.iter().map(|p| str_field(p, "sha")).collect())
                            .unwrap_or_default();
                        json!({
                            "sha": str_field(c, "sha"),
                            "author": commit.pointer("/author/name").cloned().unwrap_or(Value::Null),
                            "message": str_field(&commit, "message"),
                            "parent": parents,
                            "date": commit.pointer("/committer/date").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(commits))
    }

    async fn search_code(&self, query: &str) -> anyhow::Result<Value> {
        let response = self.get("/search/code", &[("q", query.to_string())]).await?;
        let items: Vec<Value> = response
            .get("items")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|item| {
                        json!({
                            "path": str_field(item, "path"),
                            "sha": str_field(item, "sha"),
                            "repository": item.pointer("/repository/url").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(items))
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> anyhow::Result<Value> {
        let mut query = Vec::new();
        if let Some(r) = git_ref {
            query.push(("ref", r.to_string()));
        }
        let response = self
            .get(
                &format!("/repos/{}/{}/contents/{}", owner, repo, path.trim_start_matches('/')),
                &query,
            )
            .await?;

        let encoded = response
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("{} is not a file", path))?;
        // GitHub wraps base64 content at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .with_context(|| format!("Failed to decode contents of {}", path))?;

        Ok(json!({
            "path": str_field(&response, "path"),
            "sha": str_field(&response, "sha"),
            "size": str_field(&response, "size"),
            "content": String::from_utf8_lossy(&bytes),
        }))
    }
}

/// GitHub REST client.
pub struct GitHubClient {
    actions: ActionRegistry,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("actions", &self.actions.names().collect::<Vec<_>>())
            .finish()
    }
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, IntegrationError> {
        let api = ApiClient::new(
            config.api_url.clone(),
            &[
                ("Authorization", format!("Bearer {}", config.access_token)),
                ("Accept", "application/vnd.github+json".to_string()),
                ("X-GitHub-Api-Version", "2022-11-28".to_string()),
            ],
        )?;
        let inner = Arc::new(GitHubApi { api });
        Ok(Self {
            actions: Self::register(&inner)?,
        })
    }

    fn register(inner: &Arc<GitHubApi>) -> Result<ActionRegistry, IntegrationError> {
        let api = Arc::clone(inner);
        let list_repositories = Action::builder(
            "list_repositories",
            "Lists all available repositories in the given `org_name`",
        )
        .param("org_name")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let org: Option<String> = args.optional("org_name")?;
                api.list_repositories(org.as_deref()).await
            }
        });

        let api = Arc::clone(inner);
        let get_repository =
            Action::builder("get_repository", "Gets details about a specific repository")
                .nullable("org_name")
                .param("repo_name")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let org: Option<String> = args.optional("org_name")?;
                        let repo_name: String = args.require("repo_name")?;
                        let (owner, repo) = resolve_repo(org.as_deref(), &repo_name)?;
                        api.get_repository(&owner, &repo).await
                    }
                });

        let api = Arc::clone(inner);
        let recent_commits = Action::builder(
            "get_recent_commits",
            "Gets recent commits made to the repository, default limit: 10",
        )
        .nullable("org_name")
        .param("repo_name")
        .defaulted("limit")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let org: Option<String> = args.optional("org_name")?;
                let repo_name: String = args.require("repo_name")?;
                let limit: u32 = args.optional("limit")?.unwrap_or(DEFAULT_COMMIT_LIMIT);
                let (owner, repo) = resolve_repo(org.as_deref(), &repo_name)?;
                api.get_recent_commits(&owner, &repo, limit).await
            }
        });

        let api = Arc::clone(inner);
        let search_code = Action::builder(
            "search_code",
            "Searches for code in github using github search; supports all github search keys",
        )
        .param("org_name")
        .nullable("repo_name")
        .param("query")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let org: Option<String> = args.optional("org_name")?;
                let repo: Option<String> = args.optional("repo_name")?;
                let query: String = args.require("query")?;
                let scoped = scoped_query(&query, org.as_deref(), repo.as_deref());
                api.search_code(&scoped).await
            }
        });

        let api = Arc::clone(inner);
        let file_content = Action::builder(
            "get_file_content",
            "Reads a file from the repository at an optional git ref",
        )
        .nullable("org_name")
        .param("repo_name")
        .param("file_path")
        .nullable("ref")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let org: Option<String> = args.optional("org_name")?;
                let repo_name: String = args.require("repo_name")?;
                let path: String = args.require("file_path")?;
                let git_ref: Option<String> = args.optional("ref")?;
                let (owner, repo) = resolve_repo(org.as_deref(), &repo_name)?;
                api.get_file_content(&owner, &repo, &path, git_ref.as_deref())
                    .await
            }
        });

        Ok(ActionRegistry::builder()
            .action(list_repositories)
            .action(get_repository)
            .action(recent_commits)
            .action(search_code)
            .action(file_content)
            .build()?)
    }
}

impl ActionRouter for GitHubClient {
    fn registry(&self) -> &ActionRegistry {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Params;

    fn client() -> GitHubClient {
        GitHubClient::new(&GitHubConfig::new("ghp_test")).unwrap()
    }

    #[test]
    fn test_resolve_repo() {
        assert_eq!(
            resolve_repo(None, "acme/api").unwrap(),
            ("acme".to_string(), "api".to_string())
        );
        assert_eq!(
            resolve_repo(Some("acme"), "api").unwrap(),
            ("acme".to_string(), "api".to_string())
        );
        // The owner in `owner/repo` wins over org_name.
        assert_eq!(
            resolve_repo(Some("other"), "acme/api").unwrap(),
            ("acme".to_string(), "api".to_string())
        );
        assert!(resolve_repo(None, "api").is_err());
    }

    #[test]
    fn test_scoped_query() {
        assert_eq!(
            scoped_query("load_tokenizer", Some("acme"), None),
            "load_tokenizer user:acme"
        );
        assert_eq!(
            scoped_query("load_tokenizer", Some("acme"), Some("api")),
            "load_tokenizer repo:acme/api"
        );
        assert_eq!(
            scoped_query("load_tokenizer", Some("acme"), Some("other/api")),
            "load_tokenizer repo:other/api"
        );
        assert_eq!(
            scoped_query("fn main repo:x/y", Some("acme"), None),
            "fn main repo:x/y"
        );
    }

    #[test]
    fn test_nullable_org_is_listed_optional() {
        let listing = serde_json::to_value(client().available_actions()).unwrap();
        let repo = listing
            .as_array()
            .unwrap()
            .iter()
            .find_map(|entry| entry.get("get_repository"))
            .unwrap();
        assert_eq!(
            repo["params"],
            json!([{"name": "org_name", "optional": true}, {"name": "repo_name"}])
        );
    }

    #[tokio::test]
    async fn test_repo_without_owner_is_execution_error() {
        let mut params = Params::new();
        params.insert("repo_name".into(), json!("api"));
        let result = client().execute_action("get_repository", params).await;
        assert!(result.message().unwrap().contains("needs an owner"));
    }

    #[tokio::test]
    async fn test_search_requires_org_and_query() {
        let result = client().execute_action("search_code", Params::new()).await;
        assert_eq!(
            result.message(),
            Some("Missing required parameters for search_code: org_name, query")
        );
    }
}

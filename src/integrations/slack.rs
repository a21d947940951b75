//! Slack integration: channels, channel history and threads.
//!
//! Talks to the Slack Web API with a bot token. Messages can be passed
//! through caller-supplied redaction hooks before they leave the client.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::http::{ApiClient, ApiError};
use super::IntegrationError;
use crate::actions::{Action, ActionRegistry, ActionRouter};
use crate::utilities::config::SlackConfig;

/// Page size requested from history and list endpoints.
const PAGE_LIMIT: u32 = 1000;

static MESSAGE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/archives/([^/?#]+)/p(\d{16,})").unwrap());

/// Redacts free text in a message.
pub type TextRedactor = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Redacts the `blocks` of a message.
pub type BlockRedactor = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Extract `(channel_id, thread_ts)` from a Slack message permalink.
///
/// `https://team.slack.com/archives/C01234ABCD/p1234567890123456` maps to
/// `("C01234ABCD", "1234567890.123456")`.
pub fn parse_message_url(url: &str) -> anyhow::Result<(String, String)> {
    let caps = MESSAGE_URL
        .captures(url)
        .ok_or_else(|| anyhow!("Could not parse channel ID or timestamp from URL: {}", url))?;
    let digits = &caps[2];
    let (secs, micros) = digits.split_at(digits.len() - 6);
    Ok((caps[1].to_string(), format!("{}.{}", secs, micros)))
}

/// Render a Slack timestamp parameter. Numbers and strings are both accepted.
fn slack_ts(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(anyhow!("Expected a Slack timestamp, got {}", other)),
    }
}

fn epoch_ts(dt: DateTime<Utc>) -> String {
    format!("{}.{:06}", dt.timestamp(), dt.timestamp_subsec_micros())
}

fn has_thread(message: &Value) -> bool {
    message.get("thread_ts").is_some()
        || message
            .get("reply_count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0
}

struct SlackApi {
    api: ApiClient,
    redact_text: Option<TextRedactor>,
    redact_blocks: Option<BlockRedactor>,
}

impl SlackApi {
    /// Call a Web API method; Slack reports failures as `ok: false`.
    async fn call(&self, method: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        let body = self.api.get_json(method, query).await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(ApiError::Api(format!("{} failed: {}", method, error)).into());
        }
        Ok(body)
    }

    fn redact(&self, mut message: Value) -> Value {
        let Some(redact_text) = &self.redact_text else {
            return message;
        };
        if let Some(text) = message.get("text").and_then(Value::as_str) {
            let redacted = redact_text(text);
            message["text"] = Value::String(redacted);
        }
        if let Some(redact_blocks) = &self.redact_blocks {
            if let Some(blocks) = message.get("blocks").filter(|b| !b.is_null()) {
                let redacted = redact_blocks(blocks);
                message["blocks"] = redacted;
            }
        }
        message
    }

    fn messages(body: Value) -> Vec<Value> {
        match body {
            Value::Object(mut map) => match map.remove("messages") {
                Some(Value::Array(messages)) => messages,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    async fn get_all_channels(&self) -> anyhow::Result<Value> {
        let body = self
            .call(
                "conversations.list",
                &[
                    ("types", "public_channel,private_channel".to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ],
            )
            .await?;

        let channels: Vec<Value> = body
            .get("channels")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|c| {
                        let name = c.get("name")?.as_str()?;
                        let id = c.get("id")?.clone();
                        Some(json!({ name: id }))
                    })
                    .collect()
            })
            .unwrap_or_default();

        log::debug!("Available channels {:?}", channels);
        Ok(Value::Array(channels))
    }

    /// Replies in a thread, without the parent message.
    async fn get_thread_replies(&self, channel_id: &str, thread_ts: &str) -> anyhow::Result<Vec<Value>> {
        let body = self
            .call(
                "conversations.replies",
                &[("channel", channel_id.to_string()), ("ts", thread_ts.to_string())],
            )
            .await?;
        Ok(Self::messages(body).into_iter().skip(1).collect())
    }

    /// Channel history between two timestamps, with thread replies inlined
    /// after their parent and tagged `is_thread_reply`.
    async fn get_messages_for_channel(
        &self,
        channel_id: &str,
        start_ts: &str,
        end_ts: &str,
    ) -> anyhow::Result<Vec<Value>> {
        let body = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel_id.to_string()),
                    ("oldest", start_ts.to_string()),
                    ("latest", end_ts.to_string()),
                    ("limit", PAGE_LIMIT.to_string()),
                ],
            )
            .await?;

        let mut out = Vec::new();
        for message in Self::messages(body) {
            let thread_ts = if has_thread(&message) {
                message.get("ts").and_then(Value::as_str).map(String::from)
            } else {
                None
            };
            out.push(self.redact(message));

            if let Some(thread_ts) = thread_ts {
                for mut reply in self.get_thread_replies(channel_id, &thread_ts).await? {
                    reply["is_thread_reply"] = Value::Bool(true);
                    reply["parent_message_ts"] = Value::String(thread_ts.clone());
                    out.push(self.redact(reply));
                }
            }
        }
        Ok(out)
    }

    async fn process_channels(&self, channel_ids: &[String], lookback_days: i64) -> anyhow::Result<Value> {
        let end = Utc::now();
        let start = end - Duration::days(lookback_days);
        let (start_ts, end_ts) = (epoch_ts(start), epoch_ts(end));

        let mut messages = Vec::new();
        for channel_id in channel_ids {
            log::info!("Processing channel: {}", channel_id);
            messages.extend(
                self.get_messages_for_channel(channel_id, &start_ts, &end_ts)
                    .await?,
            );
        }
        Ok(Value::Array(messages))
    }

    async fn fetch_conversation(&self, channel_id: &str, thread_ts: &str) -> anyhow::Result<Value> {
        let body = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel_id.to_string()),
                    ("oldest", thread_ts.to_string()),
                    ("latest", thread_ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let parent = Self::messages(body)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Message not found"))?;

        let replies = if has_thread(&parent) {
            self.get_thread_replies(channel_id, thread_ts)
                .await?
                .into_iter()
                .map(|reply| self.redact(reply))
                .collect()
        } else {
            Vec::new()
        };

        Ok(json!({
            "parent_message": self.redact(parent),
            "thread_replies": replies,
            "channel_id": channel_id,
            "thread_ts": thread_ts,
        }))
    }
}

/// Slack client exposing read-only conversation actions.
pub struct SlackClient {
    actions: ActionRegistry,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("actions", &self.actions.names().collect::<Vec<_>>())
            .finish()
    }
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Result<Self, IntegrationError> {
        Self::with_redaction(config, None, None)
    }

    /// Build a client whose returned messages pass through the given hooks.
    /// Block redaction only runs when text redaction is configured.
    pub fn with_redaction(
        config: &SlackConfig,
        redact_text: Option<TextRedactor>,
        redact_blocks: Option<BlockRedactor>,
    ) -> Result<Self, IntegrationError> {
        let api = ApiClient::new(
            config.api_url.clone(),
            &[("Authorization", format!("Bearer {}", config.bot_token))],
        )?;
        let inner = Arc::new(SlackApi {
            api,
            redact_text,
            redact_blocks,
        });
        let actions = Self::register(&inner)?;
        Ok(Self { actions })
    }

    fn register(inner: &Arc<SlackApi>) -> Result<ActionRegistry, IntegrationError> {
        let api = Arc::clone(inner);
        let all_channels = Action::builder("get_all_channels", "Fetch all channels").handler(
            move |_| {
                let api = Arc::clone(&api);
                async move { api.get_all_channels().await }
            },
        );

        let api = Arc::clone(inner);
        let channel_messages = Action::builder(
            "get_messages_for_channel",
            "Get messages from a channel between given start and end time",
        )
        .param("channel_id")
        .param("start_time")
        .param("end_time")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let channel_id: String = args.require("channel_id")?;
                let start = slack_ts(&args.require::<Value>("start_time")?)?;
                let end = slack_ts(&args.require::<Value>("end_time")?)?;
                api.get_messages_for_channel(&channel_id, &start, &end).await
            }
        });

        let api = Arc::clone(inner);
        let thread_replies =
            Action::builder("get_thread_replies", "Fetch all messages from within a thread")
                .param("channel_id")
                .param("thread_ts")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let channel_id: String = args.require("channel_id")?;
                        let thread_ts = slack_ts(&args.require::<Value>("thread_ts")?)?;
                        api.get_thread_replies(&channel_id, &thread_ts).await
                    }
                });

        let api = Arc::clone(inner);
        let process_channels =
            Action::builder("process_channels", "Fetch messages from a given channel Id")
                .param("channel_ids")
                .defaulted("lookback_days")
                .handler(move |args| {
                    let api = Arc::clone(&api);
                    async move {
                        let channel_ids: Vec<String> = args.require("channel_ids")?;
                        let lookback_days: i64 = args.optional("lookback_days")?.unwrap_or(1);
                        api.process_channels(&channel_ids, lookback_days).await
                    }
                });

        let api = Arc::clone(inner);
        let conversation = Action::builder(
            "fetch_conversation",
            "Fetch a single conversation thread using the channel ID and thread TS",
        )
        .param("channel_id")
        .param("thread_ts")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let channel_id: String = args.require("channel_id")?;
                let thread_ts = slack_ts(&args.require::<Value>("thread_ts")?)?;
                api.fetch_conversation(&channel_id, &thread_ts).await
            }
        });

        let api = Arc::clone(inner);
        let conversation_from_url = Action::builder(
            "fetch_conversation_from_url",
            "Fetch a single conversation thread using a Slack URL",
        )
        .param("slack_url")
        .handler(move |args| {
            let api = Arc::clone(&api);
            async move {
                let url: String = args.require("slack_url")?;
                let (channel_id, thread_ts) = parse_message_url(&url)?;
                log::info!("Parsed URL: channel_id={}, timestamp={}", channel_id, thread_ts);
                api.fetch_conversation(&channel_id, &thread_ts)
                    .await
                    .with_context(|| format!("Failed to fetch conversation for {}", url))
            }
        });

        Ok(ActionRegistry::builder()
            .action(all_channels)
            .action(channel_messages)
            .action(thread_replies)
            .action(process_channels)
            .action(conversation)
            .action(conversation_from_url)
            .build()?)
    }
}

impl ActionRouter for SlackClient {
    fn registry(&self) -> &ActionRegistry {
        &self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Params;

    fn client() -> SlackClient {
        SlackClient::new(&SlackConfig::new("xoxb-test")).unwrap()
    }

    #[test]
    fn test_parse_message_url() {
        let (channel, ts) =
            parse_message_url("https://team.slack.com/archives/C01234ABCD/p1234567890123456")
                .unwrap();
        assert_eq!(channel, "C01234ABCD");
        assert_eq!(ts, "1234567890.123456");
    }

    #[test]
    fn test_parse_message_url_with_query() {
        let (channel, ts) = parse_message_url(
            "https://team.slack.com/archives/G999/p1700000000000100?thread_ts=1700000000.000100",
        )
        .unwrap();
        assert_eq!(channel, "G999");
        assert_eq!(ts, "1700000000.000100");
    }

    #[test]
    fn test_parse_message_url_rejects_garbage() {
        let err = parse_message_url("https://team.slack.com/messages/general").unwrap_err();
        assert!(err.to_string().contains("Could not parse"));
    }

    #[test]
    fn test_slack_ts_accepts_numbers_and_strings() {
        assert_eq!(slack_ts(&json!("1700000000.000100")).unwrap(), "1700000000.000100");
        assert_eq!(slack_ts(&json!(1700000000)).unwrap(), "1700000000");
        assert!(slack_ts(&json!(null)).is_err());
    }

    #[test]
    fn test_redaction_hooks_applied() {
        let inner = SlackApi {
            api: ApiClient::new("https://slack.invalid/api/", &[]).unwrap(),
            redact_text: Some(Arc::new(|t: &str| t.replace("hunter2", "[REDACTED]"))),
            redact_blocks: Some(Arc::new(|_: &Value| json!([]))),
        };
        let message = json!({"text": "password is hunter2", "blocks": [{"type": "section"}]});
        let redacted = inner.redact(message);
        assert_eq!(redacted["text"], "password is [REDACTED]");
        assert_eq!(redacted["blocks"], json!([]));
    }

    #[test]
    fn test_registered_actions() {
        let names: Vec<String> = client()
            .available_actions()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "get_all_channels",
                "get_messages_for_channel",
                "get_thread_replies",
                "process_channels",
                "fetch_conversation",
                "fetch_conversation_from_url",
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_url_surfaces_as_error_envelope() {
        let mut params = Params::new();
        params.insert("slack_url".into(), json!("not a slack link"));
        let result = client()
            .execute_action("fetch_conversation_from_url", params)
            .await;
        assert!(result
            .message()
            .unwrap()
            .starts_with("Could not parse channel ID or timestamp"));
    }
}

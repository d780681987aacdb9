//! Hosted assistant (thread/run) API client.
//!
//! One assistant invocation walks four states: create a thread, post a
//! user message, start a run of a named assistant against the thread, then
//! poll the thread's message list until the newest message is an assistant
//! reply with non-empty content. Threads are single-use and discarded.
//!
//! The reply is either used verbatim or holds JSON inside a triple-backtick
//! fence; [`ReplyFormat`] selects the extraction mode explicitly at the
//! call site.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use invoicematch_shared::config::AssistantConfig;
use invoicematch_shared::{InvoiceMatchError, PollPolicy, Result};

/// Service tag used in error messages.
const SERVICE: &str = "assistant";

/// Default timeout for a single HTTP request (polling has its own deadline).
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for assistant API requests.
const USER_AGENT: &str = concat!("invoicematch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response for `POST /threads`.
#[derive(Debug, Deserialize)]
struct ThreadCreated {
    id: String,
}

/// Metadata returned when a run is started. The run's own status is
/// informational only: completion is detected from the message list.
#[derive(Debug, Clone, Deserialize)]
pub struct RunMetadata {
    /// Run identifier.
    pub id: String,
    /// Status at creation time (typically `queued`).
    #[serde(default)]
    pub status: String,
}

/// Response for `GET /threads/{id}/messages`, newest message first.
#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: TextValue,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

impl ThreadMessage {
    /// An assistant-authored message with non-empty content: the polling
    /// loop's only exit condition.
    fn is_complete_reply(&self) -> bool {
        self.role == "assistant"
            && self
                .content
                .first()
                .is_some_and(|part| !part.text.value.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ReplyFormat
// ---------------------------------------------------------------------------

/// How to interpret an assistant reply. Passed explicitly per call rather
/// than inferred from which assistant id was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// Use the reply text verbatim.
    PlainText,
    /// Extract a JSON payload from a fenced code block in the reply.
    FencedJson,
}

// ---------------------------------------------------------------------------
// AssistantClient
// ---------------------------------------------------------------------------

/// Client bound to one named assistant, owning its HTTP connection and
/// configuration.
pub struct AssistantClient {
    client: reqwest::Client,
    endpoint: String,
    api_version: String,
    model: String,
    assistant_id: String,
}

impl AssistantClient {
    /// Create a client for the given assistant id. The API key is attached
    /// as a static `api-key` header on every request.
    pub fn new(config: &AssistantConfig, assistant_id: &str, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key)
            .map_err(|e| InvoiceMatchError::config(format!("invalid API key value: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert("api-key", key_value);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                InvoiceMatchError::service(SERVICE, format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            assistant_id: assistant_id.to_string(),
        })
    }

    /// The assistant id this client runs.
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint, tail, self.api_version
        )
    }

    /// Create a new conversation thread.
    #[instrument(skip(self))]
    pub async fn create_thread(&self) -> Result<String> {
        let url = self.url("threads");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("create thread: HTTP {status}"),
            ));
        }

        let parsed: ThreadCreated = response.json().await.map_err(|e| {
            InvoiceMatchError::format(format!("thread response did not match schema: {e}"))
        })?;

        debug!(thread_id = %parsed.id, "thread created");
        Ok(parsed.id)
    }

    /// Post a single user-role message to the thread.
    #[instrument(skip(self, text))]
    pub async fn post_message(&self, thread_id: &str, text: &str) -> Result<()> {
        let url = self.url(&format!("threads/{thread_id}/messages"));
        let body = serde_json::json!({
            "role": "user",
            "content": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("post message: HTTP {status}"),
            ));
        }

        Ok(())
    }

    /// Start a run of this client's assistant against the thread.
    #[instrument(skip(self))]
    pub async fn start_run(&self, thread_id: &str) -> Result<RunMetadata> {
        let url = self.url(&format!("threads/{thread_id}/runs"));
        let body = serde_json::json!({
            "assistant_id": self.assistant_id,
            "model": self.model,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("start run: HTTP {status}"),
            ));
        }

        let run: RunMetadata = response.json().await.map_err(|e| {
            InvoiceMatchError::format(format!("run response did not match schema: {e}"))
        })?;

        debug!(run_id = %run.id, status = %run.status, "run started");
        Ok(run)
    }

    /// Poll the thread's message list until the newest message is a
    /// non-empty assistant reply, returning its text. A thread with no
    /// messages, or whose newest message is still the user's, keeps
    /// polling until the deadline.
    #[instrument(skip(self, policy))]
    pub async fn await_reply(&self, thread_id: &str, policy: &PollPolicy) -> Result<String> {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let messages = self.fetch_messages(thread_id).await?;

            if let Some(newest) = messages.data.first() {
                if newest.is_complete_reply() {
                    info!(attempts, elapsed = ?start.elapsed(), "assistant replied");
                    // is_complete_reply guarantees a first content part
                    return Ok(newest.content[0].text.value.clone());
                }
            }

            debug!(attempts, "no assistant reply yet");
            if start.elapsed() + policy.interval >= policy.deadline {
                return Err(InvoiceMatchError::Timeout {
                    waiting_for: "assistant reply",
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
            tokio::time::sleep(policy.interval).await;
        }
    }

    /// One message-list fetch.
    async fn fetch_messages(&self, thread_id: &str) -> Result<MessageList> {
        let url = self.url(&format!("threads/{thread_id}/messages"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InvoiceMatchError::service(SERVICE, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvoiceMatchError::service(
                SERVICE,
                format!("list messages: HTTP {status}"),
            ));
        }

        response.json().await.map_err(|e| {
            InvoiceMatchError::format(format!("message list did not match schema: {e}"))
        })
    }

    /// One full invocation: thread → message → run → reply → extraction.
    #[instrument(skip(self, text, policy), fields(assistant_id = %self.assistant_id))]
    pub async fn chat(
        &self,
        text: &str,
        format: ReplyFormat,
        policy: &PollPolicy,
    ) -> Result<String> {
        let thread_id = self.create_thread().await?;
        self.post_message(&thread_id, text).await?;
        self.start_run(&thread_id).await?;
        let reply = self.await_reply(&thread_id, policy).await?;
        reply_payload(&reply, format)
    }
}

// ---------------------------------------------------------------------------
// Reply extraction
// ---------------------------------------------------------------------------

/// Extract the machine-readable payload from a reply according to `format`.
///
/// `FencedJson` prefers a triple-backtick block, but accepts a reply that is
/// already bare JSON, since assistants occasionally skip the fence.
pub fn reply_payload(reply: &str, format: ReplyFormat) -> Result<String> {
    match format {
        ReplyFormat::PlainText => Ok(reply.to_string()),
        ReplyFormat::FencedJson => {
            if reply.contains("```") {
                return extract_fenced_json(reply);
            }
            let trimmed = reply.trim();
            if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
                return Ok(trimmed.to_string());
            }
            Err(InvoiceMatchError::format(
                "reply contains neither a fenced block nor bare JSON",
            ))
        }
    }
}

/// Extract the first triple-backtick-fenced block from a reply, stripping an
/// optional `json` language tag and all newlines.
pub fn extract_fenced_json(reply: &str) -> Result<String> {
    let mut segments = reply.split("```");
    // Text before the first fence; discarded.
    segments.next();

    let block = segments.next().ok_or_else(|| {
        InvoiceMatchError::format("reply does not contain a fenced code block")
    })?;

    let block = block.strip_prefix("json").unwrap_or(block);
    Ok(block.replace('\n', "").trim().to_string())
}

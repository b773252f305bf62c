//! Readiness and smoke checks against the server's OpenAI-compatible API

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-request timeout for the review call
const REVIEW_TIMEOUT: Duration = Duration::from_secs(300);

const REVIEW_SYSTEM_PROMPT: &str = "You are a WordPress security reviewer. \
List findings as CRITICAL/WARNING/INFO with file and line context. \
Do NOT write code fixes; describe what should change.";

/// PHP with an obvious SQL injection, used as the known-bad smoke input
pub const VULNERABLE_SNIPPET: &str = r#"function getUserData($id) {
    global $wpdb;
    $result = $wpdb->get_row("SELECT * FROM wp_users WHERE ID = " . $id);
    echo "<h1>Welcome " . $result->display_name . "</h1>";
    return $result;
}"#;

const INJECTION_KEYWORDS: [&str; 3] = ["sql", "injection", "prepare"];

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Extract model ids from a `GET /v1/models` response body
pub fn parse_model_list(body: &str) -> Result<Vec<String>> {
    let list: ModelList =
        serde_json::from_str(body).context("Unexpected response from /v1/models")?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Outcome of asking the served model to review [`VULNERABLE_SNIPPET`]
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeReview {
    pub model: String,
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub caught_injection: bool,
}

/// True if a review names the SQL injection, case-insensitively
pub fn mentions_injection(review: &str) -> bool {
    let review = review.to_lowercase();
    INJECTION_KEYWORDS.iter().any(|k| review.contains(k))
}

/// Turn a `POST /v1/chat/completions` response body into a [`SmokeReview`]
pub fn parse_chat_completion(model: &str, body: &str) -> Result<SmokeReview> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Unexpected response from /v1/chat/completions")?;
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .context("Chat completion returned no choices")?;
    let usage = response.usage.unwrap_or_default();

    Ok(SmokeReview {
        model: model.to_string(),
        caught_injection: mentions_injection(&content),
        content,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    })
}

pub struct HealthProbe {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HealthProbe {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(concat!("qa-serve/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ids of the models the server is currently serving
    pub fn served_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .with_context(|| format!("Could not reach {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP {} from {}", response.status(), url);
        }

        let body = response
            .text()
            .with_context(|| format!("Failed to read response from {url}"))?;
        parse_model_list(&body)
    }

    /// The first served model id, or an error if the server lists none
    pub fn loaded_model(&self) -> Result<String> {
        self.served_models()?
            .into_iter()
            .next()
            .with_context(|| format!("{} is up but serves no models", self.base_url))
    }

    /// Ask the loaded model to review a snippet with a known SQL injection
    pub fn smoke_review(&self) -> Result<SmokeReview> {
        let model = self.loaded_model()?;
        let request = ChatRequest {
            model: &model,
            messages: vec![
                ChatMessage::new("system", REVIEW_SYSTEM_PROMPT),
                ChatMessage::new(
                    "user",
                    format!("Review this code for security issues:\n{VULNERABLE_SNIPPET}"),
                ),
            ],
            temperature: 0.1,
            max_tokens: 1024,
        };

        let url = format!("{}/chat/completions", self.base_url);
        info!("requesting smoke review from {model}");
        let response = self
            .client
            .post(&url)
            .timeout(REVIEW_TIMEOUT)
            .json(&request)
            .send()
            .with_context(|| format!("Could not reach {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP {} from {}", response.status(), url);
        }

        let body = response
            .text()
            .with_context(|| format!("Failed to read response from {url}"))?;
        parse_chat_completion(&model, &body)
    }

    /// Poll until the server answers with a model or `timeout` passes.
    /// Loading a large model can take several minutes.
    pub fn wait_until_ready(&self, timeout: Duration, interval: Duration) -> Result<String> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Waiting for {}", self.base_url));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let started = Instant::now();
        loop {
            match self.loaded_model() {
                Ok(model) => {
                    spinner.finish_with_message(format!("Server ready, serving {model}"));
                    return Ok(model);
                }
                Err(e) => debug!("not ready yet: {e:#}"),
            }

            if started.elapsed() >= timeout {
                spinner.abandon_with_message("Server did not become ready");
                bail!(
                    "{} was not ready after {}s",
                    self.base_url,
                    timeout.as_secs()
                );
            }
            std::thread::sleep(interval);
        }
    }
}

//! LLM-backed privacy policy classification
//!
//! The pipeline treats the classifier as a pluggable, best-effort capability:
//! implementations must return `None` when unconfigured or on any failure so
//! the heuristic baseline always stands on its own.

use async_openai::config::AzureConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;

const SYSTEM_PROMPT: &str = r#"You are a privacy policy analyzer. Extract what user data the policy says is collected and whether the policy mentions third-party sharing, partners, analytics, and security/deletion practices. Respond with STRICT JSON ONLY, with the following keys:
- dataCollected: array of short strings (e.g. ["email", "location"]).
- dataShared: array of short strings (e.g. ["ads partners"]).
- securityPractices: object with boolean keys: encryptedInTransit, secureConnection, userDataDeletionRequest, developerDataDeletionMechanism.
- summary: an ARRAY of EXACTLY 4 short strings. Each array element should be one concise bullet-point style privacy highlight (1-2 short lines each).
Return only valid JSON and nothing else. Do not add any explanatory text or wrapper."#;

/// Structured judgment returned by a classifier for one policy text
///
/// Every field is optional on the wire; absent fields leave the heuristic
/// baseline untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyJudgment {
    /// Data types the policy says are collected
    pub data_collected: Vec<String>,
    /// Data types the policy says are shared with third parties
    pub data_shared: Vec<String>,
    /// Per-key security practice verdicts; `None` keys defer to heuristics
    pub security_practices: Option<JudgedPractices>,
    /// Free-form summary, normalized downstream into exactly four bullets
    pub summary: Option<Value>,
}

/// Security practice verdicts as the classifier reports them
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct JudgedPractices {
    /// Policy mentions encryption in transit
    pub encrypted_in_transit: Option<bool>,
    /// Policy mentions secure connections
    pub secure_connection: Option<bool>,
    /// Policy offers a user-initiated data deletion request
    pub user_data_deletion_request: Option<bool>,
    /// Policy names a developer-side deletion mechanism
    pub developer_data_deletion_mechanism: Option<bool>,
}

/// A capability that turns free policy text into a structured judgment
///
/// `classify` never errors: misconfiguration, timeouts, and unparseable
/// responses all collapse to `None`.
#[async_trait]
pub trait PolicyClassifier: Send + Sync {
    /// Classifies the given policy text, or returns `None` on any failure
    async fn classify(&self, text: &str) -> Option<PolicyJudgment>;
}

/// Azure OpenAI implementation of [`PolicyClassifier`]
pub struct AzureClassifier {
    client: Client<AzureConfig>,
    deployment: String,
    timeout: Duration,
}

impl AzureClassifier {
    /// Builds a classifier from the `AZURE_OPENAI_*` environment variables
    ///
    /// Returns `None` when the endpoint, deployment, or key is missing, in
    /// which case the pipeline runs heuristic-only.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let endpoint = non_empty_env("AZURE_OPENAI_ENDPOINT")?;
        let deployment = non_empty_env("AZURE_OPENAI_DEPLOYMENT")?;
        let api_key = non_empty_env("AZURE_OPENAI_KEY")?;
        let api_version = non_empty_env("AZURE_OPENAI_API_VERSION")
            .unwrap_or_else(|| "2023-10-01-preview".to_string());

        let config = AzureConfig::new()
            .with_api_base(endpoint.trim_end_matches('/'))
            .with_deployment_id(&deployment)
            .with_api_version(api_version)
            .with_api_key(api_key);

        Some(Self {
            client: Client::with_config(config),
            deployment,
            timeout,
        })
    }

    async fn call_chat(&self, text: &str) -> Result<Option<String>> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.deployment.clone())
            .temperature(0.0)
            .max_tokens(800u32)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(format!("Privacy policy text:\n\n{}", text))
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone()))
    }
}

#[async_trait]
impl PolicyClassifier for AzureClassifier {
    async fn classify(&self, text: &str) -> Option<PolicyJudgment> {
        if text.is_empty() {
            return None;
        }

        let call = self.call_chat(text);
        let content = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Some(content))) => content,
            Ok(Ok(None)) => {
                warn!("classifier returned an empty completion");
                return None;
            }
            Ok(Err(e)) => {
                warn!("classifier call failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!("classifier call timed out after {:?}", self.timeout);
                return None;
            }
        };

        let judgment = parse_judgment(&content);
        if judgment.is_none() {
            debug!("classifier response was not parseable JSON");
        }
        judgment
    }
}

/// Parses a chat completion into a judgment
///
/// Tries the whole content as JSON first, then the outermost brace-delimited
/// block, since models occasionally wrap the JSON in prose.
pub fn parse_judgment(content: &str) -> Option<PolicyJudgment> {
    if let Ok(judgment) = serde_json::from_str::<PolicyJudgment>(content) {
        return Some(judgment);
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

fn non_empty_env(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

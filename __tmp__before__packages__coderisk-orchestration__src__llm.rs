use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{OrchestratorError, Result};

/// One action the investigator can take per hop, mirroring the four
/// actions in the investigation algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Pull a Tier 2 metric for a named file.
    ComputeMetric { metric_id: String, file_path: String },
    /// Walk a graph edge kind from a node to gather more context.
    ExpandGraph { node_id: String, edge_kind: String },
    /// Search the incident store for related history.
    SearchIncidents { query: String },
    /// Stop gathering evidence and produce a verdict.
    Finalize { confidence: f64 },
}

/// A minimal chat-completions client over an OpenAI-compatible endpoint.
/// The corpus this repository is grounded on has no dedicated LLM SDK
/// dependency anywhere -- every agentic caller in the example pack reaches
/// for a plain `reqwest` JSON client, so this does the same rather than
/// adding a new dependency family.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn decide(&self, system_prompt: &str, evidence: &serde_json::Value) -> Result<Action>;
    async fn synthesize(&self, system_prompt: &str, evidence: &serde_json::Value) -> Result<String>;
}

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiCompatibleClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn chat(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content },
            ],
            "temperature": 0.0,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Llm(e.to_string()))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Llm(e.to_string()))?;

        if !status.is_success() {
            return Err(OrchestratorError::Llm(format!(
                "provider returned {status}: {payload}"
            )));
        }

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| OrchestratorError::Llm("missing choices[0].message.content".into()))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn decide(&self, system_prompt: &str, evidence: &serde_json::Value) -> Result<Action> {
        let user_content = format!(
            "ACCUMULATED EVIDENCE:\n{}\n\nRespond with exactly one JSON action object.",
            serde_json::to_string_pretty(evidence).unwrap_or_default()
        );
        let raw = self.chat(system_prompt, &user_content).await?;
        let json_str = extract_json(&raw);
        serde_json::from_str(json_str)
            .map_err(|e| OrchestratorError::Llm(format!("could not parse action: {e}")))
    }

    async fn synthesize(&self, system_prompt: &str, evidence: &serde_json::Value) -> Result<String> {
        let user_content = format!(
            "ACCUMULATED EVIDENCE:\n{}\n\nWrite the final risk rationale.",
            serde_json::to_string_pretty(evidence).unwrap_or_default()
        );
        self.chat(system_prompt, &user_content).await
    }
}

/// Models occasionally wrap JSON in prose or code fences; this pulls the
/// first balanced `{...}` block out rather than failing outright.
fn extract_json(raw: &str) -> &str {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e >= s => &raw[s..=e],
        _ => raw,
    }
}

pub const INVESTIGATOR_SYSTEM_PROMPT: &str = r#"You are assessing the production risk of a code change before commit.

You have a fixed evidence budget: at most 5 hops. Each hop you may call
exactly one of:
  1. compute_metric(metric_id, file_path) - pull a Tier 2 signal (ownership_churn, incident_similarity)
  2. expand_graph(node_id, edge_kind) - walk one edge kind from a node for more context
  3. search_incidents(query) - full-text search historical incidents
  4. finalize(confidence) - stop and produce a verdict

Use only the evidence returned by these tools. Do not invent facts about
the codebase. Finalize as soon as your confidence reaches 0.85, or when you
have exhausted your hop budget, whichever comes first.

Respond with exactly one JSON object shaped as one of the four actions
above, and nothing else."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_prose_wrapper() {
        let raw = "Here is my action:\n```json\n{\"action\":\"finalize\",\"confidence\":0.9}\n```";
        let extracted = extract_json(raw);
        let action: Action = serde_json::from_str(extracted).unwrap();
        assert_eq!(action, Action::Finalize { confidence: 0.9 });
    }

    #[test]
    fn action_roundtrips_through_serde() {
        let action = Action::SearchIncidents {
            query: "payment webhook".to_string(),
        };
        let s = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&s).unwrap();
        assert_eq!(action, back);
    }
}



use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Reply used when the model returns no text at all.
pub const FALLBACK_TEXT: &str = "bruh i errored 💀 (no text output)";

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    reasoning: Reasoning<'a>,
    instructions: &'a str,
    input: &'a [ChatMessage],
}

#[derive(Serialize)]
struct Reasoning<'a> {
    effort: &'a str,
}

#[derive(Deserialize)]
struct ResponsesResponse {
    /// Convenience field some OpenAI-compatible servers include.
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Run one completion over the full conversation with the given instructions.
///
/// Returns `Ok(None)` when the model produced no text output.
pub async fn create_response(
    client: &reqwest::Client,
    config: &LlmConfig,
    instructions: &str,
    input: &[ChatMessage],
) -> Result<Option<String>> {
    let url = format!("{}/v1/responses", config.base_url);

    let req = ResponsesRequest {
        model: &config.chat_model,
        reasoning: Reasoning {
            effort: &config.reasoning_effort,
        },
        instructions,
        input,
    };

    let resp = client
        .post(&url)
        .bearer_auth(config.api_key.as_deref().unwrap_or_default())
        .json(&req)
        .send()
        .await
        .context("Failed to call Responses API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Responses API returned {status}: {body}");
    }

    let body: ResponsesResponse = resp
        .json()
        .await
        .context("Failed to parse Responses API response")?;

    Ok(extract_output_text(body))
}

/// Concatenate every `output_text` part of every `message` output item.
fn extract_output_text(body: ResponsesResponse) -> Option<String> {
    if let Some(text) = body.output_text.filter(|t| !t.trim().is_empty()) {
        return Some(text);
    }

    let text: String = body
        .output
        .into_iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content)
        .filter(|c| c.kind == "output_text")
        .filter_map(|c| c.text)
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn parse(json: &str) -> Option<String> {
        extract_output_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_extract_message_text() {
        let json = r#"{
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "role": "assistant",
                 "content": [{"type": "output_text", "text": "lmao fr", "annotations": []}]}
            ]
        }"#;
        assert_eq!(parse(json).as_deref(), Some("lmao fr"));
    }

    #[test]
    fn test_extract_concatenates_parts() {
        let json = r#"{"output": [
            {"type": "message", "content": [
                {"type": "output_text", "text": "omg "},
                {"type": "refusal", "refusal": "no"},
                {"type": "output_text", "text": "slay"}
            ]}
        ]}"#;
        assert_eq!(parse(json).as_deref(), Some("omg slay"));
    }

    #[test]
    fn test_extract_prefers_output_text_field() {
        let json = r#"{"output_text": "dang", "output": []}"#;
        assert_eq!(parse(json).as_deref(), Some("dang"));
    }

    #[test]
    fn test_extract_none_when_only_reasoning() {
        let json = r#"{"output": [{"type": "reasoning", "summary": []}]}"#;
        assert!(parse(json).is_none());
    }

    #[test]
    fn test_extract_none_when_blank() {
        let json = r#"{"output_text": "  ", "output": [
            {"type": "message", "content": [{"type": "output_text", "text": ""}]}
        ]}"#;
        assert!(parse(json).is_none());
    }

    #[test]
    fn test_request_shape() {
        let input = vec![ChatMessage::new(Role::User, "hi")];
        let req = ResponsesRequest {
            model: "gpt-5",
            reasoning: Reasoning { effort: "low" },
            instructions: "be chill",
            input: &input,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["reasoning"]["effort"], "low");
        assert_eq!(json["input"][0]["role"], "user");
        assert_eq!(json["instructions"], "be chill");
    }

    #[tokio::test]
    async fn test_completion_uses_client_timeout() {
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "output_text": "late" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let config = LlmConfig {
            base_url: server.uri(),
            ..LlmConfig::default()
        };
        let input = vec![ChatMessage::new(Role::User, "hi")];

        let result = create_response(&client, &config, "be chill", &input).await;
        assert!(result.is_err());
    }
}

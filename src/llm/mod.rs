//! Chat LLM adapter (spec §4.11.1 step 6), grounded on the original
//! implementation's `llm/engine.py` + `llm/qwen_engine.py`: a system prompt,
//! a bounded rolling history of user/assistant turns, and a single chat
//! call per turn. Talks to any OpenAI-compatible chat-completions endpoint
//! over `reqwest` rather than a vendor SDK, so swapping providers is a
//! config change.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{classify_network, VoiceError};

const CONTINUATION_CUES: &[&str] = &[
    "那呢", "那明天呢", "那后天呢", "那晚上呢", "然后呢", "接着呢", "继续",
    "then?", "what about", "and then", "what about tomorrow",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// True if `text` reads as an elliptical continuation of a prior turn
/// ("then?", "那呢") rather than a self-contained question.
pub fn looks_like_continuation(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONTINUATION_CUES.iter().any(|cue| lower.contains(&cue.to_lowercase()))
}

pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: Option<String>,
    max_history_turns: usize,
    history: VecDeque<ChatMessage>,
}

impl LlmClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        system_prompt: Option<&str>,
        max_history_turns: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: 0.7,
            max_tokens: 3000,
            system_prompt: system_prompt.map(|s| s.to_string()),
            max_history_turns: max_history_turns.max(1),
            history: VecDeque::new(),
        }
    }

    pub fn reset_conversation(&mut self) {
        self.history.clear();
    }

    /// Sends `text` as turn `turn_index` (1-based). Applies the date-header
    /// and continuation-preamble rules before calling the model, then
    /// appends both sides of the exchange to history.
    pub async fn chat(&mut self, text: &str, turn_index: u32) -> Result<String, VoiceError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let augmented = self.augment(text, turn_index);

        let mut messages = Vec::new();
        if let Some(sp) = &self.system_prompt {
            messages.push(ChatMessage { role: "system".to_string(), content: sp.clone() });
        }
        let history_cap = self.max_history_turns * 2;
        let start = self.history.len().saturating_sub(history_cap);
        messages.extend(self.history.iter().skip(start).cloned());
        messages.push(ChatMessage { role: "user".to_string(), content: augmented });

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!(turn = turn_index, "calling chat LLM");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = anyhow::Error::from(e);
                if classify_network(&err) {
                    VoiceError::Network(err.to_string())
                } else {
                    VoiceError::Llm(err.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Llm(format!("chat API error {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Llm(format!("malformed chat response: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        self.history.push_back(ChatMessage { role: "user".to_string(), content: text.to_string() });
        self.history.push_back(ChatMessage { role: "assistant".to_string(), content: reply.clone() });
        while self.history.len() > history_cap {
            self.history.pop_front();
        }

        info!(turn = turn_index, reply_len = reply.len(), "chat LLM responded");
        Ok(reply)
    }

    fn augment(&self, text: &str, turn_index: u32) -> String {
        if turn_index <= 1 {
            let date_header = chrono::Local::now().format("今天是 %Y-%m-%d %A").to_string();
            return format!("[{date_header}]\n{text}");
        }
        if looks_like_continuation(text) {
            return format!("[这是第 {turn_index} 轮对话，请结合上文消解省略]\n{text}");
        }
        text.to_string()
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_cue_is_detected() {
        assert!(looks_like_continuation("那明天呢"));
        assert!(looks_like_continuation("what about tomorrow"));
        assert!(!looks_like_continuation("今天天气怎么样"));
    }

    #[test]
    fn first_turn_gets_date_header() {
        let client = LlmClient::new("http://x", "k", "m", None, 10);
        let augmented = client.augment("你好", 1);
        assert!(augmented.contains("今天是"));
    }

    #[test]
    fn continuation_on_later_turn_gets_preamble() {
        let client = LlmClient::new("http://x", "k", "m", None, 10);
        let augmented = client.augment("那呢", 3);
        assert!(augmented.contains("第 3 轮"));
    }

    #[test]
    fn non_continuation_later_turn_is_unmodified() {
        let client = LlmClient::new("http://x", "k", "m", None, 10);
        let augmented = client.augment("讲个笑话", 3);
        assert_eq!(augmented, "讲个笑话");
    }
}

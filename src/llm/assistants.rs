use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::llm::client::LlmClient;
use crate::llm::types::{AssistantList, LlmError, RemoteAssistant};

/// The hosted assistant resource: create, update, delete, retrieve, list.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_assistant(&self, payload: &Value) -> Result<RemoteAssistant, LlmError>;
    async fn update_assistant(&self, id: &str, payload: &Value)
        -> Result<RemoteAssistant, LlmError>;
    async fn delete_assistant(&self, id: &str) -> Result<(), LlmError>;
    async fn retrieve_assistant(&self, id: &str) -> Result<RemoteAssistant, LlmError>;
    async fn list_assistants(&self, limit: u32) -> Result<Vec<RemoteAssistant>, LlmError>;
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(raw: Value) -> Result<T, LlmError> {
    serde_json::from_value(raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl AssistantApi for LlmClient {
    async fn create_assistant(&self, payload: &Value) -> Result<RemoteAssistant, LlmError> {
        let raw = self.send_json(Method::POST, "assistants", Some(payload), true).await?;
        let created: RemoteAssistant = decode(raw)?;
        tracing::info!(assistant_id = %created.id, "created remote assistant");
        Ok(created)
    }

    async fn update_assistant(
        &self,
        id: &str,
        payload: &Value,
    ) -> Result<RemoteAssistant, LlmError> {
        let raw = self
            .send_json(Method::POST, &format!("assistants/{}", id), Some(payload), true)
            .await?;
        tracing::info!(assistant_id = id, "updated remote assistant");
        decode(raw)
    }

    async fn delete_assistant(&self, id: &str) -> Result<(), LlmError> {
        let raw = self
            .send_json(Method::DELETE, &format!("assistants/{}", id), None, true)
            .await?;
        if raw.get("deleted").and_then(Value::as_bool) == Some(false) {
            return Err(LlmError::InvalidResponse(format!("assistant {} was not deleted", id)));
        }
        tracing::info!(assistant_id = id, "deleted remote assistant");
        Ok(())
    }

    async fn retrieve_assistant(&self, id: &str) -> Result<RemoteAssistant, LlmError> {
        let raw = self
            .send_json(Method::GET, &format!("assistants/{}", id), None, true)
            .await?;
        decode(raw)
    }

    async fn list_assistants(&self, limit: u32) -> Result<Vec<RemoteAssistant>, LlmError> {
        let path = format!("assistants?order=desc&limit={}", limit.clamp(1, 100));
        let raw = self.send_json(Method::GET, &path, None, true).await?;
        let list: AssistantList = decode(raw)?;
        Ok(list.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_remote_assistant_with_missing_fields() {
        let assistant: RemoteAssistant = decode(json!({
            "id": "asst_1",
            "object": "assistant",
            "model": "gpt-4o-mini",
            "tools": [{"type": "code_interpreter"}],
            "metadata": {"prompt_id": "p1"}
        }))
        .unwrap();
        assert_eq!(assistant.id, "asst_1");
        assert!(assistant.name.is_none());
        assert_eq!(assistant.metadata["prompt_id"], "p1");
        assert_eq!(assistant.tools.len(), 1);
    }

    #[test]
    fn test_decode_list() {
        let list: AssistantList = decode(json!({
            "object": "list",
            "data": [{"id": "a"}, {"id": "b"}]
        }))
        .unwrap();
        assert_eq!(list.data.len(), 2);
        assert!(decode::<AssistantList>(json!({"data": 3})).is_err());
    }
}

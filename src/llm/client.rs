use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use backoff::{ExponentialBackoff, future::retry, Error as BackoffError};

use crate::llm::types::*;

pub struct LlmClient {
    http: Client,
    config: LlmConfig,
    api_key: String,
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, api_key })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn headers(&self, assistants_beta: bool) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", self.api_key)
            .parse::<HeaderValue>()
            .map_err(|_| LlmError::MissingApiKey)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if assistants_beta {
            headers.insert(
                HeaderName::from_static("openai-beta"),
                HeaderValue::from_static("assistants=v2"),
            );
        }

        // Add extra headers from config
        if let Some(obj) = self.config.extra_headers.as_object() {
            for (key, value) in obj {
                if let Some(val_str) = value.as_str() {
                    if let (Ok(header_name), Ok(header_value)) = (
                        HeaderName::from_bytes(key.as_bytes()),
                        val_str.parse::<HeaderValue>(),
                    ) {
                        headers.insert(header_name, header_value);
                    }
                }
            }
        }
        Ok(headers)
    }

    /// Send one JSON request, retrying transient failures with backoff.
    pub(crate) async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        assistants_beta: bool,
    ) -> Result<Value, LlmError> {
        let headers = self.headers(assistants_beta)?;
        self.send(method, path, headers, |request| match body {
            Some(body) => request.json(body),
            None => request,
        })
        .await
    }

    /// Upload one file as a multipart form.
    pub(crate) async fn send_file(
        &self,
        path: &str,
        purpose: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, LlmError> {
        let mut headers = self.headers(false)?;
        headers.remove(CONTENT_TYPE);
        self.send(Method::POST, path, headers, |request| {
            let part = Part::bytes(bytes.clone()).file_name(file_name.to_string());
            request.multipart(Form::new().text("purpose", purpose.to_string()).part("file", part))
        })
        .await
    }

    async fn send<F>(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        build: F,
    ) -> Result<Value, LlmError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Sync,
    {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let url = self.url(path);

        let operation = || async {
            let request = build(self.http.request(method.clone(), &url).headers(headers.clone()));

            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    BackoffError::transient(LlmError::Timeout)
                } else {
                    BackoffError::transient(LlmError::Http(e.to_string()))
                }
            })?;

            let status = response.status();

            if status.is_success() {
                let value: Value = response
                    .json()
                    .await
                    .map_err(|e| BackoffError::permanent(LlmError::InvalidResponse(e.to_string())))?;
                Ok(value)
            } else {
                let error_text = response.text().await.unwrap_or_default();
                match status {
                    StatusCode::TOO_MANY_REQUESTS => {
                        Err(BackoffError::transient(LlmError::RateLimited))
                    }
                    StatusCode::UNAUTHORIZED => Err(BackoffError::permanent(LlmError::Api {
                        status: 401,
                        message: "Invalid API key".to_string(),
                    })),
                    _ if status.as_u16() >= 500 => Err(BackoffError::transient(LlmError::Api {
                        status: status.as_u16(),
                        message: error_text,
                    })),
                    _ => Err(BackoffError::permanent(LlmError::Api {
                        status: status.as_u16(),
                        message: error_text,
                    })),
                }
            }
        };

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(4),
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, operation).await
    }

    pub async fn chat_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
    ) -> Result<LlmResponse, LlmError> {
        self.chat(messages, tools, None).await
    }

    /// Chat completion with an optional `response_format` (JSON mode or a JSON schema).
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
        response_format: Option<Value>,
    ) -> Result<LlmResponse, LlmError> {
        let request = chat_request(&self.config, messages, tools, response_format);
        let body =
            serde_json::to_value(&request).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let raw = self.send_json(Method::POST, "chat/completions", Some(&body), false).await?;
        let result: OpenAIChatResponse =
            serde_json::from_value(raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(choice) = result.choices.into_iter().next() {
            Ok(LlmResponse {
                content: choice.message.content,
                tool_calls: choice.message.tool_calls,
            })
        } else {
            Err(LlmError::InvalidResponse("No choices in response".to_string()))
        }
    }
}

fn chat_request(
    config: &LlmConfig,
    messages: Vec<ChatMessage>,
    tools: Vec<Value>,
    response_format: Option<Value>,
) -> OpenAIChatRequest {
    OpenAIChatRequest {
        model: config.model.clone(),
        messages,
        tools: (!tools.is_empty()).then_some(tools),
        temperature: Some(config.temperature),
        top_p: config.top_p,
        max_tokens: Some(config.max_tokens),
        response_format,
        stream: false,
    }
}

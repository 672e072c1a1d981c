//! 원격 비전-언어 모델 클라이언트.
//!
//! 인코딩된 프레임과 프롬프트를 외부 API에 보내고 응답 텍스트를 추출한다.

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, warn};

use mirror_core::config::{AiProviderType, ExternalApiEndpoint};
use mirror_core::error::CoreError;
use mirror_core::ports::vision_model::{EncodedImage, VisionModel};

/// 응답 최대 토큰
const MAX_TOKENS: u32 = 1024;

/// 모델 미지정 시 기본값
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

// ============================================================
// RemoteVisionModel
// ============================================================

/// 외부 비전-언어 모델 클라이언트
///
/// 지원 API:
/// - Claude (Anthropic): `POST /v1/messages` + image content block
/// - OpenAI 호환: `POST /v1/chat/completions` + `image_url` data URI
/// - 커스텀 엔드포인트 (OpenAI 호환 응답 형식)
#[derive(Debug)]
pub struct RemoteVisionModel {
    http_client: reqwest::Client,
    endpoint: String,
    /// API 키 (메모리에만 유지)
    api_key: String,
    model: String,
    provider_type: AiProviderType,
}

impl RemoteVisionModel {
    /// 새 RemoteVisionModel 생성
    pub fn new(config: &ExternalApiEndpoint) -> Result<Self, CoreError> {
        if config.api_key.is_empty() {
            return Err(CoreError::Config(
                "비전 모델 API 키 미설정. 설정 파일 또는 MIRROR__AI_PROVIDER__VISION_API__API_KEY로 지정하세요."
                    .into(),
            ));
        }

        let parsed = url::Url::parse(&config.endpoint)
            .map_err(|e| CoreError::Config(format!("비전 모델 엔드포인트 URL 오류: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "지원하지 않는 URL 스킴: {}",
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {e}")))?;

        let model = config.model.clone().unwrap_or_else(|| {
            match config.provider_type {
                AiProviderType::Anthropic => DEFAULT_ANTHROPIC_MODEL,
                _ => DEFAULT_OPENAI_MODEL,
            }
            .to_string()
        });

        debug!(
            endpoint = %config.endpoint,
            model = %model,
            timeout = config.timeout_secs,
            "RemoteVisionModel 초기화"
        );

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model,
            provider_type: config.provider_type,
        })
    }

    fn is_anthropic(&self) -> bool {
        self.provider_type == AiProviderType::Anthropic
    }

    /// 요청 본문 구성
    fn request_body(&self, image: &EncodedImage, prompt: &str) -> serde_json::Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);

        if self.is_anthropic() {
            serde_json::json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.media_type,
                                "data": encoded
                            }
                        },
                        {
                            "type": "text",
                            "text": prompt
                        }
                    ]
                }]
            })
        } else {
            serde_json::json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:{};base64,{}", image.media_type, encoded)
                            }
                        },
                        {
                            "type": "text",
                            "text": prompt
                        }
                    ]
                }]
            })
        }
    }

    /// Claude 응답: content[0].text
    fn parse_claude_response(body: &str) -> Result<String, CoreError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Internal(format!("모델 응답 JSON 파싱 실패: {e}")))?;

        response
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str())
            .map(String::from)
            .ok_or_else(|| CoreError::Internal("모델 응답에서 텍스트를 찾을 수 없음".to_string()))
    }

    /// OpenAI 응답: choices[0].message.content
    fn parse_openai_response(body: &str) -> Result<String, CoreError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Internal(format!("모델 응답 JSON 파싱 실패: {e}")))?;

        response
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|t| t.as_str())
            .map(String::from)
            .ok_or_else(|| {
                CoreError::Internal("OpenAI 응답에서 텍스트를 찾을 수 없음".to_string())
            })
    }
}

#[async_trait]
impl VisionModel for RemoteVisionModel {
    async fn complete(&self, image: &EncodedImage, prompt: &str) -> Result<String, CoreError> {
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            image_bytes = image.bytes.len(),
            "비전 모델 API 호출"
        );

        let mut builder = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&self.request_body(image, prompt));

        if self.is_anthropic() {
            builder = builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01");
        } else {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CoreError::ServiceUnavailable(format!("비전 모델 응답 시간 초과: {e}"))
            } else {
                CoreError::Network(format!("비전 모델 API 호출 실패: {e}"))
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            warn!(retry_after_secs, "비전 모델 API 속도 제한");
            return Err(CoreError::RateLimit { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("비전 모델 응답 읽기 실패: {e}")))?;

        if !status.is_success() {
            warn!(status = %status, "비전 모델 API 오류 응답");
            return Err(CoreError::Network(format!(
                "비전 모델 API 오류 ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let text = if self.is_anthropic() {
            Self::parse_claude_response(&body)?
        } else {
            Self::parse_openai_response(&body)?
        };

        debug!(chars = text.len(), "비전 모델 응답 수신");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 테스트
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str, provider_type: AiProviderType) -> ExternalApiEndpoint {
        ExternalApiEndpoint {
            endpoint: url.to_string(),
            api_key: "test-key".to_string(),
            model: None,
            timeout_secs: 5,
            provider_type,
        }
    }

    fn image() -> EncodedImage {
        EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF],
            media_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn empty_api_key_is_config_error() {
        let mut config = endpoint("https://api.anthropic.com/v1/messages", AiProviderType::Anthropic);
        config.api_key.clear();
        assert!(matches!(
            RemoteVisionModel::new(&config),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let config = endpoint("not a url", AiProviderType::OpenAi);
        assert!(matches!(
            RemoteVisionModel::new(&config),
            Err(CoreError::Config(_))
        ));
        let config = endpoint("ftp://example.com/v1", AiProviderType::OpenAi);
        assert!(RemoteVisionModel::new(&config).is_err());
    }

    #[test]
    fn default_model_follows_provider() {
        let claude = RemoteVisionModel::new(&endpoint(
            "https://api.anthropic.com/v1/messages",
            AiProviderType::Anthropic,
        ))
        .unwrap();
        assert_eq!(claude.model_name(), DEFAULT_ANTHROPIC_MODEL);

        let openai = RemoteVisionModel::new(&endpoint(
            "https://api.openai.com/v1/chat/completions",
            AiProviderType::OpenAi,
        ))
        .unwrap();
        assert_eq!(openai.model_name(), DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn anthropic_request_has_image_block() {
        let model = RemoteVisionModel::new(&endpoint(
            "https://api.anthropic.com/v1/messages",
            AiProviderType::Anthropic,
        ))
        .unwrap();
        let body = model.request_body(&image(), "describe");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "/9j/");
        assert_eq!(content[1]["text"], "describe");
    }

    #[test]
    fn openai_request_uses_data_uri() {
        let model = RemoteVisionModel::new(&endpoint(
            "https://api.openai.com/v1/chat/completions",
            AiProviderType::Generic,
        ))
        .unwrap();
        let body = model.request_body(&image(), "describe");
        assert_eq!(
            body["messages"][0]["content"][0]["image_url"]["url"],
            "data:image/jpeg;base64,/9j/"
        );
    }

    #[test]
    fn parse_responses() {
        let claude = r#"{"content": [{"type": "text", "text": "{\"screen_type\": \"home\"}"}]}"#;
        assert_eq!(
            RemoteVisionModel::parse_claude_response(claude).unwrap(),
            "{\"screen_type\": \"home\"}"
        );

        let openai = r#"{"choices": [{"message": {"content": "A login screen"}}]}"#;
        assert_eq!(
            RemoteVisionModel::parse_openai_response(openai).unwrap(),
            "A login screen"
        );

        assert!(RemoteVisionModel::parse_openai_response(r#"{"choices": []}"#).is_err());
        assert!(RemoteVisionModel::parse_claude_response("not json").is_err());
    }

    #[tokio::test]
    async fn anthropic_call_sends_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": [{"type": "text", "text": "Settings screen"}]}"#)
            .create_async()
            .await;

        let model = RemoteVisionModel::new(&endpoint(
            &format!("{}/v1/messages", server.url()),
            AiProviderType::Anthropic,
        ))
        .unwrap();
        let text = model.complete(&image(), "describe").await.unwrap();
        assert_eq!(text, "Settings screen");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_is_network_error_with_truncated_body() {
        let mut server = mockito::Server::new_async().await;
        let long_body = "x".repeat(500);
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(500)
            .with_body(&long_body)
            .create_async()
            .await;

        let model = RemoteVisionModel::new(&endpoint(
            &format!("{}/v1/chat/completions", server.url()),
            AiProviderType::OpenAi,
        ))
        .unwrap();
        let err = model.complete(&image(), "describe").await.unwrap_err();
        match err {
            CoreError::Network(msg) => {
                assert!(msg.contains("500"));
                assert!(!msg.contains(&long_body));
            }
            other => panic!("예상치 못한 오류: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;

        let model = RemoteVisionModel::new(&endpoint(
            &format!("{}/v1/chat/completions", server.url()),
            AiProviderType::OpenAi,
        ))
        .unwrap();
        let err = model.complete(&image(), "describe").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RateLimit {
                retry_after_secs: 12
            }
        ));
    }
}

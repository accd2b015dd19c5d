//! Presidio REST 客户端
//!
//! - analyzer：`POST {analyzer_url}/analyze`，`GET {analyzer_url}/health`
//! - anonymizer：`POST {anonymizer_url}/anonymize`
//!
//! 复用同一个 `reqwest::Client`，连接池在多次轮询间共享。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AnalyzeRequest, OperatorConfig, PiiAnalyzer, RecognizerResult, TextAnonymizer};
use crate::error::AppError;
use crate::settings::RedactorConfig;

const CONNECT_TIMEOUT_MS: u64 = 2_000;
/// 错误响应体在日志中保留的最大字符数
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct AnonymizeRequest<'a> {
    text: &'a str,
    anonymizers: &'a HashMap<String, OperatorConfig>,
    analyzer_results: &'a [RecognizerResult],
}

#[derive(Debug, Deserialize)]
struct AnonymizeResponse {
    text: String,
}

/// Presidio analyzer / anonymizer 服务客户端
#[derive(Debug, Clone)]
pub struct PresidioClient {
    http: reqwest::Client,
    analyzer_url: reqwest::Url,
    anonymizer_url: Option<reqwest::Url>,
}

fn parse_base_url(raw: &str, field: &str) -> Result<reqwest::Url, AppError> {
    let mut url = reqwest::Url::parse(raw)
        .map_err(|e| AppError::Config(format!("{} '{}' 无效: {}", field, raw, e)))?;
    // 保证 join 时保留已有路径前缀
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(base: &reqwest::Url, path: &str, map_err: fn(String) -> AppError) -> Result<reqwest::Url, AppError> {
    base.join(path)
        .map_err(|e| map_err(format!("拼接地址 '{}' + '{}' 失败: {}", base, path, e)))
}

fn body_preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}

impl PresidioClient {
    pub fn new(
        analyzer_url: &str,
        anonymizer_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .build()
            .map_err(|e| AppError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            analyzer_url: parse_base_url(analyzer_url, "analyzer_url")?,
            anonymizer_url: anonymizer_url
                .map(|url| parse_base_url(url, "anonymizer_url"))
                .transpose()?,
        })
    }

    pub fn from_config(config: &RedactorConfig) -> Result<Self, AppError> {
        Self::new(
            &config.analyzer_url,
            config.anonymizer_url.as_deref(),
            config.request_timeout(),
        )
    }

    pub fn has_remote_anonymizer(&self) -> bool {
        self.anonymizer_url.is_some()
    }

    /// 探测 analyzer 服务是否可用
    pub async fn health_check(&self) -> Result<(), AppError> {
        let url = endpoint(&self.analyzer_url, "health", AppError::Analyzer)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::Analyzer(format!("无法连接 {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::Analyzer(format!(
                "{} 返回状态 {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }

    async fn post_json<B, T>(
        &self,
        url: reqwest::Url,
        body: &B,
        map_err: fn(String) -> AppError,
    ) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    map_err(format!("请求 {} 超时", url))
                } else {
                    map_err(format!("请求 {} 失败: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_err(format!(
                "{} 返回状态 {}: {}",
                url,
                status,
                body_preview(&body)
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| map_err(format!("解析 {} 响应失败: {}", url, e)))
    }
}

impl PiiAnalyzer for PresidioClient {
    async fn analyze(&self, request: &AnalyzeRequest<'_>) -> Result<Vec<RecognizerResult>, AppError> {
        let url = endpoint(&self.analyzer_url, "analyze", AppError::Analyzer)?;
        self.post_json(url, request, AppError::Analyzer).await
    }
}

impl TextAnonymizer for PresidioClient {
    async fn anonymize(
        &self,
        text: &str,
        results: &[RecognizerResult],
        operators: &HashMap<String, OperatorConfig>,
    ) -> Result<String, AppError> {
        let base = self
            .anonymizer_url
            .as_ref()
            .ok_or_else(|| AppError::Anonymizer("未配置 anonymizer_url".to_string()))?;
        let url = endpoint(base, "anonymize", AppError::Anonymizer)?;

        let request = AnonymizeRequest {
            text,
            anonymizers: operators,
            analyzer_results: results,
        };
        let response: AnonymizeResponse = self.post_json(url, &request, AppError::Anonymizer).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_path_prefix() {
        let base = parse_base_url("http://gateway.local/presidio", "analyzer_url").expect("parse");
        let url = endpoint(&base, "analyze", AppError::Analyzer).expect("join");
        assert_eq!(url.as_str(), "http://gateway.local/presidio/analyze");

        let root = parse_base_url("http://localhost:5002", "analyzer_url").expect("parse");
        let url = endpoint(&root, "analyze", AppError::Analyzer).expect("join");
        assert_eq!(url.as_str(), "http://localhost:5002/analyze");
    }

    #[test]
    fn invalid_url_is_config_error() {
        let err = PresidioClient::new("not a url", None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn anonymize_request_uses_presidio_field_names() {
        let mut operators = HashMap::new();
        operators.insert("DEFAULT".to_string(), OperatorConfig::replace("[REDACTED]"));
        let results = vec![RecognizerResult {
            entity_type: "PHONE_NUMBER".to_string(),
            start: 5,
            end: 17,
            score: 0.75,
        }];

        let body = serde_json::to_value(AnonymizeRequest {
            text: "call 212-555-0199",
            anonymizers: &operators,
            analyzer_results: &results,
        })
        .expect("serialize");

        assert_eq!(body["anonymizers"]["DEFAULT"]["type"], "replace");
        assert_eq!(body["analyzer_results"][0]["entity_type"], "PHONE_NUMBER");
        assert_eq!(body["analyzer_results"][0]["end"], 17);
    }

    #[test]
    fn anonymize_response_reads_text_only() {
        let raw = r#"{"text":"call [PHONE_REDACTED]","items":[{"start":5,"end":21,
            "entity_type":"PHONE_NUMBER","text":"[PHONE_REDACTED]","operator":"replace"}]}"#;
        let response: AnonymizeResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(response.text, "call [PHONE_REDACTED]");
    }

    #[tokio::test]
    async fn anonymize_without_url_fails() {
        let client = PresidioClient::new("http://localhost:5002", None, Duration::from_secs(1)).expect("client");
        assert!(!client.has_remote_anonymizer());
        let err = client.anonymize("x", &[], &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Anonymizer(_)));
    }
}

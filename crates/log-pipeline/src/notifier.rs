//! 알림 전송 -- 구조화 에러를 사람이 읽을 수 있는 메시지로 만들어 웹훅으로 보냅니다.
//!
//! 요청 본문은 `{"text": "<mrkdwn>"}`이며 2xx 응답만 성공으로 봅니다.
//! 비 2xx 응답이나 전송 에러는 설정된 횟수만큼 재시도한 뒤 실패로 보고합니다.
//! 전송 실패 시 중복 제거 기록은 되돌리지 않습니다.

use std::future::Future;
use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;
use tokio::sync::Mutex;

use sqlsentinel_core::config::NotifierConfig;
use sqlsentinel_core::types::StructuredError;

use crate::error::LogPipelineError;

/// 응답 본문 중 에러 사유로 남길 최대 길이
const MAX_ERROR_BODY: usize = 256;

/// 알림 전송 trait
pub trait Notifier: Send + Sync {
    /// 렌더링된 메시지를 전송합니다. 재시도는 구현체가 처리합니다.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), LogPipelineError>> + Send;
}

/// 사람이 읽을 수 있는 타임스탬프
///
/// 로그 본문의 SQL Server 타임스탬프가 있으면 그대로 사용하고,
/// 없으면 이벤트 시각을 UTC로 변환합니다.
pub fn display_timestamp(error: &StructuredError) -> String {
    if let Some(ts) = &error.log_timestamp {
        return ts.clone();
    }
    DateTime::from_timestamp_millis(error.timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| error.timestamp_millis.to_string())
}

/// 알림 메시지를 렌더링합니다.
pub fn format_alert(error: &StructuredError, log_group: &str, log_stream: &str) -> String {
    let mut lines = vec![format!("*SQL Error:* {}", error.error_number)];
    if let Some(severity) = error.severity {
        lines.push(format!("*Severity:* {severity}"));
    }
    if let Some(state) = error.state {
        lines.push(format!("*State:* {state}"));
    }
    if let Some(server) = &error.server {
        lines.push(format!("*Server:* {server}"));
    }
    if let Some(line) = error.line {
        lines.push(format!("*Line:* {line}"));
    }
    lines.push(format!("*Timestamp:* {}", display_timestamp(error)));
    lines.push(format!("*Message:* {}", error.message));
    lines.push(format!("*Log Group:* {log_group}"));
    lines.push(format!("*Log Stream:* {log_stream}"));
    lines.join("\n")
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// 웹훅 전송 설정
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl WebhookSettings {
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self {
            url: config.webhook_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// HTTP 웹훅 알림기
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    settings: WebhookSettings,
}

impl WebhookNotifier {
    /// 설정으로 알림기를 생성합니다.
    ///
    /// # Errors
    ///
    /// URL이 비어 있거나 http(s)가 아니면, 또는 시도 횟수가 0이면 `Config` 에러를 반환합니다.
    pub fn new(settings: WebhookSettings) -> Result<Self, LogPipelineError> {
        if !(settings.url.starts_with("http://") || settings.url.starts_with("https://")) {
            return Err(LogPipelineError::Config {
                field: "notifier.webhook_url".to_owned(),
                reason: "an http(s) webhook url is required".to_owned(),
            });
        }
        if settings.max_attempts == 0 {
            return Err(LogPipelineError::Config {
                field: "notifier.max_attempts".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LogPipelineError::Config {
                field: "notifier".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self { client, settings })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, LogPipelineError> {
        Self::new(WebhookSettings::from_config(config))
    }

    async fn post(&self, text: &str) -> Result<(), LogPipelineError> {
        let response = self
            .client
            .post(&self.settings.url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|e| LogPipelineError::Notify {
                status: None,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(LogPipelineError::Notify {
            status: Some(status.as_u16()),
            reason: body,
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), LogPipelineError> {
        let mut attempt = 1;
        loop {
            match self.post(text).await {
                Ok(()) => {
                    tracing::debug!(attempt, "webhook delivered");
                    return Ok(());
                }
                Err(e) if attempt < self.settings.max_attempts => {
                    tracing::warn!(attempt, error = %e, "webhook delivery failed, retrying");
                    tokio::time::sleep(self.settings.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 전송 내용을 메모리에 기록하는 알림기
///
/// 지정한 횟수만큼 전송을 실패시킬 수 있습니다.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    failures_remaining: Mutex<u32>,
    attempts: Mutex<u32>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `count`번의 전송을 실패시킵니다.
    pub async fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().await = count;
    }

    /// 성공한 전송 메시지 목록
    pub async fn sent(&self) -> Vec<String> {
        self.sent.lock().await.clone()
    }

    /// 전체 전송 시도 횟수
    pub async fn attempts(&self) -> u32 {
        *self.attempts.lock().await
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), LogPipelineError> {
        *self.attempts.lock().await += 1;

        let mut failures = self.failures_remaining.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(LogPipelineError::Notify {
                status: Some(500),
                reason: "failure injected".to_owned(),
            });
        }
        drop(failures);

        self.sent.lock().await.push(text.to_owned());
        Ok(())
    }
}

//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端和 Cookie 容器，只暴露 GET / POST 能力

use crate::config::Config;
use crate::error::{AppResult, NetworkError};
use crate::infrastructure::cookie_jar::SessionJar;
use crate::infrastructure::retry::{with_retry, RetryPolicy};
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// 已读取完毕的响应
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// 跟随重定向后的最终地址
    pub url: Url,
    pub body: Vec<u8>,
}

impl HttpResponse {
    async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self { status, url, body })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 Client 和 Cookie 容器（即一次运行中的"会话"）
/// - 每个请求都带超时、重试和取消
/// - 不认识登录页 / 打卡页
///
/// 请求会修改 Cookie 容器，同一时间只应有一个调用方使用。
pub struct HttpExecutor {
    client: Client,
    jar: Arc<SessionJar>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpExecutor {
    /// 创建一个空会话
    pub fn new(config: &Config, cancel: CancellationToken) -> AppResult<Self> {
        Self::with_jar(config, SessionJar::new(), cancel)
    }

    /// 从导出的 Cookie 文本恢复会话
    ///
    /// 此处不检查 Cookie 是否仍然有效，由第一次打卡页请求决定。
    pub fn restore_from_cookies(config: &Config, blob: &str, cancel: CancellationToken) -> AppResult<Self> {
        let jar = SessionJar::deserialize(blob)?;
        debug!("已恢复 {} 条 Cookie", jar.len());
        Self::with_jar(config, jar, cancel)
    }

    pub fn with_jar(config: &Config, jar: SessionJar, cancel: CancellationToken) -> AppResult<Self> {
        let jar = Arc::new(jar);
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(NetworkError::ClientBuild)?;

        Ok(Self {
            client,
            jar,
            policy: RetryPolicy::new(config.request_max_attempts, config.request_retry_delay()),
            cancel,
        })
    }

    /// 发送 GET 请求（跟随重定向）
    pub async fn get(&self, url: &str) -> AppResult<HttpResponse> {
        debug!("GET {}", url);
        let client = &self.client;
        let response = with_retry(&self.policy, url, &self.cancel, || async move {
            let response = client.get(url).send().await?;
            HttpResponse::read(response).await
        })
        .await?;
        debug!("GET {} -> {} ({})", url, response.status, response.url);
        Ok(response)
    }

    /// 发送表单 POST 请求
    pub async fn post_form(&self, url: &str, form: &[(String, String)]) -> AppResult<HttpResponse> {
        debug!("POST {} ({} 个字段)", url, form.len());
        let client = &self.client;
        let response = with_retry(&self.policy, url, &self.cancel, || async move {
            let response = client.post(url).form(form).send().await?;
            HttpResponse::read(response).await
        })
        .await?;
        debug!("POST {} -> {}", url, response.status);
        Ok(response)
    }

    /// 当前 Cookie 容器
    pub fn jar(&self) -> &SessionJar {
        &self.jar
    }

    /// 导出 Cookie，用于写入持久化文件
    pub fn export_cookies(&self) -> AppResult<String> {
        self.jar.serialize()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

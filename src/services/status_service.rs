//! 打卡服务 - 业务能力层
//!
//! 只负责"读取上次打卡 / 生成新记录 / 提交"，不关心登录流程

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::HttpExecutor;
use crate::models::{StatusInfo, SubmitResult};
use reqwest::Url;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

/// 打卡页探测结果
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// 已登录，拿到了上次打卡记录
    Authenticated(StatusInfo),
    /// 被重定向到登录页
    Unauthenticated,
}

/// 打卡服务
pub struct StatusService {
    status_url: String,
    save_url: String,
    login_url: Url,
}

impl StatusService {
    pub fn new(config: &Config) -> AppResult<Self> {
        let login_url = Url::parse(&config.login_url).map_err(|e| AppError::invalid_config("login_url", e))?;
        Ok(Self {
            status_url: config.status_url.clone(),
            save_url: config.save_url.clone(),
            login_url,
        })
    }

    /// 请求打卡页，同时判断当前是否已登录
    ///
    /// - 最终地址落在登录页主机上：未登录，返回 `Unauthenticated`
    /// - 同主机但页面中没有 oldInfo：协议错误
    pub async fn probe_authenticated(&self, executor: &HttpExecutor) -> AppResult<ProbeOutcome> {
        let response = executor.get(&self.status_url).await?;

        if same_host(&response.url, &self.login_url) {
            info!("打卡页被重定向到登录页 ({})，需要重新登录", response.url);
            return Ok(ProbeOutcome::Unauthenticated);
        }

        let info = StatusInfo::extract(&response.text(), response.url.as_str())?;
        debug!("读取到上次打卡记录，{} 个字段，created={:?}", info.len(), info.created());
        Ok(ProbeOutcome::Authenticated(info))
    }

    /// 读取上次打卡记录
    pub async fn fetch_status(&self, executor: &HttpExecutor) -> AppResult<ProbeOutcome> {
        self.probe_authenticated(executor).await
    }

    /// 以当前时间生成新的打卡记录
    pub fn derive_update(old: &StatusInfo) -> StatusInfo {
        old.with_created(chrono::Utc::now().timestamp())
    }

    /// 提交打卡记录
    ///
    /// 结果码 0 / 1 视为成功，其余返回 `SubmissionRejected`（附带原始响应）
    pub async fn submit(&self, executor: &HttpExecutor, info: &StatusInfo) -> AppResult<SubmitResult> {
        info!("📤 正在提交打卡...");
        let response = executor.post_form(&self.save_url, &info.to_form()).await?;
        let payload = response.text();
        debug!("提交结果: HTTP {} {}", response.status, payload);

        let json: JsonValue = serde_json::from_str(&payload).map_err(|e| AppError::malformed("提交结果", e))?;
        let code = json
            .get("e")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| AppError::marker_missing("结果码 e", response.url.as_str()))?;
        let message = json.get("m").and_then(JsonValue::as_str).unwrap_or_default();

        match SubmitResult::from_code(code) {
            SubmitResult::Success { code } => {
                if code == 1 {
                    warn!("服务器返回 e=1 ({})，按成功处理", message);
                }
                info!("✓ 打卡提交成功: {}", message);
                Ok(SubmitResult::Success { code })
            }
            SubmitResult::Failure { code } => {
                warn!("⚠️ 打卡提交被拒绝: e={} {}", code, message);
                Err(AppError::submission_rejected(code, payload))
            }
        }
    }
}

/// 主机名和端口都相同
fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

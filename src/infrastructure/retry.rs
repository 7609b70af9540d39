//! 请求重试 - 基础设施层
//!
//! 对单次网络调用做有限次数的"失败 → 等待 → 重试"。
//! 只处理传输层失败（连接错误、超时、读取响应体失败），
//! HTTP 状态码由上层自行判断。

use crate::error::{AppError, AppResult, NetworkError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最多尝试次数（包含第一次）
    pub max_attempts: usize,
    /// 每次失败后的等待时间
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// 执行带重试的网络操作
///
/// # 参数
/// - `policy`: 重试策略
/// - `url`: 请求地址（仅用于日志和错误信息）
/// - `cancel`: 取消令牌，请求进行中或等待期间被取消时立即返回 `Cancelled`
/// - `operation`: 每次调用产生一个新的请求
///
/// # 返回
/// 第一次成功的结果；最后一次仍失败时返回 `MaxRetriesExceeded`
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    url: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!("请求 {} 在第 {} 次尝试时成功", url, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    "请求 {} 失败 (尝试 {}/{}): {}，{:?} 后重试...",
                    url, attempt, policy.max_attempts, e, policy.delay
                );
                cancellable_sleep(cancel, policy.delay).await?;
            }
            Err(e) => {
                warn!("请求 {} 失败，已重试 {} 次，放弃", url, attempt);
                return Err(NetworkError::MaxRetriesExceeded {
                    url: url.to_string(),
                    attempts: attempt,
                    source: e,
                }
                .into());
            }
        }
    }
}

/// 等待指定时间，期间被取消则返回 `Cancelled`
pub async fn cancellable_sleep(cancel: &CancellationToken, delay: Duration) -> AppResult<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

//! 登录流程 - 流程层
//!
//! 核心职责：定义"一次账号密码登录"的完整流程
//!
//! 状态顺序：
//! 1. Unauthenticated → Preparing：加载登录页，取得 execution 和验证码编号（只取一次）
//! 2. AwaitingCaptcha：获取验证码图片并识别
//! 3. LoggingIn：提交登录；失败则回到 AwaitingCaptcha，直到次数用尽
//! 4. Authenticated

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};
use crate::infrastructure::{cancellable_sleep, HttpExecutor};
use crate::models::Credentials;
use crate::services::{AuthService, CaptchaSolver};

/// 登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    Preparing,
    AwaitingCaptcha { attempt: usize },
    LoggingIn { attempt: usize },
    Authenticated,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Unauthenticated => write!(f, "未登录"),
            LoginState::Preparing => write!(f, "加载登录页"),
            LoginState::AwaitingCaptcha { attempt } => write!(f, "识别验证码 (第 {} 次)", attempt),
            LoginState::LoggingIn { attempt } => write!(f, "提交登录 (第 {} 次)", attempt),
            LoginState::Authenticated => write!(f, "已登录"),
        }
    }
}

/// 登录结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    /// 成功时用了第几次尝试
    pub attempts: usize,
}

/// 登录流程
///
/// - 决定何时取验证码、何时提交、何时放弃
/// - 不持有会话（HttpExecutor 由调用方传入）
/// - 识别器报错或超时等同于识别错误，计为一次失败的尝试
/// - 识别过程同样响应取消
pub struct LoginFlow<'a> {
    auth: AuthService,
    solver: &'a dyn CaptchaSolver,
    max_attempts: usize,
    retry_delay: Duration,
    settle_delay: Duration,
    solve_timeout: Duration,
    state: LoginState,
}

impl<'a> LoginFlow<'a> {
    pub fn new(config: &Config, solver: &'a dyn CaptchaSolver) -> Self {
        Self {
            auth: AuthService::new(config),
            solver,
            max_attempts: config.max_login_retries.max(1),
            retry_delay: config.login_retry_delay(),
            settle_delay: config.captcha_settle_delay(),
            solve_timeout: config.request_timeout(),
            state: LoginState::Unauthenticated,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn transition(&mut self, next: LoginState) {
        debug!("登录状态: {} → {}", self.state, next);
        self.state = next;
    }

    /// 账号密码 + 验证码登录
    ///
    /// 登录上下文只在开始时获取一次，之后每次尝试都用同一个验证码编号重新取图。
    pub async fn login_with_credentials(
        &mut self,
        executor: &HttpExecutor,
        credentials: &Credentials,
    ) -> AppResult<LoginOutcome> {
        info!("🔐 开始登录: {}", credentials.username);

        self.transition(LoginState::Preparing);
        let ctx = match self.auth.prepare(executor).await {
            Ok(ctx) => ctx,
            Err(e) => {
                self.transition(LoginState::Unauthenticated);
                return Err(e);
            }
        };

        for attempt in 1..=self.max_attempts {
            match self.try_once(executor, credentials, &ctx, attempt).await {
                Ok(true) => {
                    self.transition(LoginState::Authenticated);
                    info!("✓ 登录成功 (第 {}/{} 次尝试)", attempt, self.max_attempts);
                    return Ok(LoginOutcome { attempts: attempt });
                }
                Ok(false) => {
                    warn!("登录失败 (尝试 {}/{})", attempt, self.max_attempts);
                }
                Err(e) => {
                    self.transition(LoginState::Unauthenticated);
                    return Err(e);
                }
            }

            if attempt < self.max_attempts {
                if let Err(e) = cancellable_sleep(executor.cancel_token(), self.retry_delay).await {
                    self.transition(LoginState::Unauthenticated);
                    return Err(e);
                }
            }
        }

        self.transition(LoginState::Unauthenticated);
        warn!("❌ 登录失败，已尝试 {} 次", self.max_attempts);
        Err(AuthError::LoginExhausted {
            attempts: self.max_attempts,
        }
        .into())
    }

    /// 单次尝试：取图 → 识别 → 等待 → 提交
    async fn try_once(
        &mut self,
        executor: &HttpExecutor,
        credentials: &Credentials,
        ctx: &crate::models::LoginContext,
        attempt: usize,
    ) -> AppResult<bool> {
        self.transition(LoginState::AwaitingCaptcha { attempt });
        let image = self.auth.fetch_captcha_image(executor, ctx).await?;

        let predicted = tokio::select! {
            _ = executor.cancel_token().cancelled() => return Err(AppError::Cancelled),
            result = tokio::time::timeout(self.solve_timeout, self.solver.predict(&image)) => result,
        };
        let captcha_text = match predicted {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("验证码识别失败 (尝试 {}/{}): {}", attempt, self.max_attempts, e);
                return Ok(false);
            }
            Err(_) => {
                warn!(
                    "验证码识别超时 {:?} (尝试 {}/{})",
                    self.solve_timeout, attempt, self.max_attempts
                );
                return Ok(false);
            }
        };
        debug!("验证码识别结果: {}", captcha_text);

        // 服务器需要一点时间才能校验刚取出的验证码
        cancellable_sleep(executor.cancel_token(), self.settle_delay).await?;

        self.transition(LoginState::LoggingIn { attempt });
        self.auth
            .attempt_login(executor, credentials, &captcha_text, ctx)
            .await
    }
}

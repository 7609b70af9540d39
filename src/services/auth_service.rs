//! 统一身份认证服务 - 业务能力层
//!
//! 只负责登录相关的单个请求，不关心重试和流程顺序

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::HttpExecutor;
use crate::models::{extract_login_context, Credentials, LoginContext};
use tracing::{debug, info};

/// 统一身份认证服务
///
/// 职责：
/// - 加载登录页并提取 execution / 验证码编号
/// - 获取验证码图片
/// - 提交一次登录
pub struct AuthService {
    login_url: String,
    captcha_url: String,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            login_url: config.login_url.clone(),
            captcha_url: config.captcha_url.clone(),
        }
    }

    /// 加载登录页，得到本次登录的上下文
    pub async fn prepare(&self, executor: &HttpExecutor) -> AppResult<LoginContext> {
        let response = executor.get(&self.login_url).await?;
        let ctx = extract_login_context(&response.text(), response.url.as_str())?;
        debug!("登录上下文: {}", ctx);
        Ok(ctx)
    }

    /// 获取验证码图片
    pub async fn fetch_captcha_image(&self, executor: &HttpExecutor, ctx: &LoginContext) -> AppResult<Vec<u8>> {
        let url = format!("{}?captchaId={}", self.captcha_url, ctx.captcha_id);
        let response = executor.get(&url).await?;
        debug!("验证码图片 {} 字节", response.body.len());
        Ok(response.body)
    }

    /// 提交一次登录
    ///
    /// # 返回
    /// HTTP 状态成功返回 `true`；账号或验证码错误返回 `false`，不视为错误
    pub async fn attempt_login(
        &self,
        executor: &HttpExecutor,
        credentials: &Credentials,
        captcha_text: &str,
        ctx: &LoginContext,
    ) -> AppResult<bool> {
        let form = login_form(credentials, captcha_text, ctx);
        let response = executor.post_form(&self.login_url, &form).await?;

        if response.is_success() {
            info!("✓ 登录请求被接受");
            Ok(true)
        } else {
            debug!("登录被拒绝: HTTP {}", response.status);
            Ok(false)
        }
    }
}

fn login_form(credentials: &Credentials, captcha_text: &str, ctx: &LoginContext) -> Vec<(String, String)> {
    [
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
        ("captcha", captcha_text),
        ("submit", "LOGIN"),
        ("type", "username_password"),
        ("execution", ctx.execution.as_str()),
        ("_eventId", "submit"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

//! 登录相关数据

use crate::error::{AppError, AppResult};
use regex::Regex;
use std::fmt;

/// 账号密码
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// 密码不进日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

/// 一次登录页加载得到的上下文
///
/// - `execution`: 登录表单里的一次性 execution 令牌
/// - `captcha_id`: 验证码编号，获取图片和提交登录时使用同一个
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginContext {
    pub execution: String,
    pub captcha_id: String,
}

impl fmt::Display for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[验证码编号#{} execution长度#{}]", self.captcha_id, self.execution.len())
    }
}

/// 从登录页 HTML 中提取登录上下文
///
/// 任一字段缺失都说明页面结构已变化，返回协议错误。
pub fn extract_login_context(html: &str, page_url: &str) -> AppResult<LoginContext> {
    let execution_re = Regex::new(r#"input name="execution" value="(.*?)"\s*/>"#)
        .map_err(|e| AppError::malformed("execution 匹配规则", e))?;
    let captcha_re = Regex::new(r"config\.captcha\s*=\s*\{\s*type:\s*'image',\s*id:\s*'(\d+)'\s*,?\s*\}")
        .map_err(|e| AppError::malformed("captcha 匹配规则", e))?;

    let execution = execution_re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::marker_missing("execution", page_url))?;

    let captcha_id = captcha_re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::marker_missing("captcha id", page_url))?;

    Ok(LoginContext {
        execution,
        captcha_id,
    })
}

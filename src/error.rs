use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 网络传输错误（已经过重试）
    #[error("网络错误: {0}")]
    Network(#[from] NetworkError),
    /// 登录错误
    #[error("登录错误: {0}")]
    Auth(#[from] AuthError),
    /// 服务器页面结构与预期不符
    #[error("协议错误: {0}")]
    Protocol(#[from] ProtocolError),
    /// 持久化的会话状态损坏
    #[error("状态错误: {0}")]
    State(#[from] StateError),
    /// 打卡提交错误
    #[error("提交错误: {0}")]
    Submit(#[from] SubmitError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 验证码识别失败
    #[error("验证码识别失败: {0}")]
    Captcha(String),
    /// 被外部取消（Ctrl-C 等）
    #[error("操作已取消")]
    Cancelled,
}

/// 网络相关错误
#[derive(Debug, Error)]
pub enum NetworkError {
    /// 重试次数用尽
    #[error("请求 {url} 失败，已重试 {attempts} 次: {source}")]
    MaxRetriesExceeded {
        url: String,
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },
    /// 构建 HTTP 客户端失败
    #[error("无法创建 HTTP 客户端: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// 登录错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 登录次数用尽
    #[error("登录失败，已尝试 {attempts} 次")]
    LoginExhausted { attempts: usize },
    /// 重新登录后仍然无法访问打卡页面
    #[error("登录成功但仍被重定向到登录页")]
    StillUnauthenticated,
}

/// 协议错误：页面中缺少预期的标记
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("页面 {url} 中未找到 {what}")]
    MarkerMissing { what: String, url: String },
    #[error("无法解析 {what}: {reason}")]
    Malformed { what: String, reason: String },
}

/// 会话状态错误
#[derive(Debug, Error)]
pub enum StateError {
    /// Cookie 数据损坏
    #[error("Cookie 数据损坏: {reason}")]
    CorruptState { reason: String },
}

/// 提交错误
#[derive(Debug, Error)]
pub enum SubmitError {
    /// 服务器返回了无法识别的结果码
    #[error("服务器拒绝了提交 (e={code}): {payload}")]
    SubmissionRejected { code: i64, payload: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置项取值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: String, reason: String },
    /// 缺少必要的配置项
    #[error("缺少配置项 {field}")]
    Missing { field: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建“页面缺少标记”错误
    pub fn marker_missing(what: impl Into<String>, url: impl Into<String>) -> Self {
        AppError::Protocol(ProtocolError::MarkerMissing {
            what: what.into(),
            url: url.into(),
        })
    }

    /// 创建“内容无法解析”错误
    pub fn malformed(what: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Protocol(ProtocolError::Malformed {
            what: what.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建 Cookie 损坏错误
    pub fn corrupt_state(reason: impl ToString) -> Self {
        AppError::State(StateError::CorruptState {
            reason: reason.to_string(),
        })
    }

    /// 创建提交被拒错误
    pub fn submission_rejected(code: i64, payload: impl Into<String>) -> Self {
        AppError::Submit(SubmitError::SubmissionRejected {
            code,
            payload: payload.into(),
        })
    }

    /// 创建配置项非法错误
    pub fn invalid_config(field: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.to_string(),
        })
    }

    /// 是否为协议错误（服务器页面结构变化）
    pub fn is_protocol_mismatch(&self) -> bool {
        matches!(self, AppError::Protocol(_))
    }

    /// 是否为 Cookie 损坏错误
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, AppError::State(StateError::CorruptState { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_contains_details() {
        let err = AppError::submission_rejected(2, r#"{"e":2,"m":"重复提交"}"#);
        let text = err.to_string();
        assert!(text.contains("e=2"));
        assert!(text.contains("重复提交"));
    }

    #[test]
    fn test_error_classification() {
        assert!(AppError::marker_missing("oldInfo", "https://x").is_protocol_mismatch());
        assert!(AppError::corrupt_state("bad base64").is_corrupt_state());
        assert!(!AppError::Cancelled.is_protocol_mismatch());
    }
}

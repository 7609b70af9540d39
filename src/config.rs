use crate::error::{AppError, AppResult, ConfigError, FileError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// 程序配置
///
/// 运行期间不可变，由 `App` 在构造时持有。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 门户地址 ---
    /// 统一身份认证登录页
    pub login_url: String,
    /// 验证码图片地址（追加 `?captchaId=`）
    pub captcha_url: String,
    /// 打卡页面（内嵌 oldInfo）
    pub status_url: String,
    /// 打卡提交地址
    pub save_url: String,
    /// Cookie 持久化文件
    pub cookie_file: String,

    // --- 网络与重试 ---
    /// 单个请求超时（秒）
    pub request_timeout_secs: u64,
    /// 单个请求最多尝试次数
    pub request_max_attempts: usize,
    /// 请求失败后的等待时间（毫秒）
    pub request_retry_delay_ms: u64,
    /// 登录最多尝试次数
    pub max_login_retries: usize,
    /// 登录失败后的等待时间（毫秒）
    pub login_retry_delay_ms: u64,
    /// 获取验证码后、提交登录前的等待时间（毫秒）
    pub captcha_settle_delay_ms: u64,

    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- 验证码识别 ---
    /// 外部识别程序（设置后优先使用）
    pub captcha_solver_cmd: Option<String>,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            login_url: "https://ua.scu.edu.cn/login".to_string(),
            captcha_url: "https://ua.scu.edu.cn/captcha".to_string(),
            status_url: "https://wfw.scu.edu.cn/ncov/wap/default/index".to_string(),
            save_url: "https://wfw.scu.edu.cn/ncov/wap/default/save".to_string(),
            cookie_file: "cookies.txt".to_string(),
            request_timeout_secs: 60,
            request_max_attempts: 5,
            request_retry_delay_ms: 3_000,
            max_login_retries: 20,
            login_retry_delay_ms: 2_000,
            captcha_settle_delay_ms: 1_000,
            verbose_logging: false,
            captcha_solver_cmd: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// 从默认值 + 环境变量构造
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段取默认值，随后应用环境变量
    pub async fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FileError::ReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        let config: Config = toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config.with_env_overrides())
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Self {
        Self {
            login_url: env_string("CHECKIN_LOGIN_URL").unwrap_or(self.login_url),
            captcha_url: env_string("CHECKIN_CAPTCHA_URL").unwrap_or(self.captcha_url),
            status_url: env_string("CHECKIN_STATUS_URL").unwrap_or(self.status_url),
            save_url: env_string("CHECKIN_SAVE_URL").unwrap_or(self.save_url),
            cookie_file: env_string("CHECKIN_COOKIE_FILE").unwrap_or(self.cookie_file),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(self.request_timeout_secs),
            request_max_attempts: env_parse("REQUEST_MAX_ATTEMPTS").unwrap_or(self.request_max_attempts),
            request_retry_delay_ms: env_parse("REQUEST_RETRY_DELAY_MS").unwrap_or(self.request_retry_delay_ms),
            max_login_retries: env_parse("MAX_LOGIN_RETRIES").unwrap_or(self.max_login_retries),
            login_retry_delay_ms: env_parse("LOGIN_RETRY_DELAY_MS").unwrap_or(self.login_retry_delay_ms),
            captcha_settle_delay_ms: env_parse("CAPTCHA_SETTLE_DELAY_MS").unwrap_or(self.captcha_settle_delay_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            captcha_solver_cmd: env_string("CAPTCHA_SOLVER_CMD").or(self.captcha_solver_cmd),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        for (field, value) in [
            ("login_url", &self.login_url),
            ("captcha_url", &self.captcha_url),
            ("status_url", &self.status_url),
            ("save_url", &self.save_url),
        ] {
            let url = Url::parse(value).map_err(|e| AppError::invalid_config(field, e))?;
            if url.host_str().is_none() {
                return Err(AppError::invalid_config(field, "缺少主机名"));
            }
        }
        if self.request_max_attempts == 0 {
            return Err(AppError::invalid_config("request_max_attempts", "必须大于 0"));
        }
        if self.max_login_retries == 0 {
            return Err(AppError::invalid_config("max_login_retries", "必须大于 0"));
        }
        if self.cookie_file.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cookie_file".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_retry_delay(&self) -> Duration {
        Duration::from_millis(self.request_retry_delay_ms)
    }

    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_millis(self.login_retry_delay_ms)
    }

    pub fn captcha_settle_delay(&self) -> Duration {
        Duration::from_millis(self.captcha_settle_delay_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

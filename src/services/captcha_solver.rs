//! 验证码识别服务 - 业务能力层
//!
//! 只负责"图片 → 文字"能力，识别结果不保证正确，
//! 识别错误由登录流程当作一次普通的登录失败处理。
//!
//! ## 实现
//! - `LlmCaptchaSolver`: 兼容 OpenAI API 的视觉模型（`async-openai`）
//! - `CommandCaptchaSolver`: 外部识别程序，图片写入 stdin，从 stdout 读结果

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};

/// 验证码识别能力
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 识别验证码图片，返回文字
    async fn predict(&self, image: &[u8]) -> AppResult<String>;
}

/// 根据配置选择识别实现：配置了外部程序则优先使用
pub fn solver_from_config(config: &Config) -> AppResult<Box<dyn CaptchaSolver>> {
    if let Some(cmd) = config.captcha_solver_cmd.as_deref() {
        return Ok(Box::new(CommandCaptchaSolver::new(cmd)?));
    }
    if config.llm_api_key.is_empty() {
        return Err(ConfigError::Missing {
            field: "captcha_solver_cmd 或 llm_api_key".to_string(),
        }
        .into());
    }
    Ok(Box::new(LlmCaptchaSolver::new(config)))
}

/// 只保留门户验证码使用的字符（0-9a-z）
pub fn normalize_prediction(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn non_empty(raw: &str) -> AppResult<String> {
    let text = normalize_prediction(raw);
    if text.is_empty() {
        return Err(AppError::Captcha(format!("识别结果为空: {:?}", raw)));
    }
    Ok(text)
}

/// 根据文件头判断图片类型
fn image_mime(image: &[u8]) -> &'static str {
    if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if image.starts_with(b"GIF8") {
        "image/gif"
    } else if image.starts_with(b"BM") {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}

/// 视觉大模型识别
pub struct LlmCaptchaSolver {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmCaptchaSolver {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }
}

#[async_trait]
impl CaptchaSolver for LlmCaptchaSolver {
    async fn predict(&self, image: &[u8]) -> AppResult<String> {
        debug!("调用视觉模型识别验证码，模型: {}，图片 {} 字节", self.model_name, image.len());

        let data_url = format!("data:{};base64,{}", image_mime(image), STANDARD.encode(image));

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content("你是验证码识别助手。图片中是 4 位左右的小写字母或数字，只输出这些字符，不要输出其他任何内容。")
            .build()
            .map_err(|e| AppError::Captcha(e.to_string()))?;

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(ChatCompletionRequestMessageContentPartText {
                text: "识别这张验证码".to_string(),
            }),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl {
                    url: data_url,
                    detail: Some(ImageDetail::High),
                },
            }),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| AppError::Captcha(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.0)
            .max_tokens(16u32)
            .build()
            .map_err(|e| AppError::Captcha(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("视觉模型调用失败: {}", e);
            AppError::Captcha(format!("视觉模型调用失败: {}", e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Captcha("视觉模型返回内容为空".to_string()))?;

        non_empty(&content)
    }
}

/// 外部程序识别
///
/// 例如 `python predict_cli.py`：程序从 stdin 读取图片字节，
/// 把识别结果打印到 stdout。
#[derive(Debug, Clone)]
pub struct CommandCaptchaSolver {
    program: String,
    args: Vec<String>,
}

impl CommandCaptchaSolver {
    pub fn new(command_line: &str) -> AppResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::invalid_config("captcha_solver_cmd", "命令为空"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl CaptchaSolver for CommandCaptchaSolver {
    async fn predict(&self, image: &[u8]) -> AppResult<String> {
        debug!("调用外部程序识别验证码: {}", self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Captcha(format!("无法启动 {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| AppError::Captcha(format!("写入图片失败: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::Captcha(format!("等待识别程序失败: {}", e)))?;

        if !output.status.success() {
            return Err(AppError::Captcha(format!(
                "识别程序退出码 {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        non_empty(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prediction() {
        assert_eq!(normalize_prediction(" Ab3x\n"), "ab3x");
        assert_eq!(normalize_prediction("答案: 7k9q"), "7k9q");
        assert_eq!(normalize_prediction("..."), "");
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(&[0x89, b'P', b'N', b'G', 0x0d]), "image/png");
        assert_eq!(image_mime(b"GIF89a"), "image/gif");
        assert_eq!(image_mime(&[0xff, 0xd8, 0xff]), "image/jpeg");
    }

    #[test]
    fn test_solver_from_config_requires_backend() {
        let config = Config::default();
        assert!(matches!(solver_from_config(&config), Err(AppError::Config(_))));

        let config = Config {
            captcha_solver_cmd: Some("cat".to_string()),
            ..Config::default()
        };
        assert!(solver_from_config(&config).is_ok());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandCaptchaSolver::new("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_solver_echoes_stdin() {
        // cat 把输入原样输出，相当于一个"总是返回图片内容"的识别器
        let solver = CommandCaptchaSolver::new("cat").unwrap();
        let text = solver.predict(b"X7Kq\n").await.unwrap();
        assert_eq!(text, "x7kq");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_solver_failure() {
        let solver = CommandCaptchaSolver::new("false").unwrap();
        assert!(matches!(solver.predict(b"img").await, Err(AppError::Captcha(_))));
    }

    /// 需要真实的 API Key：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_llm_solver_live -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_llm_solver_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let config = Config::from_env();
        let solver = LlmCaptchaSolver::new(&config);

        let image = reqwest::get(format!("{}?captchaId=1", config.captcha_url))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        let text = solver.predict(&image).await.unwrap();
        println!("识别结果: {}", text);
        assert!(!text.is_empty());
    }
}

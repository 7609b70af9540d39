//! 集成测试公共工具：模拟门户（登录主机 + 打卡主机）和可编排的验证码识别器

#![allow(dead_code)]

use async_trait::async_trait;
use scu_checkin::error::AppResult;
use scu_checkin::infrastructure::{CookieRecord, SessionJar};
use scu_checkin::services::CaptchaSolver;
use scu_checkin::Config;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const GOOD_CAPTCHA: &str = "good";
pub const SESSION_COOKIE: &str = "CASTGC=tgt-valid";
pub const STATUS_PATH: &str = "/ncov/wap/default/index";
pub const SAVE_PATH: &str = "/ncov/wap/default/save";

pub const LOGIN_PAGE: &str = r#"<html><body>
<form id="fm1" method="post">
    <input name="execution" value="e1s1-fixed-token"/>
</form>
<script>
config.captcha = {
    type: 'image',
    id: '1234567'
}
</script>
</body></html>"#;

/// 两台模拟服务器：`ua` 扮演统一身份认证，`wfw` 扮演打卡系统
pub struct Portal {
    pub ua: MockServer,
    pub wfw: MockServer,
}

impl Portal {
    pub async fn start() -> Self {
        Self {
            ua: MockServer::start().await,
            wfw: MockServer::start().await,
        }
    }

    /// 指向模拟门户、没有任何等待的配置
    pub fn config(&self, cookie_file: &Path) -> Config {
        Config {
            login_url: format!("{}/login", self.ua.uri()),
            captcha_url: format!("{}/captcha", self.ua.uri()),
            status_url: format!("{}{}", self.wfw.uri(), STATUS_PATH),
            save_url: format!("{}{}", self.wfw.uri(), SAVE_PATH),
            cookie_file: cookie_file.display().to_string(),
            request_timeout_secs: 5,
            request_max_attempts: 2,
            request_retry_delay_ms: 1,
            max_login_retries: 5,
            login_retry_delay_ms: 0,
            captcha_settle_delay_ms: 0,
            ..Config::default()
        }
    }

    /// 登录页、验证码、登录提交
    ///
    /// 返回值依次为各自期望的调用次数：登录页 GET、验证码 GET、正确登录、错误登录
    pub async fn mount_login(&self, page_gets: u64, captcha_gets: u64, good_posts: u64, bad_posts: u64) {
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(page_gets)
            .mount(&self.ua)
            .await;
        Mock::given(method("GET"))
            .and(path("/captcha"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]))
            .expect(captcha_gets)
            .mount(&self.ua)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains(format!("captcha={}", GOOD_CAPTCHA)))
            .and(body_string_contains("execution=e1s1-fixed-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", format!("{}; Path=/; HttpOnly", SESSION_COOKIE)),
            )
            .with_priority(1)
            .expect(good_posts)
            .mount(&self.ua)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("验证码错误"))
            .with_priority(10)
            .expect(bad_posts)
            .mount(&self.ua)
            .await;
    }

    /// 打卡页：带有效 Cookie 返回 oldInfo，否则重定向到登录页
    pub async fn mount_status(&self, old_info: &Value) {
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .and(header_regex("cookie", SESSION_COOKIE))
            .respond_with(ResponseTemplate::new(200).set_body_string(status_page(old_info)))
            .with_priority(1)
            .mount(&self.wfw)
            .await;
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/login?service=wfw", self.ua.uri())),
            )
            .with_priority(10)
            .mount(&self.wfw)
            .await;
    }

    pub async fn mount_save(&self, response: &Value, times: u64) {
        Mock::given(method("POST"))
            .and(path(SAVE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(response.to_string()))
            .expect(times)
            .mount(&self.wfw)
            .await;
    }

    /// 打卡系统收到的提交表单
    pub async fn submitted_forms(&self) -> Vec<Vec<(String, String)>> {
        self.wfw
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|req| req.method.as_str() == "POST" && req.url.path() == SAVE_PATH)
            .map(|req| url::form_urlencoded::parse(&req.body).into_owned().collect())
            .collect()
    }

    pub async fn verify(&self) {
        self.ua.verify().await;
        self.wfw.verify().await;
    }
}

pub fn status_page(old_info: &Value) -> String {
    format!(
        "<html><script>\nvar vm = new Vue({{\n  data: {{\n    oldInfo: {},\n    hasFlag: '1'\n  }}\n}});\n</script></html>",
        old_info
    )
}

/// 序列化一组 Cookie，模拟上一次运行留下的文件内容
pub fn cookie_blob(name: &str, value: &str) -> String {
    SessionJar::from_records(vec![CookieRecord {
        name: name.to_string(),
        value: value.to_string(),
        domain: "127.0.0.1".to_string(),
        path: "/".to_string(),
        expiry: None,
        secure: false,
    }])
    .serialize()
    .unwrap()
}

pub fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// 按顺序返回预设答案，用完后一直返回错误答案
pub struct ScriptedSolver {
    answers: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_wrong() -> Self {
        Self::new(&[])
    }

    pub fn always_right() -> Self {
        Self::new(&[GOOD_CAPTCHA; 64])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for ScriptedSolver {
    async fn predict(&self, _image: &[u8]) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.answers.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| "wrong".to_string()))
    }
}

/// 一直不返回结果的识别器，模拟卡死的识别程序或模型接口
pub struct HangingSolver {
    calls: AtomicUsize,
}

impl HangingSolver {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaSolver for HangingSolver {
    async fn predict(&self, _image: &[u8]) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(GOOD_CAPTCHA.to_string())
    }
}

//! 会话 Cookie 容器 - 基础设施层
//!
//! 作为 reqwest 的 `CookieStore` 挂在客户端上，同时支持导出 / 导入，
//! 让认证状态可以跨进程保存。
//!
//! 导出格式：`CookieRecord` 数组的 JSON，再做 base64（STANDARD）编码。

use crate::error::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// 单条 Cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    /// 不带前导点的小写域名
    pub domain: String,
    pub path: String,
    /// 过期时间（Unix 秒），`None` 表示会话 Cookie
    pub expiry: Option<i64>,
    /// 只随 https 请求发送
    #[serde(default)]
    pub secure: bool,
}

impl CookieRecord {
    fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    fn same_slot(&self, other: &CookieRecord) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        domain_matches(&host.to_ascii_lowercase(), &self.domain) && path_matches(url.path(), &self.path)
    }

    /// 解析一条 `Set-Cookie` 头
    ///
    /// `Domain` 必须覆盖请求主机，否则整条丢弃。
    fn parse(header: &str, url: &Url, now: i64) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let request_host = url.host_str()?.to_ascii_lowercase();
        let mut record = CookieRecord {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: request_host.clone(),
            path: default_path(url.path()),
            expiry: None,
            secure: false,
        };

        let mut max_age = None;
        let mut expires = None;
        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_matches(&request_host, &domain) {
                        return None;
                    }
                    record.domain = domain;
                }
                "path" if val.starts_with('/') => record.path = val.to_string(),
                "max-age" => max_age = val.parse::<i64>().ok(),
                "expires" => expires = parse_cookie_date(val),
                "secure" => record.secure = true,
                _ => {}
            }
        }

        // Max-Age 优先于 Expires
        record.expiry = match (max_age, expires) {
            (Some(secs), _) => Some(now.saturating_add(secs)),
            (None, Some(at)) => Some(at),
            (None, None) => None,
        };

        Some(record)
    }
}

/// 可序列化的 Cookie 容器
#[derive(Debug, Default)]
pub struct SessionJar {
    records: RwLock<Vec<CookieRecord>>,
}

impl SessionJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用已有记录构造
    pub fn from_records(records: Vec<CookieRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// 从导出的文本恢复
    ///
    /// 空文本、非法 base64、非法 JSON 都视为数据损坏，不会得到一个空容器。
    pub fn deserialize(blob: &str) -> AppResult<Self> {
        let blob = blob.trim();
        if blob.is_empty() {
            return Err(AppError::corrupt_state("Cookie 数据为空"));
        }
        let bytes = STANDARD
            .decode(blob)
            .map_err(|e| AppError::corrupt_state(format!("base64 解码失败: {}", e)))?;
        let records: Vec<CookieRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::corrupt_state(format!("JSON 解析失败: {}", e)))?;
        Ok(Self::from_records(records))
    }

    /// 导出为可写入文本文件的字符串（已过期的 Cookie 不导出）
    pub fn serialize(&self) -> AppResult<String> {
        let records = self.snapshot();
        let json = serde_json::to_vec(&records).map_err(|e| AppError::malformed("Cookie", e))?;
        Ok(STANDARD.encode(json))
    }

    /// 当前有效的 Cookie 副本
    pub fn snapshot(&self) -> Vec<CookieRecord> {
        let now = Utc::now().timestamp();
        self.read()
            .iter()
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 写入或替换一条 Cookie；已过期的记录会删除同名旧值
    pub fn insert(&self, record: CookieRecord) {
        let now = Utc::now().timestamp();
        let mut records = self.write();
        records.retain(|c| !c.same_slot(&record) && !c.is_expired(now));
        if !record.is_expired(now) {
            records.push(record);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CookieRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CookieRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = Utc::now().timestamp();
        for header in cookie_headers {
            let Ok(text) = header.to_str() else {
                continue;
            };
            if let Some(record) = CookieRecord::parse(text, url, now) {
                self.insert(record);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let now = Utc::now().timestamp();
        let header = self
            .read()
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            HeaderValue::from_str(&header).ok()
        }
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// 未指定 Path 时，取请求路径中最后一个 `/` 之前的部分
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

/// 解析 Expires，兼容 RFC 1123 与旧式 `Wed, 21-Oct-2015 07:28:00 GMT`
fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn set(jar: &SessionJar, header: &'static str, at: &str) {
        let value = HeaderValue::from_static(header);
        jar.set_cookies(&mut std::iter::once(&value), &url(at));
    }

    fn cookie_header(jar: &SessionJar, at: &str) -> Option<String> {
        jar.cookies(&url(at)).map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_host_only_cookie_sent_back() {
        let jar = SessionJar::new();
        set(&jar, "JSESSIONID=abc; Path=/; HttpOnly", "https://wfw.scu.edu.cn/ncov/wap/default/index");

        assert_eq!(
            cookie_header(&jar, "https://wfw.scu.edu.cn/ncov/wap/default/save").as_deref(),
            Some("JSESSIONID=abc")
        );
        assert_eq!(cookie_header(&jar, "https://ua.scu.edu.cn/login"), None);
    }

    #[test]
    fn test_domain_cookie_shared_with_subdomains() {
        let jar = SessionJar::new();
        set(&jar, "TGC=ticket; Domain=.scu.edu.cn; Path=/", "https://ua.scu.edu.cn/login");

        assert!(cookie_header(&jar, "https://wfw.scu.edu.cn/").is_some());
        assert!(cookie_header(&jar, "https://evil-scu.edu.cn/").is_none());
    }

    #[test]
    fn test_foreign_domain_attribute_rejected() {
        let jar = SessionJar::new();
        set(&jar, "CASTGC=evil; Domain=scu.edu.cn; Path=/", "https://attacker.example.com/");
        set(&jar, "sid=x; Domain=wfw.scu.edu.cn; Path=/", "https://ua.scu.edu.cn/");

        assert_eq!(cookie_header(&jar, "https://ua.scu.edu.cn/login"), None);
        assert_eq!(cookie_header(&jar, "https://wfw.scu.edu.cn/"), None);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_secure_cookie_only_over_https() {
        let jar = SessionJar::new();
        set(&jar, "sid=secret; Path=/; Secure; HttpOnly", "https://ua.scu.edu.cn/login");

        assert_eq!(cookie_header(&jar, "http://ua.scu.edu.cn/"), None);
        assert_eq!(cookie_header(&jar, "https://ua.scu.edu.cn/").as_deref(), Some("sid=secret"));
        assert!(jar.snapshot()[0].secure);
    }

    #[test]
    fn test_old_blob_without_secure_flag() {
        let blob = STANDARD.encode(
            r#"[{"name":"a","value":"1","domain":"ua.scu.edu.cn","path":"/","expiry":null}]"#,
        );
        let jar = SessionJar::deserialize(&blob).unwrap();
        assert!(!jar.snapshot()[0].secure);
        assert_eq!(cookie_header(&jar, "http://ua.scu.edu.cn/").as_deref(), Some("a=1"));
    }

    #[test]
    fn test_path_scoping() {
        let jar = SessionJar::new();
        set(&jar, "a=1; Path=/ncov", "https://wfw.scu.edu.cn/");

        assert!(cookie_header(&jar, "https://wfw.scu.edu.cn/ncov/wap").is_some());
        assert!(cookie_header(&jar, "https://wfw.scu.edu.cn/ncovx").is_none());
        assert!(cookie_header(&jar, "https://wfw.scu.edu.cn/").is_none());
    }

    #[test]
    fn test_default_path_from_request() {
        assert_eq!(default_path("/ncov/wap/default/index"), "/ncov/wap/default");
        assert_eq!(default_path("/login"), "/");
        assert_eq!(default_path(""), "/");
    }

    #[test]
    fn test_replace_and_expire() {
        let jar = SessionJar::new();
        set(&jar, "sid=old; Path=/", "https://ua.scu.edu.cn/");
        set(&jar, "sid=new; Path=/", "https://ua.scu.edu.cn/");
        assert_eq!(cookie_header(&jar, "https://ua.scu.edu.cn/").as_deref(), Some("sid=new"));

        set(&jar, "sid=gone; Path=/; Max-Age=0", "https://ua.scu.edu.cn/");
        assert_eq!(cookie_header(&jar, "https://ua.scu.edu.cn/"), None);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_expires_attribute() {
        let jar = SessionJar::new();
        set(&jar, "old=1; Path=/; Expires=Wed, 21 Oct 2015 07:28:00 GMT", "https://ua.scu.edu.cn/");
        set(&jar, "legacy=1; Path=/; Expires=Thu, 01-Jan-2099 00:00:00 GMT", "https://ua.scu.edu.cn/");

        let names: Vec<String> = jar.snapshot().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["legacy".to_string()]);
    }

    #[test]
    fn test_serialize_roundtrip_ignores_order() {
        let jar = SessionJar::new();
        set(&jar, "b=2; Path=/", "https://wfw.scu.edu.cn/");
        set(&jar, "a=1; Domain=scu.edu.cn; Path=/; Max-Age=3600", "https://ua.scu.edu.cn/");

        let blob = jar.serialize().unwrap();
        let restored = SessionJar::deserialize(&blob).unwrap();

        let as_map = |j: &SessionJar| {
            j.snapshot()
                .into_iter()
                .map(|c| (c.name, c.value))
                .collect::<BTreeMap<_, _>>()
        };
        assert_eq!(as_map(&jar), as_map(&restored));
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let blobs = vec![
            String::new(),
            "   ".to_string(),
            "%%%not-base64%%%".to_string(),
            STANDARD.encode("not json"),
            STANDARD.encode("{\"a\":1}"),
        ];
        for blob in &blobs {
            let err = SessionJar::deserialize(blob).unwrap_err();
            assert!(err.is_corrupt_state(), "blob {:?} should be corrupt", blob);
        }
    }

    #[test]
    fn test_deserialize_empty_list_is_valid() {
        let blob = STANDARD.encode("[]");
        let jar = SessionJar::deserialize(&blob).unwrap();
        assert!(jar.is_empty());
    }
}

//! 打卡数据
//!
//! `StatusInfo` 是服务器返回的上一次打卡记录，字段由服务器定义，
//! 客户端只改写 `created`，其余字段原样提交。

use crate::error::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 打卡页中标记上次打卡数据的关键字
pub const STATUS_MARKER: &str = "oldInfo";

/// 上一次打卡记录
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusInfo(Map<String, Value>);

impl StatusInfo {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 记录中的创建时间（Unix 秒）
    pub fn created(&self) -> Option<i64> {
        self.0.get("created").and_then(Value::as_i64)
    }

    /// 复制一份并把 `created` 改为指定时间
    pub fn with_created(&self, timestamp: i64) -> Self {
        let mut fields = self.0.clone();
        fields.insert("created".to_string(), Value::from(timestamp));
        Self(fields)
    }

    /// 转为表单字段，编码方式与门户一直收到的表单一致：
    ///
    /// - 字符串原样提交，数字用其文本
    /// - 布尔提交 `True` / `False`
    /// - `null` 不提交
    /// - 数组按元素重复同一个键，元素中的 `null` 同样跳过
    /// - 对象提交其紧凑 JSON
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            match value {
                Value::Array(items) => {
                    form.extend(items.iter().filter_map(form_scalar).map(|text| (key.clone(), text)));
                }
                other => {
                    if let Some(text) = form_scalar(other) {
                        form.push((key.clone(), text));
                    }
                }
            }
        }
        form
    }

    /// 从打卡页 HTML 中解析 `oldInfo: {...},`
    pub fn extract(html: &str, page_url: &str) -> AppResult<Self> {
        if !html.contains(STATUS_MARKER) {
            return Err(AppError::marker_missing(STATUS_MARKER, page_url));
        }

        let re = Regex::new(r"oldInfo: (\{.*?\}),\r?\n").map_err(|e| AppError::malformed("oldInfo 匹配规则", e))?;
        let raw = re
            .captures(html)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| AppError::marker_missing("oldInfo 对象", page_url))?;

        let fields: Map<String, Value> = serde_json::from_str(raw).map_err(|e| AppError::malformed(STATUS_MARKER, e))?;
        Ok(Self(fields))
    }
}

fn form_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitResult {
    Success { code: i64 },
    Failure { code: i64 },
}

impl SubmitResult {
    /// 按服务器结果码分类
    ///
    /// `0` 表示成功；`1` 也按成功处理（服务器对已提交过的记录返回 1，
    /// 该含义未经服务器文档确认）。
    pub fn from_code(code: i64) -> Self {
        match code {
            0 | 1 => SubmitResult::Success { code },
            _ => SubmitResult::Failure { code },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmitResult::Success { .. })
    }

    pub fn code(&self) -> i64 {
        match self {
            SubmitResult::Success { code } | SubmitResult::Failure { code } => *code,
        }
    }
}

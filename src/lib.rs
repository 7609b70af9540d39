//! # SCU Checkin
//!
//! 一个用于自动完成统一身份认证登录和每日打卡的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（HTTP 客户端、Cookie），只暴露能力
//! - `HttpExecutor` - 唯一的会话 owner，提供带超时 / 重试 / 取消的 GET、POST
//! - `SessionJar` - 可导出、可恢复的 Cookie 容器
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只做一件事
//! - `AuthService` - 登录页 / 验证码 / 提交登录
//! - `StatusService` - 探测登录状态、读取和提交打卡记录
//! - `CaptchaSolver` - 验证码识别
//! - `SessionStore` - 读写 Cookie 文件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次登录"的完整流程
//! - `LoginFlow` - 登录状态机（取图 → 识别 → 提交 → 重试）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/checkin_runner` - 恢复会话 → 登录 → 打卡 → 保存会话
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{HttpExecutor, SessionJar};
pub use models::{Credentials, LoginContext, StatusInfo, SubmitResult};
pub use orchestrator::{App, CheckinReport};
pub use services::CaptchaSolver;
pub use workflow::{LoginFlow, LoginOutcome, LoginState};

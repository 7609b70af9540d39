//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! checkin_runner::App (一次打卡运行)
//!     ↓
//! workflow::LoginFlow (登录状态机)
//!     ↓
//! services (能力层：auth / status / captcha / session_store)
//!     ↓
//! infrastructure (基础设施：HttpExecutor / SessionJar / retry)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层创建 HttpExecutor
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无页面细节**：只做调度，不解析页面

pub mod checkin_runner;

pub use checkin_runner::{App, CheckinReport};

//! 日志工具模块
//!
//! 提供日志初始化和运行摘要输出

use crate::config::Config;
use crate::orchestrator::CheckinReport;
use crate::models::SubmitResult;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 设置了 `RUST_LOG` 时以其为准，否则按 `verbose` 选择 debug / info。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, username: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 每日打卡 ({})", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("👤 账号: {}", username);
    info!("🔁 最多登录 {} 次，单个请求最多 {} 次", config.max_login_retries, config.request_max_attempts);
    info!("{}", "=".repeat(60));
}

/// 打印运行结果
pub fn print_report(report: &CheckinReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 打卡完成");
    match report.login_attempts {
        Some(attempts) => info!("🔐 账号密码登录，第 {} 次尝试成功", attempts),
        None => info!("🍪 使用已保存的 Cookie"),
    }
    if let Some(created) = report.created {
        info!("🕒 created = {}", created);
    }
    match report.result {
        SubmitResult::Success { code } => info!("✅ 服务器结果码: {}", code),
        SubmitResult::Failure { code } => info!("❌ 服务器结果码: {}", code),
    }
    info!("{}", "=".repeat(60));
}

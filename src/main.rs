use anyhow::Result;
use clap::Parser;
use scu_checkin::utils::logging;
use scu_checkin::{App, Config, Credentials};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// 统一身份认证登录 + 每日打卡
#[derive(Debug, Parser)]
#[command(name = "scu-checkin", version)]
struct Cli {
    /// 学号
    username: String,
    /// 密码
    password: String,
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Cookie 持久化文件
    #[arg(long)]
    cookie_file: Option<String>,
    /// 外部验证码识别程序
    #[arg(long)]
    solver_cmd: Option<String>,
    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path).await?,
        None => Config::from_env(),
    };
    if let Some(cookie_file) = cli.cookie_file {
        config.cookie_file = cookie_file;
    }
    if let Some(cmd) = cli.solver_cmd {
        config.captcha_solver_cmd = Some(cmd);
    }
    config.verbose_logging |= cli.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    // Ctrl-C 取消正在进行的请求
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，正在取消...");
            signal_token.cancel();
        }
    });

    let credentials = Credentials::new(cli.username, cli.password);
    let app = App::initialize(config, cancel)?;

    if let Err(e) = app.run(&credentials).await {
        error!("❌ 打卡失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}

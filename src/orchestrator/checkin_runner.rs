//! 打卡编排 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次打卡运行的调度和资源管理。
//!
//! ## 核心流程
//!
//! 1. **恢复会话**：读取 Cookie 文件，存在则恢复并探测打卡页
//! 2. **重新登录**：无 Cookie / Cookie 损坏 / 被重定向到登录页时，走账号密码 + 验证码登录，再探测一次
//! 3. **提交打卡**：以上次记录为模板，改写 `created` 后提交
//! 4. **保存会话**：无论提交结果如何，只要已登录就写回 Cookie 文件
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一创建 HttpExecutor 的模块
//! - **向下委托**：登录交给 LoginFlow，打卡交给 StatusService

use crate::config::Config;
use crate::error::{AppResult, AuthError};
use crate::infrastructure::HttpExecutor;
use crate::models::{Credentials, StatusInfo, SubmitResult};
use crate::services::{solver_from_config, CaptchaSolver, ProbeOutcome, SessionStore, StatusService};
use crate::utils::logging;
use crate::workflow::LoginFlow;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinReport {
    /// 是否直接用保存的 Cookie 完成
    pub restored_session: bool,
    /// 走了账号密码登录时，成功所用的尝试次数
    pub login_attempts: Option<usize>,
    /// 提交的 `created`
    pub created: Option<i64>,
    pub result: SubmitResult,
}

/// 应用主结构
pub struct App {
    config: Config,
    solver: Box<dyn CaptchaSolver>,
    store: SessionStore,
    status: StatusService,
    cancel: CancellationToken,
}

impl App {
    /// 按配置初始化（识别器由配置决定）
    pub fn initialize(config: Config, cancel: CancellationToken) -> AppResult<Self> {
        let solver = solver_from_config(&config)?;
        Self::new(config, solver, cancel)
    }

    /// 使用指定的识别器
    pub fn new(config: Config, solver: Box<dyn CaptchaSolver>, cancel: CancellationToken) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            store: SessionStore::new(PathBuf::from(&config.cookie_file)),
            status: StatusService::new(&config)?,
            config,
            solver,
            cancel,
        })
    }

    /// 运行一次完整打卡
    pub async fn run(&self, credentials: &Credentials) -> AppResult<CheckinReport> {
        logging::log_startup(&self.config, &credentials.username);

        let (executor, old_info, login_attempts) = match self.restore_session().await? {
            Some((executor, info)) => {
                info!("✓ 使用已保存的 Cookie，无需登录");
                (executor, info, None)
            }
            None => {
                let (executor, info, attempts) = self.login(credentials).await?;
                (executor, info, Some(attempts))
            }
        };

        let new_info = StatusService::derive_update(&old_info);
        let submitted = self.status.submit(&executor, &new_info).await;

        // 已登录的会话总是写回，失败时也保留服务器刷新过的 Cookie
        if let Err(e) = self.persist(&executor).await {
            if submitted.is_ok() {
                return Err(e);
            }
            warn!("保存 Cookie 失败: {}", e);
        }

        let report = CheckinReport {
            restored_session: login_attempts.is_none(),
            login_attempts,
            created: new_info.created(),
            result: submitted?,
        };
        logging::print_report(&report);
        Ok(report)
    }

    /// 尝试用 Cookie 文件恢复会话并探测
    ///
    /// 文件缺失、内容损坏、Cookie 已失效都返回 `None`，交给账号密码登录。
    async fn restore_session(&self) -> AppResult<Option<(HttpExecutor, StatusInfo)>> {
        let blob = match self.store.load().await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                info!("未找到 Cookie 文件 {}，需要登录", self.store.path().display());
                return Ok(None);
            }
            Err(e) => {
                warn!("⚠️ 读取 Cookie 文件失败，改为重新登录: {}", e);
                return Ok(None);
            }
        };

        let executor = match HttpExecutor::restore_from_cookies(&self.config, &blob, self.cancel.clone()) {
            Ok(executor) => executor,
            Err(e) if e.is_corrupt_state() => {
                warn!("⚠️ Cookie 文件已损坏，改为重新登录: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match self.status.probe_authenticated(&executor).await? {
            ProbeOutcome::Authenticated(info) => Ok(Some((executor, info))),
            ProbeOutcome::Unauthenticated => {
                info!("保存的 Cookie 已失效，需要重新登录");
                Ok(None)
            }
        }
    }

    /// 账号密码登录，随后必须能读到打卡页
    async fn login(&self, credentials: &Credentials) -> AppResult<(HttpExecutor, StatusInfo, usize)> {
        let executor = HttpExecutor::new(&self.config, self.cancel.clone())?;

        let mut flow = LoginFlow::new(&self.config, self.solver.as_ref());
        let outcome = flow.login_with_credentials(&executor, credentials).await?;

        match self.status.probe_authenticated(&executor).await? {
            ProbeOutcome::Authenticated(info) => Ok((executor, info, outcome.attempts)),
            ProbeOutcome::Unauthenticated => Err(AuthError::StillUnauthenticated.into()),
        }
    }

    async fn persist(&self, executor: &HttpExecutor) -> AppResult<()> {
        let blob = executor.export_cookies()?;
        self.store.save(&blob).await?;
        info!("💾 已保存 {} 条 Cookie 到 {}", executor.jar().len(), self.store.path().display());
        Ok(())
    }
}

//! Cookie 文件服务 - 业务能力层
//!
//! 只负责读写持久化的 Cookie 文本，不解析内容

use crate::error::{AppResult, FileError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Cookie 文件
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取 Cookie 文本，文件不存在时返回 `None`
    pub async fn load(&self) -> AppResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                debug!("读取 Cookie 文件: {}", self.path.display());
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FileError::ReadFailed {
                path: self.path.display().to_string(),
                source,
            }
            .into()),
        }
    }

    /// 写入 Cookie 文本（先写临时文件再改名）
    ///
    /// 文件里是有效的登录凭据，unix 下权限为 0600。
    pub async fn save(&self, blob: &str) -> AppResult<()> {
        let write_failed = |source| FileError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let tmp = self.path.with_extension("tmp");
        // 残留的临时文件可能权限过宽，mode 只在新建时生效
        match fs::remove_file(&tmp).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(write_failed(e).into()),
            _ => {}
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await.map_err(write_failed)?;
        file.write_all(blob.as_bytes()).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;
        drop(file);

        fs::rename(&tmp, &self.path).await.map_err(write_failed)?;

        debug!("Cookie 已写入: {}", self.path.display());
        Ok(())
    }
}

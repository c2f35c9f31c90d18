use std::env;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{PocFlowError, Result};

/// 调试开关环境变量
pub const DEBUG_ENV: &str = "POCFLOW_DEBUG";

/// 日志配置
pub struct LoggingConfig;

impl LoggingConfig {
    /// 初始化日志系统
    ///
    /// 支持通过环境变量配置：
    /// - RUST_LOG: 设置日志级别（error, warn, info, debug, trace）
    /// - POCFLOW_DEBUG: 启用详细调试输出
    ///
    /// 传入 `log_file` 时额外写一份不带颜色的运行日志。
    /// 已经初始化过时直接返回 `Ok`。
    ///
    /// ```no_run
    /// use pocflow::utils::LoggingConfig;
    ///
    /// LoggingConfig::init(None).unwrap();
    /// tracing::info!("ready");
    /// ```
    pub fn init(log_file: Option<&Path>) -> Result<()> {
        let is_debug = Self::is_debug();

        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => {
                if is_debug {
                    EnvFilter::new("pocflow=debug,info")
                } else {
                    EnvFilter::new("pocflow=info,warn")
                }
            }
        };

        let fmt_layer = fmt::layer()
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug);

        let file_layer = match log_file {
            Some(path) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(open_log_file(path)?),
            ),
            None => None,
        };

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer)
            .try_init();
        if let Err(err) = installed {
            // 测试中可能重复初始化
            if log_file.is_some() {
                return Err(PocFlowError::Config(format!("日志系统初始化失败: {err}")));
            }
        }

        if is_debug {
            tracing::debug!("调试模式已启用");
        }
        Ok(())
    }

    /// 检查是否启用调试模式
    pub fn is_debug() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }
}

/// 以追加方式打开运行日志，必要时创建目录
fn open_log_file(path: &Path) -> Result<Arc<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}

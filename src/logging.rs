//! 日志初始化模块
//!
//! 基于 `env_logger`，格式为 `时间 - 级别 - 消息`。
//! `RUST_LOG` 存在时优先生效，否则使用配置中的 `log_level`。
//! 开启 `log_to_file` 时同时写入标准错误与日志文件。

use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use crate::error::AppError;
use crate::settings::RedactorConfig;

/// 同时写入 stderr 与日志文件
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn level_label(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARNING",
        log::Level::Info => "INFO",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    }
}

/// 初始化全局日志
///
/// 重复调用时返回错误，不会 panic。
pub fn init_logging(config: &RedactorConfig) -> Result<(), AppError> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.level_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            level_label(record.level()),
            record.args()
        )
    });

    if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .map_err(|e| {
                AppError::Config(format!("打开日志文件 '{}' 失败: {}", config.log_file.display(), e))
            })?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
    }

    builder
        .try_init()
        .map_err(|e| AppError::Config(format!("日志初始化失败: {}", e)))
}

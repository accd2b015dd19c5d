//! # 剪贴板脱敏工具 — 应用入口
//!
//! 本文件仅负责命令分发与组件装配。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::process::ExitCode;

use clipboard_redactor::clipboard::SystemClipboard;
use clipboard_redactor::presidio::{AnonymizerBackend, LocalAnonymizer, PresidioClient};
use clipboard_redactor::redactor::Redactor;
use clipboard_redactor::settings::{self, RedactorConfig};
use clipboard_redactor::logging;

const USAGE: &str = "用法: clipboard-redactor [run | check-config | help]

  run            启动剪贴板监控（默认）
  check-config   校验配置并打印当前生效值

配置文件: $CLIPRE_CONFIG 或 <config_dir>/clipboard-redactor/config.json";

#[tokio::main]
async fn main() -> ExitCode {
    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());

    match command.as_str() {
        "run" => run().await,
        "check-config" => check_config(),
        "help" | "-h" | "--help" => {
            println!("{USAGE}");
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("未知命令: {other}\n\n{USAGE}");
            ExitCode::from(2)
        }
    }
}

/// 加载并校验配置，失败时打印全部错误
fn load_validated_config() -> Result<RedactorConfig, ExitCode> {
    let path = settings::default_config_path();
    let config = settings::load_effective_config(&path).map_err(|err| {
        eprintln!("加载配置失败: {err}");
        ExitCode::FAILURE
    })?;

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("配置错误:");
        for error in &errors {
            eprintln!("  - {error}");
        }
        return Err(ExitCode::FAILURE);
    }

    Ok(config)
}

fn check_config() -> ExitCode {
    let path = settings::default_config_path();
    let config = match load_validated_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    println!("Configuration is valid!");
    println!("\nCurrent configuration ({}):", path.display());
    println!("  Poll interval: {:?}", config.poll_interval());
    println!("  Log level: {}", config.log_level);
    println!("  Max clipboard size: {} chars", config.max_clipboard_chars);
    println!("  PII entities: {} types", config.entities.len());
    println!("  Confidence threshold: {}", config.confidence_threshold);
    println!("  Performance target: {}ms", config.performance_target_ms);
    println!("  Change detection: {}", if config.enable_content_hashing {
        config.hash_algorithm.as_str()
    } else {
        "raw"
    });
    println!("  Analyzer: {}", config.analyzer_url);
    println!(
        "  Anonymizer: {}",
        config.anonymizer_url.as_deref().unwrap_or("local replace")
    );
    ExitCode::SUCCESS
}

async fn run() -> ExitCode {
    println!("Real-Time Clipboard Redactor");
    println!("Using Microsoft Presidio for PII Detection");
    println!("{}", "-".repeat(50));

    let config = match load_validated_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    if let Err(err) = logging::init_logging(&config) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    log::info!("初始化 Presidio 客户端...");
    let client = match PresidioClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => {
            log::error!("创建 Presidio 客户端失败: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = client.health_check().await {
        log::error!("Presidio analyzer 不可用: {err}");
        return ExitCode::FAILURE;
    }

    let anonymizer = if client.has_remote_anonymizer() {
        AnonymizerBackend::Remote(client.clone())
    } else {
        AnonymizerBackend::Local(LocalAnonymizer::new())
    };
    log::info!("Presidio 就绪（匿名化: {}）", anonymizer.describe());

    let clipboard = match SystemClipboard::new() {
        Ok(clipboard) => clipboard,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut redactor = Redactor::new(config, clipboard, client, anonymizer);

    println!("Clipboard redactor is running...");
    println!("Copy some text with PII to test the redaction.");
    println!("Press Ctrl+C to stop.");

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("监听 Ctrl+C 失败，只能通过结束进程退出: {err}");
            std::future::pending::<()>().await;
        }
    };
    redactor.run(shutdown).await;

    println!("\nShutting down clipboard redactor...");
    println!(
        "{}",
        redactor
            .stats_snapshot()
            .summary(redactor.config(), chrono::Local::now())
    );
    println!("Goodbye!");
    ExitCode::SUCCESS
}

use clap::Parser;
use digtool::config::{CliArgs, OutputFormat};
use digtool::utils::error::{DigError, ErrorSeverity};
use digtool::utils::{logger, validation::Validate};
use digtool::{DigConfig, ScanReport, Scanner};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn exit_code(e: &DigError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: DigError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(&e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = match DigConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "❌ Failed to load config file '{}': {}",
                args.config.display(),
                e
            );
            eprintln!("💡 Make sure the file is valid TOML");
            std::process::exit(1);
        }
    };
    args.apply_to(&mut config);

    if args.log_json {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("Effective config: {:?}", config);

    if let Err(e) = config.validate() {
        fail(e);
    }

    let registry = config.build_registry().unwrap_or_else(|e| fail(e));

    if args.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(email) = args.email.as_deref() else {
        eprintln!("❌ An email address is required");
        std::process::exit(2);
    };

    let scanner = Scanner::new(registry, config.policy(), config.max_workers)
        .unwrap_or_else(|e| fail(e));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("⚠️ Scan interrupted by user, collecting partial results");
                cancel.cancel();
            }
        });
    }
    if let Some(seconds) = args.deadline {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            tracing::warn!("⏰ Deadline of {}s reached, stopping scan", seconds);
            cancel.cancel();
        });
    }

    let started_at = chrono::Utc::now();
    let timer = Instant::now();
    let outcome = scanner
        .scan_until_cancelled(email, &config.modules, cancel)
        .await
        .unwrap_or_else(|e| fail(e));

    if !outcome.skipped.is_empty() {
        tracing::warn!("Skipped unknown probes: {}", outcome.skipped.join(", "));
    }

    let report = ScanReport {
        email: email.to_string(),
        started_at,
        duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
        skipped: outcome.skipped,
        results: outcome.results,
    };

    let rendered = match args.format {
        OutputFormat::Table => Ok(report.render_table()),
        OutputFormat::Json => report.render_json(),
        OutputFormat::Csv => report.render_csv(),
    };
    match rendered {
        Ok(text) => print!("{}", text),
        Err(e) => fail(e),
    }

    Ok(())
}

use anyhow::Context;
use clap::Parser;
use parcel_utils::utils::error::{ErrorSeverity, UtilityError};
use parcel_utils::utils::{logger, validation::Validate};
use parcel_utils::{BulkLookup, CliConfig, EngineConfig, UtilityResolver};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting parcel-utils");
    tracing::debug!("CLI config: {:?}", args);

    if let Err(e) = args.validate() {
        fail(&e);
    }

    // 載入 TOML 配置
    tracing::info!("📁 Loading configuration from: {}", args.config);
    let mut config = EngineConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 環境變數與命令列覆蓋設定
    config.transport.apply_env_overrides();
    if args.force_ipv4 {
        config.transport.force_ipv4_dns = true;
        tracing::info!("🔧 IPv4-only DNS enabled");
    }

    if let Err(e) = config.validate() {
        fail(&e);
    }

    let catalogue = match config.load_catalogue() {
        Ok(catalogue) => Arc::new(catalogue),
        Err(e) => fail(&e),
    };
    tracing::info!("✅ Catalogue loaded: {} jurisdictions", catalogue.len());

    let resolver = match UtilityResolver::initialize(&config, catalogue) {
        Ok(resolver) => resolver,
        Err(e) => fail(&e),
    };

    let outcome = run(&resolver, &args).await;
    resolver.shutdown();

    if let Err(e) = outcome {
        fail(&e);
    }
    Ok(())
}

async fn run(
    resolver: &UtilityResolver<parcel_utils::HttpTransport>,
    args: &CliConfig,
) -> parcel_utils::Result<()> {
    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        let report = BulkLookup::new(resolver)
            .with_defaults(args.place.clone(), args.state.clone())
            .run(Path::new(input), Path::new(output))
            .await?;
        println!(
            "✅ {} of {} parcels resolved ({} skipped, {} failed)",
            report.resolved, report.rows_read, report.skipped, report.failed
        );
        println!("📁 Output saved to: {}", output);
        return Ok(());
    }

    let Some(query) = args.single_query() else {
        return Err(UtilityError::MissingConfigError {
            field: "--place/--state".to_string(),
        });
    };

    let profile = resolver.resolve(&query).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn fail(e: &UtilityError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Lookup failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code)
}

pub mod features;
pub mod shared;

use features::subscriptions::{handlers, SqliteSubscriptionRepository, SubscriptionService};
use log::{error, info};
use shared::config::{
    initialize_application, initialize_logging_system, load_environment_variables,
    log_initialization_complete, AppConfig, EnvironmentConfig,
};
use shared::errors::AppResult;
use shared::server;
use std::path::PathBuf;

/// 設定ファイルのデフォルトパス
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// アプリケーションを起動し、停止シグナルを受け取るまでAPIを提供する
pub fn run() -> AppResult<()> {
    // 環境変数を読み込み（.envファイルがある場合）
    load_environment_variables();

    // ログシステムを初期化
    let env_config = EnvironmentConfig::from_env();
    initialize_logging_system(&env_config);

    info!("アプリケーション初期化を開始します...");

    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load(&config_path)
        .inspect_err(|e| error!("設定の読み込みに失敗しました: {}", e.details()))?;

    info!("データベースを初期化しています...");
    let (conn, init_result) = initialize_application(&config)
        .inspect_err(|e| error!("データベースの初期化に失敗しました: {}", e.details()))?;
    log_initialization_complete(&init_result);

    let service = SubscriptionService::new(SqliteSubscriptionRepository::new(conn));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve_api(config, service))
}

async fn serve_api(
    config: AppConfig,
    service: SubscriptionService<SqliteSubscriptionRepository>,
) -> AppResult<()> {
    let listener = server::bind(&config.server).await?;

    server::serve(
        listener,
        &config.server,
        move |request| handlers::handle(service.clone(), request),
        shutdown_signal(),
    )
    .await?;

    info!("サーバーを停止しました");

    Ok(())
}

/// Ctrl-Cを待機する
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("停止シグナルの待機に失敗しました: {e}");
        std::future::pending::<()>().await;
    }
}

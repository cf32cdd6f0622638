use super::environment::AppConfig;
use crate::shared::database::initialize_database;
use crate::shared::errors::AppResult;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// アプリケーション初期化の結果を表す構造体
#[derive(Debug)]
pub struct InitializationResult {
    /// 初回起動かどうか
    pub is_first_run: bool,
    /// データベースファイルのパス
    pub database_path: PathBuf,
    /// 実行環境
    pub environment: String,
}

/// アプリケーションの初期化を実行する
///
/// # 引数
/// * `config` - 起動時に読み込んだ設定
///
/// # 戻り値
/// (データベース接続, 初期化結果)、または失敗時はエラー
pub fn initialize_application(config: &AppConfig) -> AppResult<(Connection, InitializationResult)> {
    let database_path = config.database.path.clone();

    // 初回起動かどうかを判定（データベースファイルの存在で判定）
    let is_first_run = !database_path.exists();

    if is_first_run {
        log_first_run_initialization(&config.environment.environment, &database_path);
    }

    let conn = initialize_database(&database_path)?;

    Ok((
        conn,
        InitializationResult {
            is_first_run,
            database_path,
            environment: config.environment.environment.clone(),
        },
    ))
}

/// 初回起動時の初期化ログを出力する
fn log_first_run_initialization(environment: &str, database_path: &Path) {
    log::info!("=== アプリケーション初回起動 ===");
    log::info!("実行環境: {environment}");
    log::info!("データベースファイル: {:?}", database_path);
}

/// 初期化完了ログを出力する
///
/// # 引数
/// * `result` - 初期化結果
pub fn log_initialization_complete(result: &InitializationResult) {
    if result.is_first_run {
        log::info!("初回起動の初期化が正常に完了しました");
    } else {
        log::info!("アプリケーション起動完了（既存データベースを使用）");
    }
    log::info!(
        "環境: {}, データベース: {:?}",
        result.environment,
        result.database_path
    );
}

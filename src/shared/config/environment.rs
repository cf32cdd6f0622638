use crate::shared::errors::{AppError, AppResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// データディレクトリ配下に作成するアプリケーション用ディレクトリ名
const APP_DIR_NAME: &str = "subscription-aggregator";

/// リクエスト本文の既定の上限（1MiB）
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

/// 現在の実行環境を判定する
///
/// # 戻り値
/// 現在の実行環境（Development または Production）
///
/// # 判定ロジック
/// 1. コンパイル時埋め込み環境変数を最優先
/// 2. 実行時環境変数 ENVIRONMENT を確認
/// 3. デバッグビルドの場合は Development
/// 4. リリースビルドの場合は Production
pub fn get_environment() -> Environment {
    // コンパイル時埋め込み環境変数を最優先
    if let Some(embedded_env) = option_env!("EMBEDDED_ENVIRONMENT") {
        let env = parse_environment(embedded_env);
        log::debug!("環境判定: コンパイル時埋め込み値を使用 -> {embedded_env} -> {env:?}");
        return env;
    }

    // 実行時環境変数を確認
    if let Ok(env_var) = std::env::var("ENVIRONMENT") {
        let env = parse_environment(&env_var);
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    let env = if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    };
    log::debug!(
        "環境判定: ビルド設定を使用 -> debug_assertions={} -> {env:?}",
        cfg!(debug_assertions)
    );
    env
}

fn parse_environment(value: &str) -> Environment {
    match value {
        "production" => Environment::Production,
        _ => Environment::Development,
    }
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_subscriptions.db"
/// - プロダクション環境: "subscriptions.db"
pub fn get_database_filename(env: &Environment) -> &'static str {
    match env {
        Environment::Development => "dev_subscriptions.db",
        Environment::Production => "subscriptions.db",
    }
}

/// 環境設定を管理する構造体
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// 実行環境
    pub environment: String,
    /// ログレベル
    pub log_level: String,
}

impl EnvironmentConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 戻り値
    /// 環境設定
    pub fn from_env() -> Self {
        Self::from_environment(&get_environment(), std::env::var("LOG_LEVEL").ok())
    }

    fn from_environment(environment: &Environment, log_level: Option<String>) -> Self {
        let log_level = log_level.unwrap_or_else(|| match environment {
            Environment::Development => "debug".to_string(),
            Environment::Production => "info".to_string(),
        });

        Self {
            environment: format!("{environment:?}").to_lowercase(),
            log_level,
        }
    }

    /// ログレベル文字列をlogのフィルターに変換する
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// バインドするホスト
    pub host: String,
    /// バインドするポート
    pub port: u16,
    /// リクエストヘッダー読み込みのタイムアウト（秒）
    pub read_timeout_secs: u64,
    /// 1リクエストあたりの処理タイムアウト（秒）
    pub request_timeout_secs: u64,
    /// リクエスト本文の上限（バイト）
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 30,
            request_timeout_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    /// "host:port"形式のアドレスを取得
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// データベース設定
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// SQLiteデータベースファイルのパス
    pub path: PathBuf,
}

/// 起動時に一度だけ構築し、各コンポーネントへ渡すアプリケーション設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: EnvironmentConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

/// JSON設定ファイルの内容（すべて省略可能）
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerSection,
    database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    read_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseSection {
    path: Option<PathBuf>,
}

impl AppConfig {
    /// 環境に応じたデフォルト設定を作成する
    ///
    /// # 引数
    /// * `environment` - 実行環境
    /// * `env_config` - ログ等の環境設定
    pub fn defaults(environment: &Environment, env_config: EnvironmentConfig) -> Self {
        Self {
            environment: env_config,
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: default_database_path(environment),
            },
        }
    }

    /// 設定を読み込む
    ///
    /// # 引数
    /// * `config_path` - JSON設定ファイルのパス（存在しない場合は無視）
    ///
    /// # 戻り値
    /// 検証済みの設定、または失敗時はエラー
    ///
    /// # 優先順位
    /// 1. デフォルト値
    /// 2. JSON設定ファイル
    /// 3. 環境変数
    pub fn load(config_path: &Path) -> AppResult<Self> {
        let environment = get_environment();
        let mut config = Self::defaults(&environment, EnvironmentConfig::from_env());

        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            config.apply_json(&contents)?;
            log::info!("設定ファイルを読み込みました: {}", config_path.display());
        } else {
            log::debug!(
                "設定ファイルが見つかりません。デフォルト値を使用します: {}",
                config_path.display()
            );
        }

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// JSON設定ファイルの値で上書きする
    fn apply_json(&mut self, contents: &str) -> AppResult<()> {
        let file: ConfigFile = serde_json::from_str(contents)?;

        if let Some(host) = file.server.host {
            self.server.host = host;
        }
        if let Some(port) = file.server.port {
            self.server.port = port;
        }
        if let Some(secs) = file.server.read_timeout_secs {
            self.server.read_timeout_secs = secs;
        }
        if let Some(secs) = file.server.request_timeout_secs {
            self.server.request_timeout_secs = secs;
        }
        if let Some(bytes) = file.server.max_body_bytes {
            self.server.max_body_bytes = bytes;
        }
        if let Some(path) = file.database.path {
            self.database.path = path;
        }

        Ok(())
    }

    /// 環境変数の値で上書きする
    ///
    /// # 引数
    /// * `lookup` - 変数名から値を取得する関数
    fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse_number("SERVER_PORT", &port)?;
        }
        if let Some(secs) = lookup("SERVER_READ_TIMEOUT") {
            self.server.read_timeout_secs = parse_number("SERVER_READ_TIMEOUT", &secs)?;
        }
        if let Some(secs) = lookup("SERVER_REQUEST_TIMEOUT") {
            self.server.request_timeout_secs = parse_number("SERVER_REQUEST_TIMEOUT", &secs)?;
        }
        if let Some(bytes) = lookup("SERVER_MAX_BODY_BYTES") {
            self.server.max_body_bytes = parse_number("SERVER_MAX_BODY_BYTES", &bytes)?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        Ok(())
    }

    /// 設定を検証する
    ///
    /// # 戻り値
    /// 設定が有効な場合はOk(())、無効な場合は設定エラー
    pub fn validate(&self) -> AppResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(AppError::configuration("サーバーのホストが設定されていません"));
        }

        if self.server.port == 0 {
            return Err(AppError::configuration(
                "サーバーのポートは1以上である必要があります",
            ));
        }

        if self.server.read_timeout_secs == 0 || self.server.request_timeout_secs == 0 {
            return Err(AppError::configuration(
                "タイムアウトは0より大きい値である必要があります",
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(AppError::configuration(
                "リクエスト本文の上限は1バイト以上である必要があります",
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(AppError::configuration(
                "データベースのパスが設定されていません",
            ));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        AppError::configuration(format!("環境変数 {name} の値が数値ではありません: {value}"))
    })
}

/// データベースファイルのデフォルトパスを取得する
///
/// ユーザーのデータディレクトリが取得できない場合はカレントディレクトリを使用する
fn default_database_path(environment: &Environment) -> PathBuf {
    let filename = get_database_filename(environment);
    match dirs::data_dir() {
        Some(dir) => dir.join(APP_DIR_NAME).join(filename),
        None => PathBuf::from(filename),
    }
}

/// 環境変数の読み込みを確認する
///
/// # 処理内容
/// 1. 開発環境（デバッグビルド）の場合のみ.envファイルを読み込み
/// 2. 本番ビルドでは環境変数は実行時に設定されることを前提とする
///
/// # 注意
/// ログシステム初期化前に呼ばれるため標準エラー出力に書き出す
pub fn load_environment_variables() {
    let is_development = cfg!(debug_assertions);

    if is_development {
        match dotenv::dotenv() {
            Ok(path) => {
                eprintln!("環境ファイルを読み込みました: {}", path.display());
            }
            Err(e) => {
                eprintln!("環境ファイルの読み込みに失敗: {e}");
                eprintln!("環境変数が設定されていることを確認してください");
            }
        }
    } else {
        eprintln!("本番環境: 環境変数は実行時に設定されます");
    }
}

/// ログシステムを初期化する
///
/// # 処理内容
/// 1. 環境設定からログレベルを決定
/// 2. env_loggerを初期化
pub fn initialize_logging_system(env_config: &EnvironmentConfig) {
    env_logger::Builder::from_default_env()
        .filter_level(env_config.level_filter())
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .init();

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}",
        env_config.log_level,
        env_config.environment
    );
}

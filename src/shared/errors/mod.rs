use thiserror::Error;

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// 日付トークンがMM-YYYY形式でない、または範囲外
    #[error("日付の形式が不正です: MM-YYYY形式で指定してください")]
    InvalidDateFormat,

    /// 正規化後の期間終了が期間開始より前
    #[error("期間の指定が不正です: 終了月が開始月より前です")]
    InvalidDateRange,

    /// サブスクリプションの終了月が開始月より前
    #[error("終了月は開始月以降を指定してください")]
    EndDateBeforeStart,

    /// ユーザーIDがUUID v4でない
    #[error("ユーザーIDの形式が不正です")]
    InvalidUserId,

    /// サブスクリプションIDが正の整数でない
    #[error("サブスクリプションIDが不正です")]
    InvalidSubscriptionId,

    /// リクエスト本文が上限を超えた
    #[error("リクエスト本文が大きすぎます: 上限{0}バイト")]
    PayloadTooLarge(usize),

    /// データベース関連のエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// バリデーション関連のエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    /// 並行処理関連のエラー
    #[error("並行処理エラー: {0}")]
    Concurrency(String),

    /// リクエスト処理のタイムアウト
    #[error("タイムアウト: {0}")]
    Timeout(String),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（タイムアウトなど）
    Medium,
    /// 高重要度（データベースエラーなど）
    High,
}

impl AppError {
    /// ユーザーに表示するためのフレンドリーなメッセージを取得
    ///
    /// # 戻り値
    /// ユーザーに表示可能なエラーメッセージ
    pub fn user_message(&self) -> &str {
        match self {
            AppError::InvalidDateFormat => "日付はMM-YYYY形式で指定してください",
            AppError::InvalidDateRange => "終了月は開始月以降を指定してください",
            AppError::EndDateBeforeStart => "終了月は開始月以降を指定してください",
            AppError::InvalidUserId => "ユーザーIDはUUID形式で指定してください",
            AppError::InvalidSubscriptionId => "サブスクリプションIDは正の整数で指定してください",
            AppError::PayloadTooLarge(_) => "リクエスト本文が大きすぎます",
            AppError::Database(_) => "データベース操作でエラーが発生しました",
            AppError::Validation(msg) => msg,
            AppError::NotFound(msg) => msg,
            AppError::Configuration(_) => "設定エラーが発生しました",
            AppError::Io(_) => "ファイル操作でエラーが発生しました",
            AppError::Json(_) => "リクエストの形式が不正です",
            AppError::Concurrency(_) => "並行処理でエラーが発生しました",
            AppError::Timeout(_) => "処理がタイムアウトしました",
        }
    }

    /// 機械判読用のエラーコードを取得
    ///
    /// # 戻り値
    /// APIレスポンスの`error`フィールドに入れるコード
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidDateFormat => "invalid_date_format",
            AppError::InvalidDateRange | AppError::EndDateBeforeStart => "invalid_date_range",
            AppError::InvalidUserId => "invalid_user_id",
            AppError::InvalidSubscriptionId => "invalid_subscription_id",
            AppError::Validation(_) | AppError::Json(_) => "validation_failed",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::NotFound(_) => "subscription_not_found",
            AppError::Timeout(_) => "request_timeout",
            AppError::Database(_)
            | AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Concurrency(_) => "internal_server_error",
        }
    }

    /// エラーの詳細情報を取得
    ///
    /// # 戻り値
    /// エラーの詳細情報（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    ///
    /// # 戻り値
    /// エラーの重要度レベル
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::InvalidDateFormat
            | AppError::InvalidDateRange
            | AppError::EndDateBeforeStart
            | AppError::InvalidUserId
            | AppError::InvalidSubscriptionId
            | AppError::Validation(_)
            | AppError::PayloadTooLarge(_)
            | AppError::NotFound(_)
            | AppError::Json(_) => ErrorSeverity::Low,
            AppError::Io(_) | AppError::Timeout(_) => ErrorSeverity::Medium,
            AppError::Database(_) | AppError::Configuration(_) | AppError::Concurrency(_) => {
                ErrorSeverity::High
            }
        }
    }

    /// クライアント入力に起因するエラーかどうか
    pub fn is_client_error(&self) -> bool {
        self.severity() == ErrorSeverity::Low
    }

    /// バリデーションエラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `message` - バリデーションエラーメッセージ
    ///
    /// # 戻り値
    /// バリデーションエラー
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    ///
    /// # 引数
    /// * `resource` - 見つからなかったリソース名
    ///
    /// # 戻り値
    /// リソース未発見エラー
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{}が見つかりません", resource.into()))
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// 並行処理エラーを作成するヘルパー関数
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        AppError::Concurrency(message.into())
    }
}

/// rusqlite::ErrorからAppErrorへの変換
impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        AppError::Database(error.to_string())
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;

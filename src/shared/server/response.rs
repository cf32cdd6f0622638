use crate::shared::errors::AppError;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// エラーレスポンスの本文
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

/// エラーに対応するHTTPステータスを取得する
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::InvalidDateFormat
        | AppError::InvalidDateRange
        | AppError::EndDateBeforeStart
        | AppError::InvalidUserId
        | AppError::InvalidSubscriptionId
        | AppError::Validation(_)
        | AppError::Json(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Database(_)
        | AppError::Configuration(_)
        | AppError::Io(_)
        | AppError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSONレスポンスを作成する
///
/// # 引数
/// * `status` - HTTPステータス
/// * `value` - 本文としてシリアライズする値
///
/// # 戻り値
/// Content-Typeを付与したレスポンス
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<String> {
    match serde_json::to_string(value) {
        Ok(body) => with_json_body(status, body),
        Err(e) => {
            log::error!("レスポンスのシリアライズに失敗: {e}");
            with_json_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"internal_server_error","message":"内部エラーが発生しました"}"#
                    .to_string(),
            )
        }
    }
}

/// エラーを`{error, message}`形式のレスポンスに変換する
pub fn error_response(error: &AppError) -> Response<String> {
    if error.is_client_error() {
        log::debug!("クライアントエラー: {}", error.details());
    } else {
        log::error!("リクエスト処理エラー: {}", error.details());
    }

    json_response(
        status_for(error),
        &ErrorBody {
            error: error.code(),
            message: error.user_message(),
        },
    )
}

/// 該当するルートがない場合のレスポンス
pub fn not_found_response() -> Response<String> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorBody {
            error: "not_found",
            message: "指定されたパスは存在しません",
        },
    )
}

/// 本文なしのレスポンス
pub fn empty_response(status: StatusCode) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    response
}

fn with_json_body(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response
}

use super::models::{
    CostQuery, CreateSubscriptionDto, ListSubscriptionsResponse, SubscriptionResponse,
    UpdateSubscriptionDto,
};
use super::repository::SubscriptionRepository;
use super::service::SubscriptionService;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::server::{error_response, json_response, not_found_response, ApiRequest};
use hyper::{Method, Response, StatusCode};
use serde::Serialize;

/// サブスクリプションAPIのベースパス
pub const BASE_PATH: &str = "/api/v1/subscriptions";

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// サーバーから渡されたリクエストを振り分ける
pub async fn handle<R: SubscriptionRepository + 'static>(
    service: SubscriptionService<R>,
    request: ApiRequest,
) -> Response<String> {
    dispatch(
        &service,
        &request.method,
        &request.path,
        request.query.as_deref(),
        &request.body,
    )
    .await
}

/// メソッドとパスに応じてハンドラーを呼び出す
///
/// # 引数
/// * `service` - サブスクリプションサービス
/// * `method` - HTTPメソッド
/// * `path` - リクエストパス
/// * `query` - クエリ文字列
/// * `body` - リクエスト本文
///
/// # 戻り値
/// JSONレスポンス（エラー時は`{error, message}`）
pub async fn dispatch<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
) -> Response<String> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    if path == "/health" {
        return if *method == Method::GET {
            health()
        } else {
            not_found_response()
        };
    }

    let segments: Vec<&str> = match path.strip_prefix(BASE_PATH) {
        Some("") => Vec::new(),
        Some(rest) if rest.starts_with('/') => rest[1..].split('/').collect(),
        _ => return not_found_response(),
    };

    let result = match (method, segments.as_slice()) {
        (&Method::POST, []) => create_subscription(service, body).await,
        (&Method::GET, ["cost"]) => calculate_cost(service, query).await,
        (&Method::GET, ["user", user_id]) => list_subscriptions(service, user_id).await,
        (&Method::GET, [user_id, id]) => get_subscription(service, user_id, id).await,
        (&Method::PUT, [user_id, id]) => update_subscription(service, user_id, id, body).await,
        (&Method::DELETE, [user_id, id]) => delete_subscription(service, user_id, id).await,
        _ => {
            log::debug!("未対応のリクエスト: {method} {path}");
            return not_found_response();
        }
    };

    result.unwrap_or_else(|e| error_response(&e))
}

fn health() -> Response<String> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "healthy",
            message: "サブスクリプション集計サービスは稼働中です",
        },
    )
}

async fn create_subscription<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    body: &[u8],
) -> AppResult<Response<String>> {
    let dto: CreateSubscriptionDto = serde_json::from_slice(body)?;
    let created = service.create(dto).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &SubscriptionResponse::from(&created),
    ))
}

async fn get_subscription<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    user_id: &str,
    id: &str,
) -> AppResult<Response<String>> {
    let id = parse_subscription_id(id)?;
    let subscription = service.get(user_id, id).await?;

    Ok(json_response(
        StatusCode::OK,
        &SubscriptionResponse::from(&subscription),
    ))
}

async fn update_subscription<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    user_id: &str,
    id: &str,
    body: &[u8],
) -> AppResult<Response<String>> {
    let id = parse_subscription_id(id)?;
    let dto: UpdateSubscriptionDto = serde_json::from_slice(body)?;
    let updated = service.update(user_id, id, dto).await?;

    Ok(json_response(
        StatusCode::OK,
        &SubscriptionResponse::from(&updated),
    ))
}

async fn delete_subscription<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    user_id: &str,
    id: &str,
) -> AppResult<Response<String>> {
    let id = parse_subscription_id(id)?;
    service.delete(user_id, id).await?;

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            message: "サブスクリプションを削除しました",
        },
    ))
}

async fn list_subscriptions<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    user_id: &str,
) -> AppResult<Response<String>> {
    let subscriptions = service.list(user_id).await?;

    Ok(json_response(
        StatusCode::OK,
        &ListSubscriptionsResponse::from(subscriptions.as_slice()),
    ))
}

async fn calculate_cost<R: SubscriptionRepository + 'static>(
    service: &SubscriptionService<R>,
    query: Option<&str>,
) -> AppResult<Response<String>> {
    let query = parse_cost_query(query.unwrap_or(""));
    let result = service.calculate_total_cost(query).await?;

    Ok(json_response(StatusCode::OK, &result))
}

fn parse_subscription_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::InvalidSubscriptionId)
}

/// 集計APIのクエリ文字列を解析する
///
/// `service_names`はカンマ区切りと繰り返し指定のどちらも受け付ける。
/// 指定されなかった項目は空文字列になり、サービス側の検証でエラーになる。
fn parse_cost_query(query: &str) -> CostQuery {
    let mut cost_query = CostQuery::default();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "user_id" => cost_query.user_id = value.into_owned(),
            "start_date" => cost_query.start_date = value.into_owned(),
            "end_date" => cost_query.end_date = value.into_owned(),
            "service_names" => cost_query.service_names.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }

    cost_query
}

use super::handlers::dispatch;
use super::models::{CostQuery, CreateSubscriptionDto, NewSubscription, Subscription, UpdateSubscriptionDto};
use super::repository::{SqliteSubscriptionRepository, SubscriptionRepository};
use super::service::{SubscriptionService, MAX_PRICE};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use hyper::{Method, StatusCode};
use std::sync::{Arc, Mutex};

const USER_ID: &str = "60601fee-2bf1-4721-ae6f-7636e79a0cba";
const OTHER_USER_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

/// 呼び出しを記録するテスト用リポジトリ
struct RecordingRepository {
    subscriptions: Vec<Subscription>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_with: Option<String>,
}

impl RecordingRepository {
    fn new(subscriptions: Vec<Subscription>) -> (Self, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                subscriptions,
                calls: Arc::clone(&calls),
                fail_with: None,
            },
            calls,
        )
    }

    fn record(&self, call: &'static str) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        match &self.fail_with {
            Some(message) => Err(AppError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

impl SubscriptionRepository for RecordingRepository {
    fn create(&self, _new: &NewSubscription) -> AppResult<Subscription> {
        self.record("create")?;
        Err(AppError::Database("未対応".to_string()))
    }

    fn find_by_id(&self, _user_id: &str, id: i64) -> AppResult<Subscription> {
        self.record("find_by_id")?;
        Err(AppError::not_found(format!("ID {id} のサブスクリプション")))
    }

    fn update(&self, subscription: &Subscription) -> AppResult<Subscription> {
        self.record("update")?;
        Ok(subscription.clone())
    }

    fn delete(&self, _user_id: &str, _id: i64) -> AppResult<()> {
        self.record("delete")
    }

    fn find_all_by_user(&self, _user_id: &str) -> AppResult<Vec<Subscription>> {
        self.record("find_all_by_user")?;
        Ok(self.subscriptions.clone())
    }

    fn find_by_period(
        &self,
        _user_id: &str,
        _service_names: &[String],
        _period_start: DateTime<Utc>,
        _period_end: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        self.record("find_by_period")?;
        Ok(self.subscriptions.clone())
    }
}

fn sqlite_service() -> SubscriptionService<SqliteSubscriptionRepository> {
    SubscriptionService::new(SqliteSubscriptionRepository::open_in_memory().unwrap())
}

fn create_dto(service_name: &str, price: i64, start: &str, end: Option<&str>) -> CreateSubscriptionDto {
    CreateSubscriptionDto {
        service_name: service_name.to_string(),
        price,
        user_id: USER_ID.to_string(),
        start_date: start.to_string(),
        end_date: end.map(str::to_string),
    }
}

fn cost_query(start: &str, end: &str) -> CostQuery {
    CostQuery {
        user_id: USER_ID.to_string(),
        service_names: Vec::new(),
        start_date: start.to_string(),
        end_date: end.to_string(),
    }
}

fn body_json(response: &hyper::Response<String>) -> serde_json::Value {
    serde_json::from_str(response.body()).unwrap()
}

#[tokio::test]
async fn test_cost_open_ended_subscription() {
    let service = sqlite_service();
    let created = service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();

    let result = service
        .calculate_total_cost(cost_query("01-2025", "06-2025"))
        .await
        .unwrap();

    assert_eq!(result.total_cost, 3594);
    assert_eq!(result.breakdown.len(), 1);
    assert_eq!(result.breakdown[0].subscription_id, created.id);
    assert_eq!(result.breakdown[0].months_count, 6);
    // 入力トークンはそのまま返す
    assert_eq!(result.start_date, "01-2025");
    assert_eq!(result.end_date, "06-2025");
}

#[tokio::test]
async fn test_cost_subscription_inside_period() {
    let service = sqlite_service();
    service
        .create(create_dto("Spotify", 300, "02-2025", Some("05-2025")))
        .await
        .unwrap();

    let result = service
        .calculate_total_cost(cost_query("01-2025", "12-2025"))
        .await
        .unwrap();

    assert_eq!(result.total_cost, 1200);
    assert_eq!(result.breakdown[0].months_count, 4);
}

#[tokio::test]
async fn test_cost_excludes_out_of_window_subscription() {
    let service = sqlite_service();
    service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();
    service
        .create(create_dto("Later", 1000, "07-2025", None))
        .await
        .unwrap();

    let result = service
        .calculate_total_cost(cost_query("01-2025", "06-2025"))
        .await
        .unwrap();

    assert_eq!(result.total_cost, 3594);
    assert!(result.breakdown.iter().all(|line| line.service_name != "Later"));
}

#[tokio::test]
async fn test_cost_with_service_filter() {
    let service = sqlite_service();
    service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();
    service
        .create(create_dto("Spotify", 300, "01-2025", None))
        .await
        .unwrap();

    let mut query = cost_query("01-2025", "03-2025");
    query.service_names = vec![" Spotify ".to_string()];
    let result = service.calculate_total_cost(query).await.unwrap();

    assert_eq!(result.total_cost, 900);
    assert_eq!(result.breakdown.len(), 1);
    assert_eq!(result.breakdown[0].service_name, "Spotify");
}

#[tokio::test]
async fn test_invalid_month_skips_repository() {
    let (repo, calls) = RecordingRepository::new(Vec::new());
    let service = SubscriptionService::new(repo);

    let result = service
        .calculate_total_cost(cost_query("13-2025", "06-2025"))
        .await;

    assert!(matches!(result, Err(AppError::InvalidDateFormat)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reversed_period_skips_repository() {
    let (repo, calls) = RecordingRepository::new(Vec::new());
    let service = SubscriptionService::new(repo);

    let result = service
        .calculate_total_cost(cost_query("06-2025", "01-2025"))
        .await;

    assert!(matches!(result, Err(AppError::InvalidDateRange)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_single_month_period_is_accepted() {
    let (repo, calls) = RecordingRepository::new(Vec::new());
    let service = SubscriptionService::new(repo);

    let result = service
        .calculate_total_cost(cost_query("06-2025", "06-2025"))
        .await
        .unwrap();

    assert_eq!(result.total_cost, 0);
    assert!(result.breakdown.is_empty());
    assert_eq!(*calls.lock().unwrap(), vec!["find_by_period"]);
}

#[tokio::test]
async fn test_invalid_user_id_skips_repository() {
    let (repo, calls) = RecordingRepository::new(Vec::new());
    let service = SubscriptionService::new(repo);

    let mut query = cost_query("01-2025", "06-2025");
    query.user_id = "not-a-uuid".to_string();

    let result = service.calculate_total_cost(query).await;
    assert!(matches!(result, Err(AppError::InvalidUserId)));

    let result = service.list("not-a-uuid").await;
    assert!(matches!(result, Err(AppError::InvalidUserId)));

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repository_failure_is_propagated() {
    let (mut repo, calls) = RecordingRepository::new(Vec::new());
    repo.fail_with = Some("database is locked".to_string());
    let service = SubscriptionService::new(repo);

    let result = service
        .calculate_total_cost(cost_query("01-2025", "06-2025"))
        .await;

    match result {
        Err(AppError::Database(message)) => assert_eq!(message, "database is locked"),
        other => panic!("Databaseエラーが期待されます: {other:?}"),
    }
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_validation_skips_repository() {
    let (repo, calls) = RecordingRepository::new(Vec::new());
    let service = SubscriptionService::new(repo);

    let result = service.create(create_dto("  ", 100, "01-2025", None)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.create(create_dto("Netflix", -1, "01-2025", None)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service
        .create(create_dto("Netflix", i64::MAX, "01-2025", None))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service
        .create(create_dto("Netflix", 100, "06-2025", Some("01-2025")))
        .await;
    assert!(matches!(result, Err(AppError::EndDateBeforeStart)));

    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_rejects_price_above_limit() {
    let service = sqlite_service();
    let created = service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();

    let result = service
        .update(
            USER_ID,
            created.id,
            UpdateSubscriptionDto {
                service_name: "Netflix".to_string(),
                price: i64::MAX,
                start_date: "01-2025".to_string(),
                end_date: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(service.get(USER_ID, created.id).await.unwrap().price, 599);
}

#[tokio::test]
async fn test_cost_at_price_limit_keeps_line_totals_exact() {
    let service = sqlite_service();
    for name in ["Netflix", "Spotify"] {
        service
            .create(create_dto(name, MAX_PRICE, "01-2025", None))
            .await
            .unwrap();
    }

    let result = service
        .calculate_total_cost(cost_query("01-2025", "02-2025"))
        .await
        .unwrap();

    assert_eq!(result.breakdown.len(), 2);
    for line in &result.breakdown {
        assert_eq!(line.months_count, 2);
        assert_eq!(line.total_cost, MAX_PRICE * 2);
    }
    assert_eq!(result.total_cost, MAX_PRICE * 4);
}

#[tokio::test]
async fn test_crud_lifecycle() {
    let service = sqlite_service();

    let created = service
        .create(create_dto("  Yandex Plus  ", 400, "07-2025", Some("")))
        .await
        .unwrap();
    assert_eq!(created.service_name, "Yandex Plus");
    assert!(created.end_date.is_none());

    let fetched = service.get(USER_ID, created.id).await.unwrap();
    assert_eq!(fetched, created);

    let updated = service
        .update(
            USER_ID,
            created.id,
            UpdateSubscriptionDto {
                service_name: "Yandex Plus".to_string(),
                price: 450,
                start_date: "07-2025".to_string(),
                end_date: Some("12-2025".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, 450);
    assert!(updated.end_date.is_some());

    // 他のユーザーからは見えない
    assert!(matches!(
        service.get(OTHER_USER_ID, created.id).await,
        Err(AppError::NotFound(_))
    ));

    service.delete(USER_ID, created.id).await.unwrap();
    assert!(matches!(
        service.get(USER_ID, created.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(service.list(USER_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_http_create_and_get() {
    let service = sqlite_service();

    let body = format!(
        r#"{{"service_name":"Yandex Plus","price":400,"user_id":"{USER_ID}","start_date":"07-2025"}}"#
    );
    let response = dispatch(&service, &Method::POST, "/api/v1/subscriptions", None, body.as_bytes()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(&response);
    assert_eq!(created["service_name"], "Yandex Plus");
    assert_eq!(created["start_date"], "2025-07-01T00:00:00Z");
    assert!(created.get("end_date").is_none());

    let id = created["id"].as_i64().unwrap();
    let path = format!("/api/v1/subscriptions/{USER_ID}/{id}");
    let response = dispatch(&service, &Method::GET, &path, None, &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(&response)["price"], 400);
}

#[tokio::test]
async fn test_http_update_delete_and_list() {
    let service = sqlite_service();
    let created = service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();
    let path = format!("/api/v1/subscriptions/{USER_ID}/{}", created.id);

    let body = r#"{"service_name":"Netflix","price":699,"start_date":"01-2025","end_date":"03-2025"}"#;
    let response = dispatch(&service, &Method::PUT, &path, None, body.as_bytes()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(&response);
    assert_eq!(updated["price"], 699);
    assert_eq!(updated["end_date"], "2025-03-31T23:59:59Z");

    let list_path = format!("/api/v1/subscriptions/user/{USER_ID}");
    let response = dispatch(&service, &Method::GET, &list_path, None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list = body_json(&response);
    assert_eq!(list["count"], 1);
    assert_eq!(list["subscriptions"][0]["id"], created.id);

    let response = dispatch(&service, &Method::DELETE, &path, None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(&response)["message"], "サブスクリプションを削除しました");

    let response = dispatch(&service, &Method::GET, &path, None, &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&response)["error"], "subscription_not_found");
}

#[tokio::test]
async fn test_http_cost_endpoint() {
    let service = sqlite_service();
    service
        .create(create_dto("Netflix", 599, "01-2025", None))
        .await
        .unwrap();
    service
        .create(create_dto("Spotify", 300, "02-2025", Some("05-2025")))
        .await
        .unwrap();

    let query = format!("user_id={USER_ID}&start_date=01-2025&end_date=06-2025");
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/cost", Some(&query), &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(&response);
    assert_eq!(result["total_cost"], 3594 + 1200);
    assert_eq!(result["user_id"], USER_ID);
    assert_eq!(result["breakdown"].as_array().unwrap().len(), 2);

    let query = format!("user_id={USER_ID}&start_date=01-2025&end_date=06-2025&service_names=Spotify");
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/cost", Some(&query), &[]).await;
    assert_eq!(body_json(&response)["total_cost"], 1200);
}

#[tokio::test]
async fn test_http_error_responses() {
    let service = sqlite_service();

    // 期間トークンが不正
    let query = format!("user_id={USER_ID}&start_date=13-2025&end_date=06-2025");
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/cost", Some(&query), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&response)["error"], "invalid_date_format");

    // 期間が逆順
    let query = format!("user_id={USER_ID}&start_date=06-2025&end_date=01-2025");
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/cost", Some(&query), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&response)["error"], "invalid_date_range");

    // 数値でないID
    let path = format!("/api/v1/subscriptions/{USER_ID}/abc");
    let response = dispatch(&service, &Method::GET, &path, None, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&response)["error"], "invalid_subscription_id");

    // 不正なJSON
    let response = dispatch(&service, &Method::POST, "/api/v1/subscriptions", None, b"{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&response)["error"], "validation_failed");

    // 不正なユーザーID
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/user/12345", None, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(&response)["error"], "invalid_user_id");

    // 存在しないルート
    let response = dispatch(&service, &Method::GET, "/api/v2/unknown", None, &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = dispatch(&service, &Method::PATCH, "/api/v1/subscriptions", None, &[]).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_health() {
    let service = sqlite_service();

    let response = dispatch(&service, &Method::GET, "/health", None, &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(&response)["status"], "healthy");
}

#[tokio::test]
async fn test_http_repository_failure_is_internal_error() {
    let (mut repo, _calls) = RecordingRepository::new(Vec::new());
    repo.fail_with = Some("disk I/O error".to_string());
    let service = SubscriptionService::new(repo);

    let query = format!("user_id={USER_ID}&start_date=01-2025&end_date=06-2025");
    let response = dispatch(&service, &Method::GET, "/api/v1/subscriptions/cost", Some(&query), &[]).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(&response);
    assert_eq!(body["error"], "internal_server_error");
    assert!(!response.body().contains("disk I/O error"));
}

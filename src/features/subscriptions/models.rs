use super::date_utils::{end_of_month, parse_month_year};
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// サブスクリプションデータモデル
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub service_name: String,
    pub price: i64,                      // 月額、0以上
    pub user_id: String,                 // UUID v4
    pub start_date: DateTime<Utc>,       // 開始月の月初
    pub end_date: Option<DateTime<Utc>>, // 終了月の月末（この月まで有効）、NULLは無期限
}

/// 新規登録前のサブスクリプション（IDなし）
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub service_name: String,
    pub price: i64,
    pub user_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

/// サブスクリプション作成用DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionDto {
    pub service_name: String,
    pub price: i64,
    pub user_id: String,
    pub start_date: String,         // MM-YYYY形式
    #[serde(default)]
    pub end_date: Option<String>,   // MM-YYYY形式、空文字列は無期限
}

/// サブスクリプション更新用DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSubscriptionDto {
    pub service_name: String,
    pub price: i64,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// 期間合計の計算リクエスト
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostQuery {
    pub user_id: String,
    pub service_names: Vec<String>, // 空の場合は絞り込みなし
    pub start_date: String,
    pub end_date: String,
}

/// サブスクリプションごとの内訳
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdownLine {
    pub subscription_id: i64,
    pub service_name: String,
    pub monthly_price: i64,
    pub months_count: u32,
    pub total_cost: i64,
}

/// 期間合計の計算結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostResult {
    pub user_id: String,
    pub start_date: String, // 指定されたトークンそのまま
    pub end_date: String,
    pub total_cost: i64,
    pub breakdown: Vec<CostBreakdownLine>,
}

/// APIレスポンス用のサブスクリプション表現
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub service_name: String,
    pub price: i64,
    pub user_id: String,
    pub start_date: String, // RFC3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// サブスクリプション一覧レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSubscriptionsResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
    pub count: usize,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id,
            service_name: sub.service_name.clone(),
            price: sub.price,
            user_id: sub.user_id.clone(),
            start_date: sub.start_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            end_date: sub
                .end_date
                .map(|end| end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

impl From<&[Subscription]> for ListSubscriptionsResponse {
    fn from(subs: &[Subscription]) -> Self {
        let subscriptions: Vec<SubscriptionResponse> = subs.iter().map(Into::into).collect();
        Self {
            count: subscriptions.len(),
            subscriptions,
        }
    }
}

/// 開始・終了トークンを保存用の日時に変換する
///
/// # 引数
/// * `start_date` - 開始月（MM-YYYY）
/// * `end_date` - 終了月（MM-YYYY）、Noneまたは空文字列は無期限
///
/// # 戻り値
/// (開始月の月初, 終了月の月末)、または失敗時はエラー
pub fn parse_active_interval(
    start_date: &str,
    end_date: Option<&str>,
) -> AppResult<(DateTime<Utc>, Option<DateTime<Utc>>)> {
    let start = parse_month_year(start_date)?;

    let end = match end_date.map(str::trim).filter(|s| !s.is_empty()) {
        Some(token) => Some(end_of_month(parse_month_year(token)?)?),
        None => None,
    };

    if let Some(end) = end {
        if end < start {
            return Err(AppError::EndDateBeforeStart);
        }
    }

    Ok((start, end))
}

impl CreateSubscriptionDto {
    /// 保存用のモデルに変換する
    pub fn to_new_subscription(&self) -> AppResult<NewSubscription> {
        let (start_date, end_date) =
            parse_active_interval(&self.start_date, self.end_date.as_deref())?;

        Ok(NewSubscription {
            service_name: self.service_name.trim().to_string(),
            price: self.price,
            user_id: self.user_id.clone(),
            start_date,
            end_date,
        })
    }
}

impl UpdateSubscriptionDto {
    /// 指定されたユーザー・IDのモデルに変換する
    pub fn to_subscription(&self, id: i64, user_id: &str) -> AppResult<Subscription> {
        let (start_date, end_date) =
            parse_active_interval(&self.start_date, self.end_date.as_deref())?;

        Ok(Subscription {
            id,
            service_name: self.service_name.trim().to_string(),
            price: self.price,
            user_id: user_id.to_string(),
            start_date,
            end_date,
        })
    }
}

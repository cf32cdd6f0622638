use super::cost::calculate_total_cost;
use super::date_utils::{end_of_month, format_month_year, parse_month_year};
use super::models::{
    CostQuery, CostResult, CreateSubscriptionDto, Subscription, UpdateSubscriptionDto,
};
use super::repository::SubscriptionRepository;
use crate::shared::errors::{AppError, AppResult};
use std::sync::Arc;
use uuid::Uuid;

/// サービス名の最大文字数
pub const MAX_SERVICE_NAME_LENGTH: usize = 255;

/// 月額料金の上限
///
/// 上限内の料金と月数の積、およびその合計は`i64`に収まる。
pub const MAX_PRICE: i64 = i32::MAX as i64;

/// サブスクリプションのユースケースをまとめたサービス
///
/// リポジトリ呼び出しはブロッキングのため`spawn_blocking`で実行する。
pub struct SubscriptionService<R> {
    repository: Arc<R>,
}

impl<R> Clone for SubscriptionService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: SubscriptionRepository + 'static> SubscriptionService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// サブスクリプションを作成する
    ///
    /// # 引数
    /// * `dto` - サブスクリプション作成用DTO
    ///
    /// # 戻り値
    /// 作成されたサブスクリプション、または失敗時はエラー
    pub async fn create(&self, dto: CreateSubscriptionDto) -> AppResult<Subscription> {
        validate_user_id(&dto.user_id)?;
        validate_service_name(&dto.service_name)?;
        validate_price(dto.price)?;
        let new = dto.to_new_subscription()?;

        let created = self
            .run_blocking(move |repo| repo.create(&new))
            .await
            .inspect_err(|e| log::error!("サブスクリプションの作成に失敗: {}", e.details()))?;

        log::info!(
            "サブスクリプションを作成しました: id={}, user_id={}, service_name={}",
            created.id,
            created.user_id,
            created.service_name
        );

        Ok(created)
    }

    /// サブスクリプションを取得する
    pub async fn get(&self, user_id: &str, id: i64) -> AppResult<Subscription> {
        validate_user_id(user_id)?;
        validate_subscription_id(id)?;

        let owner = user_id.to_string();
        let subscription = self
            .run_blocking(move |repo| repo.find_by_id(&owner, id))
            .await?;

        log::debug!("サブスクリプションを取得しました: id={id}");

        Ok(subscription)
    }

    /// サブスクリプションを更新する
    ///
    /// # 引数
    /// * `user_id` - 所有ユーザーのID
    /// * `id` - サブスクリプションID
    /// * `dto` - サブスクリプション更新用DTO
    ///
    /// # 戻り値
    /// 更新後のサブスクリプション、または失敗時はエラー
    pub async fn update(
        &self,
        user_id: &str,
        id: i64,
        dto: UpdateSubscriptionDto,
    ) -> AppResult<Subscription> {
        validate_user_id(user_id)?;
        validate_subscription_id(id)?;
        validate_service_name(&dto.service_name)?;
        validate_price(dto.price)?;
        let subscription = dto.to_subscription(id, user_id)?;

        let updated = self
            .run_blocking(move |repo| repo.update(&subscription))
            .await
            .inspect_err(|e| {
                if !e.is_client_error() {
                    log::error!("サブスクリプションの更新に失敗: {}", e.details());
                }
            })?;

        log::info!("サブスクリプションを更新しました: id={id}, user_id={user_id}");

        Ok(updated)
    }

    /// サブスクリプションを削除する
    pub async fn delete(&self, user_id: &str, id: i64) -> AppResult<()> {
        validate_user_id(user_id)?;
        validate_subscription_id(id)?;

        let owner = user_id.to_string();
        self.run_blocking(move |repo| repo.delete(&owner, id))
            .await
            .inspect_err(|e| {
                if !e.is_client_error() {
                    log::error!("サブスクリプションの削除に失敗: {}", e.details());
                }
            })?;

        log::info!("サブスクリプションを削除しました: id={id}, user_id={user_id}");

        Ok(())
    }

    /// ユーザーのサブスクリプション一覧を取得する
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<Subscription>> {
        validate_user_id(user_id)?;

        let owner = user_id.to_string();
        let subscriptions = self
            .run_blocking(move |repo| repo.find_all_by_user(&owner))
            .await?;

        log::debug!(
            "サブスクリプション一覧を取得しました: user_id={user_id}, 件数={}",
            subscriptions.len()
        );

        Ok(subscriptions)
    }

    /// 期間内のサブスクリプション費用の合計を計算する
    ///
    /// # 引数
    /// * `query` - ユーザーID・期間・サービス名の絞り込み
    ///
    /// # 戻り値
    /// 合計金額と内訳、または失敗時はエラー
    ///
    /// # 処理内容
    /// 1. ユーザーIDの検証
    /// 2. 期間トークンの解析（終了は月末に変換）
    /// 3. 期間の前後関係の検証
    /// 4. 期間と重なるサブスクリプションの取得
    /// 5. 重なる月数による集計
    pub async fn calculate_total_cost(&self, query: CostQuery) -> AppResult<CostResult> {
        validate_user_id(&query.user_id)?;

        let period_start = parse_month_year(&query.start_date)?;
        let period_end = end_of_month(parse_month_year(&query.end_date)?)?;

        if period_end < period_start {
            return Err(AppError::InvalidDateRange);
        }

        let user_id = query.user_id.clone();
        let service_names: Vec<String> = query
            .service_names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let subscriptions = self
            .run_blocking(move |repo| {
                repo.find_by_period(&user_id, &service_names, period_start, period_end)
            })
            .await
            .inspect_err(|e| log::error!("サブスクリプションの取得に失敗: {}", e.details()))?;

        let totals = calculate_total_cost(&subscriptions, period_start, period_end);

        for line in &totals.breakdown {
            log::debug!(
                "費用内訳: id={}, service_name={}, 月額={}, 月数={}, 小計={}",
                line.subscription_id,
                line.service_name,
                line.monthly_price,
                line.months_count,
                line.total_cost
            );
        }

        log::info!(
            "期間合計を計算しました: user_id={}, 期間={}〜{}, 件数={}, 合計={}",
            query.user_id,
            format_month_year(period_start),
            format_month_year(period_end),
            totals.breakdown.len(),
            totals.total_cost
        );

        Ok(CostResult {
            user_id: query.user_id,
            start_date: query.start_date,
            end_date: query.end_date,
            total_cost: totals.total_cost,
            breakdown: totals.breakdown,
        })
    }

    async fn run_blocking<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&R) -> AppResult<T> + Send + 'static,
    {
        let repository = Arc::clone(&self.repository);

        tokio::task::spawn_blocking(move || operation(&repository))
            .await
            .map_err(|e| AppError::concurrency(format!("ブロッキング処理の実行に失敗: {e}")))?
    }
}

/// ユーザーIDがUUID v4であることを検証する
pub fn validate_user_id(user_id: &str) -> AppResult<()> {
    match Uuid::parse_str(user_id) {
        Ok(uuid) if uuid.get_version_num() == 4 => Ok(()),
        _ => Err(AppError::InvalidUserId),
    }
}

/// サブスクリプションIDが正の整数であることを検証する
pub fn validate_subscription_id(id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::InvalidSubscriptionId);
    }
    Ok(())
}

fn validate_service_name(service_name: &str) -> AppResult<()> {
    let trimmed = service_name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("サービス名を入力してください"));
    }
    if trimmed.chars().count() > MAX_SERVICE_NAME_LENGTH {
        return Err(AppError::validation(format!(
            "サービス名は{MAX_SERVICE_NAME_LENGTH}文字以内で入力してください"
        )));
    }
    Ok(())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation("価格は0以上で入力してください"));
    }
    if price > MAX_PRICE {
        return Err(AppError::validation(format!(
            "価格は{MAX_PRICE}以下で入力してください"
        )));
    }
    Ok(())
}

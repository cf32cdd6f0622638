/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの作成、読み取り、更新、削除
/// - MM-YYYY形式の月トークンの解析
/// - 指定期間と重なる月数による費用の集計
/// - HTTP APIのルーティング
pub mod cost;
pub mod date_utils;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

#[cfg(test)]
mod integration_tests;

// 公開インターフェース
pub use cost::{calculate_total_cost, months_between, overlap_months, CostTotals};
pub use date_utils::{end_of_month, format_month_year, parse_month_year};
pub use handlers::{dispatch, handle};
pub use models::{
    CostBreakdownLine, CostQuery, CostResult, CreateSubscriptionDto, NewSubscription, Subscription,
    SubscriptionResponse, UpdateSubscriptionDto,
};
pub use repository::{SqliteSubscriptionRepository, SubscriptionRepository};
pub use service::SubscriptionService;

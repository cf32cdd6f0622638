//! 期間内のサブスクリプション費用の集計
//!
//! I/Oもログ出力も行わない純粋な計算のみを置く。

use super::models::{CostBreakdownLine, Subscription};
use chrono::{DateTime, Datelike, Utc};

/// 集計結果（合計と内訳）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostTotals {
    pub total_cost: i64,
    pub breakdown: Vec<CostBreakdownLine>,
}

/// 2つの日時の間の月数を数える
///
/// `end`が`start`より前なら0。同じ日時なら1。
///
/// 月差に対して、終了日の日付が開始日の日付以上であれば1を加え、
/// そうでなくても月差が正であれば1を加える。暦日ベースの月数とは一致しない。
pub fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    if end < start {
        return 0;
    }

    let years = end.year() - start.year();
    let months = end.month() as i32 - start.month() as i32;
    let mut total = years * 12 + months;

    if end.day() >= start.day() || total > 0 {
        total += 1;
    }

    u32::try_from(total).unwrap_or(0)
}

/// サブスクリプションの有効期間と集計期間が重なる月数を計算する
///
/// # 引数
/// * `sub_start` - サブスクリプションの開始
/// * `sub_end` - サブスクリプションの終了（Noneは無期限）
/// * `period_start` - 集計期間の開始
/// * `period_end` - 集計期間の終了
///
/// # 戻り値
/// 重なる月数、重ならない場合は0
pub fn overlap_months(
    sub_start: DateTime<Utc>,
    sub_end: Option<DateTime<Utc>>,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> u32 {
    let effective_start = sub_start.max(period_start);
    let effective_end = match sub_end {
        Some(end) => end.min(period_end),
        None => period_end,
    };

    if effective_start > effective_end {
        return 0;
    }

    months_between(effective_start, effective_end)
}

/// サブスクリプションの費用を集計する
///
/// 入力順に処理し、重なる月数が0のものは内訳に含めない。
///
/// # 引数
/// * `subscriptions` - 対象のサブスクリプション
/// * `period_start` - 集計期間の開始（月初）
/// * `period_end` - 集計期間の終了（月末）
///
/// # 戻り値
/// 合計金額と入力順の内訳
pub fn calculate_total_cost(
    subscriptions: &[Subscription],
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> CostTotals {
    subscriptions
        .iter()
        .fold(CostTotals::default(), |mut totals, sub| {
            let months_count =
                overlap_months(sub.start_date, sub.end_date, period_start, period_end);
            if months_count == 0 {
                return totals;
            }

            let line_total = sub.price.saturating_mul(i64::from(months_count));
            totals.total_cost = totals.total_cost.saturating_add(line_total);
            totals.breakdown.push(CostBreakdownLine {
                subscription_id: sub.id,
                service_name: sub.service_name.clone(),
                monthly_price: sub.price,
                months_count,
                total_cost: line_total,
            });
            totals
        })
}

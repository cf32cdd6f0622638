use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// 受け付ける最小の年
pub const MIN_YEAR: i32 = 1900;
/// 受け付ける最大の年
pub const MAX_YEAR: i32 = 3000;

// `\d`はUnicodeの数字にも一致するためASCIIに限定する
static MONTH_YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{2})-([0-9]{4})$").expect("月-年パターンの正規表現が不正です")
});

/// "MM-YYYY"形式の文字列を月初の日時に変換する
///
/// # 引数
/// * `token` - "MM-YYYY"形式の文字列（例: "07-2025"）
///
/// # 戻り値
/// その月の1日 00:00:00 UTC、または形式・範囲が不正な場合は`InvalidDateFormat`
pub fn parse_month_year(token: &str) -> AppResult<DateTime<Utc>> {
    let captures = MONTH_YEAR_PATTERN
        .captures(token)
        .ok_or(AppError::InvalidDateFormat)?;

    let month: u32 = captures[1]
        .parse()
        .map_err(|_| AppError::InvalidDateFormat)?;
    let year: i32 = captures[2]
        .parse()
        .map_err(|_| AppError::InvalidDateFormat)?;

    if !(1..=12).contains(&month) || !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(AppError::InvalidDateFormat);
    }

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or(AppError::InvalidDateFormat)
}

/// 日時を"MM-YYYY"形式の文字列に変換する
pub fn format_month_year(instant: DateTime<Utc>) -> String {
    format!("{:02}-{:04}", instant.month(), instant.year())
}

/// 同じ月の最終日 23:59:59.999999999 を取得する
///
/// # 引数
/// * `instant` - 対象月に含まれる任意の日時
///
/// # 戻り値
/// その月の最後の瞬間（うるう年を考慮）、翌月が表現できない場合は`InvalidDateFormat`
pub fn end_of_month(instant: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    last_day_of_month(instant.year(), instant.month())
        .and_then(|date| date.and_hms_nano_opt(23, 59, 59, 999_999_999))
        .map(|naive| naive.and_utc())
        .ok_or(AppError::InvalidDateFormat)
}

/// 指定した月の日数を取得する
///
/// 月が範囲外、または翌月が表現できない場合はNone
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    last_day_of_month(year, month).map(|date| date.day())
}

// 翌月1日の前日
fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
}

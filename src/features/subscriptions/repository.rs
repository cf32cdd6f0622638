use super::models::{NewSubscription, Subscription};
use crate::shared::database::create_tables;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, ToSql};
use std::sync::{Mutex, MutexGuard};

// 固定長にして文字列比較と時刻比較を一致させる
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

const SELECT_COLUMNS: &str =
    "SELECT id, service_name, price, user_id, start_date, end_date FROM subscriptions";

/// サブスクリプションの永続化を担うリポジトリ
///
/// サービス層はこのトレイトにのみ依存する。
pub trait SubscriptionRepository: Send + Sync {
    /// サブスクリプションを登録し、採番されたIDを含めて返す
    fn create(&self, new: &NewSubscription) -> AppResult<Subscription>;

    /// ユーザーとIDでサブスクリプションを取得する
    ///
    /// 存在しない場合は`NotFound`
    fn find_by_id(&self, user_id: &str, id: i64) -> AppResult<Subscription>;

    /// サブスクリプションを上書きする
    ///
    /// 存在しない場合は`NotFound`
    fn update(&self, subscription: &Subscription) -> AppResult<Subscription>;

    /// サブスクリプションを削除する
    ///
    /// 存在しない場合は`NotFound`
    fn delete(&self, user_id: &str, id: i64) -> AppResult<()>;

    /// ユーザーのサブスクリプションを開始月の降順で取得する
    fn find_all_by_user(&self, user_id: &str) -> AppResult<Vec<Subscription>>;

    /// 集計期間と重なるサブスクリプションを取得する
    ///
    /// # 引数
    /// * `user_id` - ユーザーID
    /// * `service_names` - サービス名の絞り込み（空の場合は絞り込みなし）
    /// * `period_start` - 集計期間の開始
    /// * `period_end` - 集計期間の終了
    ///
    /// # 戻り値
    /// `start_date <= period_end`かつ`end_date`がNULLまたは`end_date >= period_start`の
    /// サブスクリプション（開始月の降順）
    fn find_by_period(
        &self,
        user_id: &str,
        service_names: &[String],
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>>;
}

/// SQLiteによるリポジトリ実装
pub struct SqliteSubscriptionRepository {
    conn: Mutex<Connection>,
}

impl SqliteSubscriptionRepository {
    /// 初期化済みの接続からリポジトリを作成する
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// インメモリデータベースでリポジトリを作成する
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self::new(conn))
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AppError::concurrency(format!("データベースロックエラー: {e}")))
    }
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn create(&self, new: &NewSubscription) -> AppResult<Subscription> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO subscriptions (service_name, price, user_id, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.service_name,
                new.price,
                new.user_id,
                format_timestamp(new.start_date),
                new.end_date.map(format_timestamp),
            ],
        )?;

        let id = conn.last_insert_rowid();
        select_by_id(&conn, &new.user_id, id)
    }

    fn find_by_id(&self, user_id: &str, id: i64) -> AppResult<Subscription> {
        let conn = self.lock()?;
        select_by_id(&conn, user_id, id)
    }

    fn update(&self, subscription: &Subscription) -> AppResult<Subscription> {
        let conn = self.lock()?;

        let rows_affected = conn.execute(
            "UPDATE subscriptions
             SET service_name = ?1, price = ?2, start_date = ?3, end_date = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![
                subscription.service_name,
                subscription.price,
                format_timestamp(subscription.start_date),
                subscription.end_date.map(format_timestamp),
                subscription.id,
                subscription.user_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(not_found(subscription.id));
        }

        select_by_id(&conn, &subscription.user_id, subscription.id)
    }

    fn delete(&self, user_id: &str, id: i64) -> AppResult<()> {
        let conn = self.lock()?;

        let rows_affected = conn.execute(
            "DELETE FROM subscriptions WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;

        if rows_affected == 0 {
            return Err(not_found(id));
        }

        Ok(())
    }

    fn find_all_by_user(&self, user_id: &str) -> AppResult<Vec<Subscription>> {
        let conn = self.lock()?;

        let query = format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY start_date DESC, id DESC");
        let mut stmt = conn.prepare(&query)?;
        let subscriptions = stmt.query_map(params![user_id], map_subscription_row)?;

        subscriptions
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn find_by_period(
        &self,
        user_id: &str,
        service_names: &[String],
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let conn = self.lock()?;

        let mut query = format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND start_date <= ?2 AND (end_date IS NULL OR end_date >= ?3)"
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![
            Box::new(user_id.to_string()),
            Box::new(format_timestamp(period_end)),
            Box::new(format_timestamp(period_start)),
        ];

        if !service_names.is_empty() {
            let placeholders: Vec<String> = (0..service_names.len())
                .map(|i| format!("?{}", params.len() + i + 1))
                .collect();
            query.push_str(&format!(" AND service_name IN ({})", placeholders.join(", ")));
            for name in service_names {
                params.push(Box::new(name.clone()));
            }
        }

        query.push_str(" ORDER BY start_date DESC, id DESC");

        let mut stmt = conn.prepare(&query)?;
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let subscriptions = stmt.query_map(params_refs.as_slice(), map_subscription_row)?;

        subscriptions
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn select_by_id(conn: &Connection, user_id: &str, id: i64) -> AppResult<Subscription> {
    let query = format!("{SELECT_COLUMNS} WHERE id = ?1 AND user_id = ?2");

    conn.query_row(&query, params![id, user_id], map_subscription_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => not_found(id),
            _ => AppError::Database(e.to_string()),
        })
}

fn not_found(id: i64) -> AppError {
    AppError::not_found(format!("ID {id} のサブスクリプション"))
}

fn map_subscription_row(row: &Row) -> rusqlite::Result<Subscription> {
    let start_date: String = row.get(4)?;
    let end_date: Option<String> = row.get(5)?;

    Ok(Subscription {
        id: row.get(0)?,
        service_name: row.get(1)?,
        price: row.get(2)?,
        user_id: row.get(3)?,
        start_date: parse_timestamp(4, &start_date)?,
        end_date: end_date
            .map(|value| parse_timestamp(5, &value))
            .transpose()?,
    })
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

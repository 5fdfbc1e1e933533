use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Notification, NotificationKind},
    error::{AppError, Result},
    repository::NotificationRepository,
};

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    student_id: String,
    kind: String,
    title: String,
    message: String,
    metadata: String,
    created_at: NaiveDateTime,
}

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: NotificationRow) -> Result<Notification> {
        Ok(Notification {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id).map_err(|e| AppError::Database(e.to_string()))?,
            kind: NotificationKind::parse(&row.kind)
                .ok_or_else(|| AppError::Database(format!("Invalid notification kind: {}", row.kind)))?,
            title: row.title,
            message: row.message,
            metadata: serde_json::from_str(&row.metadata)
                .map_err(|e| AppError::Database(e.to_string()))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<Notification> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, student_id, kind, title, message, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(notification.id.to_string())
        .bind(notification.student_id.to_string())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.metadata.to_string())
        .bind(notification.created_at.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn list_by_student(&self, student_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, student_id, kind, title, message, metadata, created_at
            FROM notifications
            WHERE student_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#
        )
        .bind(student_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_notification).collect()
    }
}

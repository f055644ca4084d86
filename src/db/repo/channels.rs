//! Payment channel storage and the singleton active-channel pointer.

use crate::db::repo::{parse_decimal, Repository};
use crate::domain::{Decimal, PaymentChannel};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

fn row_to_channel(row: &SqliteRow) -> PaymentChannel {
    let limit: String = row.get("payment_limit");
    let received: String = row.get("current_received");
    let active: i64 = row.get("is_active");
    PaymentChannel {
        id: row.get("id"),
        channel_id: row.get("channel_id"),
        is_active: active != 0,
        payment_limit: parse_decimal(&limit, "payment_channels.payment_limit"),
        current_received: parse_decimal(&received, "payment_channels.current_received"),
    }
}

const CHANNEL_COLUMNS: &str = "id, channel_id, is_active, payment_limit, current_received";

impl Repository {
    pub async fn insert_channel(&self, channel: &PaymentChannel) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payment_channels (id, channel_id, is_active, payment_limit, current_received)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&channel.id)
        .bind(&channel.channel_id)
        .bind(channel.is_active as i64)
        .bind(channel.payment_limit.to_canonical_string())
        .bind(channel.current_received.to_canonical_string())
        .execute(&self.pool)
        .await?;

        if channel.is_active {
            self.set_active_pointer(Some(&channel.id)).await?;
        }
        Ok(())
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<PaymentChannel>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payment_channels WHERE id = ?",
            CHANNEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_channel))
    }

    /// The channel named by the singleton pointer, if any.
    pub async fn get_active_channel(&self) -> Result<Option<PaymentChannel>, sqlx::Error> {
        let row = sqlx::query(
            &format!(
                "SELECT {} FROM payment_channels WHERE id = \
                 (SELECT channel_row_id FROM active_channel WHERE singleton = 1)",
                CHANNEL_COLUMNS
            ),
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_channel))
    }

    pub async fn set_active_pointer(&self, channel_row_id: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO active_channel (singleton, channel_row_id) VALUES (1, ?)
            ON CONFLICT(singleton) DO UPDATE SET channel_row_id = excluded.channel_row_id
            "#,
        )
        .bind(channel_row_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_channels(&self) -> Result<Vec<PaymentChannel>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payment_channels ORDER BY id ASC",
            CHANNEL_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_channel).collect())
    }
}

pub async fn get_channel_tx(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<PaymentChannel>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payment_channels WHERE id = ?",
        CHANNEL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.as_ref().map(row_to_channel))
}

pub async fn add_received_tx(
    conn: &mut SqliteConnection,
    id: &str,
    new_total: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_channels SET current_received = ? WHERE id = ?")
        .bind(new_total.to_canonical_string())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Deactivate a channel; guarded so two rotations cannot both observe it
/// active.
pub async fn deactivate_tx(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE payment_channels SET is_active = 0 WHERE id = ? AND is_active = 1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Promote the first currently-inactive channel, returning it.
pub async fn activate_first_inactive_tx(
    conn: &mut SqliteConnection,
    exclude_id: &str,
) -> Result<Option<PaymentChannel>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payment_channels WHERE is_active = 0 AND id <> ? ORDER BY id ASC LIMIT 1",
        CHANNEL_COLUMNS
    ))
    .bind(exclude_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let channel = row_to_channel(&row);

    sqlx::query("UPDATE payment_channels SET is_active = 1 WHERE id = ?")
        .bind(&channel.id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO active_channel (singleton, channel_row_id) VALUES (1, ?)
        ON CONFLICT(singleton) DO UPDATE SET channel_row_id = excluded.channel_row_id
        "#,
    )
    .bind(&channel.id)
    .execute(&mut *conn)
    .await?;

    Ok(Some(channel))
}

/// Clear the pointer when a channel exhausts with no successor.
pub async fn clear_active_pointer_tx(
    conn: &mut SqliteConnection,
    expected_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE active_channel SET channel_row_id = NULL \
         WHERE singleton = 1 AND channel_row_id = ?",
    )
    .bind(expected_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

use sqlx::{PgPool, Row};

pub struct DeviceRow {
    pub device_id: String,
    pub user_id: i64,
    pub pubkey: Vec<u8>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The outcome of a device registration attempt.
pub enum UpsertOutcome {
    /// A new device row was created.
    Created(DeviceRow),
    /// The device id already existed and is owned by the calling user;
    /// idempotent re-registration, not an error.
    AlreadyOwned(DeviceRow),
    /// The device id already exists but belongs to a different user.
    OwnedByAnotherUser,
}

/// Idempotent upsert of `(device_id, pubkey)` for `user_id`.
///
/// A first-seen device id is inserted. A device id already owned by
/// `user_id` is accepted without modification (pubkey is not updated on
/// re-registration in this revision). A device id owned by a different
/// user is refused.
pub async fn upsert_device(
    pool: &PgPool,
    device_id: &str,
    user_id: i64,
    pubkey: &[u8],
) -> Result<UpsertOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query(
        "SELECT device_id, user_id, pubkey, created_at FROM devices WHERE device_id = $1 FOR UPDATE",
    )
    .bind(device_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(row) = existing {
        let owner: i64 = row.get("user_id");
        let device = DeviceRow {
            device_id: row.get("device_id"),
            user_id: owner,
            pubkey: row.get("pubkey"),
            created_at: row.get("created_at"),
        };
        tx.commit().await?;
        return Ok(if owner == user_id {
            UpsertOutcome::AlreadyOwned(device)
        } else {
            UpsertOutcome::OwnedByAnotherUser
        });
    }

    let row = sqlx::query(
        "INSERT INTO devices (device_id, user_id, pubkey) VALUES ($1, $2, $3)
         RETURNING device_id, user_id, pubkey, created_at",
    )
    .bind(device_id)
    .bind(user_id)
    .bind(pubkey)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(UpsertOutcome::Created(DeviceRow {
        device_id: row.get("device_id"),
        user_id: row.get("user_id"),
        pubkey: row.get("pubkey"),
        created_at: row.get("created_at"),
    }))
}

pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<DeviceRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT device_id, user_id, pubkey, created_at FROM devices WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| DeviceRow {
            device_id: r.get("device_id"),
            user_id: r.get("user_id"),
            pubkey: r.get("pubkey"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn find_owner(pool: &PgPool, device_id: &str) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT user_id FROM devices WHERE device_id = $1")
        .bind(device_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("user_id")))
}

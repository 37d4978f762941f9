use sqlx::{PgPool, Row};

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

/// Creates a new user. Returns `Ok(None)` when the email is already taken
/// rather than surfacing the database's unique-violation error, so the
/// caller can map it to `Conflict` without inspecting driver internals.
///
/// Relies on the `users.email` unique constraint rather than a
/// check-then-insert, so two concurrent registrations for the same email
/// can't both succeed.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id, email, password_hash",
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => Ok(Some(UserRow {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
        })),
        Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| UserRow {
        id: r.get("id"),
        email: r.get("email"),
        password_hash: r.get("password_hash"),
    }))
}

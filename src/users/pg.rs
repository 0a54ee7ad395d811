use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::error::AppError;
use crate::users::domain::{NewUser, User, UserUpdate};
use crate::users::store::UserStore;

const USER_COLUMNS: &str = "id, name, email, password_hash, age, tokens, avatar, created_at";

/// Postgres-backed store. Token-list mutation uses array_append/array_remove
/// so appends are atomic at the database, not read-modify-write in process.
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, draft: NewUser) -> Result<User, AppError> {
        let password_hash = hash_password(&draft.password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, age)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&password_hash)
        .bind(draft.age)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE email = $1"#
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let password_hash = update.password.as_deref().map(hash_password).transpose()?;

        // single statement, so the whole update lands or none of it does
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                age = COALESCE($5, age)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(password_hash)
        .bind(update.age)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(user)
    }

    async fn append_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE users SET tokens = array_append(tokens, $2) WHERE id = $1"#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn remove_token(&self, id: Uuid, token: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE users SET tokens = array_remove(tokens, $2) WHERE id = $1"#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn clear_tokens(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(r#"UPDATE users SET tokens = '{}' WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<Vec<u8>>) -> Result<(), AppError> {
        let result = sqlx::query(r#"UPDATE users SET avatar = $2 WHERE id = $1"#)
            .bind(id)
            .bind(avatar)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use homecord_core::domain::guild::{MessagePrivacy, UserPrivacy};
use homecord_core::domain::ids::UserId;
use homecord_core::ports::{StoreError, UserConfigRepository};

use super::{decode_column, encode_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlUserConfigRepository {
    pool: DbPool,
}

impl SqlUserConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserConfigRepository for SqlUserConfigRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserPrivacy>, StoreError> {
        let row = sqlx::query("SELECT message_privacy FROM user_config WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String =
            row.try_get("message_privacy").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let message_privacy = decode_column("message_privacy", MessagePrivacy::parse(&raw))?;
        Ok(Some(UserPrivacy { user_id: user_id.clone(), message_privacy }))
    }

    async fn save(&self, privacy: UserPrivacy) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_config (user_id, message_privacy, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 message_privacy = excluded.message_privacy,
                 updated_at = excluded.updated_at",
        )
        .bind(&privacy.user_id.0)
        .bind(privacy.message_privacy.as_str())
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}

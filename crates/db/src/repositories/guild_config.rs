use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use homecord_core::domain::activity::ActivityLevel;
use homecord_core::domain::guild::{GuildActivityConfig, MessagePrivacy};
use homecord_core::domain::ids::GuildId;
use homecord_core::ports::{GuildConfigRepository, StoreError};

use super::{decode_column, encode_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlGuildConfigRepository {
    pool: DbPool,
}

impl SqlGuildConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM guild_config").fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<GuildActivityConfig, RepositoryError> {
    let text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let flag = |column: &str| -> Result<bool, RepositoryError> {
        row.try_get::<bool, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let level = |column: &str| -> Result<ActivityLevel, RepositoryError> {
        decode_column(column, ActivityLevel::parse(&text(column)?))
    };

    Ok(GuildActivityConfig {
        guild_id: GuildId(text("guild_id")?),
        homecord_enabled: flag("homecord_enabled")?,
        default_message_privacy: decode_column(
            "default_message_privacy",
            MessagePrivacy::parse(&text("default_message_privacy")?),
        )?,
        allow_starboard_reactions: flag("allow_starboard_reactions")?,
        message_activity_level: level("message_activity_level")?,
        event_activity_level: level("event_activity_level")?,
        thread_activity_level: level("thread_activity_level")?,
    })
}

const INSERT_SQL: &str = "INSERT INTO guild_config (guild_id, homecord_enabled,
        default_message_privacy, allow_starboard_reactions, message_activity_level,
        event_activity_level, thread_activity_level, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

fn bind_config<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    config: &'q GuildActivityConfig,
    now: &str,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(&config.guild_id.0)
        .bind(config.homecord_enabled)
        .bind(config.default_message_privacy.as_str())
        .bind(config.allow_starboard_reactions)
        .bind(config.message_activity_level.as_str())
        .bind(config.event_activity_level.as_str())
        .bind(config.thread_activity_level.as_str())
        .bind(now.to_owned())
        .bind(now.to_owned())
}

#[async_trait]
impl GuildConfigRepository for SqlGuildConfigRepository {
    async fn find(&self, guild_id: &GuildId) -> Result<Option<GuildActivityConfig>, StoreError> {
        let row = sqlx::query(
            "SELECT guild_id, homecord_enabled, default_message_privacy, allow_starboard_reactions,
                    message_activity_level, event_activity_level, thread_activity_level
             FROM guild_config WHERE guild_id = ?",
        )
        .bind(&guild_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_config(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        let now = encode_timestamp(Utc::now());
        bind_config(sqlx::query(INSERT_SQL), &config, &now)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn save(&self, config: GuildActivityConfig) -> Result<(), StoreError> {
        let now = encode_timestamp(Utc::now());
        let sql = format!(
            "{INSERT_SQL}
             ON CONFLICT(guild_id) DO UPDATE SET
                 homecord_enabled = excluded.homecord_enabled,
                 default_message_privacy = excluded.default_message_privacy,
                 allow_starboard_reactions = excluded.allow_starboard_reactions,
                 message_activity_level = excluded.message_activity_level,
                 event_activity_level = excluded.event_activity_level,
                 thread_activity_level = excluded.thread_activity_level,
                 updated_at = excluded.updated_at"
        );
        bind_config(sqlx::query(&sql), &config, &now)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn delete(&self, guild_id: &GuildId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM guild_config WHERE guild_id = ?")
            .bind(&guild_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use homecord_core::domain::blocklist::{BlockType, BlocklistEntry, MAX_BLOCKED_PER_TYPE};
use homecord_core::domain::ids::GuildId;
use homecord_core::ports::{BlocklistRepository, StoreError};

use super::{decode_column, encode_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlBlocklistRepository {
    pool: DbPool,
}

impl SqlBlocklistRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<BlocklistEntry, RepositoryError> {
    let text = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    Ok(BlocklistEntry {
        guild_id: GuildId(text("guild_id")?),
        item_id: text("item_id")?,
        block_type: decode_column("block_type", BlockType::parse(&text("block_type")?))?,
    })
}

#[async_trait]
impl BlocklistRepository for SqlBlocklistRepository {
    async fn any_blocked(
        &self,
        guild_id: &GuildId,
        item_ids: &[String],
    ) -> Result<bool, StoreError> {
        if item_ids.is_empty() {
            return Ok(false);
        }
        let params = vec!["?"; item_ids.len()].join(", ");
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM blocklist_entry WHERE guild_id = ? AND item_id IN ({params}))"
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(&guild_id.0);
        for item_id in item_ids {
            query = query.bind(item_id);
        }
        let found = query.fetch_one(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(found != 0)
    }

    async fn list(
        &self,
        guild_id: &GuildId,
        block_type: Option<BlockType>,
    ) -> Result<Vec<BlocklistEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT guild_id, item_id, block_type FROM blocklist_entry
             WHERE guild_id = ?1 AND (?2 IS NULL OR block_type = ?2)
             ORDER BY created_at, item_id",
        )
        .bind(&guild_id.0)
        .bind(block_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let entries = rows.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn add(&self, entry: BlocklistEntry) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO blocklist_entry (guild_id, item_id, block_type, created_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE (SELECT COUNT(*) FROM blocklist_entry WHERE guild_id = ?1 AND block_type = ?3) < ?5",
        )
        .bind(&entry.guild_id.0)
        .bind(&entry.item_id)
        .bind(entry.block_type.as_str())
        .bind(encode_timestamp(Utc::now()))
        .bind(i64::from(MAX_BLOCKED_PER_TYPE))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CapacityExceeded);
        }
        Ok(())
    }

    async fn remove_item(&self, guild_id: &GuildId, item_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM blocklist_entry WHERE guild_id = ? AND item_id = ?")
            .bind(&guild_id.0)
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM blocklist_entry WHERE guild_id = ?")
            .bind(&guild_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }
}

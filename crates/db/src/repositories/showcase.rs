use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use homecord_core::domain::ids::{ChannelId, ContentId, GuildId};
use homecord_core::domain::showcase::{
    ShowcaseCategory, ShowcaseLimits, ShowcaseType, ShowcasedItem,
};
use homecord_core::ports::{ShowcaseStore, StoreError};
use homecord_core::Clock;

use super::{decode_column, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str =
    "guild_id, content_id, channel_id, category, showcase_type, expires_at, created_at";

/// Rows past `expires_at` stay until the janitor purges them, but every read and
/// insert check treats them as gone.
pub struct SqlShowcaseStore {
    pool: DbPool,
    limits: ShowcaseLimits,
    clock: Arc<dyn Clock>,
}

impl SqlShowcaseStore {
    pub fn new(pool: DbPool, limits: ShowcaseLimits, clock: Arc<dyn Clock>) -> Self {
        Self { pool, limits, clock }
    }

    fn now(&self) -> String {
        encode_timestamp(self.clock.now())
    }

    /// Clears a stale row for the same content so the unique key cannot block a fresh insert.
    async fn drop_expired_copies(&self, item: &ShowcasedItem) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM showcased_item WHERE guild_id = ? AND content_id = ? AND expires_at <= ?",
        )
        .bind(&item.guild_id.0)
        .bind(&item.content_id.0)
        .bind(self.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn conditional_insert(&self, item: &ShowcasedItem) -> Result<u64, RepositoryError> {
        let conflicting = item.category.conflicting();
        let first = conflicting.first().copied().unwrap_or(item.category);
        let second = conflicting.get(1).copied().unwrap_or(first);

        // Single statement: the duplicate and capacity checks see the same snapshot as the write.
        let result = sqlx::query(
            "INSERT INTO showcased_item
                 (guild_id, content_id, channel_id, category, showcase_type, expires_at, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
             WHERE NOT EXISTS (
                     SELECT 1 FROM showcased_item
                     WHERE guild_id = ?1 AND content_id = ?2 AND category IN (?8, ?9)
                       AND expires_at > ?11
                 )
               AND (SELECT COUNT(*) FROM showcased_item
                    WHERE guild_id = ?1 AND category = ?4 AND expires_at > ?11) < ?10",
        )
        .bind(&item.guild_id.0)
        .bind(&item.content_id.0)
        .bind(item.channel_id.as_ref().map(|channel| channel.0.as_str()))
        .bind(item.category.as_str())
        .bind(item.showcase_type.as_str())
        .bind(encode_timestamp(item.expires_at))
        .bind(encode_timestamp(item.created_at))
        .bind(first.as_str())
        .bind(second.as_str())
        .bind(i64::from(self.limits.for_category(item.category)))
        .bind(self.now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn is_duplicate(&self, item: &ShowcasedItem) -> Result<bool, StoreError> {
        self.exists(&item.guild_id, &item.content_id, item.category.conflicting()).await
    }
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<ShowcasedItem, RepositoryError> {
    let get = |column: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    let channel_id: Option<String> =
        row.try_get("channel_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ShowcasedItem {
        guild_id: GuildId(get("guild_id")?),
        content_id: ContentId(get("content_id")?),
        channel_id: channel_id.map(ChannelId),
        category: decode_column("category", ShowcaseCategory::parse(&get("category")?))?,
        showcase_type: decode_column(
            "showcase_type",
            ShowcaseType::parse(&get("showcase_type")?),
        )?,
        expires_at: decode_timestamp("expires_at", &get("expires_at")?)?,
        created_at: decode_timestamp("created_at", &get("created_at")?)?,
    })
}

fn category_params(categories: &[ShowcaseCategory]) -> String {
    vec!["?"; categories.len()].join(", ")
}

#[async_trait]
impl ShowcaseStore for SqlShowcaseStore {
    async fn count(
        &self,
        guild_id: &GuildId,
        category: ShowcaseCategory,
    ) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM showcased_item
             WHERE guild_id = ? AND category = ? AND expires_at > ?",
        )
        .bind(&guild_id.0)
        .bind(category.as_str())
        .bind(self.now())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn exists(
        &self,
        guild_id: &GuildId,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<bool, StoreError> {
        if categories.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM showcased_item
                           WHERE guild_id = ? AND content_id = ? AND expires_at > ?
                             AND category IN ({}))",
            category_params(categories)
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&guild_id.0)
            .bind(&content_id.0)
            .bind(self.now());
        for category in categories {
            query = query.bind(category.as_str());
        }
        let found = query.fetch_one(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(found != 0)
    }

    async fn insert(&self, item: ShowcasedItem) -> Result<(), StoreError> {
        self.drop_expired_copies(&item).await?;
        let inserted = self.conditional_insert(&item).await?;
        if inserted == 1 {
            return Ok(());
        }
        if self.is_duplicate(&item).await? {
            Err(StoreError::Duplicate)
        } else {
            Err(StoreError::CapacityExceeded)
        }
    }

    async fn delete_by_content_id(
        &self,
        content_id: &ContentId,
        categories: &[ShowcaseCategory],
    ) -> Result<u64, StoreError> {
        if categories.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM showcased_item WHERE content_id = ? AND category IN ({})",
            category_params(categories)
        );
        let mut query = sqlx::query(&sql).bind(&content_id.0);
        for category in categories {
            query = query.bind(category.as_str());
        }
        let result = query.execute(&self.pool).await.map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM showcased_item WHERE channel_id = ?1 OR content_id = ?1")
                .bind(&channel_id.0)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete_for_guild(&self, guild_id: &GuildId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM showcased_item WHERE guild_id = ?")
            .bind(&guild_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM showcased_item WHERE expires_at <= ?")
            .bind(encode_timestamp(now))
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }

    async fn list_for_guild(&self, guild_id: &GuildId) -> Result<Vec<ShowcasedItem>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM showcased_item
             WHERE guild_id = ? AND expires_at > ?
             ORDER BY created_at, id"
        );
        let rows = sqlx::query(&sql)
            .bind(&guild_id.0)
            .bind(self.now())
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        let items = rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use homecord_core::domain::ids::{ChannelId, ContentId, GuildId};
    use homecord_core::domain::showcase::{
        ShowcaseCategory, ShowcaseLimits, ShowcaseType, ShowcasedItem,
    };
    use homecord_core::ports::{ShowcaseStore, StoreError};
    use homecord_core::{Clock, ManualClock};

    use super::SqlShowcaseStore;
    use crate::repositories::test_support::migrated_pool;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("timestamp")
    }

    fn item(content: &str, channel: &str, category: ShowcaseCategory) -> ShowcasedItem {
        let now = start();
        ShowcasedItem {
            guild_id: GuildId("G-1".to_owned()),
            content_id: ContentId(content.to_owned()),
            channel_id: Some(ChannelId(channel.to_owned())),
            category,
            showcase_type: ShowcaseType::Highlight,
            expires_at: now + Duration::days(5),
            created_at: now,
        }
    }

    async fn store() -> SqlShowcaseStore {
        store_with(Arc::new(ManualClock::new(start()))).await
    }

    async fn store_with(clock: Arc<ManualClock>) -> SqlShowcaseStore {
        SqlShowcaseStore::new(migrated_pool().await, ShowcaseLimits::default(), clock)
    }

    #[tokio::test]
    async fn insert_persists_and_lists_item() {
        let store = store().await;
        let entry = item("m1", "general", ShowcaseCategory::Message);

        store.insert(entry.clone()).await.expect("insert");

        let guild = GuildId("G-1".to_owned());
        assert_eq!(store.list_for_guild(&guild).await.expect("list"), vec![entry]);
        assert_eq!(store.count(&guild, ShowcaseCategory::Message).await, Ok(1));
    }

    #[tokio::test]
    async fn same_content_is_rejected_across_message_collections() {
        let store = store().await;
        store.insert(item("m1", "general", ShowcaseCategory::Announcement)).await.expect("insert");

        assert_eq!(
            store.insert(item("m1", "general", ShowcaseCategory::Message)).await,
            Err(StoreError::Duplicate)
        );
        assert_eq!(
            store.insert(item("m1", "general", ShowcaseCategory::Announcement)).await,
            Err(StoreError::Duplicate)
        );
    }

    #[tokio::test]
    async fn capacity_is_enforced_per_category() {
        let store = store().await;
        for n in 0..4 {
            store
                .insert(item(&format!("a{n}"), "news", ShowcaseCategory::Announcement))
                .await
                .expect("insert");
        }

        assert_eq!(
            store.insert(item("a4", "news", ShowcaseCategory::Announcement)).await,
            Err(StoreError::CapacityExceeded)
        );
        store.insert(item("m1", "news", ShowcaseCategory::Message)).await.expect("other category");
    }

    #[tokio::test]
    async fn channel_delete_covers_items_in_and_of_channel() {
        let store = store().await;
        store.insert(item("m1", "general", ShowcaseCategory::Message)).await.expect("insert");
        store.insert(item("general", "forum", ShowcaseCategory::Thread)).await.expect("insert");
        store.insert(item("m2", "other", ShowcaseCategory::Message)).await.expect("insert");

        let removed = store.delete_by_channel_id(&ChannelId("general".to_owned())).await;
        assert_eq!(removed, Ok(2));
    }

    #[tokio::test]
    async fn content_delete_respects_categories() {
        let store = store().await;
        store.insert(item("e1", "stage", ShowcaseCategory::Event)).await.expect("insert");

        let id = ContentId("e1".to_owned());
        let message_categories = [ShowcaseCategory::Message, ShowcaseCategory::Announcement];
        assert_eq!(store.delete_by_content_id(&id, &message_categories).await, Ok(0));
        assert_eq!(store.delete_by_content_id(&id, &[ShowcaseCategory::Event]).await, Ok(1));
    }

    #[tokio::test]
    async fn expired_items_are_purged() {
        let store = store().await;
        let entry = item("m1", "general", ShowcaseCategory::Message);
        store.insert(entry.clone()).await.expect("insert");

        assert_eq!(store.delete_expired(entry.expires_at - Duration::seconds(1)).await, Ok(0));
        assert_eq!(store.delete_expired(entry.expires_at).await, Ok(1));
    }

    #[tokio::test]
    async fn guild_purge_leaves_other_guilds() {
        let store = store().await;
        store.insert(item("m1", "general", ShowcaseCategory::Message)).await.expect("insert");
        let mut other = item("m2", "general", ShowcaseCategory::Message);
        other.guild_id = GuildId("G-2".to_owned());
        store.insert(other).await.expect("insert");

        assert_eq!(store.delete_for_guild(&GuildId("G-1".to_owned())).await, Ok(1));
        assert_eq!(store.count(&GuildId("G-2".to_owned()), ShowcaseCategory::Message).await, Ok(1));
    }

    #[tokio::test]
    async fn expired_rows_are_invisible_before_the_purge() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(clock.clone()).await;
        for n in 0..4 {
            store
                .insert(item(&format!("a{n}"), "news", ShowcaseCategory::Announcement))
                .await
                .expect("insert");
        }
        let guild = GuildId("G-1".to_owned());
        let a0 = ContentId("a0".to_owned());

        clock.advance(Duration::days(6));
        assert_eq!(store.count(&guild, ShowcaseCategory::Announcement).await, Ok(0));
        assert_eq!(store.exists(&guild, &a0, &[ShowcaseCategory::Announcement]).await, Ok(false));
        assert!(store.list_for_guild(&guild).await.expect("list").is_empty());

        let mut fresh = item("a0", "news", ShowcaseCategory::Announcement);
        fresh.created_at = clock.now();
        fresh.expires_at = clock.now() + Duration::days(1);
        store.insert(fresh.clone()).await.expect("stale copy and full slots do not block");
        assert_eq!(store.list_for_guild(&guild).await.expect("list"), vec![fresh]);
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use homecord_core::domain::ids::{ChannelId, ContentId, GuildId};
use homecord_core::domain::showcase::{
    ShowcaseCategory, ShowcaseLimits, ShowcaseType, ShowcasedItem,
};
use homecord_core::ports::{ShowcaseStore, StoreError};
use homecord_core::SystemClock;
use homecord_db::{connect_with_settings, migrations, SqlShowcaseStore};

type ContentionTestResult<T = ()> = Result<T, String>;

macro_rules! require_eq {
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!($($arg)*));
        }
    };
}

async fn file_backed_store(dir: &TempDir) -> ContentionTestResult<Arc<SqlShowcaseStore>> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("homecord.db").display());
    let pool = connect_with_settings(&url, 8, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    Ok(Arc::new(SqlShowcaseStore::new(pool, ShowcaseLimits::default(), Arc::new(SystemClock))))
}

fn item(content: &str, category: ShowcaseCategory) -> ShowcasedItem {
    let now = Utc::now();
    ShowcasedItem {
        guild_id: GuildId("G-1".to_owned()),
        content_id: ContentId(content.to_owned()),
        channel_id: Some(ChannelId("general".to_owned())),
        category,
        showcase_type: ShowcaseType::Highlight,
        expires_at: now + Duration::days(5),
        created_at: now,
    }
}

async fn race(
    store: Arc<SqlShowcaseStore>,
    items: Vec<ShowcasedItem>,
) -> ContentionTestResult<Vec<Result<(), StoreError>>> {
    let handles = items
        .into_iter()
        .map(|item| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.insert(item).await })
        })
        .collect::<Vec<_>>();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.map_err(|e| e.to_string())?);
    }
    Ok(results)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_of_same_content_leave_one_row() -> ContentionTestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let store = file_backed_store(&dir).await?;

    let attempts = (0..12)
        .map(|n| {
            let category =
                if n % 2 == 0 { ShowcaseCategory::Message } else { ShowcaseCategory::Announcement };
            item("m-hot", category)
        })
        .collect();
    let results = race(Arc::clone(&store), attempts).await?;

    let winners = results.iter().filter(|result| result.is_ok()).count();
    let duplicates =
        results.iter().filter(|result| matches!(result, Err(StoreError::Duplicate))).count();
    require_eq!(winners, 1, "expected exactly one successful insert, got {winners}");
    require_eq!(duplicates, 11, "every losing insert should report a duplicate, got {duplicates}");

    let rows = store
        .list_for_guild(&GuildId("G-1".to_owned()))
        .await
        .map_err(|e| e.to_string())?;
    require_eq!(rows.len(), 1, "expected one stored row, found {}", rows.len());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_never_exceed_capacity() -> ContentionTestResult {
    let dir = TempDir::new().map_err(|e| e.to_string())?;
    let store = file_backed_store(&dir).await?;

    let attempts =
        (0..10).map(|n| item(&format!("a-{n}"), ShowcaseCategory::Announcement)).collect();
    let results = race(Arc::clone(&store), attempts).await?;

    let accepted = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(StoreError::CapacityExceeded)))
        .count();
    require_eq!(accepted, 4, "announcement collection holds four entries, accepted {accepted}");
    require_eq!(rejected, 6, "remaining inserts should hit capacity, rejected {rejected}");

    let stored = store
        .count(&GuildId("G-1".to_owned()), ShowcaseCategory::Announcement)
        .await
        .map_err(|e| e.to_string())?;
    require_eq!(stored, 4, "expected four stored announcements, found {stored}");
    Ok(())
}

use smk_core::{Backend, BackendConfig, ChangeEntry, Migrator, RunOptions};
use smk_db::{connect_postgres, PgBackend};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// DB-backed tests, skipped if SMK_DATABASE_URL is not set.
fn pg_url() -> Option<String> {
    match std::env::var(smk_db::ENV_DB_URL) {
        Ok(v) if v.starts_with("postgres") => Some(v),
        _ => {
            eprintln!("SKIP: SMK_DATABASE_URL not set to a postgres url");
            None
        }
    }
}

/// Unique table per test run so parallel runs / reruns do not collide.
fn unique_table(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}_{nanos}")
}

#[tokio::test]
async fn pg_up_and_down_record_versions() -> anyhow::Result<()> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let pool = connect_postgres(&url).await?;
    let table = unique_table("smk_test_versions");
    let data_table = unique_table("smk_test_data");

    let catalog = vec![
        ChangeEntry::new("001", format!("create table {data_table} (id int); insert into {data_table} values (1);"))
            .with_reverse(format!("drop table {data_table};")),
    ];
    let backend = PgBackend::new(pool.clone(), BackendConfig::new(table.clone(), 424_242)?);
    let migrator = Migrator::new(catalog, backend);

    migrator.up(&RunOptions::default()).await?;
    assert_eq!(migrator.backend().read_applied().await?, vec!["001"]);

    migrator.down(1, &RunOptions::default()).await?;
    assert!(migrator.backend().read_applied().await?.is_empty());

    sqlx::query(&format!("drop table if exists {table}"))
        .execute(&pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn pg_second_locker_waits_for_release() -> anyhow::Result<()> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let pool = connect_postgres(&url).await?;
    let backend = Arc::new(PgBackend::new(
        pool.clone(),
        BackendConfig::new("smk_lock_guard", lock_key(0)?)?,
    ));

    // Same backend, same process: the second caller still waits.
    let first = backend.lock().await?;
    let waiter = {
        let backend = Arc::clone(&backend);
        tokio::spawn(async move { backend.lock().await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!waiter.is_finished(), "second lock must wait while the first is held");

    backend.unlock(first).await?;
    let second = tokio::time::timeout(Duration::from_secs(5), waiter).await???;
    backend.unlock(second).await?;
    Ok(())
}

#[tokio::test]
async fn pg_dropped_lock_guard_releases_the_lock() -> anyhow::Result<()> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let pool = connect_postgres(&url).await?;
    let backend = PgBackend::new(pool.clone(), BackendConfig::new("smk_lock_guard", lock_key(500)?)?);

    let abandoned = backend.lock().await?;
    drop(abandoned);

    let again = tokio::time::timeout(Duration::from_secs(5), backend.lock()).await??;
    backend.unlock(again).await?;
    Ok(())
}

fn lock_key(offset: i64) -> anyhow::Result<i64> {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() % 1000;
    Ok(9_100_000_000 + offset + millis as i64)
}

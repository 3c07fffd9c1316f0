//! Local state overview.
//!
//! Summarizes what the last runs left behind: preload markers, how many
//! posters are cached, and which sections the cache snapshot holds. Used by
//! `mdsync status` to check whether the next boot will take the fast path.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::db;
use crate::fingerprint::config_fingerprint;
use crate::markers::{
    MarkerStore, SqliteMarkerStore, KEY_FAST_PATH_READY, KEY_FINGERPRINT, KEY_FORCE_RESYNC,
    KEY_LAST_POSTERS,
};
use crate::migrate;
use crate::posters::SqlitePosterCache;
use crate::progress::format_number;
use crate::upstream::PosterCache;

pub struct SectionStatus {
    pub id: String,
    pub name: String,
    pub cached_items: usize,
    pub enriched_items: usize,
}

pub struct StatusReport {
    pub fast_path_ready: bool,
    pub fingerprint_matches: bool,
    pub resync_requested: bool,
    pub last_poster_count: i64,
    pub poster_count: i64,
    pub sections: Vec<SectionStatus>,
    pub snapshot_updated_at: Option<i64>,
}

/// Collect the report without consuming any one-shot marker.
pub async fn gather(pool: &SqlitePool, fingerprint: &str) -> Result<StatusReport> {
    let markers = SqliteMarkerStore::new(pool.clone());
    let fast_path_ready = markers.get(KEY_FAST_PATH_READY).await?.as_deref() == Some("true");
    let fingerprint_matches = markers.get(KEY_FINGERPRINT).await?.as_deref() == Some(fingerprint);
    let resync_requested = markers.get(KEY_FORCE_RESYNC).await?.is_some();
    let last_poster_count = markers
        .get(KEY_LAST_POSTERS)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let poster_count = SqlitePosterCache::new(pool.clone()).stats().await?.count;

    let cache = CacheStore::new();
    cache.load_snapshot(pool).await?;
    let sections = cache
        .sections()
        .unwrap_or_default()
        .into_iter()
        .map(|section| {
            let media = cache
                .section_cache(&section.id)
                .map(|c| c.media)
                .unwrap_or_default();
            SectionStatus {
                cached_items: media.len(),
                enriched_items: media.iter().filter(|m| m.metadata_complete).count(),
                id: section.id,
                name: section.name,
            }
        })
        .collect();

    let snapshot_updated_at: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM cache_entries")
        .fetch_one(pool)
        .await?;

    Ok(StatusReport {
        fast_path_ready,
        fingerprint_matches,
        resync_requested,
        last_poster_count,
        poster_count,
        sections,
        snapshot_updated_at,
    })
}

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let report = gather(&pool, &config_fingerprint(&config.upstream)).await?;

    let next_boot = if report.resync_requested {
        "full (resync requested)"
    } else if !report.fast_path_ready {
        "full (never preloaded)"
    } else if !report.fingerprint_matches {
        "full (connection settings changed)"
    } else if report.poster_count == 0 {
        "full (no posters cached)"
    } else {
        "fast"
    };

    println!("Media Dashboard Sync: Status");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Server:      {}", config.upstream.server_url);
    println!("  Next boot:   {}", next_boot);
    println!();
    println!("  Posters:     {}", format_number(report.poster_count.max(0) as u64));
    println!("  Last run:    {} posters", format_number(report.last_poster_count.max(0) as u64));
    println!(
        "  Snapshot:    {}",
        report
            .snapshot_updated_at
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );

    if !report.sections.is_empty() {
        println!();
        println!("  {:<8} {:<28} {:>6} {:>9}", "ID", "SECTION", "ITEMS", "ENRICHED");
        println!("  {}", "-".repeat(54));
        for s in &report.sections {
            println!("  {:<8} {:<28} {:>6} {:>9}", s.id, s.name, s.cached_items, s.enriched_items);
        }
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    match delta {
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => plural(d / 60, "min"),
        d if d < 86400 => plural(d / 3600, "hour"),
        d if d < 86400 * 30 => plural(d / 86400, "day"),
        _ => format_ts_iso(ts),
    }
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_times() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 60), "1 min ago");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400 * 3), "3 days ago");
    }

    #[tokio::test]
    async fn status_works_before_any_preload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("fresh.sqlite"));
        run_status(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        let report = gather(&pool, &config_fingerprint(&config.upstream)).await.unwrap();
        assert!(!report.fast_path_ready);
        assert_eq!(report.poster_count, 0);
        assert!(report.sections.is_empty());
        pool.close().await;
    }
}

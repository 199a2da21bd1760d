mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedScreenFetcher;
use sdui_runtime::cache::{
    CachePolicy, CachePolicyResolver, CachingScreenFetcher, ConfiguredPolicyResolver,
    DiskScreenCache, FileDiskStorage, MemoryScreenCache, ScreenCache,
};
use sdui_runtime::clock::ManualClock;
use sdui_runtime::config::{CacheConfig, CachePolicyKind};
use sdui_runtime::error::FetchError;
use sdui_runtime::screen::{IssueCode, Node, Screen, ScreenRequest};
use sdui_runtime::RuntimeError;
use tempfile::TempDir;

fn screen(id: &str) -> Screen {
    Screen::new(id).with_root(Node::new("root", "column"))
}

fn resolver(policy: CachePolicyKind, ttl_seconds: Option<u64>) -> Arc<ConfiguredPolicyResolver> {
    Arc::new(ConfiguredPolicyResolver::new(CacheConfig {
        default_policy: policy,
        default_ttl_seconds: ttl_seconds,
        ..CacheConfig::default()
    }))
}

fn disk_cache(dir: &TempDir, clock: &ManualClock) -> Arc<DiskScreenCache> {
    Arc::new(DiskScreenCache::with_clock(
        Arc::new(FileDiskStorage::new(dir.path())),
        Arc::new(clock.clone()),
    ))
}

#[tokio::test]
async fn memory_entries_expire_after_ttl() {
    let clock = ManualClock::at_millis(0);
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("home", Ok(screen("home")));
    let caching = CachingScreenFetcher::builder(fetcher.clone())
        .clock(Arc::new(clock.clone()))
        .policy_resolver(resolver(CachePolicyKind::Memory, Some(60)))
        .build();
    let request = ScreenRequest::new("home");

    caching.load(&request).await.unwrap();
    clock.advance(Duration::from_secs(59));
    caching.load(&request).await.unwrap();
    assert_eq!(fetcher.calls(), 1);

    clock.advance(Duration::from_secs(1));
    caching.load(&request).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn params_are_part_of_the_cache_identity() {
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("feed", Ok(screen("feed")));
    let caching = CachingScreenFetcher::builder(fetcher.clone()).build();

    caching
        .load(&ScreenRequest::new("feed").param("page", "1"))
        .await
        .unwrap();
    caching
        .load(&ScreenRequest::new("feed").param("page", "2"))
        .await
        .unwrap();
    caching
        .load(&ScreenRequest::new("feed").param("page", "1"))
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn separator_characters_in_params_do_not_alias_requests() {
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("feed", Ok(screen("feed")));
    let caching = CachingScreenFetcher::builder(fetcher.clone()).build();
    let packed = ScreenRequest::new("feed").param("page", "2&q=x");
    let split = ScreenRequest::new("feed").param("page", "2").param("q", "x");

    assert_ne!(packed.cache_key(), split.cache_key());
    caching.load(&packed).await.unwrap();
    caching.load(&split).await.unwrap();
    assert_eq!(fetcher.calls(), 2);

    caching.load(&packed).await.unwrap();
    caching.load(&split).await.unwrap();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn disk_hits_survive_restarts_and_are_promoted() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::at_millis(0);
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("home", Ok(screen("home")));
    let request = ScreenRequest::new("home");

    let first = CachingScreenFetcher::builder(fetcher.clone())
        .clock(Arc::new(clock.clone()))
        .disk_cache(disk_cache(&dir, &clock))
        .policy_resolver(resolver(CachePolicyKind::Disk, None))
        .build();
    first.load(&request).await.unwrap();
    assert_eq!(fetcher.calls(), 1);

    // Fresh memory tier over the same directory.
    let disk = disk_cache(&dir, &clock);
    let memory = Arc::new(MemoryScreenCache::with_clock(Arc::new(clock.clone())));
    let second = CachingScreenFetcher::builder(fetcher.clone())
        .clock(Arc::new(clock.clone()))
        .memory_cache(memory.clone())
        .disk_cache(disk.clone())
        .policy_resolver(resolver(CachePolicyKind::Disk, None))
        .build();

    let loaded = second.load(&request).await.unwrap();
    assert_eq!(loaded.id, "home");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(memory.len(), 1);

    disk.remove(&request.cache_key()).await.unwrap();
    second.load(&request).await.unwrap();
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn disabled_policy_always_fetches() {
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("live", Ok(screen("live")));
    let caching = CachingScreenFetcher::builder(fetcher.clone())
        .policy_resolver(resolver(CachePolicyKind::Disabled, None))
        .build();

    for _ in 0..3 {
        caching.load(&ScreenRequest::new("live")).await.unwrap();
    }
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn invalid_screens_report_every_issue_and_are_not_cached() {
    let mut bad = Screen::new("  ").with_root(Node::new("dup", "column").with_children(vec![
        Node::new("dup", "text"),
    ]));
    bad.version = -2;
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("bad", Ok(bad));
    let memory = Arc::new(MemoryScreenCache::new());
    let caching = CachingScreenFetcher::builder(fetcher.clone())
        .memory_cache(memory.clone())
        .build();

    let err = caching.load(&ScreenRequest::new("bad")).await.unwrap_err();
    let RuntimeError::Validation(issues) = err else {
        panic!("Expected a validation error");
    };
    let codes: Vec<IssueCode> = issues.iter().map(|issue| issue.code).collect();
    assert_eq!(
        codes,
        vec![
            IssueCode::BlankScreenId,
            IssueCode::NegativeVersion,
            IssueCode::DuplicateNodeId
        ]
    );
    assert!(memory.is_empty());

    caching.load(&ScreenRequest::new("bad")).await.unwrap_err();
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn fetch_failures_keep_their_category() {
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("down", Err(FetchError::remote("503")));
    fetcher.respond("garbled", Err(FetchError::mapping("missing id")));
    let caching = CachingScreenFetcher::builder(fetcher).build();

    let down = caching.load(&ScreenRequest::new("down")).await.unwrap_err();
    let garbled = caching.load(&ScreenRequest::new("garbled")).await.unwrap_err();

    assert_eq!(down.error_type(), "remote");
    assert_eq!(garbled.error_type(), "mapping");
}

#[tokio::test]
async fn clear_expired_sweeps_both_tiers() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::at_millis(0);
    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("a", Ok(screen("a")));
    fetcher.respond("b", Ok(screen("b")));
    let disk = disk_cache(&dir, &clock);
    let caching = CachingScreenFetcher::builder(fetcher)
        .clock(Arc::new(clock.clone()))
        .disk_cache(disk.clone())
        .policy_resolver(resolver(CachePolicyKind::Disk, Some(10)))
        .build();

    caching.load(&ScreenRequest::new("a")).await.unwrap();
    clock.advance(Duration::from_secs(5));
    caching.load(&ScreenRequest::new("b")).await.unwrap();
    clock.advance(Duration::from_secs(6));

    // "a" expired at t=10s, "b" expires at t=15s: one entry per tier.
    assert_eq!(caching.clear_expired().await.unwrap(), 2);
    assert_eq!(disk.keys().await.unwrap(), vec!["b".to_string()]);
}

#[tokio::test]
async fn custom_resolvers_choose_per_request() {
    struct ParamsDisableCache;

    impl CachePolicyResolver for ParamsDisableCache {
        fn resolve(&self, request: &ScreenRequest) -> CachePolicy {
            if request.params.is_empty() {
                CachePolicy::Memory { ttl: None }
            } else {
                CachePolicy::Disabled
            }
        }
    }

    let fetcher = ScriptedScreenFetcher::new();
    fetcher.respond("search", Ok(screen("search")));
    let caching = CachingScreenFetcher::builder(fetcher.clone())
        .policy_resolver(Arc::new(ParamsDisableCache))
        .build();

    let plain = ScreenRequest::new("search");
    let query = ScreenRequest::new("search").param("q", "shoes");
    caching.load(&plain).await.unwrap();
    caching.load(&plain).await.unwrap();
    caching.load(&query).await.unwrap();
    caching.load(&query).await.unwrap();

    assert_eq!(fetcher.calls(), 3);
}

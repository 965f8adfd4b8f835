//! Session store behaviour under concurrent first contact and idle eviction.

use buddyrag::config::{CacheConfig, SessionConfig};
use buddyrag::session::{SessionStore, Turn};
use chrono::{Duration, Utc};
use std::sync::Arc;

fn store() -> Arc<SessionStore> {
    Arc::new(SessionStore::new(&SessionConfig::default(), &CacheConfig::default()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_yields_one_session() {
    let store = store();

    let tasks = (0..32).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get_or_create("s1", "u1") })
    });
    let handles: Vec<_> = futures_util::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(store.len(), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_land_in_one_history() {
    let store = store();

    let tasks = (0..8).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let handle = store.get_or_create("s1", "u1");
            let _gate = handle.begin_run().await;
            handle.with(|session| {
                session.push_turn(Turn {
                    question: format!("question {}", i),
                    answer: format!("answer {}", i),
                    timestamp: Utc::now(),
                })
            });
        })
    });
    futures_util::future::join_all(tasks).await;

    let session = store.get("s1").unwrap().snapshot();
    assert_eq!(session.turns().len(), 8);
}

#[test]
fn test_history_is_bounded() {
    let config = SessionConfig {
        max_turns: 3,
        ..Default::default()
    };
    let store = SessionStore::new(&config, &CacheConfig::default());
    let handle = store.get_or_create("s1", "u1");

    for i in 0..5 {
        handle.with(|session| {
            session.push_turn(Turn {
                question: format!("question {}", i),
                answer: String::new(),
                timestamp: Utc::now(),
            })
        });
    }

    let session = handle.snapshot();
    let questions: Vec<&str> = session.turns().iter().map(|t| t.question.as_str()).collect();
    assert_eq!(questions, vec!["question 2", "question 3", "question 4"]);
}

#[tokio::test]
async fn test_idle_reaper_evicts_abandoned_sessions() {
    let config = SessionConfig {
        idle_timeout_secs: 0,
        ..Default::default()
    };
    let store = Arc::new(SessionStore::new(&config, &CacheConfig::default()));
    drop(store.get_or_create("stale", "u1"));
    let kept = store.get_or_create("held", "u2");

    let reaper = Arc::clone(&store).spawn_idle_reaper(std::time::Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    reaper.abort();

    assert!(!store.contains("stale"));
    assert!(store.contains("held"));
    drop(kept);
}

#[test]
fn test_touch_defers_eviction() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        ..Default::default()
    };
    let store = SessionStore::new(&config, &CacheConfig::default());
    drop(store.get_or_create("s1", "u1"));

    assert!(store.touch("s1"));
    assert!(store.evict_idle(Utc::now() + Duration::seconds(30)).is_empty());
    assert_eq!(store.evict_idle(Utc::now() + Duration::seconds(61)), vec!["s1".to_string()]);
}

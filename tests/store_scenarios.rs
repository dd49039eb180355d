//! End-to-end scenarios against the storage facade and the memory store

use quotebook::error::Error;
use quotebook::storage::{self, MemoryStore, NewQuote, Storage, StoreConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_gc() -> StoreConfig {
    StoreConfig {
        gc_interval_ms: 50,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_inserted_quotes_are_listed() {
    let storage = storage::open(&StoreConfig::default()).expect("open memdb");

    let mut ids = Vec::new();
    for i in 0..25 {
        let id = storage
            .insert(NewQuote::new(format!("Q{}", i), format!("A{}", i % 3)))
            .await
            .unwrap();
        ids.push(id);
    }

    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must increase");

    let quotes = storage.list_all().await.unwrap();
    assert_eq!(quotes.len(), 25);
    let listed: HashSet<_> = quotes.iter().map(|q| q.id).collect();
    assert_eq!(listed, ids.iter().copied().collect::<HashSet<_>>());
    for quote in &quotes {
        let i: usize = quote.text[1..].parse().unwrap();
        assert_eq!(quote.author, format!("A{}", i % 3));
    }
}

#[tokio::test]
async fn test_empty_text_leaves_store_unchanged() {
    let storage = storage::open(&StoreConfig::default()).unwrap();
    storage.insert(NewQuote::new("Q1", "A1")).await.unwrap();

    let err = storage.insert(NewQuote::new("", "A1")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(storage.list_by_author("A1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_author_lookup_scenario() {
    let storage = storage::open(&StoreConfig::default()).unwrap();
    let q1 = storage.insert(NewQuote::new("Q1", "A1")).await.unwrap();
    let q2 = storage.insert(NewQuote::new("Q2", "A1")).await.unwrap();
    storage.insert(NewQuote::new("Q3", "A2")).await.unwrap();

    let by_a1: HashSet<_> = storage
        .list_by_author("A1")
        .await
        .unwrap()
        .into_iter()
        .map(|q| (q.id, q.text))
        .collect();
    assert_eq!(
        by_a1,
        HashSet::from([(q1, "Q1".to_string()), (q2, "Q2".to_string())])
    );
    assert!(storage.list_by_author("Unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_quote_disappears_immediately() {
    let store = MemoryStore::without_collector(StoreConfig::default());
    let storage = Storage::new(store.clone());

    let id = storage.insert(NewQuote::new("Q1", "A1")).await.unwrap();
    storage.insert(NewQuote::new("Q2", "A1")).await.unwrap();

    storage.delete(id).await.unwrap();
    storage.delete(id).await.unwrap();
    storage.delete(424242).await.unwrap();

    assert!(storage.list_all().await.unwrap().iter().all(|q| q.id != id));
    assert!(storage
        .list_by_author("A1")
        .await
        .unwrap()
        .iter()
        .all(|q| q.id != id));
    for _ in 0..20 {
        assert_ne!(storage.random().await.unwrap().id, id);
    }

    // Still only tombstoned, nothing reclaimed yet.
    let stats = store.stats();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.tombstones, 1);
}

#[tokio::test]
async fn test_random_empty_and_single() {
    let storage = storage::open(&StoreConfig::default()).unwrap();
    assert!(matches!(storage.random().await, Err(Error::EmptyStore)));

    let id = storage.insert(NewQuote::new("only", "me")).await.unwrap();
    for _ in 0..10 {
        assert_eq!(storage.random().await.unwrap().id, id);
    }

    storage.delete(id).await.unwrap();
    assert!(matches!(storage.random().await, Err(Error::EmptyStore)));
}

#[tokio::test]
async fn test_collector_reclaims_after_threshold() {
    let store = MemoryStore::new(fast_gc()).unwrap();
    let storage = Storage::new(store.clone());

    let mut ids = Vec::new();
    for i in 0..100 {
        // The first five quotes are the only ones by "Doomed".
        let author = if i < 5 { "Doomed" } else { "Survivor" };
        ids.push(
            storage
                .insert(NewQuote::new(format!("Q{}", i), author))
                .await
                .unwrap(),
        );
    }
    for &id in &ids[..15] {
        storage.delete(id).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(storage.list_all().await.unwrap().len(), 85);
    assert!(storage.list_by_author("Doomed").await.unwrap().is_empty());
    assert_eq!(storage.list_by_author("Survivor").await.unwrap().len(), 85);

    let stats = store.stats();
    assert_eq!(stats.records, 85);
    assert_eq!(stats.tombstones, 0);
    assert_eq!(stats.roster_len, 85);
    assert_eq!(stats.authors, 1);
    assert!(stats.compactions >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_get_unique_ids() {
    let storage = Arc::new(storage::open(&StoreConfig::default()).unwrap());

    let handles: Vec<_> = (0..1000)
        .map(|i| {
            let storage = storage.clone();
            tokio::spawn(async move {
                storage
                    .insert(NewQuote::new(format!("Q{}", i), format!("A{}", i % 7)))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()), "duplicate id issued");
    }

    assert_eq!(ids.len(), 1000);
    assert_eq!(storage.list_all().await.unwrap().len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_workload_with_collector() {
    let store = MemoryStore::new(StoreConfig {
        gc_interval_ms: 5,
        ..Default::default()
    })
    .unwrap();
    let storage = Arc::new(Storage::new(store.clone()));
    let deleted = Arc::new(Mutex::new(HashSet::new()));

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let storage = storage.clone();
            let deleted = deleted.clone();
            tokio::spawn(async move {
                let mut kept = Vec::new();
                for i in 0..200 {
                    let id = storage
                        .insert(NewQuote::new(format!("W{}-{}", w, i), format!("W{}", w)))
                        .await
                        .unwrap();
                    if i % 2 == 0 {
                        storage.delete(id).await.unwrap();
                        deleted.lock().unwrap().insert(id);
                    } else {
                        kept.push(id);
                    }
                    if i % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                kept
            })
        })
        .collect();

    let reader = {
        let storage = storage.clone();
        let deleted = deleted.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                let gone_before = deleted.lock().unwrap().clone();
                match storage.random().await {
                    Ok(quote) => assert!(
                        !gone_before.contains(&quote.id),
                        "deleted quote {} returned by random()",
                        quote.id
                    ),
                    Err(Error::EmptyStore) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let mut expected = HashSet::new();
    for writer in writers {
        expected.extend(writer.await.unwrap());
    }
    reader.await.unwrap();

    let listed: HashSet<_> = storage
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(listed, expected);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = store.stats();
    assert_eq!(stats.alive, 800);
    assert!(stats.compactions >= 1);
}

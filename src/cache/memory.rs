// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! In-process store with Redis-like expiry semantics
//!
//! Expiry runs on `tokio::time`, so paused-clock tests can step through TTLs.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::time::Instant;

use super::{CacheError, KvStore};

const CHANNEL_CAPACITY: usize = 1024;

enum Entry {
    Text(String),
    List(VecDeque<String>),
}

struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Slot>>>,
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired keys so they never leak into reads
    fn purge(data: &mut HashMap<String, Slot>, key: &str) {
        let now = Instant::now();
        if data.get(key).is_some_and(|slot| !slot.is_live(now)) {
            data.remove(key);
        }
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Snapshot of a list, oldest first
    pub async fn lrange(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        Ok(match data.get(key) {
            Some(Slot {
                entry: Entry::List(list),
                ..
            }) => list.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    /// Closes every open subscription, as a dropped server connection would
    #[cfg(test)]
    pub(crate) async fn disconnect_subscribers(&self) {
        self.channels.lock().await.clear();
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        Ok(match data.get(key) {
            Some(Slot {
                entry: Entry::Text(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut data = self.data.lock().await;
        data.insert(
            key.to_string(),
            Slot {
                entry: Entry::Text(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        match data.remove(key) {
            Some(Slot {
                entry: Entry::Text(value),
                ..
            }) => Ok(Some(value)),
            Some(other) => {
                data.insert(key.to_string(), other);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn push(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        let slot = data.entry(key.to_string()).or_insert_with(|| Slot {
            entry: Entry::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut slot.entry {
            Entry::List(list) => list.push_back(value.to_string()),
            Entry::Text(_) => {
                slot.entry = Entry::List(VecDeque::from([value.to_string()]));
            }
        }
        Ok(())
    }

    async fn push_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        self.push(key, value).await?;
        let mut data = self.data.lock().await;
        if let Some(slot) = data.get_mut(key) {
            slot.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
        }
        Ok(())
    }

    async fn llen(&self, key: &str) -> Result<usize, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        Ok(match data.get(key) {
            Some(Slot {
                entry: Entry::List(list),
                ..
            }) => list.len(),
            _ => 0,
        })
    }

    async fn lrem(&self, key: &str, value: &str) -> Result<bool, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        let Some(Slot {
            entry: Entry::List(list),
            ..
        }) = data.get_mut(key)
        else {
            return Ok(false);
        };
        let Some(index) = list.iter().position(|item| item == value) else {
            return Ok(false);
        };
        list.remove(index);
        if list.is_empty() {
            data.remove(key);
        }
        Ok(true)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut data = self.data.lock().await;
        Self::purge(&mut data, key);
        let Some(Slot {
            entry: Entry::List(list),
            ..
        }) = data.get_mut(key)
        else {
            return Ok(None);
        };
        let value = list.pop_front();
        if list.is_empty() {
            data.remove(key);
        }
        Ok(value)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), CacheError> {
        let sender = self.sender(channel).await;
        // no subscribers is not an error, same as PUBLISH returning 0
        let _ = sender.send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, CacheError> {
        let mut receiver = self.sender(channel).await.subscribe();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let channel = channel.to_string();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber on {} lagged by {} messages", channel, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_text_entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set_ex("10.0.0.1:3", "edge", 1800).await.unwrap();

        tokio::time::advance(Duration::from_secs(1799)).await;
        assert_eq!(store.get("10.0.0.1:3").await.unwrap().as_deref(), Some("edge"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("10.0.0.1:3").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set_ex("mac:xid", "lease", 300).await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(store.take("mac:xid").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_ttl_is_rearmed_on_push() {
        let store = MemoryStore::new();
        store.push_with_ttl("mac:fake_ip", "x1", 3600).await.unwrap();
        tokio::time::advance(Duration::from_secs(3000)).await;
        store.push_with_ttl("mac:fake_ip", "x2", 3600).await.unwrap();
        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(store.llen("mac:fake_ip").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(store.llen("mac:fake_ip").await.unwrap(), 0);
        assert!(store.lrange("mac:fake_ip").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_returns_value_once() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 60).await.unwrap();
        assert_eq!(store.take("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.take("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let store = MemoryStore::new();
        store.push("q", "a").await.unwrap();
        store.push("q", "b").await.unwrap();
        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.lpop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lrem_removes_single_occurrence() {
        let store = MemoryStore::new();
        for xid in ["a", "b", "a"] {
            store.push_with_ttl("l", xid, 60).await.unwrap();
        }
        assert!(store.lrem("l", "a").await.unwrap());
        assert_eq!(store.lrange("l").await.unwrap(), vec!["b", "a"]);
        assert!(!store.lrem("l", "zzz").await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("check_port:notify").await.unwrap();
        store.publish("check_port:notify", "").await.unwrap();
        store.publish("other", "ignored").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some(""));
    }
}

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use portal_cache::cache::Clock;
use portal_cache::{CacheStore, Keyed, MemoryMedium, Record};
use serde::{Deserialize, Serialize};

/// Wall time that follows tokio's (pausable) clock.
pub struct TokioClock {
    origin: tokio::time::Instant,
    base_ms: i64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base_ms: 1_700_000_000_000,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.base_ms + self.origin.elapsed().as_millis() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct NewsDraft {
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct NewsPatch {
    pub id: String,
    pub title: String,
}

impl Keyed for NewsItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Keyed for NewsPatch {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for NewsItem {
    type Draft = NewsDraft;
    type Patch = NewsPatch;
}

pub fn news(id: &str, title: &str) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        title: title.to_string(),
    }
}

pub fn ids(items: &[NewsItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

/// Store over an in-memory medium whose time follows tokio's clock.
pub fn memory_store() -> (Arc<CacheStore>, Arc<MemoryMedium>) {
    let medium = Arc::new(MemoryMedium::new());
    let store = CacheStore::new(medium.clone()).with_clock(Arc::new(TokioClock::new()));
    (Arc::new(store), medium)
}

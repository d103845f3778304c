//! Breadth-first crawl frontier
//!
//! The frontier is a strict FIFO queue paired with the visited set. A URL is
//! enqueued at most once per run: `push` refuses anything already visited or
//! still waiting in the queue.

use std::collections::{HashSet, VecDeque};
use url::Url;

/// FIFO queue of pages to crawl plus the set of pages already processed
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<Url>,

    /// Mirrors the contents of `queue` for O(1) membership checks
    queued: HashSet<String>,

    visited: HashSet<String>,
}

impl Frontier {
    /// Creates a frontier seeded with the start URL
    pub fn new(start_url: Url) -> Self {
        let mut frontier = Self::default();
        frontier.push(start_url);
        frontier
    }

    /// Enqueues a URL unless it was already visited or is already queued
    ///
    /// Returns true if the URL was added.
    pub fn push(&mut self, url: Url) -> bool {
        let key = url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            return false;
        }

        self.queued.insert(key.to_string());
        self.queue.push_back(url);
        true
    }

    /// Removes and returns the oldest queued URL
    pub fn pop(&mut self) -> Option<Url> {
        let url = self.queue.pop_front()?;
        self.queued.remove(url.as_str());
        Some(url)
    }

    /// Records a URL as processed
    ///
    /// Returns false if it had already been visited.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Number of URLs waiting in the queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

use std::collections::{HashSet, VecDeque};

use reqwest::Url;

/// How a URL entered the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Seed,
    Discovered,
    Pagination(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    pub url: Url,
    pub source: Source,
    /// Anchor text of the link the URL was found through.
    pub link_text: Option<String>,
}

/// FIFO of pending URLs plus the set of every URL ever queued.
///
/// A URL is queued at most once per run, so it is also fetched at most once.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the entry unless its URL was seen before. Returns whether it was queued.
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.mark_seen(&entry.url) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Records `url` as seen without queueing it. Returns `false` if it already was.
    pub fn mark_seen(&mut self, url: &Url) -> bool {
        self.seen.insert(url.as_str().to_string())
    }
}

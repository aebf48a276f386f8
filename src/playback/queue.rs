use std::collections::VecDeque;
use serde::Serialize;

/// Stream references for a list of songs, in playback order.
pub fn stream_urls(base_url: &str, song_ids: &[i64]) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    song_ids
        .iter()
        .map(|id| format!("{}/songs/{}", base, id))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub current_position: Option<usize>,
    pub current: Option<String>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub history: Vec<String>,
}

/// A navigable play order: what has played, what is playing, what is next.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    urls: Vec<String>,
    queued: VecDeque<String>,
    history: Vec<String>,
    current: Option<String>,
}

impl PlaybackQueue {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            queued: urls.iter().cloned().collect(),
            urls,
            history: Vec::new(),
            current: None,
        }
    }

    /// Replaces the play order with `urls` and makes the first one current.
    pub fn start(&mut self, urls: Vec<String>) -> Option<&str> {
        self.urls = urls;
        self.reset();
        self.step()
    }

    /// Puts every url back in the queue and forgets what has played.
    pub fn reset(&mut self) {
        self.queued = self.urls.iter().cloned().collect();
        self.history.clear();
        self.current = None;
    }

    pub fn add(&mut self, url: String) {
        self.urls.push(url.clone());
        self.queued.push_back(url);
    }

    pub fn extend(&mut self, urls: Vec<String>) {
        self.urls.extend(urls.iter().cloned());
        self.queued.extend(urls);
    }

    /// Advances to the next url. Returns `None`, changing nothing, when the
    /// queue is exhausted.
    pub fn step(&mut self) -> Option<&str> {
        let next = self.queued.pop_front()?;
        self.end_current();
        self.current = Some(next);
        self.current.as_deref()
    }

    /// Returns to the previous url, pushing the current one back onto the
    /// queue. Returns `None`, changing nothing, when there is no history.
    pub fn step_back(&mut self) -> Option<&str> {
        let previous = self.history.pop()?;
        if let Some(current) = self.current.take() {
            self.queued.push_front(current);
        }
        self.current = Some(previous);
        self.current.as_deref()
    }

    /// Moves the current url into history without advancing.
    pub fn end_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.history.push(current);
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn peek_next(&self) -> Option<&str> {
        self.queued.front().map(String::as_str)
    }

    pub fn peek_previous(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    /// 1-based position of the current url, if one is playing.
    pub fn current_position(&self) -> Option<usize> {
        self.current.as_ref().map(|_| self.history.len() + 1)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            current_position: self.current_position(),
            current: self.current.clone(),
            next: self.peek_next().map(str::to_string),
            previous: self.peek_previous().map(str::to_string),
            history: self.history.clone(),
        }
    }
}

//! Per-thread conversation memory (non-persistent).
//!
//! Each thread keeps a sliding window of its most recent turns; older turns
//! are dropped as new ones arrive. A window of zero disables memory. The
//! number of threads is bounded: starting a thread past the limit evicts the
//! least recently used one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// One question and the answer it got.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub human: String,
    pub ai: String,
    pub timestamp: DateTime<Utc>,
}

struct Thread {
    turns: VecDeque<Turn>,
    last_used: Instant,
}

#[derive(Clone)]
pub struct ConversationMemory {
    threads: Arc<RwLock<HashMap<String, Thread>>>,
    window: usize,
    max_threads: usize,
}

impl ConversationMemory {
    pub fn new(window: usize, max_threads: usize) -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
            window,
            max_threads: max_threads.max(1),
        }
    }

    /// Remembered turns of `thread_id`, oldest first.
    pub async fn history(&self, thread_id: &str) -> Vec<Turn> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .map(|t| t.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn append(&self, thread_id: &str, human: &str, ai: &str) {
        if self.window == 0 {
            return;
        }

        let mut threads = self.threads.write().await;
        if !threads.contains_key(thread_id) {
            while threads.len() >= self.max_threads {
                let Some(oldest) = threads
                    .iter()
                    .min_by_key(|(_, t)| t.last_used)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                threads.remove(&oldest);
                tracing::debug!("Evicted conversation thread {}", oldest);
            }
        }

        let thread = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| Thread {
                turns: VecDeque::new(),
                last_used: Instant::now(),
            });
        thread.last_used = Instant::now();
        thread.turns.push_back(Turn {
            human: human.to_string(),
            ai: ai.to_string(),
            timestamp: Utc::now(),
        });
        while thread.turns.len() > self.window {
            thread.turns.pop_front();
        }
    }

    /// Forget a thread. Returns whether anything was remembered.
    pub async fn clear(&self, thread_id: &str) -> bool {
        self.threads.write().await.remove(thread_id).is_some()
    }

    /// The thread as `Human:`/`AI:` lines for the prompt; empty when there is
    /// no history.
    pub async fn render(&self, thread_id: &str) -> String {
        let threads = self.threads.read().await;
        let Some(thread) = threads.get(thread_id) else {
            return String::new();
        };

        thread
            .turns
            .iter()
            .map(|t| format!("Human: {}\nAI: {}", t.human, t.ai))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(5, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_only_the_last_turns() {
        let memory = ConversationMemory::new(2, 10);
        memory.append("t", "one", "1").await;
        memory.append("t", "two", "2").await;
        memory.append("t", "three", "3").await;

        let history = memory.history("t").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].human, "two");
        assert_eq!(memory.render("t").await, "Human: two\nAI: 2\nHuman: three\nAI: 3");
    }

    #[tokio::test]
    async fn threads_are_isolated_and_clearable() {
        let memory = ConversationMemory::default();
        memory.append("a", "hi", "hello").await;
        memory.append("b", "yo", "hey").await;

        assert!(memory.clear("a").await);
        assert!(!memory.clear("a").await);
        assert_eq!(memory.render("a").await, "");
        assert_eq!(memory.history("b").await.len(), 1);
        assert_eq!(memory.thread_count().await, 1);
    }

    #[tokio::test]
    async fn zero_window_remembers_nothing() {
        let memory = ConversationMemory::new(0, 10);
        memory.append("t", "hi", "hello").await;
        assert!(memory.history("t").await.is_empty());
        assert_eq!(memory.thread_count().await, 0);
    }

    #[tokio::test]
    async fn least_recently_used_thread_is_evicted() {
        let memory = ConversationMemory::new(5, 2);
        memory.append("a", "1", "1").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        memory.append("b", "2", "2").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        // Touching "a" makes "b" the oldest.
        memory.append("a", "3", "3").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        memory.append("c", "4", "4").await;

        assert_eq!(memory.thread_count().await, 2);
        assert_eq!(memory.history("a").await.len(), 2);
        assert!(memory.history("b").await.is_empty());
        assert_eq!(memory.history("c").await.len(), 1);
    }

    #[tokio::test]
    async fn many_one_off_threads_stay_bounded() {
        let memory = ConversationMemory::new(5, 3);
        for i in 0..50 {
            memory.append(&format!("thread-{}", i), "q", "a").await;
        }
        assert_eq!(memory.thread_count().await, 3);
        assert_eq!(memory.history("thread-49").await.len(), 1);
    }
}

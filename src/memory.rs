//! Bounded conversation window kept by each session.
//!
//! Oldest messages fall off the front once the window is full, so the
//! window always reflects the most recent `capacity` turns in conversation
//! order.

use crate::types::{ChatRole, ChatTurn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatMemory {
    capacity: usize,
    messages: VecDeque<MemoryMessage>,
    /// Trailing user turns replayed by the warm start that no reply follows.
    /// Each one is claimed at most once by `push_user_prompt`.
    unanswered: Vec<String>,
}

impl ChatMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
            unanswered: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(MemoryMessage {
            role,
            content: content.into(),
        });
    }

    /// Adds the user prompt unless the warm start already replayed it. The
    /// prompt is written to durable history before the session is built, so
    /// every generation waiting on that build can find its prompt among the
    /// unanswered tail, in any order.
    pub fn push_user_prompt(&mut self, prompt: &str) {
        match self.unanswered.iter().position(|p| p == prompt) {
            Some(idx) => {
                self.unanswered.remove(idx);
            }
            None => self.push(ChatRole::User, prompt),
        }
    }

    /// Replays durable history delivered most-recent-first, inserting the
    /// turns oldest-first. Returns how many turns were loaded.
    pub fn warm_start(&mut self, recent_first: Vec<ChatTurn>) -> usize {
        let take = recent_first.len().min(self.capacity);
        self.unanswered = recent_first
            .iter()
            .take(take)
            .take_while(|t| t.role == ChatRole::User)
            .map(|t| t.text.clone())
            .collect();
        let mut loaded = 0;
        for turn in recent_first.into_iter().take(take).rev() {
            self.push(turn.role, turn.text);
            loaded += 1;
        }
        loaded
    }

    pub fn snapshot(&self) -> Vec<MemoryMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.unanswered.clear();
    }
}

//! Scripted oracle: replays canned replies in order, for tests and demos.

use crate::oracle::{ChatMessage, GenerationParams, Oracle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Reply returned once the script runs out.
pub const EXHAUSTED_REPLY: &str = "[脚本回复已用尽]";

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(Vec<ChatMessage>, GenerationParams)>>,
    call_count: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub async fn push(&self, reply: impl Into<String>) {
        self.replies.lock().await.push_back(reply.into());
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every message list the oracle was called with, in order.
    pub async fn calls(&self) -> Vec<(Vec<ChatMessage>, GenerationParams)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, messages: &[ChatMessage], params: GenerationParams) -> String {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push((messages.to_vec(), params));
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| EXHAUSTED_REPLY.to_string())
    }
}

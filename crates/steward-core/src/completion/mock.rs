//! Scripted completion client for tests and dry runs

use parking_lot::Mutex;

use async_trait::async_trait;

use super::{AssistantReply, CompletionClient, ToolChoice, ToolSchema, WireMessage};
use crate::error::{Error, Result};

/// A completion client that replays programmed replies in order.
///
/// Also records every request so tests can assert on the wire traffic.
pub struct MockCompletion {
    replies: Mutex<Vec<AssistantReply>>,
    call_log: Mutex<Vec<RecordedCall>>,
}

/// One recorded request
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub tool_names: Vec<String>,
    pub tool_choice: ToolChoice,
}

impl MockCompletion {
    pub fn new(replies: Vec<AssistantReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Number of times complete() was invoked
    pub fn call_count(&self) -> usize {
        self.call_log.lock().len()
    }

    /// The Nth recorded request (0-indexed)
    pub fn call(&self, n: usize) -> Option<RecordedCall> {
        self.call_log.lock().get(n).cloned()
    }

    /// Queue another reply after construction
    pub fn push_reply(&self, reply: AssistantReply) {
        self.replies.lock().push(reply);
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(
        &self,
        model: &str,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSchema>,
        tool_choice: ToolChoice,
    ) -> Result<AssistantReply> {
        self.call_log.lock().push(RecordedCall {
            model: model.to_string(),
            messages,
            tool_names: tools.into_iter().map(|t| t.name).collect(),
            tool_choice,
        });

        let mut replies = self.replies.lock();
        if replies.is_empty() {
            return Err(Error::Completion(
                "MockCompletion: no more programmed replies".to_string(),
            ));
        }
        Ok(replies.remove(0))
    }
}

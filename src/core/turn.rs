//! One question/answer exchange: context + prompt + streamed completion,
//! recorded into the session when it ends.

use std::sync::{Arc, PoisonError};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::completion::{CompletionClient, CompletionError};
use crate::core::context::{ContextLoader, LoadedContext};
use crate::core::message::Message;
use crate::core::prompt::assemble;
use crate::core::session::{SharedSession, TurnOutcome};

/// Progress of a turn as seen by whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    Chunk(String),
    Done { reply: Message },
    Failed { error: CompletionError, reply: Message },
}

#[derive(Clone)]
pub struct TurnRunner {
    context: Arc<ContextLoader>,
    client: Arc<dyn CompletionClient>,
}

impl TurnRunner {
    pub fn new(context: Arc<ContextLoader>, client: Arc<dyn CompletionClient>) -> Self {
        Self { context, client }
    }

    pub fn context(&self) -> &Arc<ContextLoader> {
        &self.context
    }

    /// Loads (or reuses) the context blob off the async executor.
    pub async fn load_context(&self) -> Arc<LoadedContext> {
        let loader = Arc::clone(&self.context);
        match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("context load task failed: {err}");
                self.context.load()
            }
        }
    }

    /// Completes a turn the caller already opened with
    /// [`ChatSession::begin_turn`](crate::core::session::ChatSession::begin_turn).
    ///
    /// Fragments are forwarded to `events` as they arrive. The turn always
    /// runs to the end and is recorded in the session even when the receiver
    /// has gone away.
    pub async fn run(
        &self,
        session: SharedSession,
        question: String,
        events: mpsc::UnboundedSender<TurnEvent>,
    ) -> Message {
        let context = self.load_context().await;
        let prompt = assemble(context.text(), &question);

        let result = self.stream_reply(&prompt, &events).await;

        let outcome = match &result {
            Ok(reply) => TurnOutcome::Success(reply.clone()),
            Err(_) => TurnOutcome::Failed,
        };
        let recorded = session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_turn(outcome)
            .clone();

        match result {
            Ok(reply) => {
                info!(reply_chars = reply.chars().count(), "turn completed");
                let _ = events.send(TurnEvent::Done {
                    reply: recorded.clone(),
                });
            }
            Err(error) => {
                warn!(%error, "completion failed");
                let _ = events.send(TurnEvent::Failed {
                    error,
                    reply: recorded.clone(),
                });
            }
        }

        recorded
    }

    async fn stream_reply(
        &self,
        prompt: &str,
        events: &mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<String, CompletionError> {
        let mut stream = self.client.stream_complete(prompt).await?;
        let mut reply = String::new();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            reply.push_str(&fragment);
            let _ = events.send(TurnEvent::Chunk(fragment));
        }

        Ok(reply)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::completion::CompletionStream;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed script and remembers every prompt it was given.
    pub struct ScriptedClient {
        script: Result<Vec<Result<String, CompletionError>>, CompletionError>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn replying(fragments: &[&str]) -> Self {
            Self {
                script: Ok(fragments.iter().map(|f| Ok(f.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_midway(fragments: &[&str], error: CompletionError) -> Self {
            let mut items: Vec<_> = fragments.iter().map(|f| Ok(f.to_string())).collect();
            items.push(Err(error));
            Self {
                script: Ok(items),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn rejecting(error: CompletionError) -> Self {
            Self {
                script: Err(error),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn stream_complete(
            &self,
            prompt: &str,
        ) -> Result<CompletionStream, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.script {
                Ok(items) => Ok(futures_util::stream::iter(items.clone()).boxed()),
                Err(err) => Err(err.clone()),
            }
        }
    }
}

//! Server-less "ask" command

use std::error::Error;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::core::completion::CompletionError;
use crate::core::session::ChatSession;
use crate::core::turn::{TurnEvent, TurnRunner};

#[derive(Debug)]
pub enum AskError {
    /// Nothing but whitespace was given.
    EmptyQuestion,
    /// The completion failed; the error detail is kept for stderr.
    Completion(CompletionError),
}

impl fmt::Display for AskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskError::EmptyQuestion => write!(f, "Usage: nobelforge ask <question>"),
            AskError::Completion(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AskError {}

/// Runs one turn and writes the reply to `out` as fragments arrive.
pub async fn run_ask<W: Write>(
    runner: &TurnRunner,
    question: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    if question.trim().is_empty() {
        return Err(AskError::EmptyQuestion.into());
    }

    let session = Arc::new(Mutex::new(ChatSession::new()));
    session
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .begin_turn(question)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let turn = {
        let runner = runner.clone();
        let session = Arc::clone(&session);
        let question = question.to_string();
        tokio::spawn(async move { runner.run(session, question, tx).await })
    };

    let mut failure = None;
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Chunk(content) => {
                write!(out, "{content}")?;
                out.flush()?;
            }
            TurnEvent::Done { .. } => writeln!(out)?,
            TurnEvent::Failed { error, .. } => failure = Some(error),
        }
    }
    turn.await?;

    match failure {
        Some(error) => Err(AskError::Completion(error).into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{ContextLoader, ContextSources};
    use crate::core::turn::test_support::ScriptedClient;
    use tempfile::TempDir;

    fn runner_with(client: ScriptedClient, dir: &TempDir) -> (TurnRunner, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let sources = ContextSources {
            text_path: dir.path().join("data.txt"),
            ontology_path: dir.path().join("ontology.ttl"),
        };
        let runner = TurnRunner::new(Arc::new(ContextLoader::new(sources)), client.clone());
        (runner, client)
    }

    #[tokio::test]
    async fn streams_fragments_then_newline() {
        let dir = TempDir::new().unwrap();
        let (runner, client) =
            runner_with(ScriptedClient::replying(&["Entropy ", "grows."]), &dir);
        let mut out = Vec::new();

        run_ask(&runner, "What is entropy?", &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Entropy grows.\n");
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("What is entropy?"));
    }

    #[tokio::test]
    async fn blank_question_never_reaches_the_client() {
        let dir = TempDir::new().unwrap();
        let (runner, client) = runner_with(ScriptedClient::replying(&["x"]), &dir);
        let mut out = Vec::new();

        let err = run_ask(&runner, "  ", &mut out).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AskError>(),
            Some(AskError::EmptyQuestion)
        ));
        assert!(out.is_empty());
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_after_partial_output_is_reported() {
        let dir = TempDir::new().unwrap();
        let (runner, _) = runner_with(
            ScriptedClient::failing_midway(
                &["Half an "],
                CompletionError::Transport("connection reset".into()),
            ),
            &dir,
        );
        let mut out = Vec::new();

        let err = run_ask(&runner, "What is entropy?", &mut out)
            .await
            .unwrap_err();

        assert_eq!(String::from_utf8(out).unwrap(), "Half an ");
        match err.downcast_ref::<AskError>() {
            Some(AskError::Completion(CompletionError::Transport(detail))) => {
                assert_eq!(detail, "connection reset")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

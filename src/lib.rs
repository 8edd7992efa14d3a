//! Nobelforge is a small web app where students ask a hosted LLM about their
//! research ideas, grounded in a local reference document and ontology.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the context loader, prompt assembly, chat sessions, the
//!   streaming completion client and configuration.
//! - [`server`] exposes the page and the session/chat API over HTTP and relays
//!   streamed replies as server-sent events.
//! - [`ui`] renders the single HTML page with its chat and gallery tabs.
//! - [`api`] defines the chat-completion payloads sent to the remote service.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod server;
pub mod ui;

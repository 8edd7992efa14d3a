//! Builds the reference text sent along with every question.
//!
//! Two optional sources feed the blob: a UTF-8 text document and a Turtle
//! ontology that is flattened to N-Triples. Failures on either source are
//! recorded as warnings and never abort loading. The result is computed once
//! per [`ContextLoader`] and shared read-only afterwards.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use oxttl::TurtleParser;
use tracing::{info, warn};

use crate::core::config::data::path_display;
use crate::core::constants::{NO_CONTEXT_FALLBACK, ONTOLOGY_SECTION_LABEL, TEXT_SECTION_LABEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSources {
    pub text_path: PathBuf,
    pub ontology_path: PathBuf,
}

impl Default for ContextSources {
    fn default() -> Self {
        Self {
            text_path: PathBuf::from("data.txt"),
            ontology_path: PathBuf::from("ontology.ttl"),
        }
    }
}

/// The combined blob plus any non-fatal problems hit while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContext {
    text: String,
    warnings: Vec<String>,
}

impl LoadedContext {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Debug)]
pub enum ContextError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Read { path, source } => {
                write!(f, "{}: {}", path_display(path), source)
            }
            ContextError::Parse { path, message } => {
                write!(f, "{}: {}", path_display(path), message)
            }
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ContextError::Read { source, .. } => Some(source),
            ContextError::Parse { .. } => None,
        }
    }
}

pub struct ContextLoader {
    sources: ContextSources,
    cached: OnceLock<Arc<LoadedContext>>,
}

impl ContextLoader {
    pub fn new(sources: ContextSources) -> Self {
        Self {
            sources,
            cached: OnceLock::new(),
        }
    }

    pub fn sources(&self) -> &ContextSources {
        &self.sources
    }

    /// Returns the context blob, reading the sources on the first call only.
    /// Concurrent first callers block until the single load finishes.
    pub fn load(&self) -> Arc<LoadedContext> {
        let loaded = self
            .cached
            .get_or_init(|| Arc::new(build_context(&self.sources)));
        Arc::clone(loaded)
    }
}

/// Reads every source and assembles the blob without caching.
pub fn build_context(sources: &ContextSources) -> LoadedContext {
    let mut text = String::new();
    let mut warnings = Vec::new();

    if sources.text_path.exists() {
        match read_text_source(&sources.text_path) {
            Ok(contents) => {
                text.push_str(&format!("\n{TEXT_SECTION_LABEL}\n{contents}\n"));
            }
            Err(err) => {
                warn!(error = %err, "failed to load text source");
                warnings.push(format!("TXT 파일 로드 중 오류: {err}"));
            }
        }
    } else {
        warn!(path = %sources.text_path.display(), "text source not present");
    }

    if sources.ontology_path.exists() {
        match read_ontology_source(&sources.ontology_path) {
            Ok(ntriples) => {
                text.push_str(&format!("\n{ONTOLOGY_SECTION_LABEL}\n{ntriples}\n"));
            }
            Err(err) => {
                warn!(error = %err, "failed to load ontology source");
                warnings.push(format!("TTL 파일 로드 중 오류: {err}"));
            }
        }
    } else {
        warn!(path = %sources.ontology_path.display(), "ontology source not present");
    }

    if text.is_empty() {
        info!("no context sources available, using general-knowledge fallback");
        text = NO_CONTEXT_FALLBACK.to_string();
    } else {
        info!(bytes = text.len(), "context blob loaded");
    }

    LoadedContext { text, warnings }
}

fn read_text_source(path: &Path) -> Result<String, ContextError> {
    fs::read_to_string(path).map_err(|source| ContextError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses a Turtle document and re-serializes it as N-Triples, one triple per
/// line in document order. Any syntax error rejects the whole document.
fn read_ontology_source(path: &Path) -> Result<String, ContextError> {
    let bytes = fs::read(path).map_err(|source| ContextError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parser = match base_iri_for(path) {
        Some(iri) => TurtleParser::new()
            .with_base_iri(iri)
            .unwrap_or_else(|_| TurtleParser::new()),
        None => TurtleParser::new(),
    };

    let mut ntriples = String::new();
    for triple in parser.for_reader(bytes.as_slice()) {
        let triple = triple.map_err(|err| ContextError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        ntriples.push_str(&format!("{triple} .\n"));
    }
    Ok(ntriples)
}

// Relative IRIs in the document resolve against the file's own location.
fn base_iri_for(path: &Path) -> Option<String> {
    let absolute = fs::canonicalize(path).ok()?;
    let display = absolute.to_str()?.replace('\\', "/");
    if display.starts_with('/') {
        Some(format!("file://{display}"))
    } else {
        Some(format!("file:///{display}"))
    }
}

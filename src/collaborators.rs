//! Interfaces to everything outside the protocol core
//!
//! The core reaches the model, the web, the disk, the terminal and the
//! shell only through these traits, so scenarios can be driven by scripted
//! implementations in tests.

use crate::errors::Result;
use crate::search::SearchHit;
use crate::tools::CommandOutput;
use crate::types::ChatMessage;
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Language model backend
#[async_trait]
pub trait ModelCollaborator: Send + Sync {
    /// Complete the conversation and return the raw reply text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Web search and page retrieval
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    /// Page body as plain text
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Disk access used by the mutation applier
pub trait Filesystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
}

/// Blocking interaction with the user
pub trait UserPrompt: Send + Sync {
    fn confirm(&self, question: &str) -> bool;

    /// Index of the chosen candidate, `None` when cancelled
    fn choose_one(&self, prompt: &str, candidates: &[String]) -> Option<usize>;

    /// Free-form answer, `None` when cancelled or empty
    fn ask_text(&self, prompt: &str) -> Option<String>;
}

/// Shell command execution
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput>;
}

/// Borrowed set of collaborators for one turn
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub model: &'a dyn ModelCollaborator,
    /// `None` when web access is disabled
    pub search: Option<&'a dyn SearchCollaborator>,
    pub filesystem: &'a dyn Filesystem,
    pub prompt: &'a dyn UserPrompt,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        model: &'a dyn ModelCollaborator,
        filesystem: &'a dyn Filesystem,
        prompt: &'a dyn UserPrompt,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            model,
            search: None,
            filesystem,
            prompt,
            runner,
        }
    }

    pub fn with_search(mut self, search: &'a dyn SearchCollaborator) -> Self {
        self.search = Some(search);
        self
    }
}

//! Session context: open files, conversation history, project root
//!
//! The orchestrator owns one `SessionContext` for the life of the process
//! and lends it to the protocol components. Open files keep insertion
//! order because disambiguation prompts list them in that order.

use crate::types::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Maximum number of history messages kept
pub const MAX_HISTORY_MESSAGES: usize = 100;

/// File loaded into the model's context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    /// Path relative to the project root
    pub path: String,
    pub content: String,
}

/// Process-lifetime state shared by the protocol components
#[derive(Debug, Clone)]
pub struct SessionContext {
    project_root: PathBuf,
    open_files: Vec<OpenFile>,
    history: VecDeque<ChatMessage>,
    max_history: usize,
}

impl SessionContext {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self::with_history_capacity(project_root, MAX_HISTORY_MESSAGES)
    }

    pub fn with_history_capacity(project_root: impl Into<PathBuf>, max_history: usize) -> Self {
        Self {
            project_root: project_root.into(),
            open_files: Vec::new(),
            history: VecDeque::with_capacity(max_history.min(MAX_HISTORY_MESSAGES)),
            max_history: max_history.max(1),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn set_project_root(&mut self, root: impl Into<PathBuf>) {
        self.project_root = root.into();
    }

    // Open files

    /// Add or refresh a file; a refreshed file keeps its position
    pub fn open_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        match self.open_files.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.content = content,
            None => self.open_files.push(OpenFile { path, content }),
        }
    }

    pub fn close_file(&mut self, path: &str) -> bool {
        let before = self.open_files.len();
        self.open_files.retain(|f| f.path != path);
        self.open_files.len() != before
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.open_files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.content.as_str())
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    pub fn open_files(&self) -> &[OpenFile] {
        &self.open_files
    }

    /// Open paths in insertion order
    pub fn open_paths(&self) -> Vec<String> {
        self.open_files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }

    pub fn clear_files(&mut self) {
        self.open_files.clear();
    }

    // Conversation history

    /// Append a message, evicting the oldest at capacity
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }

    pub fn history(&self) -> &VecDeque<ChatMessage> {
        &self.history
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.history.back()
    }

    /// Most recent assistant reply
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn replace_history(&mut self, messages: Vec<ChatMessage>) {
        self.history.clear();
        let skip = messages.len().saturating_sub(self.max_history);
        self.history.extend(messages.into_iter().skip(skip));
    }

    /// Drop history and open files; the project root stays
    pub fn reset(&mut self) {
        self.clear_history();
        self.clear_files();
    }

    /// Loaded files rendered for the system prompt
    pub fn render_open_files(&self) -> String {
        let mut out = String::new();
        for file in &self.open_files {
            out.push_str(&format!("--- {} ---\n{}\n", file.path, file.content));
        }
        out
    }

    /// Full message list for a model request: system prompt then history
    pub fn model_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut system = system_prompt.to_string();
        if !self.open_files.is_empty() {
            system.push_str("\n\nLoaded file contents:\n");
            system.push_str(&self.render_open_files());
        }

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(self.history.iter().cloned());
        messages
    }

    /// Rough token estimate of the history
    pub fn estimated_tokens(&self) -> usize {
        self.history.iter().map(|m| m.estimate_tokens()).sum()
    }
}

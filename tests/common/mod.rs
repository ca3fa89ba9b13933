//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ollamacode::agent::{AssistantOrchestrator, PromptSettings};
use ollamacode::collaborators::{CommandRunner, ModelCollaborator, SearchCollaborator, UserPrompt};
use ollamacode::dispatch::{DispatchSettings, IntentDispatcher};
use ollamacode::search::SearchHit;
use ollamacode::session::SessionContext;
use ollamacode::tools::CommandOutput;
use ollamacode::types::ChatMessage;
use ollamacode::validation::SyntaxValidator;
use ollamacode::{AgentError, Result};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Model that replays canned replies and records every request
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelCollaborator for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::ModelUnavailable("script exhausted".to_string()))
    }
}

/// Search backend with fixed hits and pages keyed by URL
#[derive(Default)]
pub struct StaticSearch {
    pub hits: Vec<SearchHit>,
    pub pages: HashMap<String, String>,
    pub queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn with_page(mut self, hit: SearchHit, page: &str) -> Self {
        self.pages.insert(hit.url.clone(), page.to_string());
        self.hits.push(hit);
        self
    }
}

#[async_trait]
impl SearchCollaborator for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AgentError::Generic(format!("404 for {}", url)))
    }
}

/// Prompt with fixed answers; records every question
pub struct ScriptedPrompt {
    pub confirm: bool,
    pub choice: Option<usize>,
    pub text: Option<String>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn accepting() -> Self {
        Self::answering(true)
    }

    pub fn refusing() -> Self {
        Self::answering(false)
    }

    fn answering(confirm: bool) -> Self {
        Self {
            confirm,
            choice: None,
            text: None,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl UserPrompt for ScriptedPrompt {
    fn confirm(&self, question: &str) -> bool {
        self.asked.lock().unwrap().push(question.to_string());
        self.confirm
    }

    fn choose_one(&self, prompt: &str, _candidates: &[String]) -> Option<usize> {
        self.asked.lock().unwrap().push(prompt.to_string());
        self.choice
    }

    fn ask_text(&self, prompt: &str) -> Option<String> {
        self.asked.lock().unwrap().push(prompt.to_string());
        self.text.clone()
    }
}

/// Runner that records commands instead of executing them
#[derive(Default)]
pub struct RecordingRunner {
    pub commands: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &str, _cwd: &Path) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(CommandOutput::completed(
            command,
            format!("ran {}", command),
            String::new(),
            Some(0),
            Duration::from_millis(1),
        ))
    }
}

/// Orchestrator over a fresh temporary project root
pub fn workspace(confirm_writes: bool) -> (TempDir, AssistantOrchestrator) {
    let dir = TempDir::new().unwrap();
    let dispatcher = IntentDispatcher::new(
        SyntaxValidator::new(),
        DispatchSettings {
            confirm_writes,
            ..DispatchSettings::default()
        },
    );
    let prompt = PromptSettings {
        web_enabled: true,
        ..PromptSettings::default()
    };
    let orchestrator = AssistantOrchestrator::new(SessionContext::new(dir.path()), dispatcher, prompt);
    (dir, orchestrator)
}

pub fn read(dir: &TempDir, path: &str) -> String {
    std::fs::read_to_string(dir.path().join(path)).unwrap()
}

//! Terminal input
//!
//! `InputHandler` reads REPL lines through rustyline with persistent
//! history. `TerminalPrompt` answers the confirmation and choice questions
//! the assistant asks while it works.

use crate::collaborators::UserPrompt;
use crate::repl::display::colorize_diff;
use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use rustyline::DefaultEditor;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

pub const DEFAULT_PROMPT: &str = "ollamacode> ";

/// What one read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl-C: drop the current line, keep the session
    Interrupted,
    /// Ctrl-D: leave the session
    Eof,
}

pub struct InputHandler {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    prompt: String,
}

impl InputHandler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            history_path: None,
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    /// Handler whose history is loaded from and saved to `history_file`
    pub fn with_history(history_file: PathBuf) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if history_file.exists() {
            let _ = editor.load_history(&history_file);
        }
        Ok(Self {
            editor,
            history_path: Some(history_file),
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn read_line(&mut self) -> Result<InputEvent> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = self.editor.add_history_entry(trimmed);
                }
                Ok(InputEvent::Line(trimmed.to_string()))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }

    pub fn save_history(&mut self) -> Result<()> {
        if let Some(path) = &self.history_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.editor.save_history(path)?;
        }
        Ok(())
    }

    pub fn history_len(&self) -> usize {
        self.editor.history().len()
    }
}

/// `UserPrompt` on stdin/stdout
///
/// Questions containing a diff are colored. Reads are line based so the
/// same prompt works for the REPL and for one-shot runs with piped input.
pub struct TerminalPrompt<R = io::BufReader<io::Stdin>> {
    input: Mutex<R>,
    /// Answer every confirmation with yes without asking
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> TerminalPrompt<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
            assume_yes: false,
        }
    }

    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    fn read_answer(&self, prompt: &str) -> Option<String> {
        print!("{}", prompt);
        let _ = io::stdout().flush();
        let mut line = String::new();
        let mut input = self.input.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead + Send> UserPrompt for TerminalPrompt<R> {
    fn confirm(&self, question: &str) -> bool {
        println!("\n{}", colorize_diff(question).trim_end());
        if self.assume_yes {
            println!("{}", "yes (auto)".dimmed());
            return true;
        }
        matches!(
            self.read_answer(&format!("{} ", "[y/N]".bold()))
                .map(|a| a.to_lowercase())
                .as_deref(),
            Some("y" | "yes")
        )
    }

    fn choose_one(&self, prompt: &str, candidates: &[String]) -> Option<usize> {
        println!("\n{}", prompt.bold());
        for (i, candidate) in candidates.iter().enumerate() {
            println!("  {}. {}", (i + 1).to_string().cyan(), candidate);
        }
        let answer = self.read_answer(&format!("Choose 1-{} (empty to cancel): ", candidates.len()))?;
        answer
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=candidates.len()).contains(n))
            .map(|n| n - 1)
    }

    fn ask_text(&self, prompt: &str) -> Option<String> {
        println!("\n{}", prompt.bold());
        self.read_answer("> ").filter(|answer| !answer.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn scripted(answers: &str) -> TerminalPrompt<Cursor<Vec<u8>>> {
        TerminalPrompt::new(Cursor::new(answers.as_bytes().to_vec()))
    }

    #[test]
    fn test_confirm_answers() {
        let prompt = scripted("y\nno\nYES\n");
        assert!(prompt.confirm("Apply?"));
        assert!(!prompt.confirm("Apply?"));
        assert!(prompt.confirm("Apply?"));
        assert!(!prompt.confirm("Apply? (input exhausted)"));
    }

    #[test]
    fn test_assume_yes_skips_input() {
        let prompt = scripted("").assume_yes(true);
        assert!(prompt.confirm("Run this command?"));
    }

    #[test]
    fn test_choose_one_is_one_based() {
        let candidates = vec!["a.py".to_string(), "b.py".to_string()];
        let prompt = scripted("2\n3\nx\n\n");
        assert_eq!(prompt.choose_one("Which?", &candidates), Some(1));
        assert_eq!(prompt.choose_one("Which?", &candidates), None);
        assert_eq!(prompt.choose_one("Which?", &candidates), None);
        assert_eq!(prompt.choose_one("Which?", &candidates), None);
    }

    #[test]
    fn test_ask_text_rejects_empty() {
        let prompt = scripted("\n  notes.md  \n");
        assert_eq!(prompt.ask_text("Name?"), None);
        assert_eq!(prompt.ask_text("Name?"), Some("notes.md".to_string()));
    }

    #[test]
    fn test_history_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let history_path = temp_dir.path().join("nested").join("history");
        {
            let mut handler = InputHandler::with_history(history_path.clone()).unwrap();
            let _ = handler.editor.add_history_entry("/help");
            let _ = handler.editor.add_history_entry("write a script");
            handler.save_history().unwrap();
        }
        assert!(history_path.exists());

        let handler = InputHandler::with_history(history_path).unwrap();
        assert_eq!(handler.history_len(), 2);
    }

    #[test]
    fn test_custom_prompt() {
        let mut handler = InputHandler::new().unwrap();
        assert_eq!(handler.prompt, DEFAULT_PROMPT);
        handler.set_prompt("test> ");
        assert_eq!(handler.prompt, "test> ");
    }
}

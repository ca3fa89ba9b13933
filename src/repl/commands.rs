//! Built-in REPL commands
//!
//! Lines starting with `/` are commands; everything else goes to the model.
//! Parsing is kept separate from execution so it can be tested without a
//! terminal.

use colored::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    Save(String),
    Load(String),
    List,
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    /// Reset history and open files
    Clear,
    Load { path: String },
    Files,
    Web { query: String },
    Run { command: String },
    /// List models, or switch when a name is given
    Model { name: Option<String> },
    Project(ProjectCommand),
    /// Toggle when no argument is given
    Verbose { enable: Option<bool> },
    Stats,
    /// Known command used with missing or bad arguments
    Usage { usage: &'static str },
    Unknown { input: String },
}

/// Whether `input` should be handled as a command
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Command::Unknown {
            input: input.to_string(),
        };
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        "clear" => Command::Clear,
        "files" => Command::Files,
        "stats" => Command::Stats,
        "load" if !rest.is_empty() => Command::Load { path: rest.to_string() },
        "load" => Command::Usage { usage: "/load <path>" },
        "web" if !rest.is_empty() => Command::Web { query: rest.to_string() },
        "web" => Command::Usage { usage: "/web <query>" },
        "run" if !rest.is_empty() => Command::Run {
            command: rest.to_string(),
        },
        "run" => Command::Usage { usage: "/run <command>" },
        "model" => Command::Model {
            name: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "project" => parse_project(rest),
        "verbose" => match rest.to_lowercase().as_str() {
            "" => Command::Verbose { enable: None },
            "on" | "true" | "1" => Command::Verbose { enable: Some(true) },
            "off" | "false" | "0" => Command::Verbose { enable: Some(false) },
            _ => Command::Usage {
                usage: "/verbose [on|off]",
            },
        },
        _ => Command::Unknown {
            input: trimmed.to_string(),
        },
    }
}

fn parse_project(rest: &str) -> Command {
    const USAGE: &str = "/project save|load|list|delete <name>";
    let mut parts = rest.split_whitespace();
    let action = parts.next().map(str::to_lowercase);
    let name = parts.next().map(str::to_string);
    if parts.next().is_some() {
        return Command::Usage { usage: USAGE };
    }

    match (action.as_deref(), name) {
        (Some("list"), None) => Command::Project(ProjectCommand::List),
        (Some("save"), Some(name)) => Command::Project(ProjectCommand::Save(name)),
        (Some("load"), Some(name)) => Command::Project(ProjectCommand::Load(name)),
        (Some("delete"), Some(name)) => Command::Project(ProjectCommand::Delete(name)),
        _ => Command::Usage { usage: USAGE },
    }
}

pub fn help_text() -> String {
    let rows = [
        ("/help", "Show this help"),
        ("/exit, /quit, /q", "Leave the session"),
        ("/clear", "Forget the conversation and loaded files"),
        ("/load <path>", "Load a file or a directory (recursive) into context"),
        ("/files", "List loaded files"),
        ("/web <query>", "Search the web and summarize the results"),
        ("/run <command>", "Run a shell command; its output joins the conversation"),
        ("/model [name]", "List models, or switch model (clears context)"),
        ("/project save|load|list|delete <name>", "Manage saved projects"),
        ("/verbose [on|off]", "Show correction and search details"),
        ("/stats", "Session statistics"),
    ];

    let mut out = format!("{}\n", "Commands".bold().cyan());
    for (usage, description) in rows {
        out.push_str(&format!("  {:<40} {}\n", usage.green(), description));
    }
    out.push_str(
        "\nAnything else is sent to the model. Code it writes is syntax-checked and previewed before it touches disk.\n",
    );
    out
}

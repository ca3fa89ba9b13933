//! System prompt with the tool-tag instructions

/// Values substituted into the tool instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub python_command: String,
    pub terminal_launcher: Option<String>,
    pub web_enabled: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            python_command: "python3".to_string(),
            terminal_launcher: None,
            web_enabled: true,
        }
    }
}

/// Build the system prompt sent in front of every request
///
/// Loaded file contents are not part of it; the session appends them to
/// the end of this same system message.
pub fn system_prompt(settings: &PromptSettings, open_paths: &[String]) -> String {
    let python = &settings.python_command;
    let mut prompt = format!(
        "You are a terminal assistant for software development.

GENERAL RULES:
- Answer simple questions, greetings and discussion directly, without tools.
- Use the tools below only when the user asks for an action (create or change files, run a command).
- Never tell the user to do something you can do yourself with a tool.
- Use `{python}` to run Python code.

TOOLS:

1. CREATE A PROJECT OR NEW FILES:
<project_creation>
  <explanation>Short explanation.</explanation>
  <file path=\"dir/\" />
  <file path=\"dir/file.ext\">CONTENT</file>
</project_creation>

2. MODIFY FILES:
<file_modifications>
  <explanation>Short explanation.</explanation>
  <file path=\"dir/file.ext\" action=\"overwrite\">COMPLETE NEW CONTENT</file>
</file_modifications>
For a small change to a loaded file use action=\"patch\" with one or more hunks:
<file path=\"dir/file.ext\" action=\"patch\">
<<<<<<< SEARCH
exact existing lines
=======
replacement lines
>>>>>>> REPLACE
</file>

3. RUN A SHELL COMMAND:
<shell>command</shell>
Python script: <shell>{python} script.py</shell>
"
    );

    if let Some(launcher) = settings.terminal_launcher.as_deref() {
        prompt.push_str(&format!(
            "Servers and other long-running commands must open a new terminal: <shell>{} bash -c 'cd dir && command'</shell>\n",
            launcher
        ));
    }

    if settings.web_enabled {
        prompt.push_str(
            "\n4. WEB SEARCH, when current or external information is needed:\n<search>what to look up</search>\n",
        );
    }

    let files = if open_paths.is_empty() {
        "none".to_string()
    } else {
        open_paths.join(", ")
    };
    prompt.push_str(&format!("\nFiles currently loaded in context (you can read them): {}\n", files));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_loaded_files() {
        let prompt = system_prompt(&PromptSettings::default(), &["a.py".into(), "b.sh".into()]);
        assert!(prompt.contains("a.py, b.sh"));
        assert!(system_prompt(&PromptSettings::default(), &[]).contains("context (you can read them): none"));
    }

    #[test]
    fn test_optional_sections() {
        let settings = PromptSettings {
            python_command: "py".to_string(),
            terminal_launcher: Some("gnome-terminal --".to_string()),
            web_enabled: false,
        };
        let prompt = system_prompt(&settings, &[]);
        assert!(prompt.contains("<shell>py script.py</shell>"));
        assert!(prompt.contains("gnome-terminal -- bash -c"));
        assert!(!prompt.contains("<search>"));
    }
}

//! Directives recovered from fenced code blocks
//!
//! Models sometimes answer with a bare Markdown fence instead of a tagged
//! block. When a reply carries no directive markup at all, its fences are
//! read as follows:
//!
//! ```text
//! every non-empty fence is bash/sh/shell  → one shell command per fence
//! otherwise                               → first non-empty fence overwrites
//!                                           a file chosen by the resolver
//! ```

use super::types::{Directive, FileModification, WriteMode};
use regex::Regex;
use std::sync::OnceLock;

const SHELL_LANGUAGES: [&str; 3] = ["bash", "sh", "shell"];

/// One fenced block: info string and trimmed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub language: String,
    pub content: String,
}

impl FencedBlock {
    fn is_shell(&self) -> bool {
        SHELL_LANGUAGES.contains(&self.language.to_ascii_lowercase().as_str())
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([\w+.-]*)[ \t]*\n?(.*?)```").expect("valid fence regex"))
}

/// Non-empty fenced blocks in reply order
pub fn fenced_blocks(reply: &str) -> Vec<FencedBlock> {
    fence_re()
        .captures_iter(reply)
        .filter_map(|caps| {
            let content = caps.get(2)?.as_str().trim();
            if content.is_empty() {
                return None;
            }
            Some(FencedBlock {
                language: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// Directives implied by the fences of an untagged reply
pub fn fenced_block_directives(reply: &str) -> Vec<Directive> {
    let blocks = fenced_blocks(reply);
    let Some(first) = blocks.first() else {
        return Vec::new();
    };

    if blocks.iter().all(FencedBlock::is_shell) {
        return blocks
            .into_iter()
            .map(|block| Directive::ShellCommand {
                command: block.content,
            })
            .collect();
    }

    vec![Directive::FileModification(FileModification {
        path: None,
        content: first.content.clone(),
        mode: WriteMode::Overwrite,
    })]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_fences_yields_nothing() {
        assert!(fenced_block_directives("Just an explanation.").is_empty());
        assert!(fenced_block_directives("Empty:\n```python\n\n```").is_empty());
    }

    #[test]
    fn test_shell_fences_become_commands() {
        let reply = "Try:\n```bash\nls -la\n```\nthen\n```SH\necho done\n```";
        assert_eq!(
            fenced_block_directives(reply),
            vec![
                Directive::ShellCommand {
                    command: "ls -la".to_string()
                },
                Directive::ShellCommand {
                    command: "echo done".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_first_code_fence_becomes_unnamed_overwrite() {
        let reply = "Here:\n```python\ndef f():\n    return 1\n```\nand a test\n```python\nassert f() == 1\n```";
        match fenced_block_directives(reply).as_slice() {
            [Directive::FileModification(modification)] => {
                assert_eq!(modification.path, None);
                assert_eq!(modification.mode, WriteMode::Overwrite);
                assert_eq!(modification.content, "def f():\n    return 1");
            }
            other => panic!("unexpected directives: {:?}", other),
        }
    }

    #[test]
    fn test_mixed_fences_are_not_all_run() {
        let reply = "```bash\npip install x\n```\n```\nimport x\n```";
        let directives = fenced_block_directives(reply);
        assert_eq!(directives.len(), 1);
        assert!(matches!(
            &directives[0],
            Directive::FileModification(m) if m.content == "pip install x"
        ));
    }

    #[test]
    fn test_fence_without_language() {
        let blocks = fenced_blocks("```\nplain\n```");
        assert_eq!(
            blocks,
            vec![FencedBlock {
                language: String::new(),
                content: "plain".to_string()
            }]
        );
    }
}

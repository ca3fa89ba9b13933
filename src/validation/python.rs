//! Python rules the tree-sitter grammar accepts but the interpreter rejects
//!
//! The grammar is error tolerant about layout and still parses Python 2
//! statement forms, so a clean tree is not enough to say a file compiles.

use tree_sitter::Node;

use super::types::Diagnostic;

const TAB_STOP: usize = 8;

/// All structural problems in `source`, given its parsed `root`
pub fn structural_diagnostics(root: Node<'_>, source: &str) -> Vec<Diagnostic> {
    let mut diagnostics = indentation_diagnostics(source);
    collect_statement_errors(root, &mut diagnostics);
    diagnostics.sort_by_key(|d| d.line);
    diagnostics
}

/// Indentation checked the way the tokenizer does it
///
/// Only the first physical line of each logical line counts; lines inside
/// brackets, strings, or after a backslash continuation are skipped.
pub fn indentation_diagnostics(source: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut levels = vec![0usize];
    let mut awaiting_block: Option<usize> = None;
    let mut scan = LineScanner::default();
    let mut line_count = 0;

    for (idx, line) in source.lines().enumerate() {
        let number = idx + 1;
        line_count = number;

        if scan.at_logical_start() {
            let (width, rest) = indentation(line);
            if rest.is_empty() || rest.starts_with('#') {
                continue;
            }
            let current = levels.last().copied().unwrap_or(0);
            if let Some(header) = awaiting_block.take() {
                if width > current {
                    levels.push(width);
                } else {
                    diagnostics.push(Diagnostic::new(
                        number,
                        format!("expected an indented block after line {}", header),
                    ));
                }
            } else if width > current {
                diagnostics.push(Diagnostic::new(number, "unexpected indent"));
            } else if width < current {
                while levels.last().is_some_and(|level| *level > width) {
                    levels.pop();
                }
                if levels.last() != Some(&width) {
                    diagnostics.push(Diagnostic::new(
                        number,
                        "unindent does not match any outer indentation level",
                    ));
                    levels.push(width);
                }
            }
        }

        if scan.feed(line) == Some(':') {
            awaiting_block = Some(number);
        }
    }

    if let Some(header) = awaiting_block {
        diagnostics.push(Diagnostic::new(
            line_count.max(header),
            format!("expected an indented block after line {}", header),
        ));
    }
    diagnostics
}

/// Column width of the leading whitespace, and the rest of the line
fn indentation(line: &str) -> (usize, &str) {
    let mut width = 0;
    for (idx, c) in line.char_indices() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / TAB_STOP + 1) * TAB_STOP,
            '\x0c' => width = 0,
            _ => return (width, line[idx..].trim_end()),
        }
    }
    (width, "")
}

/// Lexical state carried between physical lines
#[derive(Debug, Default)]
struct LineScanner {
    depth: usize,
    string: Option<(char, bool)>,
    continued: bool,
    last_significant: Option<char>,
}

impl LineScanner {
    fn at_logical_start(&self) -> bool {
        self.depth == 0 && self.string.is_none() && !self.continued
    }

    /// Consume one physical line; returns the last significant character
    /// when the line closes a logical line
    fn feed(&mut self, line: &str) -> Option<char> {
        let chars: Vec<char> = line.chars().collect();
        self.continued = false;
        let mut escaped_newline = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if let Some((quote, triple)) = self.string {
                if c == '\\' {
                    escaped_newline = i + 1 == chars.len();
                    i += 2;
                    continue;
                }
                if c == quote {
                    if !triple {
                        self.string = None;
                        self.last_significant = Some(c);
                    } else if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                        self.string = None;
                        self.last_significant = Some(c);
                        i += 3;
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            match c {
                '#' => break,
                '\'' | '"' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    self.string = Some((c, triple));
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                '\\' if i + 1 == chars.len() => self.continued = true,
                _ => {}
            }
            if !c.is_whitespace() {
                self.last_significant = Some(c);
            }
            i += 1;
        }

        // an unterminated single-quoted string ends at the newline
        if matches!(self.string, Some((_, false))) && !escaped_newline {
            self.string = None;
        }

        if self.at_logical_start() {
            self.last_significant.take()
        } else {
            None
        }
    }
}

fn collect_statement_errors(node: Node<'_>, diagnostics: &mut Vec<Diagnostic>) {
    let line = node.start_position().row + 1;
    match node.kind() {
        "print_statement" => {
            diagnostics.push(Diagnostic::new(line, "missing parentheses in call to 'print'"))
        }
        "exec_statement" => {
            diagnostics.push(Diagnostic::new(line, "missing parentheses in call to 'exec'"))
        }
        "return_statement" if !inside_function(node) => {
            diagnostics.push(Diagnostic::new(line, "'return' outside function"))
        }
        "break_statement" if !inside_loop(node) => {
            diagnostics.push(Diagnostic::new(line, "'break' outside loop"))
        }
        "continue_statement" if !inside_loop(node) => {
            diagnostics.push(Diagnostic::new(line, "'continue' not properly in loop"))
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_statement_errors(child, diagnostics);
    }
}

fn inside_function(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            "function_definition" => return true,
            "class_definition" | "module" => return false,
            _ => current = ancestor.parent(),
        }
    }
    false
}

/// A loop's `else` clause is not part of the loop body
fn inside_loop(node: Node<'_>) -> bool {
    let mut child = node;
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            "for_statement" | "while_statement" if child.kind() != "else_clause" => return true,
            "function_definition" | "class_definition" | "module" => return false,
            _ => {
                child = ancestor;
                current = ancestor.parent();
            }
        }
    }
    false
}

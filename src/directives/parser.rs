//! Tag-based directive parser
//!
//! Splits a model reply into typed directives. Recognized blocks:
//!
//! ```text
//! <file_modifications>
//!   <explanation>…</explanation>            (optional, becomes narrative)
//!   <file path="a.py" action="patch">…</file>
//! </file_modifications>
//!
//! <project_creation>
//!   <explanation>…</explanation>
//!   <file path="pkg/"></file>               (directory)
//!   <file path="pkg/main.py">…</file>
//! </project_creation>
//!
//! <search>query text</search>
//! <shell>command line</shell>
//! ```
//!
//! Parsing never fails. A block whose close marker is missing, or whose
//! content cannot be read, is demoted to narrative and reported as a
//! [`ParseWarning`]. Text outside blocks is kept in order as narrative.

use super::types::{
    Directive, FileModification, ParseOutput, ParseWarning, ScaffoldEntry, SearchRequest,
    WarningKind, WriteMode,
};

/// Top-level block kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    FileModifications,
    ProjectCreation,
    Search,
    Shell,
}

impl BlockKind {
    const ALL: [BlockKind; 4] = [
        BlockKind::FileModifications,
        BlockKind::ProjectCreation,
        BlockKind::Search,
        BlockKind::Shell,
    ];

    fn tag(&self) -> &'static str {
        match self {
            BlockKind::FileModifications => "file_modifications",
            BlockKind::ProjectCreation => "project_creation",
            BlockKind::Search => "search",
            BlockKind::Shell => "shell",
        }
    }
}

/// Open marker located in the raw text
#[derive(Debug, Clone, Copy)]
struct OpenMarker {
    kind: BlockKind,
    /// Byte offset of `<`
    start: usize,
    /// Byte offset just past `>`
    end: usize,
}

/// `<file …>` sub-block inside a container block
#[derive(Debug, Clone)]
struct FileElement {
    attributes: Vec<(String, String)>,
    body: String,
}

impl FileElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Problem found inside one block; the block is demoted to narrative
#[derive(Debug, Clone)]
struct BlockFault {
    tag: String,
    kind: WarningKind,
}

impl BlockFault {
    fn new(tag: &str, kind: WarningKind) -> Self {
        Self {
            tag: tag.to_string(),
            kind,
        }
    }
}

/// Stateless directive parser
#[derive(Debug, Clone, Default)]
pub struct DirectiveParser;

impl DirectiveParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw model reply
    ///
    /// ```text
    /// cursor ← 0, narrative_from ← 0
    /// while next open marker M at or after cursor:
    ///   C ← first close marker for M.kind after M
    ///   if C missing: warn, leave M..end as narrative, stop
    ///   if block body interprets to directives D:
    ///     emit narrative(narrative_from..M.start), emit D
    ///     narrative_from ← C.end
    ///   else: warn, leave M..C.end inside the pending narrative
    ///   cursor ← C.end
    /// emit narrative(narrative_from..end)
    /// ```
    ///
    /// Output order follows appearance order; whitespace-only narrative is
    /// dropped.
    pub fn parse(&self, raw: &str) -> ParseOutput {
        let mut output = ParseOutput::default();
        let mut cursor = 0;
        let mut narrative_from = 0;

        while let Some(marker) = find_open_marker(raw, cursor) {
            let close = format!("</{}>", marker.kind.tag());
            let Some(close_rel) = raw[marker.end..].find(&close) else {
                output.warnings.push(ParseWarning {
                    offset: marker.start,
                    tag: marker.kind.tag().to_string(),
                    kind: WarningKind::MissingCloseMarker,
                });
                break;
            };

            let body = &raw[marker.end..marker.end + close_rel];
            let block_end = marker.end + close_rel + close.len();

            match interpret_block(marker.kind, body) {
                Ok(directives) => {
                    push_narrative(&mut output, &raw[narrative_from..marker.start]);
                    output.directives.extend(directives);
                    narrative_from = block_end;
                }
                Err(fault) => {
                    tracing::debug!(tag = %fault.tag, offset = marker.start, "demoting block to narrative");
                    output.warnings.push(ParseWarning {
                        offset: marker.start,
                        tag: fault.tag,
                        kind: fault.kind,
                    });
                }
            }
            cursor = block_end;
        }

        push_narrative(&mut output, &raw[narrative_from..]);
        output
    }
}

/// Convenience wrapper around [`DirectiveParser::parse`]
pub fn parse(raw: &str) -> ParseOutput {
    DirectiveParser.parse(raw)
}

fn push_narrative(output: &mut ParseOutput, text: &str) {
    if !text.trim().is_empty() {
        output.directives.push(Directive::narrative(text.trim()));
    }
}

/// Find the earliest top-level open marker at or after `from`
fn find_open_marker(raw: &str, from: usize) -> Option<OpenMarker> {
    let mut search_from = from;
    while let Some(rel) = raw[search_from..].find('<') {
        let start = search_from + rel;
        let after = &raw[start + 1..];
        for kind in BlockKind::ALL {
            if let Some(end) = match_tag_open(after, kind.tag()) {
                return Some(OpenMarker {
                    kind,
                    start,
                    end: start + 1 + end,
                });
            }
        }
        search_from = start + 1;
    }
    None
}

/// If `text` (positioned after `<`) opens tag `name`, return the offset just
/// past its `>`. Attributes on block tags are tolerated and ignored.
fn match_tag_open(text: &str, name: &str) -> Option<usize> {
    let rest = text.strip_prefix(name)?;
    match rest.chars().next()? {
        '>' => Some(name.len() + 1),
        c if c.is_whitespace() => rest
            .find('>')
            .filter(|&gt| !rest[..gt].contains('<'))
            .map(|gt| name.len() + gt + 1),
        _ => None,
    }
}

fn interpret_block(kind: BlockKind, body: &str) -> Result<Vec<Directive>, BlockFault> {
    match kind {
        BlockKind::FileModifications => interpret_modifications(body),
        BlockKind::ProjectCreation => interpret_project(body),
        BlockKind::Search => {
            let query = body.trim();
            if query.is_empty() {
                return Err(BlockFault::new("search", WarningKind::EmptyBlock));
            }
            Ok(vec![Directive::SearchRequest(SearchRequest::new(query))])
        }
        BlockKind::Shell => {
            let command = normalize_body(body);
            if command.trim().is_empty() {
                return Err(BlockFault::new("shell", WarningKind::EmptyBlock));
            }
            Ok(vec![Directive::ShellCommand {
                command: command.trim().to_string(),
            }])
        }
    }
}

fn interpret_modifications(body: &str) -> Result<Vec<Directive>, BlockFault> {
    let (explanation, files) = read_container(body)?;
    if files.is_empty() {
        return Err(BlockFault::new("file_modifications", WarningKind::EmptyBlock));
    }

    let mut directives = Vec::with_capacity(files.len() + 1);
    if let Some(text) = explanation {
        directives.push(Directive::narrative(text));
    }

    for file in files {
        let mode = match file.attribute("action") {
            None => WriteMode::Overwrite,
            Some(value) => WriteMode::from_action(value).ok_or_else(|| {
                BlockFault::new(
                    "file",
                    WarningKind::InvalidAttribute {
                        attribute: "action".to_string(),
                        value: value.to_string(),
                    },
                )
            })?,
        };
        let path = file
            .attribute("path")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        directives.push(Directive::FileModification(FileModification {
            path,
            content: normalize_body(&file.body),
            mode,
        }));
    }

    Ok(directives)
}

fn interpret_project(body: &str) -> Result<Vec<Directive>, BlockFault> {
    let (explanation, files) = read_container(body)?;
    if files.is_empty() {
        return Err(BlockFault::new("project_creation", WarningKind::EmptyBlock));
    }

    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let path = file
            .attribute("path")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                BlockFault::new(
                    "file",
                    WarningKind::MissingAttribute {
                        attribute: "path".to_string(),
                    },
                )
            })?;

        let marked_directory = file
            .attribute("type")
            .map(|t| t.eq_ignore_ascii_case("directory") || t.eq_ignore_ascii_case("dir"))
            .unwrap_or(false);
        let content = normalize_body(&file.body);

        if path.ends_with('/') {
            let single_name = content.trim();
            // A one-word body under a directory path names a file inside it
            if !single_name.is_empty()
                && !single_name.contains(char::is_whitespace)
                && !marked_directory
            {
                entries.push(ScaffoldEntry::file(format!("{}{}", path, single_name), ""));
            } else {
                entries.push(ScaffoldEntry::directory(path.trim_end_matches('/')));
            }
        } else if marked_directory {
            entries.push(ScaffoldEntry::directory(path));
        } else {
            entries.push(ScaffoldEntry::file(path, content));
        }
    }

    let mut directives = Vec::with_capacity(2);
    if let Some(text) = explanation {
        directives.push(Directive::narrative(text));
    }
    directives.push(Directive::ProjectScaffold { entries });
    Ok(directives)
}

/// Read the optional `<explanation>` and every `<file>` element of a
/// container block
fn read_container(body: &str) -> Result<(Option<String>, Vec<FileElement>), BlockFault> {
    let mut explanation = None;
    let mut files = Vec::new();
    let mut pos = 0;

    loop {
        let next_expl = find_element(body, pos, "explanation");
        let next_file = find_element(body, pos, "file");

        let take_explanation = match (next_expl, next_file) {
            (None, None) => break,
            (Some(e), Some(f)) => e < f,
            (Some(_), None) => true,
            (None, Some(_)) => false,
        };

        if take_explanation {
            let start = next_expl.unwrap_or(pos);
            let open_end = body[start..]
                .find('>')
                .map(|gt| start + gt + 1)
                .ok_or_else(|| BlockFault::new("explanation", WarningKind::MalformedTag))?;
            let close_rel = body
                .get(open_end..)
                .and_then(|rest| rest.find("</explanation>"))
                .ok_or_else(|| BlockFault::new("explanation", WarningKind::MissingCloseMarker))?;
            let text = body[open_end..open_end + close_rel].trim();
            if !text.is_empty() {
                explanation = Some(text.to_string());
            }
            pos = open_end + close_rel + "</explanation>".len();
        } else {
            let start = next_file.unwrap_or(pos);
            let (element, end) = read_file_element(body, start)?;
            files.push(element);
            pos = end;
        }
    }

    Ok((explanation, files))
}

/// Offset of the next `<name>` / `<name …>` open marker
fn find_element(body: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut search_from = from;
    while let Some(rel) = body.get(search_from..)?.find(&needle) {
        let start = search_from + rel;
        let after = &body[start + needle.len()..];
        match after.chars().next() {
            Some('>') | Some('/') => return Some(start),
            Some(c) if c.is_whitespace() => return Some(start),
            _ => search_from = start + needle.len(),
        }
    }
    None
}

/// Read `<file attrs>body</file>` or `<file attrs/>` starting at `start`
fn read_file_element(body: &str, start: usize) -> Result<(FileElement, usize), BlockFault> {
    let (attributes, tag_end, self_closing) = read_attributes(body, start + "<file".len())?;
    if self_closing {
        return Ok((
            FileElement {
                attributes,
                body: String::new(),
            },
            tag_end,
        ));
    }

    let close_rel = body[tag_end..]
        .find("</file>")
        .ok_or_else(|| BlockFault::new("file", WarningKind::MissingCloseMarker))?;
    let element = FileElement {
        attributes,
        body: body[tag_end..tag_end + close_rel].to_string(),
    };
    Ok((element, tag_end + close_rel + "</file>".len()))
}

/// Read `name="value"` pairs up to `>` or `/>`
///
/// Returns the attributes, the offset just past the tag and whether the tag
/// was self-closing.
fn read_attributes(
    text: &str,
    from: usize,
) -> Result<(Vec<(String, String)>, usize, bool), BlockFault> {
    let malformed = || BlockFault::new("file", WarningKind::MalformedTag);
    let mut attributes = Vec::new();
    let mut chars = text[from..].char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let (offset, c) = chars.next().ok_or_else(malformed)?;
        match c {
            '>' => return Ok((attributes, from + offset + 1, false)),
            '/' => {
                return match chars.next() {
                    Some((gt, '>')) => Ok((attributes, from + gt + 1, true)),
                    _ => Err(malformed()),
                };
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                let mut name = String::from(c);
                while let Some((_, c)) =
                    chars.next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                {
                    name.push(c);
                }
                while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
                if chars.next_if(|(_, c)| *c == '=').is_none() {
                    // Bare attribute
                    attributes.push((name, String::new()));
                    continue;
                }
                while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

                let mut value = String::new();
                match chars.peek().map(|(_, c)| *c) {
                    Some(quote @ ('"' | '\'')) => {
                        chars.next();
                        loop {
                            match chars.next() {
                                Some((_, c)) if c == quote => break,
                                Some((_, c)) => value.push(c),
                                None => return Err(malformed()),
                            }
                        }
                    }
                    Some(_) => {
                        while let Some((_, c)) =
                            chars.next_if(|(_, c)| !c.is_whitespace() && *c != '>')
                        {
                            value.push(c);
                        }
                    }
                    None => return Err(malformed()),
                }
                attributes.push((name, value));
            }
            _ => return Err(malformed()),
        }
    }
}

/// Strip surrounding blank lines and an enclosing Markdown fence
fn normalize_body(body: &str) -> String {
    let trimmed = trim_blank_lines(body);
    match unwrap_fence(trimmed) {
        Some(inner) => trim_blank_lines(inner).to_string(),
        None => trimmed.to_string(),
    }
}

/// Drop whitespace-only leading lines and trailing whitespace while keeping
/// the first line's indentation
fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            start += line.len();
        } else {
            break;
        }
    }
    &text[start..]
}

fn unwrap_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let newline = rest.find('\n')?;
    let inner = rest[newline + 1..].strip_suffix("```")?;
    Some(inner)
}

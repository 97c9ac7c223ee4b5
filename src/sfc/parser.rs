//! Top-level block scanner for `.vue` files.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::LineIndex;

use super::{is_void_element, SfcBlock, SfcDescriptor, SourceLocation, SourcePosition};

/// Errors that make a document structurally unparsable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("element <{tag}> opened on line {line} is never closed")]
    UnclosedElement { tag: String, line: usize },

    #[error("expected </{expected}> but found </{found}> on line {line}")]
    MismatchedCloseTag {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("close tag </{tag}> on line {line} has no matching open tag")]
    StrayCloseTag { tag: String, line: usize },

    #[error("comment opened on line {line} is never closed")]
    UnclosedComment { line: usize },

    #[error("malformed tag on line {line}")]
    MalformedTag { line: usize },

    #[error("a single file component can contain only one {block} block (second one on line {line})")]
    DuplicateBlock { block: &'static str, line: usize },
}

/// Matches a `lang` attribute with a double-quoted, single-quoted or bare value.
static LANG_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)lang\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#).unwrap()
});

/// Matches a bare or valued `setup` attribute.
static SETUP_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)setup(?:\s|=|$)").unwrap());

/// An open tag as read from the source.
#[derive(Debug)]
struct OpenTag<'a> {
    name: &'a str,
    /// Raw attribute text between the name and the closing `>` (or `/>`).
    attrs: &'a str,
    self_closing: bool,
    /// Byte offset just past the `>`.
    end: usize,
}

struct Scanner<'a> {
    src: &'a str,
    index: LineIndex,
}

/// Parse an SFC into its top-level blocks.
///
/// Returns an error when the document cannot be split reliably: unclosed or
/// mismatched elements, stray close tags, malformed tags, or duplicate
/// template/script blocks.
pub fn parse(source: &str) -> Result<SfcDescriptor, ParseError> {
    let scanner = Scanner {
        src: source,
        index: LineIndex::new(source.to_string()),
    };
    scanner.descriptor()
}

impl<'a> Scanner<'a> {
    fn descriptor(&self) -> Result<SfcDescriptor, ParseError> {
        let mut descriptor = SfcDescriptor::default();
        let mut pos = 0;

        while let Some(rel) = self.src[pos..].find('<') {
            let at = pos + rel;
            let rest = &self.src[at..];

            if rest.starts_with("<!--") {
                pos = self.skip_comment(at)?;
                continue;
            }
            if rest.starts_with("</") && starts_with_alpha(&rest[2..]) {
                let (name, _) = self.read_close_tag(at)?;
                return Err(ParseError::StrayCloseTag {
                    tag: name.to_string(),
                    line: self.line(at),
                });
            }
            if !starts_with_alpha(&rest[1..]) {
                pos = at + 1;
                continue;
            }

            let tag = self.read_open_tag(at)?;
            let name = tag.name.to_ascii_lowercase();
            let (content_end, element_end) = if tag.self_closing {
                (tag.end, tag.end)
            } else if name == "script" || name == "style" {
                self.find_raw_close(&name, at, tag.end)?
            } else {
                self.find_element_close(tag.name, at, tag.end)?
            };
            pos = element_end;

            let block = SfcBlock {
                content: self.src[tag.end..content_end].to_string(),
                lang: lang_attr(tag.attrs),
                loc: SourceLocation {
                    start: self.position(at),
                    end: self.position(element_end),
                },
                content_range: tag.end..content_end,
            };

            let slot = match name.as_str() {
                "template" => Some((&mut descriptor.template, "<template>")),
                "script" if SETUP_ATTR.is_match(tag.attrs) => {
                    Some((&mut descriptor.script_setup, "<script setup>"))
                }
                "script" => Some((&mut descriptor.script, "<script>")),
                "style" => {
                    descriptor.styles.push(block);
                    continue;
                }
                _ => None,
            };

            if let Some((slot, label)) = slot {
                if slot.is_some() {
                    return Err(ParseError::DuplicateBlock {
                        block: label,
                        line: self.line(at),
                    });
                }
                *slot = Some(block);
            }
        }

        Ok(descriptor)
    }

    /// Read an open tag starting at the `<` at `at`.
    fn read_open_tag(&self, at: usize) -> Result<OpenTag<'a>, ParseError> {
        let bytes = self.src.as_bytes();
        let name_start = at + 1;
        let mut i = name_start;
        while i < bytes.len() && is_tag_name_byte(bytes[i]) {
            i += 1;
        }
        let name = &self.src[name_start..i];

        let attrs_start = i;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => break,
                None if b == b'<' => return Err(ParseError::MalformedTag { line: self.line(at) }),
                None => {}
            }
            i += 1;
        }
        if i >= bytes.len() {
            return Err(ParseError::MalformedTag { line: self.line(at) });
        }

        let raw_attrs = self.src[attrs_start..i].trim_end();
        let (attrs, self_closing) = match raw_attrs.strip_suffix('/') {
            Some(attrs) => (attrs, true),
            None => (raw_attrs, false),
        };

        Ok(OpenTag {
            name,
            attrs,
            self_closing,
            end: i + 1,
        })
    }

    /// Read a close tag starting at the `</` at `at`. Returns the tag name and
    /// the offset just past its `>`.
    fn read_close_tag(&self, at: usize) -> Result<(&'a str, usize), ParseError> {
        let bytes = self.src.as_bytes();
        let name_start = at + 2;
        let mut i = name_start;
        while i < bytes.len() && is_tag_name_byte(bytes[i]) {
            i += 1;
        }
        let name = &self.src[name_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'>') {
            return Err(ParseError::MalformedTag { line: self.line(at) });
        }
        Ok((name, i + 1))
    }

    /// Find the close tag of a raw-text element (`script`, `style`). Returns
    /// the content end and the element end.
    fn find_raw_close(
        &self,
        name: &str,
        open_at: usize,
        from: usize,
    ) -> Result<(usize, usize), ParseError> {
        let mut pos = from;
        while let Some(rel) = self.src[pos..].find("</") {
            let at = pos + rel;
            let candidate = &self.src[at + 2..];
            let matches_name = candidate
                .get(..name.len())
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
                && !candidate
                    .as_bytes()
                    .get(name.len())
                    .is_some_and(|&b| is_tag_name_byte(b));
            if matches_name {
                let (_, end) = self.read_close_tag(at)?;
                return Ok((at, end));
            }
            pos = at + 2;
        }
        Err(ParseError::UnclosedElement {
            tag: name.to_string(),
            line: self.line(open_at),
        })
    }

    /// Find the close tag matching an element whose body is markup, checking
    /// that every nested element is balanced along the way.
    fn find_element_close(
        &self,
        root: &'a str,
        open_at: usize,
        from: usize,
    ) -> Result<(usize, usize), ParseError> {
        let mut stack: Vec<(&'a str, usize)> = vec![(root, open_at)];
        let mut pos = from;

        while let Some(rel) = self.src[pos..].find(&['<', '{'][..]) {
            let at = pos + rel;
            let rest = &self.src[at..];

            if rest.starts_with("{{") {
                pos = self.skip_interpolation(at);
            } else if rest.starts_with("<!--") {
                pos = self.skip_comment(at)?;
            } else if rest.starts_with("</") && starts_with_alpha(&rest[2..]) {
                let (name, end) = self.read_close_tag(at)?;
                let Some((open, _)) = stack.pop() else {
                    break;
                };
                if !open.eq_ignore_ascii_case(name) {
                    return Err(ParseError::MismatchedCloseTag {
                        expected: open.to_string(),
                        found: name.to_string(),
                        line: self.line(at),
                    });
                }
                if stack.is_empty() {
                    return Ok((at, end));
                }
                pos = end;
            } else if rest.starts_with('<') && starts_with_alpha(&rest[1..]) {
                let tag = self.read_open_tag(at)?;
                if !tag.self_closing && !is_void_element(tag.name) {
                    stack.push((tag.name, at));
                }
                pos = tag.end;
            } else {
                pos = at + 1;
            }
        }

        let (tag, at) = stack.last().copied().unwrap_or((root, open_at));
        Err(ParseError::UnclosedElement {
            tag: tag.to_string(),
            line: self.line(at),
        })
    }

    /// Skip a comment starting at `at`, returning the offset past `-->`.
    fn skip_comment(&self, at: usize) -> Result<usize, ParseError> {
        self.src[at + 4..]
            .find("-->")
            .map(|rel| at + 4 + rel + 3)
            .ok_or(ParseError::UnclosedComment { line: self.line(at) })
    }

    /// Skip a `{{ }}` interpolation starting at `at`. An interpolation that is
    /// never closed is plain text.
    fn skip_interpolation(&self, at: usize) -> usize {
        match self.src[at + 2..].find("}}") {
            Some(rel) => at + 2 + rel + 2,
            None => at + 2,
        }
    }

    fn line(&self, offset: usize) -> usize {
        self.index.line_of(offset) + 1
    }

    fn position(&self, offset: usize) -> SourcePosition {
        let line = self.index.line_of(offset);
        let line_start = self.index.line_start(line).unwrap_or(0);
        SourcePosition {
            offset,
            line: line + 1,
            column: self.src[line_start..offset].chars().count() + 1,
        }
    }
}

fn starts_with_alpha(s: &str) -> bool {
    s.as_bytes().first().is_some_and(u8::is_ascii_alphabetic)
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn lang_attr(attrs: &str) -> Option<String> {
    let caps = LANG_ATTR.captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
        .filter(|lang| !lang.is_empty())
}

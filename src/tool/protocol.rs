//! tool::protocol
//!
//! Framing of the interactive tool's output stream and the exact command
//! strings sent to it.
//!
//! # Framing
//!
//! The tool prints no message delimiters. A response ends when the prompt
//! appears again. [`PromptFramer`] consumes the stream one character at a
//! time:
//! - a line terminator flushes the current line if it is not blank
//! - every other character advances a rolling match against the prompt; a
//!   mismatch restarts the match at 1 if the character is the prompt's
//!   first character, at 0 otherwise
//! - a full match strips the prompt from the current line, flushes what is
//!   left and completes the response
//!
//! The restart rule is only correct when the prompt contains its first
//! character once, which [`PromptFramer::new`] enforces.

use thiserror::Error;

/// Reserved separator between fields of `desc -fmt` output.
pub const FIELD_SEPARATOR: char = '§';

/// Errors from protocol setup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("prompt cannot be empty")]
    EmptyPrompt,

    #[error("prompt {0:?} repeats its first character")]
    AmbiguousPrompt(String),

    #[error("prompt {0:?} contains a line break")]
    MultilinePrompt(String),
}

/// Incremental splitter of the tool's stdout into responses.
#[derive(Debug, Clone)]
pub struct PromptFramer {
    prompt: Vec<char>,
    prompt_bytes: usize,
    matched: usize,
    line: String,
    lines: Vec<String>,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl PromptFramer {
    pub fn new(prompt: &str) -> Result<Self, ProtocolError> {
        let chars: Vec<char> = prompt.chars().collect();
        let first = *chars.first().ok_or(ProtocolError::EmptyPrompt)?;
        if chars[1..].contains(&first) {
            return Err(ProtocolError::AmbiguousPrompt(prompt.to_string()));
        }
        if chars.iter().any(|c| matches!(c, '\r' | '\n')) {
            return Err(ProtocolError::MultilinePrompt(prompt.to_string()));
        }
        Ok(Self {
            prompt: chars,
            prompt_bytes: prompt.len(),
            matched: 0,
            line: String::new(),
            lines: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Feed one character. Returns the completed response when the prompt
    /// has just been matched.
    pub fn push(&mut self, c: char) -> Option<Vec<String>> {
        match c {
            '\r' | '\n' => {
                self.flush_line();
                self.matched = 0;
                None
            }
            _ => {
                self.line.push(c);
                if self.prompt[self.matched] == c {
                    self.matched += 1;
                    if self.matched == self.prompt.len() {
                        let keep = self.line.len() - self.prompt_bytes;
                        self.line.truncate(keep);
                        self.flush_line();
                        self.matched = 0;
                        return Some(std::mem::take(&mut self.lines));
                    }
                } else {
                    self.matched = usize::from(c == self.prompt[0]);
                }
                None
            }
        }
    }

    /// Feed raw bytes, decoding UTF-8 across chunk boundaries.
    ///
    /// Invalid sequences are replaced with U+FFFD.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<Vec<String>> {
        self.pending.extend_from_slice(bytes);
        let mut buffer = std::mem::take(&mut self.pending);
        let mut responses = Vec::new();
        let mut rest: &[u8] = &buffer;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    responses.extend(text.chars().filter_map(|c| self.push(c)));
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix decodes
                    let text = std::str::from_utf8(valid).unwrap_or_default();
                    responses.extend(text.chars().filter_map(|c| self.push(c)));
                    match e.error_len() {
                        Some(len) => {
                            responses.extend(self.push(char::REPLACEMENT_CHARACTER));
                            rest = &tail[len..];
                        }
                        None => {
                            rest = tail;
                            break;
                        }
                    }
                }
            }
        }
        let consumed = buffer.len() - rest.len();
        buffer.drain(..consumed);
        self.pending = buffer;
        responses
    }

    /// Lines collected so far for the response in progress.
    pub fn partial(&self) -> &[String] {
        &self.lines
    }

    fn flush_line(&mut self) {
        let line = std::mem::take(&mut self.line);
        if !line.trim().is_empty() {
            self.lines.push(line);
        }
    }
}

/// Command lines understood by the tool.
pub mod command {
    use super::FIELD_SEPARATOR;

    pub fn cd(dir: &str) -> String {
        format!("cd \"{dir}\"")
    }

    pub fn pwd() -> String {
        "pwd".to_string()
    }

    pub fn version_tree(element: &str) -> String {
        format!("lsvtree -short -all -obsolete \"{element}\"")
    }

    pub fn list_directory(versioned: &str) -> String {
        format!("ls -dump \"{versioned}\"")
    }

    /// `element` must already carry its trailing `@@`.
    pub fn object_id(element: &str) -> String {
        format!("desc -fmt %On{FIELD_SEPARATOR}%m \"{element}\"")
    }

    pub fn predecessor(version: &str) -> String {
        format!("desc -pred -s \"{version}\"")
    }

    pub fn version_metadata(version: &str) -> String {
        let s = FIELD_SEPARATOR;
        format!("desc -fmt %Fu{s}%u{s}%Nd{s}%Nc{s}%Nl{s}%[hlink:Merge]p \"{version}\"")
    }

    pub fn get(to: &str, versioned: &str) -> String {
        format!("get -to {to} \"{versioned}\"")
    }

    pub fn quit() -> String {
        "quit".to_string()
    }
}

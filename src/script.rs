//! Script documents and header parsing.
//!
//! A script is plain text. Its first line is the header naming the target
//! organization and the routing path:
//!
//! ```text
//! connect <address> <segment>... [@context:<url>]
//! ```
//!
//! Every following line is the body, handed verbatim to the execution
//! engine. The header is parsed by a small hand-written scanner; nothing here
//! touches the network.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::is_hex_address;
use crate::error::ScriptError;

const CONNECT_KEYWORD: &str = "connect";
const CONTEXT_MARKER: &str = "@context:";

/// Raw script text as authored by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptDocument {
    text: String,
}

impl ScriptDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// First line, without its line terminator.
    pub fn header(&self) -> &str {
        let line = self.text.split('\n').next().unwrap_or_default();
        line.strip_suffix('\r').unwrap_or(line)
    }

    /// Everything after the first line.
    pub fn body(&self) -> &str {
        self.text
            .split_once('\n')
            .map(|(_, body)| body)
            .unwrap_or_default()
    }

    pub fn parse(&self) -> Result<ForwardRequest, ScriptError> {
        let header = parse_header(self.header())?;
        Ok(ForwardRequest {
            organization_address: header.organization_address,
            path: header.path,
            context: header.context,
            body: self.body().to_string(),
        })
    }
}

impl From<String> for ScriptDocument {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for ScriptDocument {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for ScriptDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A validated request to forward a script body through an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub organization_address: String,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub body: String,
}

impl ForwardRequest {
    /// Application the forward finally lands in.
    pub fn target_app(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }
}

/// Parsed header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub organization_address: String,
    pub path: Vec<String>,
    pub context: Option<String>,
}

/// Parse a header line.
///
/// Shape errors come first: a line that does not fit the grammar at all is
/// [`ScriptError::MalformedHeader`], even if its address is also invalid.
pub fn parse_header(line: &str) -> Result<Header, ScriptError> {
    let mut scanner = Scanner::new(line.trim_end());

    scanner.keyword(CONNECT_KEYWORD)?;
    scanner.space()?;
    let address = scanner.token(is_address_char)?;

    let mut segments = Vec::new();
    while scanner.peek_segment() {
        scanner.space()?;
        segments.push(scanner.token(is_segment_char)?.trim().to_string());
    }
    if segments.is_empty() {
        return Err(ScriptError::MalformedHeader);
    }

    let context = if scanner.at_end() {
        None
    } else {
        scanner.space()?;
        scanner.keyword(CONTEXT_MARKER)?;
        let rest = scanner.rest();
        if rest.is_empty() {
            return Err(ScriptError::MalformedHeader);
        }
        Some(rest.trim().to_string()).filter(|url| !url.is_empty())
    };

    if !is_hex_address(address) {
        return Err(ScriptError::UnsupportedAddressForm(address.to_string()));
    }

    Ok(Header {
        organization_address: address.to_string(),
        path: segments,
        context,
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_address_char(c: char) -> bool {
    is_word_char(c) || c == '.' || c == '-'
}

fn is_segment_char(c: char) -> bool {
    is_address_char(c) || c == ':'
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn keyword(&mut self, keyword: &str) -> Result<(), ScriptError> {
        if self.remaining().starts_with(keyword) {
            self.pos += keyword.len();
            Ok(())
        } else {
            Err(ScriptError::MalformedHeader)
        }
    }

    fn space(&mut self) -> Result<(), ScriptError> {
        self.keyword(" ")
    }

    fn token(&mut self, accept: fn(char) -> bool) -> Result<&'a str, ScriptError> {
        let rest = self.remaining();
        let len = rest
            .char_indices()
            .find(|&(_, c)| !accept(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(ScriptError::MalformedHeader);
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// Whether a single space followed by a path segment comes next.
    fn peek_segment(&self) -> bool {
        let mut chars = self.remaining().chars();
        chars.next() == Some(' ') && chars.next().is_some_and(is_segment_char)
    }

    fn rest(&mut self) -> &'a str {
        let rest = self.remaining();
        self.pos = self.input.len();
        rest
    }
}

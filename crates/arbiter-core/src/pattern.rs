//! Path templates for pattern grants
//!
//! Templates follow the Express route dialect that container managers already
//! write: `/data/:id`, `/files/*`, `/ts/:sensor/:from?`, `/v:major(\d+)/x`.
//! A template compiles to an anchored, case-insensitive regular expression
//! that tolerates a single trailing slash.

use regex::Regex;
use std::fmt;

use crate::error::{CoreError, Result};

/// A compiled path template
#[derive(Clone)]
pub struct PathPattern {
    template: String,
    matcher: Regex,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.template).finish()
    }
}

impl PathPattern {
    /// Compile a template
    pub fn compile(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let tokens = tokenize(&template)?;
        let source = to_regex_source(&tokens);

        let matcher = Regex::new(&source).map_err(|e| CoreError::InvalidPattern {
            template: template.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { template, matcher })
    }

    /// The template this pattern was compiled from
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Test a concrete request path
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Param {
        prefix: Option<char>,
        pattern: String,
        optional: bool,
        repeat: bool,
    },
}

fn invalid(template: &str, reason: &str) -> CoreError {
    CoreError::InvalidPattern {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn starts_param(chars: &[char], i: usize) -> bool {
    match chars.get(i) {
        Some(':') => chars.get(i + 1).is_some_and(|c| is_word(*c)),
        Some('(') | Some('*') => true,
        _ => false,
    }
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = template.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\\' {
            let escaped = chars
                .get(i + 1)
                .ok_or_else(|| invalid(template, "trailing escape"))?;
            literal.push(*escaped);
            i += 2;
            continue;
        }

        let (prefix, start) = if (c == '/' || c == '.') && starts_param(&chars, i + 1) {
            (Some(c), i + 1)
        } else if starts_param(&chars, i) {
            (None, i)
        } else {
            literal.push(c);
            i += 1;
            continue;
        };

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }

        let (param, next) = parse_param(template, &chars, start, prefix)?;
        tokens.push(param);
        i = next;
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok(tokens)
}

fn parse_param(
    template: &str,
    chars: &[char],
    start: usize,
    prefix: Option<char>,
) -> Result<(Token, usize)> {
    let delimiter = prefix.unwrap_or('/');
    let mut i = start;

    if chars[i] == '*' {
        let token = Token::Param {
            prefix,
            pattern: ".*".into(),
            optional: false,
            repeat: false,
        };
        return Ok((token, i + 1));
    }

    let mut pattern = format!("[^{}]+?", regex::escape(&delimiter.to_string()));

    if chars[i] == ':' {
        i += 1;
        while chars.get(i).is_some_and(|c| is_word(*c)) {
            i += 1;
        }
    }

    if chars.get(i) == Some(&'(') {
        let (group, next) = parse_group(template, chars, i)?;
        pattern = group;
        i = next;
    }

    let (optional, repeat) = match chars.get(i) {
        Some('?') => (true, false),
        Some('+') => (false, true),
        Some('*') => (true, true),
        _ => (false, false),
    };
    if optional || repeat {
        i += 1;
    }

    let token = Token::Param {
        prefix,
        pattern,
        optional,
        repeat,
    };
    Ok((token, i))
}

/// Read a `( ... )` group starting at `open`; nesting is not supported
fn parse_group(template: &str, chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut group = String::new();
    let mut i = open + 1;

    loop {
        match chars.get(i) {
            None => return Err(invalid(template, "unterminated group")),
            Some('\\') => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| invalid(template, "trailing escape"))?;
                group.push('\\');
                group.push(*escaped);
                i += 2;
            }
            Some('(') => return Err(invalid(template, "nested groups are not supported")),
            Some(')') => break,
            Some(c) => {
                group.push(*c);
                i += 1;
            }
        }
    }

    if group.is_empty() {
        return Err(invalid(template, "empty group"));
    }

    Ok((group, i + 1))
}

fn to_regex_source(tokens: &[Token]) -> String {
    let mut route = String::from("(?i)^");

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(text) => {
                // Non-strict: a trailing delimiter is matched optionally below
                let text = if idx + 1 == tokens.len() {
                    text.strip_suffix('/').unwrap_or(text)
                } else {
                    text
                };
                route.push_str(&regex::escape(text));
            }
            Token::Param {
                prefix,
                pattern,
                optional,
                repeat,
            } => {
                let prefix = prefix
                    .map(|p| regex::escape(&p.to_string()))
                    .unwrap_or_default();

                let mut capture = format!("(?:{})", pattern);
                if *repeat {
                    capture = format!("{capture}(?:{prefix}{capture})*");
                }

                let part = match (*optional, prefix.is_empty()) {
                    (true, true) => format!("({capture})?"),
                    (true, false) => format!("(?:{prefix}({capture}))?"),
                    (false, _) => format!("{prefix}({capture})"),
                };
                route.push_str(&part);
            }
        }
    }

    route.push_str("/?$");
    route
}

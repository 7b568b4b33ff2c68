//! Tokenizer and block parser for the directive config format.
//!
//! ```text
//! ask_redis {
//!     host 127.0.0.1
//!     key  domains
//! }
//!
//! permission redis {
//!     address  "10.0.0.5:6379"
//!     prefix   certificates/   # trailing comment
//! }
//! ```

use super::ConfigError;

/// A single `name [args...]` line inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub line: usize,
}

impl Directive {
    /// First argument, if any.
    pub fn value(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// A top-level `name [args...] { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub args: Vec<String>,
    pub directives: Vec<Directive>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
}

fn syntax(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Syntax {
        line,
        message: message.into(),
    }
}

/// Split one line into tokens. Quoted words keep their whitespace and never
/// count as braces or comments.
fn tokenize_line(text: &str, line: usize) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '"' {
            chars.next();
            let mut word = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped @ ('"' | '\\')) => word.push(escaped),
                        Some(other) => {
                            word.push('\\');
                            word.push(other);
                        }
                        None => word.push('\\'),
                    },
                    other => word.push(other),
                }
            }
            if !closed {
                return Err(syntax(line, "unterminated quoted string"));
            }
            tokens.push(Token::Word(word));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(match word.as_str() {
            "{" => Token::Open,
            "}" => Token::Close,
            _ => Token::Word(word),
        });
    }

    Ok(tokens)
}

/// Parse directive text into its top-level blocks, in source order.
pub fn parse(text: &str) -> Result<Vec<Block>, ConfigError> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let mut tokens = tokenize_line(raw, line)?;
        if tokens.is_empty() {
            continue;
        }

        let closes = tokens.last() == Some(&Token::Close);
        if closes {
            tokens.pop();
        }
        let opens = tokens.last() == Some(&Token::Open);
        if opens {
            tokens.pop();
        }

        let mut words = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Word(w) => words.push(w),
                Token::Open | Token::Close => {
                    return Err(syntax(line, "braces must end a line"));
                }
            }
        }

        if opens {
            if current.is_some() {
                return Err(syntax(line, "nested blocks are not supported"));
            }
            let mut words = words.into_iter();
            let name = words
                .next()
                .ok_or_else(|| syntax(line, "block is missing a name"))?;
            current = Some(Block {
                name,
                args: words.collect(),
                directives: Vec::new(),
                line,
            });
        } else if !words.is_empty() {
            let block = current
                .as_mut()
                .ok_or_else(|| syntax(line, "directive outside of a block"))?;
            let mut words = words.into_iter();
            // `words` is non-empty, so there is always a name.
            if let Some(name) = words.next() {
                block.directives.push(Directive {
                    name,
                    args: words.collect(),
                    line,
                });
            }
        }

        if closes {
            if opens {
                return Err(syntax(line, "empty blocks must span two lines"));
            }
            let block = current
                .take()
                .ok_or_else(|| syntax(line, "unexpected '}'"))?;
            blocks.push(block);
        }
    }

    if let Some(block) = current {
        return Err(syntax(block.line, format!("block '{}' is never closed", block.name)));
    }

    Ok(blocks)
}

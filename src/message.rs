//! Message tokens and the shared helpers every node family leans on.
//!
//! A message is an ordered, immutable sequence of tokens. Each token is either
//! a number or a string. `bang` is the one-token message `["bang"]`.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single message token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// Numeric token.
    Float(f64),
    /// String token.
    Symbol(String),
}

impl Token {
    /// Returns the numeric value, if this is a float token.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Token::Float(v) => Some(*v),
            Token::Symbol(_) => None,
        }
    }

    /// Returns the string value, if this is a symbol token.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Token::Float(_) => None,
            Token::Symbol(s) => Some(s),
        }
    }
}

impl From<f64> for Token {
    fn from(v: f64) -> Self {
        Token::Float(v)
    }
}

impl From<i32> for Token {
    fn from(v: i32) -> Self {
        Token::Float(v as f64)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Symbol(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Symbol(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Float(v) => write!(f, "{}", v),
            Token::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// An immutable token sequence. Cloning shares the underlying storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message(Arc<[Token]>);

impl Message {
    /// Build a message from tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens.into())
    }

    /// The `["bang"]` message.
    pub fn bang() -> Self {
        Self::new(vec![Token::Symbol("bang".to_string())])
    }

    /// A single float message.
    pub fn float(v: f64) -> Self {
        Self::new(vec![Token::Float(v)])
    }

    /// A single symbol message.
    pub fn symbol(s: impl Into<String>) -> Self {
        Self::new(vec![Token::Symbol(s.into())])
    }

    /// Borrow the tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the zero-token message.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Token at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.0.get(index)
    }

    /// True if the token at `index` is a float.
    pub fn is_float_token(&self, index: usize) -> bool {
        matches!(self.0.get(index), Some(Token::Float(_)))
    }

    /// True if the token at `index` is a string.
    pub fn is_symbol_token(&self, index: usize) -> bool {
        matches!(self.0.get(index), Some(Token::Symbol(_)))
    }

    /// Reads the float at `index`.
    pub fn read_float(&self, index: usize) -> Option<f64> {
        self.0.get(index).and_then(Token::as_float)
    }

    /// Reads the string at `index`.
    pub fn read_symbol(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(Token::as_symbol)
    }

    /// True for exactly `["bang"]`.
    pub fn is_bang(&self) -> bool {
        self.0.len() == 1 && self.read_symbol(0) == Some("bang")
    }

    /// True for a message holding exactly one float.
    pub fn is_single_float(&self) -> bool {
        self.0.len() == 1 && self.is_float_token(0)
    }

    /// True if the first token is the given keyword.
    pub fn starts_with(&self, keyword: &str) -> bool {
        self.read_symbol(0) == Some(keyword)
    }

    /// Drops the leading token.
    pub fn shift(&self) -> Message {
        Message::new(self.0.iter().skip(1).cloned().collect())
    }

    /// Replaces an empty message by `bang`.
    pub fn empty_to_bang(self) -> Message {
        if self.is_empty() {
            Message::bang()
        } else {
            self
        }
    }
}

impl From<Vec<Token>> for Message {
    fn from(tokens: Vec<Token>) -> Self {
        Message::new(tokens)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// Build a message from a list of token-convertible values.
///
/// ```
/// use patchcore::msg;
/// let m = msg!["set", 2.5];
/// assert_eq!(m.len(), 2);
/// ```
#[macro_export]
macro_rules! msg {
    () => {
        $crate::message::Message::new(::std::vec::Vec::new())
    };
    ($($token:expr),+ $(,)?) => {
        $crate::message::Message::new(vec![$($crate::message::Token::from($token)),+])
    };
}

//! Reducing source text to the three significant characters.
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TokenKind {
    Space,
    Tab,
    Newline,
}

impl TokenKind {
    /// Maps a source character to its token kind. Every other character is a comment.
    pub fn from_char(c: char) -> Option<TokenKind> {
        match c {
            ' ' => Some(TokenKind::Space),
            '\t' => Some(TokenKind::Tab),
            '\n' => Some(TokenKind::Newline),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            TokenKind::Space => ' ',
            TokenKind::Tab => '\t',
            TokenKind::Newline => '\n',
        }
    }

    /// Letter used in diagnostics and in the `S`/`T`/`N` notation.
    pub fn letter(self) -> char {
        match self {
            TokenKind::Space => 'S',
            TokenKind::Tab => 'T',
            TokenKind::Newline => 'N',
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Space => "SPACE",
            TokenKind::Tab => "TAB",
            TokenKind::Newline => "NEWLINE",
        })
    }
}

/// A significant character together with its offset in the source text.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Zero-based character offset in the source text.
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Token { kind, offset }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]->{}", self.offset, self.kind.letter())
    }
}

pub fn tokenize(text: &str) -> Vec<Token> {
    text.chars()
        .enumerate()
        .filter_map(|(offset, c)| TokenKind::from_char(c).map(|kind| Token::new(kind, offset)))
        .collect()
}

/// Renders tokens back into whitespace source.
pub fn tokens_to_string(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.kind.to_char()).collect()
}

/// Expands the human-writable letter notation into real whitespace.
///
/// `S`, `T` and `N` become space, tab and newline, and the escapes `\t` and `\n`
/// become tab and newline. Literal whitespace in the notation is layout and is dropped.
/// Everything else is copied as is, so annotated programs keep their comments,
/// which the tokenizer later ignores.
///
/// ```
/// use whitespace::token::expand_notation;
///
/// assert_eq!(expand_notation("SS push TN"), "  push\t\n");
/// assert_eq!(expand_notation(r"\t\n"), "\t\n");
/// ```
pub fn expand_notation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            'S' => result.push(' '),
            'T' => result.push('\t'),
            'N' => result.push('\n'),
            '\\' => match chars.peek() {
                Some('t') => {
                    chars.next();
                    result.push('\t');
                }
                Some('n') => {
                    chars.next();
                    result.push('\n');
                }
                _ => result.push('\\'),
            },
            ' ' | '\t' | '\n' | '\r' => {}
            c => result.push(c),
        }
    }
    result
}

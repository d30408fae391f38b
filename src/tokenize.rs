use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

const FOOTNOTE_OPEN: &str = "[[fn:";
const FOOTNOTE_CLOSE: &str = "]]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    FootnoteRef,
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Word,
            text: text.into(),
        }
    }

    pub fn footnote_ref(text: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::FootnoteRef,
            text: text.into(),
        }
    }

    pub fn line_break() -> Self {
        Self {
            kind: TokenKind::LineBreak,
            text: "\n".to_owned(),
        }
    }
}

/// Memoizing tokenizer for chapter prose.
///
/// Results are cached by the exact input string for the lifetime of the
/// tokenizer. Authored text is small, so the cache is never evicted.
#[derive(Debug, Default)]
pub struct Tokenizer {
    cache: Mutex<HashMap<String, Arc<[Token]>>>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokenize(&self, text: &str) -> Arc<[Token]> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tokens) = cache.get(text) {
            return Arc::clone(tokens);
        }
        let tokens: Arc<[Token]> = tokenize_uncached(text).into();
        cache.insert(text.to_owned(), Arc::clone(&tokens));
        tokens
    }

    pub fn cached_entries(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Splits `text` into words and inline `[[fn: ...]]` footnote references.
///
/// A marker closes at the first `]]` after its opening; an unclosed marker is
/// ordinary text. Markers whose trimmed body is empty produce no token. Each
/// newline outside a marker yields a `LineBreak` token; a marker body keeps its
/// newlines.
pub fn tokenize_uncached(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    while let Some(rel) = text[cursor..].find(FOOTNOTE_OPEN) {
        let start = cursor + rel;
        let body_start = start + FOOTNOTE_OPEN.len();
        let Some(close_rel) = text[body_start..].find(FOOTNOTE_CLOSE) else {
            break;
        };
        let body_end = body_start + close_rel;

        push_words(&text[cursor..start], &mut tokens);
        let inner = text[body_start..body_end].trim();
        if !inner.is_empty() {
            tokens.push(Token::footnote_ref(inner));
        }
        cursor = body_end + FOOTNOTE_CLOSE.len();
    }

    push_words(&text[cursor..], &mut tokens);
    tokens
}

fn push_words(segment: &str, tokens: &mut Vec<Token>) {
    for (idx, line) in segment.split('\n').enumerate() {
        if idx > 0 {
            tokens.push(Token::line_break());
        }
        tokens.extend(line.split_whitespace().map(Token::word));
    }
}

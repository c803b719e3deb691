use std::fmt;

/// One lexical unit of an input line.
pub type Token = String;

/// A program name followed by its arguments. Never empty after splitting.
pub type Command = Vec<Token>;

/// Commands connected left to right by pipes.
pub type Pipeline = Vec<Command>;

/// The token that separates pipeline stages.
pub const PIPE: &str = "|";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line ended inside a single- or double-quoted run.
    UnmatchedQuote,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnmatchedQuote => f.write_str("unmatched quote"),
        }
    }
}

impl std::error::Error for ParseError {}

/// States for the tokenizer state machine.
enum State {
    /// Outside quotes: whitespace separates tokens
    Normal,
    /// Inside '...': everything is literal
    SingleQuote,
    /// Inside "...": only a few backslash escapes apply
    DoubleQuote,
}

/// Characters a backslash may escape inside double quotes.
fn escapable_in_double_quotes(c: char) -> bool {
    matches!(c, '"' | '\\' | '$' | '`' | '\n')
}

fn flush(current: &mut String, tokens: &mut Vec<Token>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Split a raw line into tokens, honoring quotes and backslash escapes.
///
/// An unquoted `|` is always emitted as its own token. Quoting only groups
/// characters; it leaves no marker on the token, so `''` contributes nothing.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            // ── Normal ──
            (State::Normal, c) if c.is_whitespace() => flush(&mut current, &mut tokens),
            (State::Normal, '|') => {
                flush(&mut current, &mut tokens);
                tokens.push(PIPE.to_string());
            }
            (State::Normal, '\'') => state = State::SingleQuote,
            (State::Normal, '"') => state = State::DoubleQuote,
            (State::Normal, '\\') => {
                // A lone trailing backslash stays literal.
                current.push(chars.next().unwrap_or('\\'));
            }
            (State::Normal, c) => current.push(c),

            // ── '...' ──
            (State::SingleQuote, '\'') => state = State::Normal,
            (State::SingleQuote, c) => current.push(c),

            // ── "..." ──
            (State::DoubleQuote, '"') => state = State::Normal,
            (State::DoubleQuote, '\\') => match chars.peek() {
                Some(&next) if escapable_in_double_quotes(next) => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            (State::DoubleQuote, c) => current.push(c),
        }
    }

    if !matches!(state, State::Normal) {
        return Err(ParseError::UnmatchedQuote);
    }

    flush(&mut current, &mut tokens);
    Ok(tokens)
}

/// Group tokens into pipeline stages on the `|` separator.
///
/// Returns `None` for a leading, trailing or doubled separator, and for an
/// empty token list.
pub fn split_pipeline(tokens: &[Token]) -> Option<Pipeline> {
    let mut commands = Vec::new();
    let mut current: Command = Vec::new();

    for token in tokens {
        if token == PIPE {
            if current.is_empty() {
                return None;
            }
            commands.push(std::mem::take(&mut current));
        } else {
            current.push(token.clone());
        }
    }

    if current.is_empty() {
        return None;
    }

    commands.push(current);
    Some(commands)
}

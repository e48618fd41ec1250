//! Splits rule text into words, quoted strings and operator symbols.

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Not,
    And,
    Or,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    /// Text between matching quotes, never interpreted.
    Quoted(String),
    Symbol(Symbol),
}

fn is_symbol_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>' | '&' | '|' | '(' | ')')
}

fn is_word_char(c: char) -> bool {
    !(c.is_whitespace() || c == '\'' || c == '"' || is_symbol_char(c))
}

/// Tokenizes a rule.
///
/// # Errors
///
/// Returns the cause when a quote is left open or a symbol is not part of the vocabulary.
pub fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut quoted = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == c {
                    closed = true;
                    break;
                }
                quoted.push(next);
            }
            if !closed {
                return Err(format!("unterminated quote in `{text}`"));
            }
            tokens.push(Token::Quoted(quoted));
            continue;
        }

        if is_symbol_char(c) {
            chars.next();
            let doubled = chars.peek().copied();
            let symbol = match (c, doubled) {
                ('=', Some('=')) | ('!', Some('=')) | ('<', Some('=')) | ('>', Some('=')) => {
                    chars.next();
                    // `===` and `!==` read the same as their short forms
                    if chars.peek() == Some(&'=') {
                        chars.next();
                    }
                    match c {
                        '=' => Symbol::Eq,
                        '!' => Symbol::Ne,
                        '<' => Symbol::Le,
                        _ => Symbol::Ge,
                    }
                }
                ('&', Some('&')) => {
                    chars.next();
                    Symbol::And
                }
                ('|', Some('|')) => {
                    chars.next();
                    Symbol::Or
                }
                ('=', _) => Symbol::Eq,
                ('!', _) => Symbol::Not,
                ('<', _) => Symbol::Lt,
                ('>', _) => Symbol::Gt,
                ('(', _) => Symbol::Open,
                (')', _) => Symbol::Close,
                (other, _) => return Err(format!("unexpected `{other}`")),
            };
            tokens.push(Token::Symbol(symbol));
            continue;
        }

        let mut word = String::new();
        while let Some(&next) = chars.peek() {
            if !is_word_char(next) {
                break;
            }
            word.push(next);
            chars.next();
        }
        tokens.push(Token::Word(word));
    }

    Ok(tokens)
}

//! Selector tokenizer.
//!
//! Splits selector text into runs of ordinary characters and single
//! special characters. The builder decides what each special character
//! means in context, so the tokenizer does no classification beyond that.

/// One lexical unit of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A maximal run of characters that carry no syntax of their own.
    Word(String),
    /// A single character that may carry syntax depending on context.
    Mark(char),
}

impl Token {
    /// The characters this token stands for.
    pub fn push_to(&self, out: &mut String) {
        match self {
            Self::Word(word) => out.push_str(word),
            Self::Mark(c) => out.push(*c),
        }
    }

    /// True for whitespace marks.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self, Self::Mark(c) if c.is_ascii_whitespace())
    }

    /// True for `Mark(c)`.
    #[must_use]
    pub fn is_mark(&self, c: char) -> bool {
        matches!(self, Self::Mark(m) if *m == c)
    }
}

/// Characters that always become their own [`Token::Mark`].
#[must_use]
pub const fn is_mark_char(c: char) -> bool {
    matches!(
        c,
        ' ' | '\t' | '\n' | '\r' | '\x0C'
            | '>'
            | '+'
            | '~'
            | ','
            | ':'
            | '('
            | ')'
            | '['
            | ']'
            | '"'
            | '\''
            | '\\'
            | '/'
    )
}

/// Selector tokenizer.
pub struct SelectorTokenizer {
    /// The input string being tokenized
    input: Vec<char>,
    /// Current position in the input
    position: usize,
    /// Collected tokens
    tokens: Vec<Token>,
}

impl SelectorTokenizer {
    /// Create a new tokenizer over `input`.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into().chars().collect(),
            position: 0,
            tokens: Vec::new(),
        }
    }

    /// Consume the whole input.
    pub fn run(&mut self) {
        while let Some(token) = self.consume_token() {
            self.tokens.push(token);
        }
    }

    /// Return the collected tokens.
    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    fn consume_token(&mut self) -> Option<Token> {
        let c = *self.input.get(self.position)?;
        self.position += 1;
        if is_mark_char(c) {
            return Some(Token::Mark(c));
        }
        let mut word = String::from(c);
        while let Some(&next) = self.input.get(self.position) {
            if is_mark_char(next) {
                break;
            }
            word.push(next);
            self.position += 1;
        }
        Some(Token::Word(word))
    }
}

/// Tokenize `input` in one call.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokenizer = SelectorTokenizer::new(input);
    tokenizer.run();
    tokenizer.into_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn splits_words_and_marks() {
        assert_eq!(
            tokenize("div.a > p:has(+ span)"),
            vec![
                word("div.a"),
                Token::Mark(' '),
                Token::Mark('>'),
                Token::Mark(' '),
                word("p"),
                Token::Mark(':'),
                word("has"),
                Token::Mark('('),
                Token::Mark('+'),
                Token::Mark(' '),
                word("span"),
                Token::Mark(')'),
            ]
        );
    }

    #[test]
    fn keeps_hyphenated_names_whole() {
        assert_eq!(
            tokenize(":-abp-contains"),
            vec![Token::Mark(':'), word("-abp-contains")]
        );
    }

    #[test]
    fn round_trips_text() {
        let input = r#"a[title="x, y"]:contains(/a\/b/i)"#;
        let mut out = String::new();
        for token in tokenize(input) {
            token.push_to(&mut out);
        }
        assert_eq!(out, input);
    }
}

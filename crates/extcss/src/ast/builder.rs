//! Single-pass AST builder.
//!
//! The builder walks the token stream once, keeping one [`Frame`] per open
//! selector list: the root list plus one for every relative pseudo-class
//! whose closing parenthesis has not been seen yet. Text goes into the
//! innermost frame's regular buffer; extended pseudo-classes flush that
//! buffer and either capture a raw argument (absolute) or push a new frame
//! (relative).
//!
//! Regular text is normalised as it is collected: runs of whitespace become
//! one space, combinators are written as `" > "`, and an implicit `*` is
//! inserted wherever an extended pseudo-class would otherwise have no
//! compound to attach to.

use crate::ast::{Fragment, Selector, SelectorList};
use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::pseudo::PseudoClass;
use crate::tokenizer::{Token, tokenize};

/// Build an AST from selector text, without optimizing it.
///
/// # Errors
///
/// Returns a [`SyntaxError`] for any malformed selector.
pub fn build(selector: &str) -> Result<SelectorList, SyntaxError> {
    AstBuilder::new(selector).run()
}

/// What separates the buffered text from the next compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    None,
    Space,
    Combinator(char),
}

/// One selector list under construction.
#[derive(Debug)]
struct Frame {
    /// The relative pseudo-class that owns this list; `None` for the root.
    owner: Option<PseudoClass>,
    /// Finished selectors.
    selectors: Vec<Selector>,
    /// Fragments of the selector being built.
    fragments: Vec<Fragment>,
    /// Regular text not yet turned into a fragment.
    buffer: String,
    separator: Separator,
}

impl Frame {
    const fn new(owner: Option<PseudoClass>) -> Self {
        Self {
            owner,
            selectors: Vec::new(),
            fragments: Vec::new(),
            buffer: String::new(),
            separator: Separator::None,
        }
    }

    /// Nothing at all has been written for the current selector.
    fn at_selector_start(&self) -> bool {
        self.buffer.is_empty() && self.fragments.is_empty()
    }

    fn is_untouched(&self) -> bool {
        self.selectors.is_empty()
            && self.at_selector_start()
            && !matches!(self.separator, Separator::Combinator(_))
    }

    /// Write the pending separator into the buffer.
    fn flush_separator(&mut self) {
        match std::mem::replace(&mut self.separator, Separator::None) {
            Separator::None => {}
            Separator::Space => {
                if !self.at_selector_start() {
                    self.buffer.push(' ');
                }
            }
            Separator::Combinator(c) => {
                if self.at_selector_start() {
                    self.buffer.push(c);
                    self.buffer.push(' ');
                } else {
                    self.buffer.push(' ');
                    self.buffer.push(c);
                    self.buffer.push(' ');
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        self.flush_separator();
        self.buffer.push_str(text);
    }

    /// Turn buffered text into a regular fragment ahead of an extended one.
    fn flush_before_extended(&mut self) {
        self.flush_separator();
        if self.at_selector_start() || self.buffer.ends_with(' ') {
            self.buffer.push('*');
        }
        if !self.buffer.is_empty() {
            let value = std::mem::take(&mut self.buffer);
            self.fragments.push(Fragment::regular(value));
        }
    }

    /// Close the current selector and add it to the list.
    fn end_selector(&mut self) -> Result<(), SyntaxErrorKind> {
        if let Separator::Combinator(c) = self.separator {
            return Err(SyntaxErrorKind::TrailingCombinator(c));
        }
        self.separator = Separator::None;
        if !self.buffer.is_empty() {
            let value = std::mem::take(&mut self.buffer);
            self.fragments.push(Fragment::regular(value));
        }
        if self.fragments.is_empty() {
            return Err(SyntaxErrorKind::EmptyListEntry);
        }
        let fragments = std::mem::take(&mut self.fragments);
        check_fragment_order(&fragments)?;
        self.selectors.push(Selector { fragments });
        Ok(())
    }
}

/// `:remove()` goes last; finders go last or right before `:remove()`.
fn check_fragment_order(fragments: &[Fragment]) -> Result<(), SyntaxErrorKind> {
    for (index, fragment) in fragments.iter().enumerate() {
        let Some(pc) = fragment.pseudo_class() else {
            continue;
        };
        let rest = &fragments[index + 1..];
        if pc == PseudoClass::Remove && !rest.is_empty() {
            return Err(SyntaxErrorKind::RemoveNotLast);
        }
        if pc.is_finder() {
            let only_remove_follows = match rest {
                [] => true,
                [last] => last.pseudo_class() == Some(PseudoClass::Remove),
                _ => false,
            };
            if !only_remove_follows {
                return Err(SyntaxErrorKind::FinderNotLast(pc));
            }
        }
    }
    Ok(())
}

struct AstBuilder<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
    frames: Vec<Frame>,
}

impl<'a> AstBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            position: 0,
            frames: vec![Frame::new(None)],
        }
    }

    fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError::new(kind, self.source)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn frame(&mut self) -> &mut Frame {
        // The root frame is never popped.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn run(mut self) -> Result<SelectorList, SyntaxError> {
        while let Some(token) = self.next() {
            match token {
                Token::Word(word) => self.frame().push_text(&word),
                Token::Mark(c) if c.is_ascii_whitespace() => {
                    let frame = self.frame();
                    if frame.separator == Separator::None {
                        frame.separator = Separator::Space;
                    }
                }
                Token::Mark(c @ ('>' | '+' | '~')) => self.combinator(c)?,
                Token::Mark(',') => self.frame().end_selector().map_err(|kind| self.error(kind))?,
                Token::Mark(':') => self.colon()?,
                Token::Mark(')') => self.close_relative()?,
                Token::Mark('[') => {
                    let text = self.bracketed()?;
                    self.frame().push_text(&text);
                }
                Token::Mark(']') => return Err(self.error(SyntaxErrorKind::UnbalancedBrackets)),
                Token::Mark(quote @ ('"' | '\'')) => {
                    let text = self.quoted(quote)?;
                    self.frame().push_text(&text);
                }
                Token::Mark('\\') => {
                    let mut text = String::from('\\');
                    if let Some(next) = self.next() {
                        next.push_to(&mut text);
                    }
                    self.frame().push_text(&text);
                }
                Token::Mark('(') => return Err(self.error(SyntaxErrorKind::Unexpected('('))),
                Token::Mark(c) => self.frame().push_text(&c.to_string()),
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Result<SelectorList, SyntaxError> {
        if self.frames.len() > 1 {
            return Err(self.error(SyntaxErrorKind::UnbalancedParentheses));
        }
        if self.frame().is_untouched() {
            return Err(self.error(SyntaxErrorKind::EmptySelector));
        }
        self.frame().end_selector().map_err(|kind| self.error(kind))?;
        let root = self.frame();
        Ok(SelectorList {
            selectors: std::mem::take(&mut root.selectors),
        })
    }

    fn combinator(&mut self, c: char) -> Result<(), SyntaxError> {
        let frame = self.frame();
        if matches!(frame.separator, Separator::Combinator(_)) {
            return Err(self.error(SyntaxErrorKind::DoubleCombinator));
        }
        let frame = self.frame();
        if frame.at_selector_start() && !frame.owner.is_some_and(PseudoClass::is_has_like) {
            return Err(self.error(SyntaxErrorKind::LeadingCombinator(c)));
        }
        self.frame().separator = Separator::Combinator(c);
        Ok(())
    }

    fn colon(&mut self) -> Result<(), SyntaxError> {
        match self.next() {
            // Pseudo-elements are always native.
            Some(Token::Mark(':')) => {
                let Some(Token::Word(name)) = self.next() else {
                    return Err(self.error(SyntaxErrorKind::Unexpected(':')));
                };
                let mut text = format!("::{name}");
                self.native_arguments(&mut text)?;
                self.frame().push_text(&text);
                Ok(())
            }
            Some(Token::Word(name)) => match PseudoClass::lookup(&name) {
                None => {
                    let mut text = format!(":{name}");
                    self.native_arguments(&mut text)?;
                    self.frame().push_text(&text);
                    Ok(())
                }
                Some(pc) => {
                    if !matches!(self.next(), Some(Token::Mark('('))) {
                        return Err(self.error(SyntaxErrorKind::MissingParentheses(pc)));
                    }
                    self.open_extended(pc)
                }
            },
            _ => Err(self.error(SyntaxErrorKind::Unexpected(':'))),
        }
    }

    fn open_extended(&mut self, pc: PseudoClass) -> Result<(), SyntaxError> {
        if pc == PseudoClass::Remove {
            if let Some(owner) = self.frame().owner {
                return Err(self.error(SyntaxErrorKind::NestedRemove(owner)));
            }
        }
        self.frame().flush_before_extended();

        if pc.is_relative() {
            self.frames.push(Frame::new(Some(pc)));
            return Ok(());
        }

        let argument = self.absolute_argument(pc)?;
        let argument = argument.trim();
        if pc == PseudoClass::Remove {
            if !argument.is_empty() {
                return Err(self.error(SyntaxErrorKind::RemoveArgument));
            }
        } else if argument.is_empty() {
            return Err(self.error(SyntaxErrorKind::EmptyArgument(pc)));
        }
        self.frame().fragments.push(Fragment::absolute(pc, argument));
        Ok(())
    }

    fn close_relative(&mut self) -> Result<(), SyntaxError> {
        if self.frames.len() == 1 {
            return Err(self.error(SyntaxErrorKind::UnbalancedParentheses));
        }
        let frame = self.frame();
        if frame.is_untouched() {
            let Some(owner) = frame.owner else {
                return Err(self.error(SyntaxErrorKind::UnbalancedParentheses));
            };
            return Err(self.error(SyntaxErrorKind::EmptyArgument(owner)));
        }
        self.frame().end_selector().map_err(|kind| self.error(kind))?;

        let Some(frame) = self.frames.pop() else {
            return Err(self.error(SyntaxErrorKind::UnbalancedParentheses));
        };
        let Some(owner) = frame.owner else {
            return Err(self.error(SyntaxErrorKind::UnbalancedParentheses));
        };
        let list = SelectorList {
            selectors: frame.selectors,
        };
        self.frame().fragments.push(Fragment::relative(owner, list));
        Ok(())
    }

    /// Raw argument of an absolute pseudo-class, up to its closing
    /// parenthesis. Parentheses inside quotes, regex literals and escapes
    /// do not count.
    fn absolute_argument(&mut self, pc: PseudoClass) -> Result<String, SyntaxError> {
        let mut out = String::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut in_regex = false;

        while let Some(token) = self.next() {
            match token {
                Token::Mark('\\') => {
                    out.push('\\');
                    if let Some(next) = self.next() {
                        next.push_to(&mut out);
                    }
                }
                Token::Mark(c) if quote == Some(c) => {
                    quote = None;
                    out.push(c);
                }
                _ if quote.is_some() => token.push_to(&mut out),
                Token::Mark('/') if in_regex => {
                    in_regex = false;
                    out.push('/');
                }
                _ if in_regex => token.push_to(&mut out),
                Token::Mark('/') if pc.tracks_regex() && regex_may_start(&out) => {
                    in_regex = true;
                    out.push('/');
                }
                Token::Mark(q @ ('"' | '\'')) if pc.tracks_quotes() => {
                    quote = Some(q);
                    out.push(q);
                }
                Token::Mark('(') => {
                    depth += 1;
                    out.push('(');
                }
                Token::Mark(')') if depth == 0 => return Ok(out),
                Token::Mark(')') => {
                    depth -= 1;
                    out.push(')');
                }
                _ => token.push_to(&mut out),
            }
        }
        if quote.is_some() {
            Err(self.error(SyntaxErrorKind::UnbalancedQuotes))
        } else {
            Err(self.error(SyntaxErrorKind::UnbalancedParentheses))
        }
    }

    /// Copy a native pseudo-class argument, parentheses included, if one
    /// follows.
    fn native_arguments(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        if !self.peek().is_some_and(|t| t.is_mark('(')) {
            return Ok(());
        }
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        while let Some(token) = self.next() {
            match token {
                Token::Mark('\\') => {
                    out.push('\\');
                    if let Some(next) = self.next() {
                        next.push_to(out);
                    }
                    continue;
                }
                Token::Mark(c) if quote == Some(c) => quote = None,
                _ if quote.is_some() => {}
                Token::Mark(q @ ('"' | '\'')) => quote = Some(q),
                Token::Mark('(') => depth += 1,
                Token::Mark(')') => depth -= 1,
                _ => {}
            }
            token.push_to(out);
            if depth == 0 {
                return Ok(());
            }
        }
        if quote.is_some() {
            Err(self.error(SyntaxErrorKind::UnbalancedQuotes))
        } else {
            Err(self.error(SyntaxErrorKind::UnbalancedParentheses))
        }
    }

    /// An attribute selector, copied verbatim up to its `]`.
    fn bracketed(&mut self) -> Result<String, SyntaxError> {
        let mut out = String::from('[');
        let mut quote: Option<char> = None;
        while let Some(token) = self.next() {
            match token {
                Token::Mark('\\') => {
                    out.push('\\');
                    if let Some(next) = self.next() {
                        next.push_to(&mut out);
                    }
                    continue;
                }
                Token::Mark(c) if quote == Some(c) => quote = None,
                _ if quote.is_some() => {}
                Token::Mark(q @ ('"' | '\'')) => quote = Some(q),
                Token::Mark(']') => {
                    out.push(']');
                    return Ok(out);
                }
                _ => {}
            }
            token.push_to(&mut out);
        }
        if quote.is_some() {
            Err(self.error(SyntaxErrorKind::UnbalancedQuotes))
        } else {
            Err(self.error(SyntaxErrorKind::UnbalancedBrackets))
        }
    }

    /// A string outside any bracket, copied verbatim.
    fn quoted(&mut self, quote: char) -> Result<String, SyntaxError> {
        let mut out = String::from(quote);
        while let Some(token) = self.next() {
            if token.is_mark('\\') {
                out.push('\\');
                if let Some(next) = self.next() {
                    next.push_to(&mut out);
                }
                continue;
            }
            token.push_to(&mut out);
            if token.is_mark(quote) {
                return Ok(out);
            }
        }
        Err(self.error(SyntaxErrorKind::UnbalancedQuotes))
    }
}

/// A `/` opens a regex at the start of an argument or right after `=`, `:`
/// or `,`.
fn regex_may_start(before: &str) -> bool {
    let before = before.trim_end();
    before.is_empty() || before.ends_with(['=', ':', ','])
}

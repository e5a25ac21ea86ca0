//! Query evaluation.
//!
//! A [`Selector`] is evaluated left to right. The first regular fragment is
//! handed to the native engine; every following fragment filters or replaces
//! the candidate set. Fragments are never reordered: each extended filter
//! has to see exactly the candidates everything to its left produced.

pub mod finders;
pub mod matchers;
pub mod pattern;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::builder::build;
use crate::ast::optimizer::optimize;
use crate::ast::{Fragment, PseudoClassNode, Selector, SelectorList};
use crate::document::Document;
use crate::error::{Error, MatchError, MatchFailure, QueryError, SyntaxError};
use crate::pseudo::PseudoClass;

use finders::UpwardTarget;
use matchers::Matcher;

/// Parse and optimize selector text.
///
/// # Errors
///
/// Returns a [`SyntaxError`] for malformed selectors.
pub fn parse(selector: &str) -> Result<SelectorList, SyntaxError> {
    let mut list = build(selector)?;
    optimize(&mut list);
    Ok(list)
}

/// Evaluate `ast` against the whole document.
///
/// # Errors
///
/// See [`QueryError`].
pub fn select_elements_by_ast<D: Document>(ast: &SelectorList, doc: &D) -> Result<Vec<D::Node>, QueryError> {
    Evaluator::new(doc).select(ast, doc.root())
}

/// Evaluate `ast` with the first fragment of each selector rooted at
/// `context`.
///
/// # Errors
///
/// See [`QueryError`].
pub fn select_elements_in<D: Document>(
    ast: &SelectorList,
    doc: &D,
    context: D::Node,
) -> Result<Vec<D::Node>, QueryError> {
    Evaluator::new(doc).select(ast, context)
}

thread_local! {
    static SHARED_CACHE: SelectorCache = SelectorCache::new();
}

/// Run `f` with this thread's cache behind [`query`], [`matches`] and
/// [`validate`].
pub fn with_shared_cache<R>(f: impl FnOnce(&SelectorCache) -> R) -> R {
    SHARED_CACHE.with(f)
}

/// Parse and evaluate `selector` against the document. The AST is cached
/// per thread.
///
/// # Errors
///
/// Returns [`Error::Syntax`] or [`Error::Query`].
pub fn query<D: Document>(doc: &D, selector: &str) -> Result<Vec<D::Node>, Error> {
    with_shared_cache(|cache| cache.query(doc, selector))
}

/// True if `element` is among the elements `selector` selects. The AST is
/// cached per thread.
///
/// # Errors
///
/// Returns [`Error::Syntax`] or [`Error::Query`].
pub fn matches<D: Document>(doc: &D, element: D::Node, selector: &str) -> Result<bool, Error> {
    with_shared_cache(|cache| cache.matches(doc, element, selector))
}

/// Parse `selector` and run it once, surfacing argument errors that only
/// show up during evaluation.
///
/// # Errors
///
/// Returns [`Error::Syntax`] or [`Error::Query`].
pub fn validate<D: Document>(doc: &D, selector: &str) -> Result<(), Error> {
    query(doc, selector).map(|_| ())
}

/// Parsed selectors keyed by their literal text.
#[derive(Debug, Default)]
pub struct SelectorCache {
    entries: RefCell<HashMap<String, Rc<SelectorList>>>,
}

impl SelectorCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached AST for `selector`, parsing it on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`SyntaxError`] for malformed selectors; failures are not
    /// cached.
    pub fn get_or_parse(&self, selector: &str) -> Result<Rc<SelectorList>, SyntaxError> {
        if let Some(ast) = self.entries.borrow().get(selector) {
            return Ok(Rc::clone(ast));
        }
        let ast = Rc::new(parse(selector)?);
        let _ = self
            .entries
            .borrow_mut()
            .insert(selector.to_string(), Rc::clone(&ast));
        Ok(ast)
    }

    /// Cached [`query`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] or [`Error::Query`].
    pub fn query<D: Document>(&self, doc: &D, selector: &str) -> Result<Vec<D::Node>, Error> {
        let ast = self.get_or_parse(selector)?;
        Ok(select_elements_by_ast(&ast, doc)?)
    }

    /// Cached [`matches`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] or [`Error::Query`].
    pub fn matches<D: Document>(&self, doc: &D, element: D::Node, selector: &str) -> Result<bool, Error> {
        Ok(self.query(doc, selector)?.contains(&element))
    }

    /// Number of cached selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every cached AST.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Where the first fragment of a selector is rooted.
#[derive(Debug, Clone, Copy)]
enum Anchor<N> {
    /// Plain query from a context node.
    Context(N),
    /// Scoped to a `:has()` candidate: descendants, or following siblings
    /// for a leading `+`/`~`.
    Relative(N),
}

/// Walks an AST against one document.
pub struct Evaluator<'d, D: Document> {
    doc: &'d D,
    /// Captured once so later overrides of the document's accessor do not
    /// affect text matching.
    text_content: fn(&D, D::Node) -> String,
}

impl<'d, D: Document> Evaluator<'d, D> {
    /// Capture `doc` and its text accessor.
    #[must_use]
    pub fn new(doc: &'d D) -> Self {
        Self {
            doc,
            text_content: <D as Document>::text_content,
        }
    }

    /// Evaluate `list` from `context`. Results are in document order and
    /// duplicate-free.
    ///
    /// # Errors
    ///
    /// See [`QueryError`].
    pub fn select(&self, list: &SelectorList, context: D::Node) -> Result<Vec<D::Node>, QueryError> {
        self.select_list(list, Anchor::Context(context))
    }

    fn select_list(&self, list: &SelectorList, anchor: Anchor<D::Node>) -> Result<Vec<D::Node>, QueryError> {
        let mut results = Vec::new();
        for selector in &list.selectors {
            results.extend(self.select_selector(selector, anchor)?);
        }
        let mut results = unique(results);
        self.doc.sort_in_document_order(&mut results);
        Ok(results)
    }

    fn select_selector(&self, selector: &Selector, anchor: Anchor<D::Node>) -> Result<Vec<D::Node>, QueryError> {
        let mut fragments = selector.fragments.iter();
        let Some(Fragment::Regular(first)) = fragments.next() else {
            return Ok(Vec::new());
        };
        let mut candidates = self.select_first(&first.value, anchor)?;
        // `:xpath()` right after the implicit `*` runs once from the document.
        let mut from_document =
            first.value == "*" && matches!(anchor, Anchor::Context(c) if c == self.doc.root());

        for fragment in fragments {
            candidates = match fragment {
                Fragment::Regular(regular) => self.select_following(candidates, &regular.value)?,
                Fragment::Extended(extended) => match &extended.child {
                    PseudoClassNode::Absolute(absolute) => {
                        self.apply_absolute(absolute.name, &absolute.value, candidates, from_document)?
                    }
                    PseudoClassNode::Relative(relative) => {
                        self.apply_relative(relative.name, &relative.selector_list, candidates)?
                    }
                },
            };
            from_document = false;
        }
        Ok(candidates)
    }

    fn select_first(&self, value: &str, anchor: Anchor<D::Node>) -> Result<Vec<D::Node>, QueryError> {
        match anchor {
            Anchor::Context(context) => Ok(self.doc.query_selector_all(context, value)?),
            Anchor::Relative(node) => {
                let (combinator, rest) = split_leading_combinator(value);
                self.scoped_query(node, combinator.unwrap_or(' '), rest)
            }
        }
    }

    /// Native query relative to `node`: `:scope > x`, `:scope x`, or for
    /// sibling combinators `:scope > :nth-child(k) + x` from the parent.
    fn scoped_query(&self, node: D::Node, combinator: char, rest: &str) -> Result<Vec<D::Node>, QueryError> {
        let results = match combinator {
            '>' => self.doc.query_selector_all(node, &format!(":scope > {rest}"))?,
            '+' | '~' => {
                let (Some(parent), Some(index)) = (self.doc.parent_node(node), self.doc.element_index(node))
                else {
                    return Ok(Vec::new());
                };
                self.doc.query_selector_all(
                    parent,
                    &format!(":scope > :nth-child({index}) {combinator} {rest}"),
                )?
            }
            _ => self.doc.query_selector_all(node, &format!(":scope {rest}"))?,
        };
        Ok(results)
    }

    /// A regular fragment after an extended one.
    fn select_following(&self, candidates: Vec<D::Node>, value: &str) -> Result<Vec<D::Node>, QueryError> {
        let (combinator, rest) = split_leading_combinator(value);
        if let Some(combinator) = combinator {
            return self.scoped_from_each(&candidates, combinator, rest);
        }

        // Continuation of the candidate's own compound, possibly followed by
        // more steps: `.x`, `.x > span`.
        let (compound, tail) = split_compound(value);
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.doc.matches_selector(candidate, compound)? {
                kept.push(candidate);
            }
        }
        match split_leading_combinator(tail) {
            (Some(combinator), rest) => self.scoped_from_each(&kept, combinator, rest),
            (None, _) => Ok(kept),
        }
    }

    fn scoped_from_each(&self, candidates: &[D::Node], combinator: char, rest: &str) -> Result<Vec<D::Node>, QueryError> {
        let mut results = Vec::new();
        for &candidate in candidates {
            results.extend(self.scoped_query(candidate, combinator, rest)?);
        }
        let mut results = unique(results);
        self.doc.sort_in_document_order(&mut results);
        Ok(results)
    }

    fn apply_absolute(
        &self,
        name: PseudoClass,
        arg: &str,
        candidates: Vec<D::Node>,
        from_document: bool,
    ) -> Result<Vec<D::Node>, QueryError> {
        let fail = |reason: MatchFailure| {
            QueryError::Match(MatchError::PseudoClass {
                name,
                arg: arg.to_string(),
                reason,
            })
        };

        match name {
            PseudoClass::Remove => Ok(candidates),
            PseudoClass::NthAncestor => {
                let depth = finders::parse_depth(arg).map_err(fail)?;
                let mut found = Vec::new();
                for candidate in candidates {
                    found.push(finders::nth_ancestor(self.doc, candidate, depth).map_err(fail)?);
                }
                Ok(unique(found))
            }
            PseudoClass::Upward => {
                let target: UpwardTarget = finders::parse_upward(self.doc, arg).map_err(fail)?;
                let mut found = Vec::new();
                for candidate in candidates {
                    found.extend(finders::upward(self.doc, candidate, &target).map_err(fail)?);
                }
                Ok(unique(found))
            }
            PseudoClass::Xpath => {
                if from_document {
                    return finders::xpath(self.doc, self.doc.root(), arg).map_err(fail);
                }
                let mut found = Vec::new();
                for candidate in candidates {
                    found.extend(finders::xpath(self.doc, candidate, arg).map_err(fail)?);
                }
                Ok(unique(found))
            }
            _ => {
                let Some(matcher) = Matcher::compile(name, arg).map_err(fail)? else {
                    return Ok(candidates);
                };
                Ok(candidates
                    .into_iter()
                    .filter(|&node| matcher.matches(self.doc, self.text_content, node))
                    .collect())
            }
        }
    }

    fn apply_relative(
        &self,
        name: PseudoClass,
        list: &SelectorList,
        candidates: Vec<D::Node>,
    ) -> Result<Vec<D::Node>, QueryError> {
        if name.is_has_like() {
            let keep_matching = name != PseudoClass::IfNot;
            let mut kept = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let found = !self.select_list(list, Anchor::Relative(candidate))?.is_empty();
                if found == keep_matching {
                    kept.push(candidate);
                }
            }
            return Ok(kept);
        }

        let selected: HashSet<D::Node> = self
            .select_list(list, Anchor::Context(self.doc.root()))?
            .into_iter()
            .collect();
        let keep_selected = name == PseudoClass::Is;
        Ok(candidates
            .into_iter()
            .filter(|node| selected.contains(node) == keep_selected)
            .collect())
    }
}

/// Drop repeats, keeping first occurrences in order.
fn unique<N: Copy + Eq + std::hash::Hash>(nodes: Vec<N>) -> Vec<N> {
    let mut seen = HashSet::with_capacity(nodes.len());
    nodes.into_iter().filter(|node| seen.insert(*node)).collect()
}

/// `"> a"` → `(Some('>'), "a")`, `" a"` → `(Some(' '), "a")`,
/// `".x"` → `(None, ".x")`.
fn split_leading_combinator(value: &str) -> (Option<char>, &str) {
    let trimmed = value.trim_start();
    if let Some(c) = trimmed.chars().next().filter(|c| matches!(c, '>' | '+' | '~')) {
        return (Some(c), trimmed[c.len_utf8()..].trim_start());
    }
    if trimmed.len() < value.len() && !trimmed.is_empty() {
        return (Some(' '), trimmed);
    }
    (None, trimmed)
}

/// Split off the leading compound selector at the first top-level
/// whitespace or combinator.
fn split_compound(value: &str) -> (&str, &str) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if quote == Some(c) => quote = None,
            _ if quote.is_some() => {}
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c.is_whitespace() || matches!(c, '>' | '+' | '~')) => {
                return (&value[..index], &value[index..]);
            }
            _ => {}
        }
    }
    (value, "")
}

//! Recursive-descent parser + Thompson construction (component A).
//!
//! Grammar:
//! ```text
//! alt     := concat ('|' concat)*
//! concat  := repeat+
//! repeat  := atom ('*' | '+' | '?')?
//! atom    := literal | '.' | '(' alt ')'
//! literal := any char not in "()|*+?."
//! ```
//!
//! `+` is built directly as a looped fragment rather than desugared into
//! `a` `a*`, so no AST cloning is needed. Epsilon transitions exist only
//! during construction; they are eliminated by an epsilon-closure pass
//! before the final [`Nfa`] is handed back, so [`super::NfaState`] never
//! has to represent them.

use std::collections::HashMap;

use crate::error::ParseError;

use super::{Label, Nfa, NfaState};

enum Ast {
    Literal(char),
    Wildcard,
    Concat(Box<Ast>, Box<Ast>),
    Union(Box<Ast>, Box<Ast>),
    Star(Box<Ast>),
    Plus(Box<Ast>),
    Optional(Box<Ast>),
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(pattern: &'a str) -> Self {
        Parser {
            chars: pattern.chars().peekable(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn parse_pattern(&mut self) -> Result<Ast, ParseError> {
        let ast = self.parse_alt()?;
        if let Some(c) = self.peek() {
            return Err(ParseError::UnexpectedChar(c, self.pos));
        }
        Ok(ast)
    }

    fn parse_alt(&mut self) -> Result<Ast, ParseError> {
        let mut node = self.parse_concat()?;
        while self.peek() == Some('|') {
            self.bump();
            let rhs = self.parse_concat()?;
            node = Ast::Union(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_concat(&mut self) -> Result<Ast, ParseError> {
        let mut node: Option<Ast> = None;
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_repeat()?;
            node = Some(match node {
                None => atom,
                Some(n) => Ast::Concat(Box::new(n), Box::new(atom)),
            });
        }
        node.ok_or(ParseError::EmptyPattern)
    }

    fn parse_repeat(&mut self) -> Result<Ast, ParseError> {
        let mut atom = self.parse_atom()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.bump();
                    atom = Ast::Star(Box::new(atom));
                }
                Some('+') => {
                    self.bump();
                    atom = Ast::Plus(Box::new(atom));
                }
                Some('?') => {
                    self.bump();
                    atom = Ast::Optional(Box::new(atom));
                }
                _ => break,
            }
        }
        Ok(atom)
    }

    fn parse_atom(&mut self) -> Result<Ast, ParseError> {
        match self.bump() {
            Some('(') => {
                let inner = self.parse_alt()?;
                match self.bump() {
                    Some(')') => Ok(inner),
                    _ => Err(ParseError::UnbalancedParens),
                }
            }
            Some('.') => Ok(Ast::Wildcard),
            Some(')') => Err(ParseError::UnbalancedParens),
            Some(c) if !"()|*+?".contains(c) => Ok(Ast::Literal(c)),
            Some(c) => Err(ParseError::UnexpectedChar(c, self.pos - 1)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// A fragment of the in-progress automaton: a single entry state and a
/// single exit state, connected by whatever was built between them.
#[derive(Clone, Copy)]
struct Fragment {
    start: usize,
    accept: usize,
}

struct Builder {
    eps: Vec<Vec<usize>>,
    sym: Vec<Vec<(Label, usize)>>,
}

impl Builder {
    fn new_state(&mut self) -> usize {
        self.eps.push(Vec::new());
        self.sym.push(Vec::new());
        self.eps.len() - 1
    }

    fn add_eps(&mut self, from: usize, to: usize) {
        self.eps[from].push(to);
    }

    fn add_sym(&mut self, from: usize, label: Label, to: usize) {
        self.sym[from].push((label, to));
    }
}

fn build(ast: &Ast, b: &mut Builder) -> Fragment {
    match ast {
        Ast::Literal(c) => {
            let s0 = b.new_state();
            let s1 = b.new_state();
            b.add_sym(s0, Label::Symbol(*c), s1);
            Fragment { start: s0, accept: s1 }
        }
        Ast::Wildcard => {
            let s0 = b.new_state();
            let s1 = b.new_state();
            b.add_sym(s0, Label::Wildcard, s1);
            Fragment { start: s0, accept: s1 }
        }
        Ast::Concat(a, c) => {
            let fa = build(a, b);
            let fc = build(c, b);
            b.add_eps(fa.accept, fc.start);
            Fragment {
                start: fa.start,
                accept: fc.accept,
            }
        }
        Ast::Union(a, c) => {
            let fa = build(a, b);
            let fc = build(c, b);
            let s0 = b.new_state();
            let s1 = b.new_state();
            b.add_eps(s0, fa.start);
            b.add_eps(s0, fc.start);
            b.add_eps(fa.accept, s1);
            b.add_eps(fc.accept, s1);
            Fragment { start: s0, accept: s1 }
        }
        Ast::Star(a) => {
            let fa = build(a, b);
            let s0 = b.new_state();
            let s1 = b.new_state();
            b.add_eps(s0, fa.start);
            b.add_eps(s0, s1);
            b.add_eps(fa.accept, fa.start);
            b.add_eps(fa.accept, s1);
            Fragment { start: s0, accept: s1 }
        }
        Ast::Plus(a) => {
            let fa = build(a, b);
            let s1 = b.new_state();
            b.add_eps(fa.accept, fa.start);
            b.add_eps(fa.accept, s1);
            Fragment {
                start: fa.start,
                accept: s1,
            }
        }
        Ast::Optional(a) => {
            let fa = build(a, b);
            let s0 = b.new_state();
            let s1 = b.new_state();
            b.add_eps(s0, fa.start);
            b.add_eps(s0, s1);
            b.add_eps(fa.accept, s1);
            Fragment { start: s0, accept: s1 }
        }
    }
}

fn epsilon_closure(eps: &[Vec<usize>], start: usize) -> Vec<usize> {
    let mut seen = vec![false; eps.len()];
    let mut stack = vec![start];
    seen[start] = true;
    let mut out = vec![start];
    while let Some(s) = stack.pop() {
        for &t in &eps[s] {
            if !seen[t] {
                seen[t] = true;
                stack.push(t);
                out.push(t);
            }
        }
    }
    out
}

/// Compiles a pattern string into a well-formed [`Nfa`].
pub fn parse_regex(pattern: &str) -> Result<Nfa, ParseError> {
    let ast = Parser::new(pattern).parse_pattern()?;

    let mut b = Builder {
        eps: Vec::new(),
        sym: Vec::new(),
    };
    let frag = build(&ast, &mut b);

    let n = b.eps.len();
    let mut final_raw = vec![false; n];
    final_raw[frag.accept] = true;

    let mut states = Vec::with_capacity(n);
    for s in 0..n {
        let closure = epsilon_closure(&b.eps, s);
        let is_final = closure.iter().any(|&t| final_raw[t]);

        let mut transitions: HashMap<Label, Vec<usize>> = HashMap::new();
        for &t in &closure {
            for &(label, to) in &b.sym[t] {
                transitions.entry(label).or_default().push(to);
            }
        }
        for v in transitions.values_mut() {
            v.sort_unstable();
            v.dedup();
        }

        states.push(NfaState { is_final, transitions });
    }

    Ok(Nfa::new(states, frag.start))
}

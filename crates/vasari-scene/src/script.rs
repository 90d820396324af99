//! Inline document logic.
//!
//! `Event` and `Declare` bodies are programs in a small command language,
//! never host code:
//!
//! ```text
//! program := stmt ((';' | newline) stmt)*
//! stmt    := 'set' IDENT expr | 'navigate' expr | 'back' | 'exit' | 'log' expr
//! expr    := term (('+' | '-') term)*
//! term    := STRING | NUMBER | 'true' | 'false' | '$' IDENT | 'event.' IDENT
//! ```
//!
//! Running a program mutates [`ScriptState`] directly and returns the
//! side effects (`navigate`, `back`, `exit`, `log`) for the runtime to apply.
//! Side-effecting verbs must be listed in the capability allow-list.

use crate::attributes::{AttributeValue, Attributes};
use crate::error::ScriptError;
use crate::listeners::EventTarget;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A script value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    /// Interpret attribute text: numbers and booleans are typed, anything else is a string.
    pub fn from_literal(text: &str) -> Self {
        match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match text.trim().parse::<f64>() {
                Ok(n) if n.is_finite() && !text.trim().is_empty() => Value::Num(n),
                _ => Value::Str(text.to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

/// Variables shared by every script of the current page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptState {
    vars: BTreeMap<String, Value>,
}

impl ScriptState {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Read-only view of every variable.
    pub fn snapshot(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    /// Replace `${name}` placeholders with variable values. Unset names
    /// become empty strings; malformed placeholders are left alone. `$${`
    /// is an escape for a literal `${`.
    pub fn interpolate(&self, source: &str) -> String {
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find('$') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            if let Some(escaped) = after.strip_prefix("${") {
                out.push_str("${");
                rest = escaped;
                continue;
            }
            let Some(body) = after.strip_prefix('{') else {
                out.push('$');
                rest = after;
                continue;
            };
            match body.find('}') {
                Some(end) if is_ident(&body[..end]) => {
                    if let Some(value) = self.vars.get(&body[..end]) {
                        out.push_str(&value.to_string());
                    }
                    rest = &body[end + 1..];
                }
                _ => {
                    out.push_str("${");
                    rest = body;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Verbs a script may use beyond `set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    allowed: HashSet<String>,
}

impl Capabilities {
    pub fn new<I, S>(verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: verbs.into_iter().map(|v| v.into().to_ascii_lowercase()).collect(),
        }
    }

    pub fn allows(&self, verb: &str) -> bool {
        self.allowed.contains(verb)
    }
}

/// A side effect requested by a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Navigate(String),
    Back,
    Exit,
    Log(String),
}

/// What `event.*` resolves against.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventContext<'a> {
    pub target: Option<&'a EventTarget>,
    pub point: Option<(f32, f32)>,
    pub key: Option<&'a str>,
}

impl EventContext<'_> {
    fn field(&self, name: &str) -> Option<Value> {
        let target = self.target;
        match name {
            "x" => self.point.map(|(x, _)| Value::Num(x as f64)),
            "y" => self.point.map(|(_, y)| Value::Num(y as f64)),
            "key" => self.key.map(Value::from),
            "id" => target.map(|t| Value::from(t.id.as_str())),
            "tag" => target.map(|t| Value::from(t.tag.as_str())),
            "left" => target.map(|t| Value::Num(t.appearance.left as f64)),
            "top" => target.map(|t| Value::Num(t.appearance.top as f64)),
            "width" => target.map(|t| Value::Num(t.appearance.width as f64)),
            "height" => target.map(|t| Value::Num(t.appearance.height as f64)),
            other => target.and_then(|t| match t.attributes.get(other)? {
                AttributeValue::Text(text) => Some(Value::from_literal(text)),
                AttributeValue::Flag => Some(Value::Bool(true)),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Literal(Value),
    Var(String),
    EventField(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
struct Expr {
    first: Term,
    rest: Vec<(Op, Term)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Stmt {
    Set(String, Expr),
    Navigate(Expr),
    Back,
    Exit,
    Log(Expr),
}

impl Stmt {
    fn verb(&self) -> &'static str {
        match self {
            Stmt::Set(..) => "set",
            Stmt::Navigate(_) => "navigate",
            Stmt::Back => "back",
            Stmt::Exit => "exit",
            Stmt::Log(_) => "log",
        }
    }
}

/// A parsed script body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    stmts: Vec<Stmt>,
}

impl Program {
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let tokens = tokenize(source)?;
        let mut stmts = Vec::new();
        for statement in tokens.split(|t| t.kind == Tok::Sep) {
            if statement.is_empty() {
                continue;
            }
            stmts.push(parse_stmt(statement)?);
        }
        Ok(Self { stmts })
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Run against `state`, returning requested side effects in order.
    pub fn run(
        &self,
        state: &mut ScriptState,
        event: &EventContext<'_>,
        capabilities: &Capabilities,
    ) -> Result<Vec<Effect>, ScriptError> {
        let mut effects = Vec::new();
        for stmt in &self.stmts {
            let verb = stmt.verb();
            if verb != "set" && !capabilities.allows(verb) {
                return Err(ScriptError::Denied(verb.to_string()));
            }
            match stmt {
                Stmt::Set(name, expr) => {
                    let value = eval(expr, state, event)?;
                    state.set(name.clone(), value);
                }
                Stmt::Navigate(expr) => effects.push(Effect::Navigate(eval(expr, state, event)?.to_string())),
                Stmt::Back => effects.push(Effect::Back),
                Stmt::Exit => effects.push(Effect::Exit),
                Stmt::Log(expr) => effects.push(Effect::Log(eval(expr, state, event)?.to_string())),
            }
        }
        Ok(effects)
    }
}

fn eval(expr: &Expr, state: &ScriptState, event: &EventContext<'_>) -> Result<Value, ScriptError> {
    let mut acc = eval_term(&expr.first, state, event)?;
    for (op, term) in &expr.rest {
        let rhs = eval_term(term, state, event)?;
        acc = match (op, acc, rhs) {
            (Op::Add, Value::Num(a), Value::Num(b)) => Value::Num(a + b),
            (Op::Add, a, b) => Value::Str(format!("{a}{b}")),
            (Op::Sub, Value::Num(a), Value::Num(b)) => Value::Num(a - b),
            (Op::Sub, a, b) => {
                return Err(ScriptError::Type(format!("cannot subtract {b:?} from {a:?}")));
            }
        };
    }
    Ok(acc)
}

fn eval_term(term: &Term, state: &ScriptState, event: &EventContext<'_>) -> Result<Value, ScriptError> {
    match term {
        Term::Literal(value) => Ok(value.clone()),
        Term::Var(name) => state
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::Undefined(name.clone())),
        Term::EventField(name) => event
            .field(name)
            .ok_or_else(|| ScriptError::Undefined(format!("event.{name}"))),
    }
}

// ---------------------------------------------------------------- parsing

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Var(String),
    Str(String),
    Num(f64),
    Plus,
    Minus,
    Sep,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: Tok,
    line: usize,
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' | ';' => {
                chars.next();
                tokens.push(Token { kind: Tok::Sep, line });
                if ch == '\n' {
                    line += 1;
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                // comment to end of line
                while chars.peek().is_some_and(|c| *c != '\n') {
                    chars.next();
                }
            }
            '+' => {
                chars.next();
                tokens.push(Token { kind: Tok::Plus, line });
            }
            '-' => {
                chars.next();
                tokens.push(Token { kind: Tok::Minus, line });
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == ch => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => break,
                        },
                        Some('\n') | None => {
                            return Err(ScriptError::Parse {
                                line,
                                message: "unterminated string".into(),
                            });
                        }
                        Some(c) => text.push(c),
                    }
                }
                tokens.push(Token { kind: Tok::Str(text), line });
            }
            '$' => {
                chars.next();
                let name = take_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_');
                if !is_ident(&name) {
                    return Err(ScriptError::Parse {
                        line,
                        message: "expected a variable name after '$'".into(),
                    });
                }
                tokens.push(Token { kind: Tok::Var(name), line });
            }
            c if c.is_ascii_digit() => {
                let text = take_while(&mut chars, |c| c.is_ascii_digit() || c == '.');
                let value = text.parse::<f64>().map_err(|_| ScriptError::Parse {
                    line,
                    message: format!("bad number '{text}'"),
                })?;
                tokens.push(Token { kind: Tok::Num(value), line });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let word = take_while(&mut chars, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                tokens.push(Token { kind: Tok::Word(word), line });
            }
            other => {
                return Err(ScriptError::Parse {
                    line,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(tokens)
}

fn take_while(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !keep(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn parse_stmt(tokens: &[Token]) -> Result<Stmt, ScriptError> {
    let line = tokens[0].line;
    let err = |message: String| ScriptError::Parse { line, message };
    let Tok::Word(verb) = &tokens[0].kind else {
        return Err(err("expected a statement".into()));
    };
    let args = &tokens[1..];
    let no_args = |stmt: Stmt| {
        if args.is_empty() {
            Ok(stmt)
        } else {
            Err(err(format!("'{verb}' takes no arguments")))
        }
    };
    match verb.as_str() {
        "set" => match args.split_first() {
            Some((Token { kind: Tok::Word(name), .. }, rest)) if is_ident(name) => {
                Ok(Stmt::Set(name.clone(), parse_expr(rest, line)?))
            }
            _ => Err(err("expected 'set NAME expr'".into())),
        },
        "navigate" => Ok(Stmt::Navigate(parse_expr(args, line)?)),
        "log" => Ok(Stmt::Log(parse_expr(args, line)?)),
        "back" => no_args(Stmt::Back),
        "exit" => no_args(Stmt::Exit),
        other => Err(err(format!("unknown statement '{other}'"))),
    }
}

fn parse_expr(tokens: &[Token], line: usize) -> Result<Expr, ScriptError> {
    let err = |message: &str| ScriptError::Parse {
        line,
        message: message.to_string(),
    };
    let mut iter = tokens.iter();
    let first = parse_term(iter.next().ok_or_else(|| err("expected an expression"))?, line)?;
    let mut rest = Vec::new();
    while let Some(token) = iter.next() {
        let op = match token.kind {
            Tok::Plus => Op::Add,
            Tok::Minus => Op::Sub,
            _ => return Err(err("expected '+' or '-'")),
        };
        let term = parse_term(iter.next().ok_or_else(|| err("expected a term after operator"))?, line)?;
        rest.push((op, term));
    }
    Ok(Expr { first, rest })
}

fn parse_term(token: &Token, line: usize) -> Result<Term, ScriptError> {
    match &token.kind {
        Tok::Str(s) => Ok(Term::Literal(Value::Str(s.clone()))),
        Tok::Num(n) => Ok(Term::Literal(Value::Num(*n))),
        Tok::Var(name) => Ok(Term::Var(name.clone())),
        Tok::Word(word) if word == "true" => Ok(Term::Literal(Value::Bool(true))),
        Tok::Word(word) if word == "false" => Ok(Term::Literal(Value::Bool(false))),
        Tok::Word(word) => match word.strip_prefix("event.") {
            Some(field) if is_ident(field) => Ok(Term::EventField(field.to_string())),
            _ => Err(ScriptError::Parse {
                line,
                message: format!("unexpected word '{word}'"),
            }),
        },
        other => Err(ScriptError::Parse {
            line,
            message: format!("unexpected token {other:?}"),
        }),
    }
}

// ---------------------------------------------------------------- bindings

/// Script registry for the current document: `Event` programs (rebuilt
/// every pass), run-once `Declare` bodies, and the shared state.
#[derive(Debug, Default)]
pub struct ScriptBindings {
    state: ScriptState,
    events: HashMap<String, Program>,
    declared: HashSet<String>,
    capabilities: Capabilities,
}

impl ScriptBindings {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &ScriptState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ScriptState {
        &mut self.state
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Forget this pass's `Event` programs.
    pub fn begin_pass(&mut self) {
        self.events.clear();
    }

    /// Forget everything tied to the current document. State survives.
    pub fn reset_document(&mut self) {
        self.events.clear();
        self.declared.clear();
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Register an `Event` body under its id for the current pass.
    pub fn register_event(&mut self, id: &str, body: &str) -> Result<(), ScriptError> {
        let program = Program::parse(body)?;
        self.events.insert(id.to_string(), program);
        Ok(())
    }

    /// Process a `Declare`: seed unset variables from its attributes (except
    /// `id`) and run its body the first time `id` is seen in this document.
    pub fn declare(&mut self, id: &str, attributes: &Attributes, body: &str) -> Result<Vec<Effect>, ScriptError> {
        for (name, value) in attributes.iter() {
            if name == "id" || self.state.contains(name) {
                continue;
            }
            let value = match value {
                AttributeValue::Text(text) => Value::from_literal(text),
                AttributeValue::Flag => Value::Bool(true),
            };
            self.state.set(name, value);
        }
        if !self.declared.insert(id.to_string()) {
            return Ok(Vec::new());
        }
        Program::parse(body)?.run(&mut self.state, &EventContext::default(), &self.capabilities)
    }

    /// Run the named `Event` program. Unknown names do nothing.
    pub fn invoke(&mut self, name: &str, event: &EventContext<'_>) -> Result<Vec<Effect>, ScriptError> {
        match self.events.get(name) {
            Some(program) => program.run(&mut self.state, event, &self.capabilities),
            None => {
                tracing::trace!(handler = name, "script: no such event, ignoring");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;
    use crate::attributes::extract;

    fn all_verbs() -> Capabilities {
        Capabilities::new(["navigate", "back", "exit", "log"])
    }

    fn run(source: &str, state: &mut ScriptState) -> Result<Vec<Effect>, ScriptError> {
        Program::parse(source)?.run(state, &EventContext::default(), &all_verbs())
    }

    #[test]
    fn set_and_arithmetic() {
        let mut state = ScriptState::default();
        run("set n 1; set n $n + 2\nset label \"count: \" + $n", &mut state).unwrap();
        assert_eq!(state.get("n"), Some(&Value::Num(3.0)));
        assert_eq!(state.get("label"), Some(&Value::from("count: 3")));
        run("set n $n - 0.5", &mut state).unwrap();
        assert_eq!(state.get("n"), Some(&Value::Num(2.5)));
    }

    #[test]
    fn effects_are_returned_in_order() {
        let mut state = ScriptState::default();
        state.set("home", Value::from("@peer:page:home"));
        let effects = run("log 'going'; navigate $home; back; exit", &mut state).unwrap();
        assert_eq!(
            effects,
            vec![
                Effect::Log("going".into()),
                Effect::Navigate("@peer:page:home".into()),
                Effect::Back,
                Effect::Exit,
            ]
        );
    }

    #[test]
    fn denied_verbs_are_errors() {
        let program = Program::parse("set a 1; exit").unwrap();
        let mut state = ScriptState::default();
        let err = program
            .run(&mut state, &EventContext::default(), &Capabilities::new(["log"]))
            .unwrap_err();
        assert_eq!(err, ScriptError::Denied("exit".into()));
        // statements before the denied verb have run
        assert_eq!(state.get("a"), Some(&Value::Num(1.0)));
    }

    #[test]
    fn parse_errors_report_lines() {
        assert!(matches!(Program::parse("set a 1\nfrobnicate"), Err(ScriptError::Parse { line: 2, .. })));
        assert!(matches!(Program::parse("log \"open"), Err(ScriptError::Parse { line: 1, .. })));
        assert!(matches!(Program::parse("set 1 2"), Err(ScriptError::Parse { .. })));
        assert!(matches!(Program::parse("log 1 +"), Err(ScriptError::Parse { .. })));
        assert!(matches!(Program::parse("back now"), Err(ScriptError::Parse { .. })));
        assert!(matches!(Program::parse("this.onBack();"), Err(ScriptError::Parse { .. })));
        assert!(Program::parse("  \n ; # nothing\n").unwrap().is_empty());
    }

    #[test]
    fn runtime_errors() {
        let mut state = ScriptState::default();
        assert_eq!(run("log $missing", &mut state), Err(ScriptError::Undefined("missing".into())));
        assert!(matches!(run("log 'a' - 1", &mut state), Err(ScriptError::Type(_))));
    }

    #[test]
    fn event_fields_resolve_against_target() {
        let attributes = extract(r#"id="buy" price={3} fill"#);
        let appearance = Appearance::resolve(&attributes, &Appearance::surface(100.0, 100.0, 13.0), 100.0, 13.0);
        let target = EventTarget {
            id: "buy".into(),
            tag: "Rect".into(),
            attributes,
            appearance,
        };
        let event = EventContext {
            target: Some(&target),
            point: Some((4.0, 5.0)),
            key: None,
        };
        let mut state = ScriptState::default();
        Program::parse("set total event.price + 1; set where event.id + '@' + event.x; set f event.fill")
            .unwrap()
            .run(&mut state, &event, &all_verbs())
            .unwrap();
        assert_eq!(state.get("total"), Some(&Value::Num(4.0)));
        assert_eq!(state.get("where"), Some(&Value::from("buy@4")));
        assert_eq!(state.get("f"), Some(&Value::Bool(true)));
    }

    #[test]
    fn interpolation() {
        let mut state = ScriptState::default();
        state.set("search", Value::from("@a:text:b"));
        state.set("n", Value::Num(2.0));
        assert_eq!(
            state.interpolate("value=\"${search}\" n=${n} gone=${nope} raw=${ not } end$"),
            "value=\"@a:text:b\" n=2 gone= raw=${ not } end$"
        );
    }

    #[test]
    fn doubled_dollar_escapes_a_placeholder() {
        let mut state = ScriptState::default();
        state.set("home", Value::from("secret"));
        assert_eq!(state.interpolate("a $${home} b ${home} $$ c"), "a ${home} b secret $$ c");
    }

    #[test]
    fn declare_seeds_once_and_runs_body_once() {
        let mut bindings = ScriptBindings::new(all_verbs());
        bindings.state_mut().set("title", Value::from("kept"));
        let attrs = extract(r#"id="init" title="ignored" count={0}"#);

        let effects = bindings.declare("init", &attrs, "set count $count + 1; log 'ready'").unwrap();
        assert_eq!(effects, vec![Effect::Log("ready".into())]);
        let again = bindings.declare("init", &attrs, "set count $count + 1; log 'ready'").unwrap();
        assert!(again.is_empty());

        assert_eq!(bindings.state().get("title"), Some(&Value::from("kept")));
        assert_eq!(bindings.state().get("count"), Some(&Value::Num(1.0)));
        assert!(!bindings.state().contains("id"));

        bindings.reset_document();
        bindings.declare("init", &attrs, "set count $count + 1").unwrap();
        assert_eq!(bindings.state().get("count"), Some(&Value::Num(2.0)));
    }

    #[test]
    fn events_are_per_pass_and_unknown_names_are_no_ops() {
        let mut bindings = ScriptBindings::new(all_verbs());
        bindings.register_event("go", "navigate 'x:page:y'").unwrap();
        assert_eq!(
            bindings.invoke("go", &EventContext::default()).unwrap(),
            vec![Effect::Navigate("x:page:y".into())]
        );
        assert!(bindings.invoke("missing", &EventContext::default()).unwrap().is_empty());
        bindings.begin_pass();
        assert!(!bindings.has_event("go"));
        assert!(bindings.register_event("bad", "nonsense here").is_err());
    }
}

//! The string-splicing evaluation core.
//!
//! Nothing here builds a syntax tree. Formulas reduce over a token list
//! (see `formula`), relational and logical expressions are split and
//! respliced as text, and the resolver classifies raw operand text directly.

use std::cmp::Ordering;
use std::io::{self, BufRead, Write};

use lazy_static::lazy_static;
use regex::Regex;

use crate::lang::error::{EvalError, Result};
use crate::lang::formula;
use crate::lang::value::{Value, FALSE_TOKEN, TRUE_TOKEN};
use crate::lang::variables::Variables;

const CONJUNCTION: char = 'と';
const AND_MARKER: &str = "かつ";
const OR_MARKER: &str = "または";
const NOT_SUFFIX: &str = "でない";
const INPUT_MARKER: &str = "【外部からの入力】";
const INPUT_PROMPT: &str = "入力してください: ";

/// Comparison glyphs, tried in this order
const COMPARISONS: [char; 6] = ['＞', '＜', '＝', '≠', '≧', '≦'];
/// Glyphs that rule out the variable branch of the resolver
const ARITHMETIC: [char; 8] = ['＋', '－', '×', '/', '÷', '％', '（', '）'];

lazy_static! {
    static ref STRING: Regex = Regex::new("^「(.*)」").unwrap();
    static ref STRING_ASCII: Regex = Regex::new("^\"(.*)\"").unwrap();
    static ref INDEXED: Regex = Regex::new(r"^(.*)\[(\d+)\]$").unwrap();
}

/// Executes statements against the variable store.
///
/// `sink` receives everything the program prints (including the input
/// prompt); `source` supplies lines for the external input marker. Both are
/// injected so tests can drive the interpreter with in-memory buffers.
pub struct Interp<'a> {
    variables: Variables,
    sink: &'a mut dyn Write,
    source: &'a mut dyn BufRead,
}

impl<'a> Interp<'a> {
    pub fn new(sink: &'a mut dyn Write, source: &'a mut dyn BufRead) -> Self {
        Self {
            variables: Variables::new(),
            sink,
            source,
        }
    }

    /// Resolve raw operand text to a value, folding `と`-joined parts into an
    /// accumulator whose kind is fixed by the first part
    fn resolve(&mut self, raw: &str) -> Result<Value> {
        let mut accumulator: Option<Value> = None;

        for part in raw.split(CONJUNCTION) {
            let value = self.resolve_part(part.trim())?;
            accumulator = Some(match accumulator {
                None => value,
                Some(prev) => prev.combine(value)?,
            });
        }

        accumulator.ok_or_else(|| EvalError::MalformedExpression(raw.to_string()))
    }

    /// Classify one part; the first matching branch wins
    fn resolve_part(&mut self, part: &str) -> Result<Value> {
        if part.contains(AND_MARKER) || part.contains(OR_MARKER) || part.contains(NOT_SUFFIX) {
            return self.logic(part);
        }
        if COMPARISONS.iter().any(|&glyph| part.contains(glyph)) {
            return self.relational(part);
        }
        if let Some(caps) = STRING.captures(part) {
            return Ok(Value::Text(caps[1].to_string()));
        }
        if let Some(caps) = STRING_ASCII.captures(part) {
            return Ok(Value::Text(caps[1].to_string()));
        }
        if let Some(inner) = part.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
            return self.array_literal(inner);
        }
        if !part.is_empty() && part.chars().all(|ch| formula::digit(ch).is_some()) {
            return parse_integer(part);
        }
        if !part.is_empty() && part.chars().all(char::is_numeric) {
            return parse_real(part);
        }
        if part == INPUT_MARKER {
            return self.read_input();
        }
        if !part.chars().any(|ch| ARITHMETIC.contains(&ch)) {
            return self.variable(part);
        }

        formula::evaluate(part)
    }

    fn array_literal(&mut self, inner: &str) -> Result<Value> {
        let inner = inner.trim();
        if inner.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let mut items = Vec::new();
        for element in inner.split(',') {
            items.push(self.resolve(element)?);
        }

        Ok(Value::Array(items))
    }

    fn variable(&self, part: &str) -> Result<Value> {
        if let Some(caps) = INDEXED.captures(part) {
            let name = &caps[1];
            let index = parse_index(&caps[2])?;
            let stored = self
                .variables
                .get(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))?;
            let items = match stored {
                Value::Array(items) => items,
                other => {
                    return Err(EvalError::TypeMismatch(format!(
                        "Expected array for '{}', got {}",
                        name,
                        other.kind()
                    )))
                }
            };
            return items
                .get(index)
                .cloned()
                .ok_or_else(|| EvalError::IndexOutOfRange {
                    name: name.to_string(),
                    index,
                    len: items.len(),
                });
        }

        self.variables
            .get(part)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(part.to_string()))
    }

    fn read_input(&mut self) -> Result<Value> {
        write!(self.sink, "{}", INPUT_PROMPT)?;
        self.sink.flush()?;

        let mut line = String::new();
        let read = self.source.read_line(&mut line)?;
        if read == 0 {
            return Err(EvalError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input stream closed",
            )));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        // input is always text, never auto-parsed
        Ok(Value::Text(line))
    }

    /// Split on the first comparison glyph present and compare the resolved
    /// sides. Boolean tokens pass through so collapsed groups compose.
    fn relational(&mut self, raw: &str) -> Result<Value> {
        if raw == TRUE_TOKEN || raw == FALSE_TOKEN {
            return Ok(Value::Text(raw.to_string()));
        }

        for &glyph in COMPARISONS.iter() {
            let segments: Vec<&str> = raw.split(glyph).collect();
            if segments.len() < 2 {
                continue;
            }

            // extra segments are ignored: a＞b＞c compares a with b
            let left = self.resolve(segments[0])?;
            let right = self.resolve(segments[1])?;
            let holds = match glyph {
                '＞' => left.compare(&right)? == Ordering::Greater,
                '＜' => left.compare(&right)? == Ordering::Less,
                '＝' => left == right,
                '≠' => left != right,
                '≧' => left.compare(&right)? != Ordering::Less,
                '≦' => left.compare(&right)? != Ordering::Greater,
                other => return Err(EvalError::UnknownOperator(other)),
            };

            return Ok(Value::truth(holds));
        }

        Err(EvalError::MalformedExpression(raw.to_string()))
    }

    /// Grouping, the でない suffix, then the two operator tiers
    fn logic(&mut self, raw: &str) -> Result<Value> {
        let mut expr = raw.trim().to_string();

        while expr.contains('（') && expr.contains('）') {
            match self.collapse_group(&expr)? {
                Some(collapsed) => expr = collapsed,
                // unbalanced glyphs; let the leftovers fail downstream
                None => break,
            }
        }

        if let Some(prefix) = expr.strip_suffix(NOT_SUFFIX) {
            let holds = self.relational(prefix.trim())?.is_true();
            return Ok(Value::truth(!holds));
        }

        // かつ binds tighter, so the looser または splits first
        for &(marker, disjunction) in &[(OR_MARKER, true), (AND_MARKER, false)] {
            if let Some(at) = find_top_level(&expr, marker) {
                let rest = at + marker.len();
                let holds = if disjunction {
                    self.logic(&expr[..at])?.is_true() || self.logic(&expr[rest..])?.is_true()
                } else {
                    self.logic(&expr[..at])?.is_true() && self.logic(&expr[rest..])?.is_true()
                };
                return Ok(Value::truth(holds));
            }
        }

        self.relational(&expr)
    }

    /// Collapse the first complete top-level （…） group to its boolean
    /// token, one replacement per call. `None` means no complete group.
    fn collapse_group(&mut self, expr: &str) -> Result<Option<String>> {
        let mut opens = Vec::new();

        for (at, ch) in expr.char_indices() {
            match ch {
                '（' => opens.push(at),
                '）' => {
                    let start = match opens.pop() {
                        Some(start) => start,
                        // stray close glyph, skip it
                        None => continue,
                    };
                    if opens.is_empty() {
                        let inner = &expr[start + '（'.len_utf8()..at];
                        let token = self.logic(inner)?;
                        let mut collapsed = String::with_capacity(expr.len());
                        collapsed.push_str(&expr[..start]);
                        collapsed.push_str(&token.to_string());
                        collapsed.push_str(&expr[at + '）'.len_utf8()..]);
                        return Ok(Some(collapsed));
                    }
                }
                _ => (),
            }
        }

        Ok(None)
    }

    pub fn assign(&mut self, name: &str, raw: &str) -> Result<()> {
        let value = self.resolve(raw.trim())?;
        self.variables.insert(name.trim().to_string(), value);
        Ok(())
    }

    pub fn increment(&mut self, name: &str, amount: &str) -> Result<()> {
        self.shift(name, amount, '＋')
    }

    pub fn decrement(&mut self, name: &str, amount: &str) -> Result<()> {
        self.shift(name, amount, '－')
    }

    fn shift(&mut self, name: &str, amount: &str, op: char) -> Result<()> {
        let name = name.trim();
        let current = self.resolve(name)?.as_real()?;
        let delta = self.resolve(amount.trim())?.as_real()?;
        let shifted = formula::apply(op, current, delta)?;
        self.variables
            .insert(name.to_string(), Value::number(shifted));
        Ok(())
    }

    pub fn print(&mut self, raw: &str) -> Result<()> {
        let value = self.resolve(raw.trim())?;
        writeln!(self.sink, "{}", value)?;
        Ok(())
    }

    /// Write every store entry as `name = literal`, name-sorted
    pub fn dump_store(&mut self) -> Result<()> {
        for (name, value) in self.variables.iter() {
            writeln!(self.sink, "{} = {}", name, value.literal())?;
        }
        Ok(())
    }
}

/// Byte offset of the first marker occurrence at parenthesis depth zero
fn find_top_level(expr: &str, marker: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (at, ch) in expr.char_indices() {
        match ch {
            '（' => depth += 1,
            '）' => depth -= 1,
            _ => {
                if depth == 0 && expr[at..].starts_with(marker) {
                    return Some(at);
                }
            }
        }
    }
    None
}

fn parse_integer(part: &str) -> Result<Value> {
    let mut total: i64 = 0;
    for ch in part.chars() {
        let digit = formula::digit(ch)
            .map(i64::from)
            .ok_or_else(|| EvalError::MalformedExpression(part.to_string()))?;
        total = total
            .checked_mul(10)
            .and_then(|shifted| shifted.checked_add(digit))
            .ok_or_else(|| EvalError::Overflow(part.to_string()))?;
    }
    Ok(Value::Integer(total))
}

fn parse_real(part: &str) -> Result<Value> {
    let normalized: Option<String> = part
        .chars()
        .map(|ch| formula::digit(ch).and_then(|d| std::char::from_digit(d, 10)))
        .collect();

    match normalized.and_then(|repr| repr.parse::<f64>().ok()) {
        Some(value) => Ok(Value::Real(value)),
        None => Err(EvalError::MalformedExpression(part.to_string())),
    }
}

fn parse_index(digits: &str) -> Result<usize> {
    let mut total: usize = 0;
    for ch in digits.chars() {
        let digit = formula::digit(ch)
            .map(|d| d as usize)
            .ok_or_else(|| EvalError::MalformedExpression(digits.to_string()))?;
        total = total
            .checked_mul(10)
            .and_then(|shifted| shifted.checked_add(digit))
            .ok_or_else(|| EvalError::Overflow(digits.to_string()))?;
    }
    Ok(total)
}

#[test]
fn test_resolve_literals() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    let tests = vec![
        ("42", Value::Integer(42)),
        ("１２３", Value::Integer(123)),
        ("「こんにちは」", Value::Text("こんにちは".to_string())),
        ("\"ascii\"", Value::Text("ascii".to_string())),
        (
            "{1, 2, 3}",
            Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]),
        ),
        (
            "{1, 「a」}",
            Value::Array(vec![Value::Integer(1), Value::Text("a".to_string())]),
        ),
        ("{}", Value::Array(vec![])),
        ("2×3", Value::Integer(6)),
        ("（1＋2）×（3＋4）", Value::Integer(21)),
    ];

    for (text, expected) in tests {
        let value = interp.resolve(text).expect(text);
        assert_eq!(value, expected, "input: {}", text);
    }

    // the と split happens before any classification, so a brace literal
    // containing と splits apart and its pieces read as variable names
    assert!(matches!(
        interp.resolve("{1と2, 5}"),
        Err(EvalError::UndefinedVariable(_))
    ));

    // resolving the same text twice gives the same value
    let first = interp.resolve("2＋3").expect("eval");
    let second = interp.resolve("2＋3").expect("eval");
    assert_eq!(first, second);
}

#[test]
fn test_resolve_accumulation() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    let tests = vec![
        ("1と2と3", Value::Integer(6)),
        ("「ab」と「cd」", Value::Text("abcd".to_string())),
        (
            "{1}と{2, 3}",
            Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]),
        ),
        // an integer accumulator promotes when a real part arrives
        ("1と（3/2）", Value::Real(2.5)),
        // boolean tokens concatenate as text
        ("3＞2と「!」", Value::Text("真!".to_string())),
    ];

    for (text, expected) in tests {
        let value = interp.resolve(text).expect(text);
        assert_eq!(value, expected, "input: {}", text);
    }

    let mismatches = vec!["1と「a」", "「a」と1", "{1}と2"];
    for text in mismatches {
        assert!(
            matches!(interp.resolve(text), Err(EvalError::TypeMismatch(_))),
            "input: {}",
            text
        );
    }
}

#[test]
fn test_resolve_variables() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    interp.assign("x", "5").expect("assign");
    assert_eq!(interp.resolve("x").expect("eval"), Value::Integer(5));
    assert_eq!(interp.resolve("xと1").expect("eval"), Value::Integer(6));

    interp.assign("a", "{10, 20}").expect("assign");
    assert_eq!(interp.resolve("a[1]").expect("eval"), Value::Integer(20));
    assert_eq!(interp.resolve("a[0]と5").expect("eval"), Value::Integer(15));
    assert!(matches!(
        interp.resolve("a[2]"),
        Err(EvalError::IndexOutOfRange {
            index: 2,
            len: 2,
            ..
        })
    ));
    assert!(matches!(
        interp.resolve("x[0]"),
        Err(EvalError::TypeMismatch(_))
    ));
    assert!(matches!(
        interp.resolve("y"),
        Err(EvalError::UndefinedVariable(_))
    ));
    // a bare real literal is not numeric; it reads as a variable name
    assert!(matches!(
        interp.resolve("1.5"),
        Err(EvalError::UndefinedVariable(_))
    ));
}

#[test]
fn test_relational() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    let tests = vec![
        ("3＞2", "真"),
        ("2＞3", "偽"),
        ("2＜3", "真"),
        ("3＝3", "真"),
        ("3≠3", "偽"),
        ("3≠4", "真"),
        ("3≧3", "真"),
        ("4≦3", "偽"),
        ("「ab」＝「ab」", "真"),
        ("「ab」≠「cd」", "真"),
        ("「a」＜「b」", "真"),
        ("3＞（5/2）", "真"),
        // the split keeps only the first two segments
        ("1＞2＞3", "偽"),
    ];

    for (text, expected) in tests {
        let value = interp.resolve(text).expect(text);
        assert_eq!(value, Value::Text(expected.to_string()), "input: {}", text);
    }

    assert!(matches!(
        interp.resolve("ほげ＞ふが"),
        Err(EvalError::UndefinedVariable(_))
    ));
    // a side with no comparison pattern at all
    assert!(matches!(
        interp.resolve("1＞2または3"),
        Err(EvalError::MalformedExpression(_))
    ));
}

#[test]
fn test_logic() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    let tests = vec![
        ("3＞2かつ1＜2", "真"),
        ("3＞2かつ2＜1", "偽"),
        ("3＜2または1＜2", "真"),
        ("1＜0または2＜1", "偽"),
        ("3＞5でない", "真"),
        ("3＞2でない", "偽"),
        // spacing before the suffix is tolerated
        ("3＞5 でない", "真"),
        ("（3＞2）かつ（1＜2）", "真"),
        ("（3＞2）でない", "偽"),
        ("（3＞2） でない", "偽"),
        ("（3＜2または1＜2）かつ3＞2", "真"),
        // かつ binds tighter than または
        ("1＞2かつ2＞1または3＞1", "真"),
        ("1＞2かつ1＞2または2＞1", "真"),
    ];

    for (text, expected) in tests {
        let value = interp.resolve(text).expect(text);
        assert_eq!(value, Value::Text(expected.to_string()), "input: {}", text);
    }
}

#[test]
fn test_logic_short_circuit() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    // the right side never runs when the left side decides
    assert_eq!(
        interp.resolve("1＞2かつほげ＞1").expect("eval"),
        Value::truth(false)
    );
    assert_eq!(
        interp.resolve("2＞1またはほげ＞1").expect("eval"),
        Value::truth(true)
    );
    assert!(matches!(
        interp.resolve("2＞1かつほげ＞1"),
        Err(EvalError::UndefinedVariable(_))
    ));
}

#[test]
fn test_resolve_input() {
    let mut output = Vec::new();
    let mut input = io::Cursor::new("hello\n42\n");
    {
        let mut interp = Interp::new(&mut output, &mut input);
        assert_eq!(
            interp.resolve(INPUT_MARKER).expect("read"),
            Value::Text("hello".to_string())
        );
        // always text, even when the line looks numeric
        assert_eq!(
            interp.resolve(INPUT_MARKER).expect("read"),
            Value::Text("42".to_string())
        );
    }
    assert_eq!(
        String::from_utf8(output).expect("utf-8"),
        "入力してください: 入力してください: "
    );

    let mut sink = Vec::new();
    let mut closed = io::empty();
    let mut interp = Interp::new(&mut sink, &mut closed);
    assert!(matches!(
        interp.resolve(INPUT_MARKER),
        Err(EvalError::Io(_))
    ));
}

#[test]
fn test_statements() {
    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut interp = Interp::new(&mut output, &mut input);
        interp.assign("x", "5").expect("assign");
        interp.print("x").expect("print");
        interp.increment("x", "3").expect("increment");
        interp.print("x").expect("print");
        interp.decrement("x", "2").expect("decrement");
        interp.print("x").expect("print");
        interp.assign("y", "7/2").expect("assign");
        interp.print("y").expect("print");
        interp.print("「x=」").expect("print");
        interp.print("{1, 2}").expect("print");
    }
    assert_eq!(
        String::from_utf8(output).expect("utf-8"),
        "5\n8\n6\n3.5\nx=\n{1, 2}\n"
    );
}

#[test]
fn test_statement_errors() {
    let mut output = Vec::new();
    let mut input = io::empty();
    let mut interp = Interp::new(&mut output, &mut input);

    assert!(matches!(
        interp.increment("missing", "1"),
        Err(EvalError::UndefinedVariable(_))
    ));

    interp.assign("s", "「abc」").expect("assign");
    assert!(matches!(
        interp.increment("s", "1"),
        Err(EvalError::TypeMismatch(_))
    ));

    // a failed assignment commits nothing
    assert!(interp.assign("z", "nope").is_err());
    assert!(interp.variables.get("z").is_none());
}

#[test]
fn test_dump_store() {
    let mut output = Vec::new();
    let mut input = io::empty();
    {
        let mut interp = Interp::new(&mut output, &mut input);
        interp.assign("x", "5").expect("assign");
        interp.assign("s", "「abc」").expect("assign");
        interp.assign("a", "{1, 2}").expect("assign");
        interp.dump_store().expect("dump");
    }
    assert_eq!(
        String::from_utf8(output).expect("utf-8"),
        "a = {1, 2}\ns = 「abc」\nx = 5\n"
    );
}

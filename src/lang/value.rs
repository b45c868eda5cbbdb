use std::cmp::Ordering;
use std::fmt;

use crate::lang::error::{EvalError, Result};

/// Text of the DNCL true token
pub const TRUE_TOKEN: &str = "真";
/// Text of the DNCL false token
pub const FALSE_TOKEN: &str = "偽";

/// Largest integer magnitude an f64 carries exactly (2^53 - 1)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone)]
pub enum Value {
    /// Integers are kept as 64 bit signed; formula arithmetic happens in f64
    /// and whole results are renormalized back into this variant
    Integer(i64),
    Real(f64),
    /// Also carries the boolean tokens: 真 and 偽 are text in this dialect,
    /// not a primitive boolean
    Text(String),
    Array(Vec<Value>),
}

impl Value {
    /// Normalize a formula result: whole numbers become `Integer`, everything
    /// else stays `Real`
    pub fn number(raw: f64) -> Value {
        if raw.is_finite() && raw.fract() == 0.0 && raw.abs() <= MAX_EXACT_INTEGER {
            Value::Integer(raw as i64)
        } else {
            Value::Real(raw)
        }
    }

    pub fn truth(flag: bool) -> Value {
        let token = if flag { TRUE_TOKEN } else { FALSE_TOKEN };
        Value::Text(token.to_string())
    }

    /// A value is true iff it is exactly the 真 token
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Text(text) if text == TRUE_TOKEN)
    }

    pub fn as_real(&self) -> Result<f64> {
        match self {
            Value::Integer(v) => Ok(*v as f64),
            Value::Real(v) => Ok(*v),
            other => Err(EvalError::TypeMismatch(format!(
                "Expected a number, got {}",
                other.kind()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
        }
    }

    /// Fold one more `と` part into the accumulator. The accumulator's kind
    /// decides the operation: numeric add (an integer accumulator promotes to
    /// real when a real part arrives), text concatenation, array
    /// concatenation. Anything else is a type mismatch.
    pub fn combine(self, other: Value) -> Result<Value> {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l
                .checked_add(r)
                .map(Value::Integer)
                .ok_or_else(|| EvalError::Overflow(format!("{} + {}", l, r))),
            (Value::Integer(l), Value::Real(r)) => Ok(Value::Real(l as f64 + r)),
            (Value::Real(l), Value::Integer(r)) => Ok(Value::Real(l + r as f64)),
            (Value::Real(l), Value::Real(r)) => Ok(Value::Real(l + r)),
            (Value::Text(mut l), Value::Text(r)) => {
                l.push_str(&r);
                Ok(Value::Text(l))
            }
            (Value::Array(mut l), Value::Array(mut r)) => {
                l.append(&mut r);
                Ok(Value::Array(l))
            }
            (l, r) => Err(EvalError::TypeMismatch(format!(
                "cannot combine {} and {}",
                l.kind(),
                r.kind()
            ))),
        }
    }

    /// Ordering for the relational glyphs. Numeric kinds cross-compare, text
    /// is lexicographic, arrays compare elementwise then by length.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => Ok(l.cmp(r)),
            (Value::Integer(l), Value::Real(r)) => real_cmp(*l as f64, *r),
            (Value::Real(l), Value::Integer(r)) => real_cmp(*l, *r as f64),
            (Value::Real(l), Value::Real(r)) => real_cmp(*l, *r),
            (Value::Text(l), Value::Text(r)) => Ok(l.as_str().cmp(r.as_str())),
            (Value::Array(l), Value::Array(r)) => {
                for (a, b) in l.iter().zip(r.iter()) {
                    match a.compare(b)? {
                        Ordering::Equal => continue,
                        decided => return Ok(decided),
                    }
                }
                Ok(l.len().cmp(&r.len()))
            }
            (l, r) => Err(EvalError::TypeMismatch(format!(
                "cannot order {} and {}",
                l.kind(),
                r.kind()
            ))),
        }
    }

    /// Rendering for the store dump and for array elements: text gets its
    /// 「」 quotes back, everything else prints as `Display`
    pub fn literal(&self) -> String {
        match self {
            Value::Text(text) => format!("「{}」", text),
            other => other.to_string(),
        }
    }
}

fn real_cmp(left: f64, right: f64) -> Result<Ordering> {
    left.partial_cmp(&right)
        .ok_or_else(|| EvalError::TypeMismatch("cannot order against NaN".to_string()))
}

/// Reals always show a decimal point, so a whole `Real` prints as `3.0` and
/// stays visibly distinct from an `Integer`
fn format_real(value: f64) -> String {
    let repr = value.to_string();
    if repr.chars().all(|ch| ch.is_ascii_digit() || ch == '-') {
        format!("{}.0", repr)
    } else {
        repr
    }
}

impl PartialEq for Value {
    /// Equality for the ＝/≠ glyphs: numeric kinds compare by value, every
    /// other cross-kind pair is simply unequal
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l == r,
            (Value::Integer(l), Value::Real(r)) => (*l as f64) == *r,
            (Value::Real(l), Value::Integer(r)) => *l == (*r as f64),
            (Value::Real(l), Value::Real(r)) => l == r,
            (Value::Text(l), Value::Text(r)) => l == r,
            (Value::Array(l), Value::Array(r)) => l == r,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", format_real(*v)),
            Value::Text(v) => write!(f, "{}", v),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|item| item.literal()).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

#[test]
fn test_number_normalization() {
    let tests = vec![
        (3.0, Value::Integer(3)),
        (-4.0, Value::Integer(-4)),
        (3.5, Value::Real(3.5)),
        (0.25, Value::Real(0.25)),
        (1e300, Value::Real(1e300)),
    ];

    for (input, expected) in tests {
        assert_eq!(Value::number(input), expected, "input: {}", input);
    }
}

#[test]
fn test_combine() {
    let tests = vec![
        (Value::Integer(1), Value::Integer(2), Value::Integer(3)),
        (Value::Integer(1), Value::Real(1.5), Value::Real(2.5)),
        (Value::Real(1.5), Value::Integer(1), Value::Real(2.5)),
        (Value::Real(1.5), Value::Real(1.5), Value::Real(3.0)),
        (
            Value::Text("ab".to_string()),
            Value::Text("cd".to_string()),
            Value::Text("abcd".to_string()),
        ),
        (
            Value::Array(vec![Value::Integer(1)]),
            Value::Array(vec![Value::Integer(2), Value::Integer(3)]),
            Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]),
        ),
    ];

    for (left, right, expected) in tests {
        let combined = left.combine(right).expect("combine failed");
        assert_eq!(combined, expected);
    }

    // a real accumulator stays real even when the sum is whole
    assert_eq!(
        Value::Real(1.5)
            .combine(Value::Real(1.5))
            .expect("combine failed")
            .kind(),
        "real"
    );

    let mismatches = vec![
        (Value::Text("a".to_string()), Value::Integer(1)),
        (Value::Integer(1), Value::Text("a".to_string())),
        (Value::Array(vec![]), Value::Integer(1)),
        (Value::Array(vec![]), Value::Text("ab".to_string())),
    ];

    for (left, right) in mismatches {
        assert!(matches!(
            left.combine(right),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    assert!(matches!(
        Value::Integer(i64::MAX).combine(Value::Integer(1)),
        Err(EvalError::Overflow(_))
    ));
}

#[test]
fn test_compare_and_eq() {
    use std::cmp::Ordering;

    assert_eq!(Value::Integer(1), Value::Real(1.0));
    assert_ne!(Value::Integer(1), Value::Text("1".to_string()));
    assert_eq!(
        Value::Integer(3).compare(&Value::Real(2.5)).unwrap(),
        Ordering::Greater
    );
    assert_eq!(
        Value::Text("a".to_string())
            .compare(&Value::Text("b".to_string()))
            .unwrap(),
        Ordering::Less
    );
    assert_eq!(
        Value::Array(vec![Value::Integer(1), Value::Integer(2)])
            .compare(&Value::Array(vec![Value::Integer(1), Value::Integer(3)]))
            .unwrap(),
        Ordering::Less
    );
    assert_eq!(
        Value::Array(vec![Value::Integer(1)])
            .compare(&Value::Array(vec![Value::Integer(1), Value::Integer(0)]))
            .unwrap(),
        Ordering::Less
    );
    assert!(matches!(
        Value::Integer(1).compare(&Value::Text("a".to_string())),
        Err(EvalError::TypeMismatch(_))
    ));
}

#[test]
fn test_display() {
    let tests = vec![
        (Value::Integer(5), "5"),
        (Value::Integer(-2), "-2"),
        (Value::Real(3.5), "3.5"),
        (Value::Real(3.0), "3.0"),
        (Value::Real(-2.0), "-2.0"),
        (Value::Text("こんにちは".to_string()), "こんにちは"),
        (Value::truth(true), "真"),
        (
            Value::Array(vec![Value::Integer(1), Value::Text("a".to_string())]),
            "{1, 「a」}",
        ),
    ];

    for (value, expected) in tests {
        assert_eq!(value.to_string(), expected);
    }

    assert_eq!(Value::Text("abc".to_string()).literal(), "「abc」");
    assert_eq!(Value::Integer(7).literal(), "7");
}

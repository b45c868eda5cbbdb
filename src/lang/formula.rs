use crate::lang::error::{EvalError, Result};
use crate::lang::value::Value;

const MULTIPLICATIVE: [char; 4] = ['×', '/', '÷', '％'];
const ADDITIVE: [char; 2] = ['＋', '－'];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Operator(char),
}

/// Evaluate a DNCL formula such as `2＋3×4` or `（1＋2）×（3＋4）`.
///
/// Arithmetic happens entirely in f64; whole results renormalize to
/// `Integer`, everything else comes back as `Real`.
pub fn evaluate(formula: &str) -> Result<Value> {
    Ok(Value::number(eval_real(formula)?))
}

fn eval_real(formula: &str) -> Result<f64> {
    let mut tokens = tokenize(formula)?;

    reduce(&mut tokens, &MULTIPLICATIVE, formula)?;
    reduce(&mut tokens, &ADDITIVE, formula)?;

    match tokens.as_slice() {
        [Token::Number(value)] => Ok(*value),
        _ => Err(EvalError::MalformedExpression(formula.to_string())),
    }
}

/// Map ASCII and full-width digits to their value
pub(crate) fn digit(ch: char) -> Option<u32> {
    match ch {
        '0'..='9' => Some(ch as u32 - '0' as u32),
        '０'..='９' => Some(ch as u32 - '０' as u32),
        _ => None,
    }
}

fn is_operator(ch: char) -> bool {
    MULTIPLICATIVE.contains(&ch) || ADDITIVE.contains(&ch)
}

fn tokenize(formula: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = formula.chars().collect();
    let mut tokens = Vec::new();
    let mut buffer = String::new();
    // pending unary sign, applied to the next number or group
    let mut sign = 1.0f64;

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];

        if ch == '.' || digit(ch).is_some() {
            buffer.push(ch);
            i += 1;
            continue;
        }

        flush_number(&mut buffer, &mut sign, &mut tokens)?;

        if is_operator(ch) {
            let has_left_operand = matches!(tokens.last(), Some(Token::Number(_)));
            if !has_left_operand && (ch == '－' || ch == '＋') {
                // prefix position: a sign, not an operator
                if ch == '－' {
                    sign = -sign;
                }
            } else {
                tokens.push(Token::Operator(ch));
            }
            i += 1;
        } else if ch == '（' {
            // collect the group up to the matching close (or the rest of the
            // formula when unbalanced) and evaluate it recursively
            let mut inner = String::new();
            let mut depth = 1;
            i += 1;
            while i < chars.len() && depth > 0 {
                match chars[i] {
                    '（' => depth += 1,
                    '）' => depth -= 1,
                    _ => (),
                }
                if depth > 0 {
                    inner.push(chars[i]);
                }
                i += 1;
            }
            tokens.push(Token::Number(sign * eval_real(&inner)?));
            sign = 1.0;
        } else if ch.is_whitespace() {
            i += 1;
        } else {
            return Err(EvalError::InvalidCharacter {
                ch,
                formula: formula.to_string(),
            });
        }
    }

    flush_number(&mut buffer, &mut sign, &mut tokens)?;

    Ok(tokens)
}

fn flush_number(buffer: &mut String, sign: &mut f64, tokens: &mut Vec<Token>) -> Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }

    let normalized: Option<String> = buffer
        .chars()
        .map(|ch| {
            if ch == '.' {
                Some('.')
            } else {
                digit(ch).and_then(|d| std::char::from_digit(d, 10))
            }
        })
        .collect();

    let value = match normalized.and_then(|repr| repr.parse::<f64>().ok()) {
        Some(value) => value,
        None => return Err(EvalError::MalformedExpression(buffer.clone())),
    };

    tokens.push(Token::Number(*sign * value));
    *sign = 1.0;
    buffer.clear();

    Ok(())
}

/// One left-to-right pass: apply every operator of `tier` to its numeric
/// neighbors, splicing the result back in place and re-examining from it
fn reduce(tokens: &mut Vec<Token>, tier: &[char], formula: &str) -> Result<()> {
    let mut i = 0;
    while i < tokens.len() {
        let op = match tokens[i] {
            Token::Operator(op) if tier.contains(&op) => op,
            _ => {
                i += 1;
                continue;
            }
        };

        if i == 0 || i + 1 >= tokens.len() {
            return Err(EvalError::MalformedExpression(formula.to_string()));
        }
        let (left, right) = match (tokens[i - 1], tokens[i + 1]) {
            (Token::Number(left), Token::Number(right)) => (left, right),
            _ => return Err(EvalError::MalformedExpression(formula.to_string())),
        };

        tokens[i - 1] = Token::Number(apply(op, left, right)?);
        tokens.drain(i..=i + 1);
        i -= 1;
    }

    Ok(())
}

/// The six operator glyphs. `÷` floors and `％` is the floor-consistent
/// modulo, so `－7÷2` is -4 and `－7％2` is 1.
pub(crate) fn apply(op: char, left: f64, right: f64) -> Result<f64> {
    match op {
        '＋' => Ok(left + right),
        '－' => Ok(left - right),
        '×' => Ok(left * right),
        '/' => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(left / right)
            }
        }
        '÷' => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok((left / right).floor())
            }
        }
        '％' => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(left - (left / right).floor() * right)
            }
        }
        other => Err(EvalError::UnknownOperator(other)),
    }
}

#[test]
fn test_evaluate() {
    let tests = vec![
        ("2＋3×4", Value::Integer(14)),
        ("（1＋2）×（3＋4）", Value::Integer(21)),
        ("（（2＋3）×2）", Value::Integer(10)),
        ("10－2－3", Value::Integer(5)),
        ("7/2", Value::Real(3.5)),
        ("1/4", Value::Real(0.25)),
        ("7÷2", Value::Integer(3)),
        ("7％2", Value::Integer(1)),
        ("－7÷2", Value::Integer(-4)),
        ("－7％2", Value::Integer(1)),
        ("－7÷－2", Value::Integer(3)),
        ("7％－2", Value::Integer(-1)),
        ("3×－2", Value::Integer(-6)),
        ("－（1＋2）×3", Value::Integer(-9)),
        ("2 ＋ 3", Value::Integer(5)),
        ("２＋３", Value::Integer(5)),
        ("1.5＋1.5", Value::Integer(3)),
        ("2.5×2", Value::Integer(5)),
        ("42", Value::Integer(42)),
    ];

    for (input, expected) in tests {
        let value = evaluate(input).expect(input);
        assert_eq!(value, expected, "input: {}", input);
    }
}

#[test]
fn test_evaluate_unbalanced_group() {
    // an unclosed group swallows the rest of the formula
    assert_eq!(evaluate("（2＋3").expect("eval"), Value::Integer(5));
}

#[test]
fn test_evaluate_errors() {
    assert!(matches!(
        evaluate("2a"),
        Err(EvalError::InvalidCharacter { ch: 'a', .. })
    ));
    assert!(matches!(evaluate("5÷0"), Err(EvalError::DivisionByZero)));
    assert!(matches!(evaluate("5/0"), Err(EvalError::DivisionByZero)));
    assert!(matches!(evaluate("5％0"), Err(EvalError::DivisionByZero)));
    assert!(matches!(
        evaluate(""),
        Err(EvalError::MalformedExpression(_))
    ));
    assert!(matches!(
        evaluate("5＋"),
        Err(EvalError::MalformedExpression(_))
    ));
    assert!(matches!(
        evaluate("×5"),
        Err(EvalError::MalformedExpression(_))
    ));
    assert!(matches!(
        evaluate("1.2.3"),
        Err(EvalError::MalformedExpression(_))
    ));
    assert!(matches!(
        evaluate("1 2"),
        Err(EvalError::MalformedExpression(_))
    ));
}

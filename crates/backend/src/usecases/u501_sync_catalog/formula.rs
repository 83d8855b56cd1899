//! Интерпретатор ценовых формул в точной десятичной арифметике.
//!
//! Грамматика: десятичные литералы, плейсхолдеры `{name}`, операторы
//! `+ - * /`, скобки. Функций, сравнений и унарного минуса нет.
//! Конвейер: токенизация -> подстановка плейсхолдеров -> shunting-yard ->
//! вычисление постфиксной записи на стеке `Decimal`.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use super::errors::{SyncError, SyncResult};

/// Плейсхолдеры, которые может использовать формула
pub const PLACEHOLDERS: &[&str] = &[
    "basePrice",
    "discount",
    "discountPercent",
    "discountMultiplier",
    "priceMargin",
    "priceMarginPercent",
    "priceMarginFactor",
    "vat",
    "vatPercent",
    "shipping",
];

pub fn is_known_placeholder(name: &str) -> bool {
    PLACEHOLDERS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }

    fn apply(self, a: Decimal, b: Decimal) -> SyncResult<Decimal> {
        let result = match self {
            Self::Add => a.checked_add(b),
            Self::Sub => a.checked_sub(b),
            Self::Mul => a.checked_mul(b),
            // деление на ноль дает ноль: кривая цена не должна ронять запуск
            Self::Div if b.is_zero() => Some(Decimal::ZERO),
            Self::Div => a.checked_div(b),
        };
        result.ok_or_else(|| SyncError::Formula(format!("arithmetic overflow in {a} {self:?} {b}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Placeholder(String),
    Op(Operator),
    LParen,
    RParen,
}

/// Вычислить формулу с заданными значениями плейсхолдеров
pub fn evaluate(formula: &str, bindings: &HashMap<String, Decimal>) -> SyncResult<Decimal> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Err(SyncError::Formula("formula is empty".into()));
    }
    let tokens = substitute(tokens, bindings)?;
    let postfix = to_postfix(tokens)?;
    eval_postfix(&postfix)
}

fn tokenize(formula: &str) -> SyncResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = formula.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = Decimal::from_str(&literal)
                .map_err(|_| SyncError::Formula(format!("malformed number '{literal}'")))?;
            tokens.push(Token::Number(value));
            continue;
        }

        chars.next();
        match c {
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(SyncError::Formula(format!("unterminated placeholder '{{{name}'")));
                }
                tokens.push(Token::Placeholder(name.trim().to_string()));
            }
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            _ => match Operator::from_char(c) {
                Some(op) => tokens.push(Token::Op(op)),
                None => {
                    return Err(SyncError::Formula(format!("unexpected character '{c}'")));
                }
            },
        }
    }

    Ok(tokens)
}

fn substitute(tokens: Vec<Token>, bindings: &HashMap<String, Decimal>) -> SyncResult<Vec<Token>> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Placeholder(name) => {
                if !is_known_placeholder(&name) {
                    return Err(SyncError::Formula(format!("unknown placeholder '{{{name}}}'")));
                }
                bindings
                    .get(&name)
                    .copied()
                    .map(Token::Number)
                    .ok_or_else(|| SyncError::Formula(format!("no value bound for '{{{name}}}'")))
            }
            other => Ok(other),
        })
        .collect()
}

/// Shunting-yard: `* /` связывают сильнее `+ -`, все операторы левоассоциативны
fn to_postfix(tokens: Vec<Token>) -> SyncResult<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(_) => output.push(token),
            Token::Op(op) => {
                while let Some(Token::Op(top)) = stack.last() {
                    if top.precedence() >= op.precedence() {
                        output.push(Token::Op(*top));
                        stack.pop();
                    } else {
                        break;
                    }
                }
                stack.push(Token::Op(op));
            }
            Token::LParen => stack.push(Token::LParen),
            Token::RParen => loop {
                match stack.pop() {
                    Some(Token::LParen) => break,
                    Some(t) => output.push(t),
                    None => return Err(SyncError::Formula("unbalanced ')'".into())),
                }
            },
            Token::Placeholder(name) => {
                return Err(SyncError::Formula(format!("unresolved placeholder '{name}'")));
            }
        }
    }

    while let Some(t) = stack.pop() {
        if t == Token::LParen {
            return Err(SyncError::Formula("unbalanced '('".into()));
        }
        output.push(t);
    }

    Ok(output)
}

fn eval_postfix(postfix: &[Token]) -> SyncResult<Decimal> {
    let mut stack: Vec<Decimal> = Vec::new();

    for token in postfix {
        match token {
            Token::Number(n) => stack.push(*n),
            Token::Op(op) => {
                let (b, a) = match (stack.pop(), stack.pop()) {
                    (Some(b), Some(a)) => (b, a),
                    _ => return Err(SyncError::Formula(format!("missing operand for {op:?}"))),
                };
                stack.push(op.apply(a, b)?);
            }
            _ => return Err(SyncError::Formula("unexpected token in postfix".into())),
        }
    }

    match stack.as_slice() {
        [value] => Ok(*value),
        [] => Err(SyncError::Formula("formula produced no value".into())),
        _ => Err(SyncError::Formula("dangling operands".into())),
    }
}

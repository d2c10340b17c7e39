//! Operand stack and token evaluation.

use thiserror::Error;

/// Maximum number of values on the operand stack.
pub const STACK_DEPTH: usize = 10;

/// Conditions the calculator cannot recover from.
///
/// Each one ends the worker process; see [`Stop::terminate`](super::Stop::terminate).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// An operator needed more operands than the stack holds.
    #[error("pop on an empty stack")]
    Underflow,
    /// A push would exceed [`STACK_DEPTH`].
    #[error("push on a full stack")]
    Overflow,
    /// Division by zero, or a quotient that does not fit.
    #[error("division by zero")]
    DivideByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Binary(BinOp),
    Print,
    Number(i32),
}

impl Token {
    fn parse(s: &str) -> Option<Token> {
        let op = match s {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "." => return Some(Token::Print),
            _ => return parse_number(s).map(Token::Number),
        };
        Some(Token::Binary(op))
    }
}

/// Decimal integer with an optional leading `-`. Wraps like a C `int`.
fn parse_number(s: &str) -> Option<i32> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n = digits.bytes().fold(0i32, |acc, b| {
        acc.wrapping_mul(10).wrapping_add(i32::from(b - b'0'))
    });
    Some(if negative { n.wrapping_neg() } else { n })
}

/// Stack machine. The stack survives across lines.
#[derive(Debug, Default)]
pub struct Machine {
    stack: Vec<i32>,
}

impl Machine {
    /// Creates an empty machine.
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(STACK_DEPTH),
        }
    }

    /// Current stack, bottom first.
    pub fn stack(&self) -> &[i32] {
        &self.stack
    }

    /// Evaluates one input line and returns the lines it prints.
    ///
    /// On a fault nothing of this line is returned.
    pub fn eval_line(&mut self, line: &str) -> Result<Vec<String>, Fault> {
        let mut printed = Vec::new();
        for tok in line.split_whitespace() {
            match Token::parse(tok) {
                Some(Token::Number(n)) => self.push(n)?,
                Some(Token::Print) => printed.push(self.pop()?.to_string()),
                Some(Token::Binary(op)) => self.apply(op)?,
                None => printed.push(format!("invalid token: {tok:?}")),
            }
        }
        if let Some(top) = self.stack.pop() {
            printed.push(top.to_string());
        }
        Ok(printed)
    }

    fn apply(&mut self, op: BinOp) -> Result<(), Fault> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let value = match op {
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::Div => lhs.checked_div(rhs).ok_or(Fault::DivideByZero)?,
        };
        self.push(value)
    }

    fn push(&mut self, v: i32) -> Result<(), Fault> {
        if self.stack.len() == STACK_DEPTH {
            return Err(Fault::Overflow);
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, Fault> {
        self.stack.pop().ok_or(Fault::Underflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_line_prints_the_top() {
        let mut m = Machine::new();
        assert_eq!(m.eval_line("3 4 +").unwrap(), ["7"]);
        assert!(m.stack().is_empty());
    }

    #[test]
    fn explicit_print_and_leftovers() {
        let mut m = Machine::new();
        assert_eq!(m.eval_line("1 2 . 5").unwrap(), ["2", "5"]);
        assert_eq!(m.stack(), [1]);
        assert_eq!(m.eval_line("9 -").unwrap(), ["-8"]);
    }

    #[test]
    fn numbers_parse_like_c_ints() {
        assert_eq!(parse_number("-12"), Some(-12));
        assert_eq!(parse_number("007"), Some(7));
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("+3"), None);
        assert_eq!(parse_number("4x"), None);
        assert_eq!(parse_number("2147483648"), Some(i32::MIN));
    }

    #[test]
    fn invalid_tokens_are_reported_and_skipped() {
        let mut m = Machine::new();
        assert_eq!(
            m.eval_line("2 foo 3 *").unwrap(),
            ["invalid token: \"foo\"", "6"]
        );
    }

    #[test]
    fn faults() {
        assert_eq!(Machine::new().eval_line("+"), Err(Fault::Underflow));
        assert_eq!(Machine::new().eval_line("1 ."), Ok(vec!["1".to_string()]));
        assert_eq!(Machine::new().eval_line("."), Err(Fault::Underflow));
        assert_eq!(Machine::new().eval_line("10 0 /"), Err(Fault::DivideByZero));
        assert_eq!(
            Machine::new().eval_line("-2147483648 -1 /"),
            Err(Fault::DivideByZero)
        );
        assert_eq!(
            Machine::new().eval_line("1 2 3 4 5 6 7 8 9 10 11"),
            Err(Fault::Overflow)
        );
    }

    #[test]
    fn arithmetic_wraps() {
        let mut m = Machine::new();
        assert_eq!(m.eval_line("2147483647 1 +").unwrap(), ["-2147483648"]);
    }
}

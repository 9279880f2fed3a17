//! Built-in arithmetic tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::tool::{Tool, ToolOutput};
use crate::error::AgentError;

/// Evaluates arithmetic expressions: `+ - * /`, unary minus, parentheses,
/// and decimal literals.
///
/// Bad input is reported as a tool-level failure so the model sees the
/// reason instead of the worker failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

#[derive(Deserialize)]
struct CalculatorArgs {
    #[serde(default)]
    expression: String,
}

#[async_trait]
impl Tool for Calculator {
    fn name(&self) -> &'static str {
        "calculator"
    }

    fn description(&self) -> &'static str {
        "Evaluates mathematical expressions. Supports +, -, *, /, parentheses, and decimal \
         numbers. Example: '(2 + 3) * 4' returns '20'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate, e.g., '2 + 3 * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: &str) -> Result<ToolOutput, AgentError> {
        let args: CalculatorArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return Ok(ToolOutput::failure(format!("Invalid arguments: {e}"))),
        };

        if args.expression.trim().is_empty() {
            return Ok(ToolOutput::failure("Expression cannot be empty"));
        }

        Ok(match evaluate(&args.expression) {
            Ok(value) => ToolOutput::success(format_number(value)),
            Err(e) => ToolOutput::failure(format!("Evaluation error: {e}")),
        })
    }
}

/// Evaluates an arithmetic expression.
///
/// # Errors
///
/// Returns a description of the first syntax error, division by zero, or
/// nesting deeper than [`MAX_NESTING`].
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut parser = Parser {
        src: expr.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
        return Err(format!("unexpected character at position {}", parser.pos));
    }
    Ok(value)
}

/// Formats integral values without a fractional part.
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

/// Deepest run of unary signs or parentheses the parser accepts.
pub const MAX_NESTING: usize = 256;

// expr   := term (('+' | '-') term)*
// term   := unary (('*' | '/') unary)*
// unary  := ('-' | '+') unary | atom
// atom   := number | '(' expr ')'
struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Runs `f` one nesting level deeper, bounding recursion on hostile input.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == b'+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == b'*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some(b'+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                if self.peek() != Some(b')') {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) => Err(format!("unexpected character '{}'", char::from(c))),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_digit() || self.src[self.pos] == b'.')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| "invalid number".to_string())?;
        text.parse::<f64>()
            .map_err(|_| format!("invalid number: {text}"))
    }
}

//! Calculator tool — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative power),
//! parentheses and unary negation, via a small recursive-descent parser.

use async_trait::async_trait;
use std::collections::BTreeMap;
use toolweave_core::error::ToolError;
use toolweave_core::tool::{Arguments, ParamSpec, ParamType, Tool};

pub struct CalculatorTool {
    parameters: BTreeMap<String, ParamSpec>,
}

impl CalculatorTool {
    pub fn new() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "expression".to_string(),
            ParamSpec::required(ParamType::String)
                .with_description("Arithmetic expression, e.g. '(2 + 3) * 4 ^ 2'"),
        );
        Self { parameters }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses and decimals."
    }

    fn parameters(&self) -> &BTreeMap<String, ParamSpec> {
        &self.parameters
    }

    async fn invoke(&self, arguments: Arguments) -> Result<String, ToolError> {
        let expr = arguments
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameter {
                tool: "calculator".into(),
                parameter: "expression".into(),
                reason: "missing required parameter".into(),
            })?;

        let value = evaluate(expr).map_err(|e| ToolError::execution("calculator", e))?;
        Ok(format_number(value))
    }
}

/// Drop the trailing `.0` from integral results.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent evaluator ───────────────────────────────────────────

/// Evaluate an expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.expr()?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected token at position {}: {tok:?}", parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let n = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Num(n));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut left = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let right = self.term()?;
            left = if op == '+' { left + right } else { left - right };
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut left = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let right = self.unary()?;
            left = match op {
                '*' => left * right,
                _ if right == 0.0 => {
                    return Err(if op == '/' { "Division by zero" } else { "Modulo by zero" }.into());
                }
                '/' => left / right,
                _ => left % right,
            };
        }
        Ok(left)
    }

    // unary = '-' unary | power
    fn unary(&mut self) -> Result<f64, String> {
        if self.peek_op() == Some('-') {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.power()
    }

    // power = primary ('^' unary)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.peek_op() == Some('^') {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn modulo_and_power() {
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 ^ 10").unwrap(), 1024.0);
        // right-associative
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ^ -1").unwrap(), 0.5);
    }

    #[test]
    fn division_and_modulo_by_zero() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("1 % 0").is_err());
    }

    #[test]
    fn malformed_expressions() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("2 $ 3").is_err());
    }

    #[test]
    fn decimals() {
        assert!((evaluate("3.14 * 2").unwrap() - 6.28).abs() < 1e-10);
    }

    #[tokio::test]
    async fn tool_formats_results() {
        let tool = CalculatorTool::new();
        let args = |e: &str| json!({"expression": e}).as_object().cloned().unwrap();
        assert_eq!(tool.invoke(args("10 / 2")).await.unwrap(), "5");
        assert!(tool.invoke(args("10 / 3")).await.unwrap().starts_with("3.333"));
    }

    #[tokio::test]
    async fn tool_reports_evaluation_errors() {
        let tool = CalculatorTool::new();
        let args = json!({"expression": "1 / 0"}).as_object().cloned().unwrap();
        let err = tool.invoke(args).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("Division by zero"));
    }

    #[test]
    fn description_lists_expression_parameter() {
        let desc = CalculatorTool::new().describe();
        assert_eq!(desc.name, "calculator");
        assert!(desc.parameters["expression"].required);
    }
}

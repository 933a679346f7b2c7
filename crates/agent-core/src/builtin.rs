//! Built-in Tools
//!
//! Small general-purpose tools so an agent is useful before any domain tools
//! are registered.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::tool::{Tool, ToolRegistry, require_str};

/// Register every built-in tool
pub fn register_builtins(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(
        DateTimeTool::NAME,
        DateTimeTool,
        "Get the current date and time",
        DateTimeTool::parameters(),
    )?;
    registry.register(
        CalculatorTool::NAME,
        CalculatorTool,
        "Evaluate an arithmetic expression with + - * / ^ and parentheses",
        CalculatorTool::parameters(),
    )?;
    Ok(())
}

/// DateTime tool - returns current time
pub struct DateTimeTool;

impl DateTimeTool {
    pub const NAME: &'static str = "datetime";

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Output format",
                    "enum": ["iso", "human", "unix"]
                }
            }
        })
    }
}

#[async_trait]
impl Tool for DateTimeTool {
    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<Value> {
        let now = chrono::Utc::now();
        let output = match arguments.get("format").and_then(Value::as_str).unwrap_or("human") {
            "iso" => json!(now.to_rfc3339()),
            "unix" => json!(now.timestamp()),
            "human" => json!(now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string()),
            other => anyhow::bail!("Unsupported format: {other}"),
        };
        Ok(output)
    }
}

/// Calculator tool - evaluates mathematical expressions
pub struct CalculatorTool;

impl CalculatorTool {
    pub const NAME: &'static str = "calculate";

    pub fn parameters() -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    async fn call(&self, arguments: Map<String, Value>) -> anyhow::Result<Value> {
        let expression = require_str(&arguments, "expression")?;
        let value = Parser::new(expression).parse()?;
        Ok(json!({ "expression": expression, "result": value }))
    }
}

/// Deepest nesting of parentheses, unary minus and `^` chains accepted
const MAX_DEPTH: usize = 256;

/// Recursive-descent evaluator over `expr := term (('+'|'-') term)*`,
/// `term := power (('*'|'/') power)*`, `power := unary ('^' power)?`
struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            depth: 0,
        }
    }

    fn parse(mut self) -> anyhow::Result<f64> {
        let value = self.expr()?;
        self.skip_ws();
        if let Some(c) = self.chars.next() {
            anyhow::bail!("Unexpected character '{c}'");
        }
        Ok(value)
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if_eq(&expected).is_some()
    }

    /// Run `f` one nesting level deeper, refusing input that would exhaust the stack
    fn nested(&mut self, f: fn(&mut Self) -> anyhow::Result<f64>) -> anyhow::Result<f64> {
        if self.depth >= MAX_DEPTH {
            anyhow::bail!("Expression nested too deeply");
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> anyhow::Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> anyhow::Result<f64> {
        let mut value = self.power()?;
        loop {
            if self.eat('*') {
                value *= self.power()?;
            } else if self.eat('/') {
                let divisor = self.power()?;
                if divisor == 0.0 {
                    anyhow::bail!("Division by zero");
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn power(&mut self) -> anyhow::Result<f64> {
        let base = self.unary()?;
        if self.eat('^') {
            return Ok(base.powf(self.nested(Self::power)?));
        }
        Ok(base)
    }

    fn unary(&mut self) -> anyhow::Result<f64> {
        if self.eat('-') {
            return Ok(-self.nested(Self::unary)?);
        }
        if self.eat('(') {
            let value = self.nested(Self::expr)?;
            if !self.eat(')') {
                anyhow::bail!("Missing closing parenthesis");
            }
            return Ok(value);
        }
        self.number()
    }

    fn number(&mut self) -> anyhow::Result<f64> {
        self.skip_ws();
        let mut literal = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            literal.push(c);
        }
        if literal.is_empty() {
            anyhow::bail!("Expected a number");
        }
        literal
            .parse()
            .map_err(|e| anyhow::anyhow!("Parse error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ToolDispatcher;
    use crate::tool::ToolCall;
    use std::sync::Arc;

    fn eval(expr: &str) -> anyhow::Result<f64> {
        Parser::new(expr).parse()
    }

    #[test]
    fn test_calculator() {
        assert!((eval("2 + 2").unwrap() - 4.0).abs() < f64::EPSILON);
        assert!((eval("10 * 5").unwrap() - 50.0).abs() < f64::EPSILON);
        assert!((eval("(2 + 3) * 4").unwrap() - 20.0).abs() < f64::EPSILON);
        assert!((eval("2 ^ 8").unwrap() - 256.0).abs() < f64::EPSILON);
        assert!((eval("10 - 4 - 3").unwrap() - 3.0).abs() < f64::EPSILON);
        assert!((eval("-3 * -2").unwrap() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn calculator_rejects_bad_input() {
        assert_eq!(eval("1 / 0").unwrap_err().to_string(), "Division by zero");
        assert!(eval("(1 + 2").is_err());
        assert!(eval("2 +").is_err());
        assert!(eval("2 $ 3").is_err());
    }

    #[test]
    fn calculator_limits_nesting() {
        let shallow = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!((eval(&shallow).unwrap() - 1.0).abs() < f64::EPSILON);

        for deep in [
            format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000)),
            format!("{}1", "-".repeat(50_000)),
            format!("2{}", "^2".repeat(50_000)),
        ] {
            assert_eq!(eval(&deep).unwrap_err().to_string(), "Expression nested too deeply");
        }
    }

    #[tokio::test]
    async fn deeply_nested_expression_fails_alone() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry).unwrap();
        let dispatcher = ToolDispatcher::new(Arc::new(registry), 4);

        let deep = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        let calls = [
            ToolCall::from_value("deep", CalculatorTool::NAME, json!({ "expression": deep })),
            ToolCall::from_value("easy", CalculatorTool::NAME, json!({ "expression": "1+1" })),
        ];
        let results = dispatcher.dispatch(&calls).await;

        assert_eq!(results[0].error(), Some("Expression nested too deeply"));
        assert_eq!(results[1].output().unwrap()["result"], json!(2.0));
    }

    #[tokio::test]
    async fn builtins_register_and_run() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry).unwrap();
        assert_eq!(registry.names(), ["calculate", "datetime"]);

        let calc = &registry.lookup("calculate").unwrap().callable;
        let args = json!({"expression": "6 * 7"}).as_object().cloned().unwrap();
        let output = calc.call(args).await.unwrap();
        assert_eq!(output["result"], json!(42.0));

        let missing = calc.call(Map::new()).await.unwrap_err();
        assert_eq!(missing.to_string(), "Missing required parameter: expression");

        let clock = &registry.lookup("datetime").unwrap().callable;
        let args = json!({"format": "unix"}).as_object().cloned().unwrap();
        assert!(clock.call(args).await.unwrap().is_i64());
    }
}

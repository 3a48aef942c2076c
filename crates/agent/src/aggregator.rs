//! Result aggregation — one round's results folded into observation text.

use std::fmt::Write as _;
use toolweave_core::plan::ExecutionResult;

/// Rendered observation plus counts for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    pub successes: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    max_output_chars: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self {
            max_output_chars: 4000,
        }
    }
}

impl ResultAggregator {
    /// `max_output_chars` of zero keeps outputs whole.
    pub fn new(max_output_chars: usize) -> Self {
        Self { max_output_chars }
    }

    /// Render results in order, one entry per call:
    ///
    /// ```text
    /// [1] search_wiki -> success: ...
    /// [2] calc -> error: Tool execution failed: ...
    /// 2 call(s): 1 succeeded, 1 failed
    /// ```
    pub fn render(&self, results: &[ExecutionResult]) -> Observation {
        if results.is_empty() {
            return Observation {
                text: "No tool calls were executed.".into(),
                successes: 0,
                failures: 0,
            };
        }

        let mut text = String::new();
        let mut successes = 0;
        for (i, result) in results.iter().enumerate() {
            let status = if result.is_success() {
                successes += 1;
                "success"
            } else {
                "error"
            };
            let _ = writeln!(
                text,
                "[{}] {} -> {status}: {}",
                i + 1,
                result.tool,
                self.clip(result.output.trim())
            );
        }
        let failures = results.len() - successes;
        let _ = write!(
            text,
            "{} call(s): {successes} succeeded, {failures} failed",
            results.len()
        );

        Observation {
            text,
            successes,
            failures,
        }
    }

    fn clip(&self, output: &str) -> String {
        let total = output.chars().count();
        if self.max_output_chars == 0 || total <= self.max_output_chars {
            return output.to_string();
        }
        let kept: String = output.chars().take(self.max_output_chars).collect();
        format!("{kept}... [truncated {} chars]", total - self.max_output_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolweave_core::error::ToolError;

    #[test]
    fn renders_in_order_with_distinct_markers() {
        let results = vec![
            ExecutionResult::success("search_wiki", "Rust is a language", 12),
            ExecutionResult::failure("calc", &ToolError::execution("calc", "Division by zero"), 1),
            ExecutionResult::success("search_news", "Rust 2.0 released", 30),
        ];
        let obs = ResultAggregator::default().render(&results);
        let lines: Vec<_> = obs.text.lines().collect();

        assert_eq!(lines[0], "[1] search_wiki -> success: Rust is a language");
        assert!(lines[1].starts_with("[2] calc -> error: "));
        assert!(lines[1].contains("Division by zero"));
        assert_eq!(lines[2], "[3] search_news -> success: Rust 2.0 released");
        assert_eq!(lines[3], "3 call(s): 2 succeeded, 1 failed");
        assert_eq!((obs.successes, obs.failures), (2, 1));
    }

    #[test]
    fn truncates_long_outputs() {
        let long = "é".repeat(50);
        let obs = ResultAggregator::new(10).render(&[ExecutionResult::success("t", long, 0)]);
        assert!(obs.text.contains(&format!("{}... [truncated 40 chars]", "é".repeat(10))));
    }

    #[test]
    fn empty_results() {
        let obs = ResultAggregator::default().render(&[]);
        assert_eq!(obs.text, "No tool calls were executed.");
    }

    #[test]
    fn rendering_is_pure() {
        let results = vec![ExecutionResult::success("t", "x", 0)];
        let aggregator = ResultAggregator::default();
        assert_eq!(aggregator.render(&results), aggregator.render(&results));
    }
}

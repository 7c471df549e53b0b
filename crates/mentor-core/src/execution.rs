/// Outcome of running generated code. Exactly one of stdout or error exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Captured standard output, trimmed.
    Output(String),
    /// Rejection reason or the string form of the raised error.
    Failed(String),
}

impl ExecutionResult {
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Output(out) => Some(out),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Output(_) => None,
            Self::Failed(err) => Some(err),
        }
    }

    /// Output that can stand as an answer: present and non-empty.
    pub fn answer(&self) -> Option<&str> {
        self.stdout().filter(|out| !out.is_empty())
    }
}

/// Capability flags for one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Expose the symbolic-mathematics library and its primitives.
    pub use_sympy: bool,
}

impl Capabilities {
    pub const NUMERIC: Self = Self { use_sympy: false };
    pub const SYMBOLIC: Self = Self { use_sympy: true };
}

/// Runs model-generated code under a restricted capability set.
///
/// Implementations never fail: every problem is reported through
/// [`ExecutionResult::Failed`].
pub trait CodeRunner: Send + Sync {
    fn execute(&self, code: &str, capabilities: Capabilities) -> ExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_are_exclusive() {
        let ok = ExecutionResult::Output("0.0277".into());
        assert_eq!(ok.stdout(), Some("0.0277"));
        assert!(ok.error().is_none());

        let failed = ExecutionResult::Failed("boom".into());
        assert!(failed.stdout().is_none());
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn test_empty_output_is_not_an_answer() {
        assert_eq!(ExecutionResult::Output(String::new()).answer(), None);
        assert_eq!(ExecutionResult::Output("42".into()).answer(), Some("42"));
        assert_eq!(ExecutionResult::Failed("x".into()).answer(), None);
    }
}

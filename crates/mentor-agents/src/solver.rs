use std::sync::Arc;

use mentor_core::{
    Capabilities, CodeRunner, Inference, MentorError, MentorResult, Retriever, SolutionArtifact,
    Tier, Topic,
};
use tracing::{debug, warn};

use crate::prompts;

pub const SYMBOLIC_LABEL: &str = "**Symbolic Solution (via SymPy):**";
pub const NUMERIC_LABEL: &str = "**Calculated Answer:**";
pub const DEFAULT_RETRIEVAL_K: usize = 3;

/// Words that send any problem to the symbolic tier, whatever its topic.
const SYMBOLIC_CUES: [&str; 5] = ["differential", "derivative", "integrate", "integral", "dy/dx"];

const NUMERIC_TOPICS: [Topic; 3] = [Topic::Probability, Topic::Algebra, Topic::LinearAlgebra];

/// Tiered solver: symbolic code, numeric code, then retrieval-grounded
/// explanation. Each tier falls through to the next on any failure.
pub struct Solver {
    inference: Arc<dyn Inference>,
    runner: Arc<dyn CodeRunner>,
    retriever: Arc<dyn Retriever>,
    retrieval_k: usize,
}

impl Solver {
    pub fn new(
        inference: Arc<dyn Inference>,
        runner: Arc<dyn CodeRunner>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            inference,
            runner,
            retriever,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    pub fn solve(&self, problem_text: &str, topic: Topic) -> SolutionArtifact {
        if wants_symbolic(problem_text, topic) {
            match self.code_tier(problem_text, Capabilities::SYMBOLIC) {
                Ok((code, answer)) => {
                    return SolutionArtifact::new(
                        Tier::Symbolic,
                        format!("{SYMBOLIC_LABEL}\n{answer}"),
                        vec![code],
                    )
                }
                Err(e) => debug!(error = %e, "symbolic tier fell through"),
            }
        }

        if NUMERIC_TOPICS.contains(&topic) {
            match self.code_tier(problem_text, Capabilities::NUMERIC) {
                Ok((code, answer)) => {
                    return SolutionArtifact::new(
                        Tier::Numeric,
                        format!("{NUMERIC_LABEL} {answer}"),
                        vec![code],
                    )
                }
                Err(e) => debug!(error = %e, "numeric tier fell through"),
            }
        }

        self.retrieval_tier(problem_text)
    }

    /// Generate code, run it, and return `(code, answer)` when it printed
    /// something.
    fn code_tier(
        &self,
        problem_text: &str,
        capabilities: Capabilities,
    ) -> MentorResult<(String, String)> {
        let prompt = if capabilities.use_sympy {
            prompts::symbolic_code(problem_text)
        } else {
            prompts::numeric_code(problem_text)
        };
        let reply = self.inference.infer(&prompt)?;
        let code = extract_code_block(&reply)
            .ok_or_else(|| MentorError::Inference("reply contained no python block".into()))?;

        let result = self.runner.execute(&code, capabilities);
        match result.answer() {
            Some(answer) => {
                let answer = answer.to_string();
                Ok((code, answer))
            }
            None => Err(MentorError::Sandbox(
                result.error().unwrap_or("no output").to_string(),
            )),
        }
    }

    fn retrieval_tier(&self, problem_text: &str) -> SolutionArtifact {
        let context = match self.retriever.retrieve(problem_text, self.retrieval_k) {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "retrieval failed, solving without context");
                Vec::new()
            }
        };

        let prompt = prompts::solve(problem_text, &context.join("\n"));
        match self.inference.infer(&prompt) {
            Ok(text) => SolutionArtifact::new(Tier::Retrieval, text, context),
            Err(e) => {
                warn!(error = %e, "every solver tier failed");
                SolutionArtifact::new(
                    Tier::Unresolved,
                    format!("Unable to produce a solution: {e}"),
                    context,
                )
            }
        }
    }
}

fn wants_symbolic(problem_text: &str, topic: Topic) -> bool {
    if topic == Topic::Calculus {
        return true;
    }
    let text = problem_text.to_lowercase();
    SYMBOLIC_CUES.iter().any(|cue| text.contains(cue))
}

/// Body of the first ```` ```python ```` fenced block, trimmed.
pub fn extract_code_block(reply: &str) -> Option<String> {
    let start = reply.find("```python")? + "```python".len();
    let rest = &reply[start..];
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, ScriptedInference, StaticRetriever};
    use mentor_core::ExecutionResult;

    const DIE_CODE: &str = "```python\nprint(1/36)\n```";

    fn solver(
        replies: &[&str],
        runs: Vec<ExecutionResult>,
        docs: &[&str],
    ) -> (Solver, Arc<ScriptedInference>, Arc<FakeRunner>) {
        let inference = Arc::new(ScriptedInference::new(replies));
        let runner = Arc::new(FakeRunner::new(runs));
        let retriever = Arc::new(StaticRetriever::new(docs));
        (
            Solver::new(inference.clone(), runner.clone(), retriever),
            inference,
            runner,
        )
    }

    #[test]
    fn test_extract_code_block() {
        let reply = "Here:\n```python\nx = 1\nprint(x)\n```\nand\n```python\nprint(2)\n```";
        assert_eq!(extract_code_block(reply).unwrap(), "x = 1\nprint(x)");
        assert_eq!(extract_code_block("```\nprint(1)\n```"), None);
        assert_eq!(extract_code_block("```python\n\n```"), None);
        assert_eq!(extract_code_block("```python\nprint(3)").unwrap(), "print(3)");
    }

    #[test]
    fn test_numeric_tier() {
        let (s, _, runner) = solver(
            &[DIE_CODE],
            vec![ExecutionResult::Output("0.027777777777777776".into())],
            &[],
        );
        let artifact = s.solve("Probability of two sixes with two dice?", Topic::Probability);
        assert_eq!(artifact.tier, Tier::Numeric);
        assert!(artifact.text.starts_with(NUMERIC_LABEL));
        assert!(artifact.text.contains("0.0277"));
        assert_eq!(artifact.evidence, vec!["print(1/36)".to_string()]);
        assert_eq!(runner.seen(), vec![(String::from("print(1/36)"), false)]);
    }

    #[test]
    fn test_symbolic_cue_overrides_topic() {
        let (s, _, runner) = solver(
            &["```python\nprint(integrate(x, x))\n```"],
            vec![ExecutionResult::Output("x**2/2".into())],
            &[],
        );
        let artifact = s.solve("Find the integral of x", Topic::Algebra);
        assert_eq!(artifact.tier, Tier::Symbolic);
        assert_eq!(artifact.text, format!("{SYMBOLIC_LABEL}\nx**2/2"));
        assert!(runner.seen()[0].1);
    }

    #[test]
    fn test_symbolic_failure_falls_to_numeric() {
        let (s, inference, _) = solver(
            &[DIE_CODE, DIE_CODE],
            vec![
                ExecutionResult::Failed("NameError".into()),
                ExecutionResult::Output("0.5".into()),
            ],
            &[],
        );
        let artifact = s.solve("Solve the differential equation", Topic::Algebra);
        assert_eq!(artifact.tier, Tier::Numeric);
        assert_eq!(inference.calls(), 2);
    }

    #[test]
    fn test_empty_output_falls_to_retrieval() {
        let (s, _, _) = solver(
            &["```python\nx = 1\n```", "Step 1: think."],
            vec![ExecutionResult::Output(String::new())],
            &["rule one", "rule two"],
        );
        let artifact = s.solve("What is x?", Topic::Algebra);
        assert_eq!(artifact.tier, Tier::Retrieval);
        assert_eq!(artifact.text, "Step 1: think.");
        assert_eq!(artifact.evidence, vec!["rule one", "rule two"]);
    }

    #[test]
    fn test_geometry_skips_code_tiers() {
        let (s, inference, runner) = solver(&["Area is pi r^2."], Vec::new(), &["circle area"]);
        let artifact = s.solve("Area of a circle?", Topic::Geometry);
        assert_eq!(artifact.tier, Tier::Retrieval);
        assert_eq!(inference.calls(), 1);
        assert!(runner.seen().is_empty());
        assert!(inference.prompts()[0].contains("Context: circle area"));
    }

    #[test]
    fn test_total_failure_is_unresolved() {
        let (s, _, _) = solver(&[], Vec::new(), &["ctx"]);
        let artifact = s.solve("Is 7 prime?", Topic::NumberTheory);
        assert_eq!(artifact.tier, Tier::Unresolved);
        assert_eq!(artifact.evidence, vec!["ctx"]);
        assert!(!artifact.text.is_empty());
    }

    #[test]
    fn test_retrieval_failure_degrades_to_empty_context() {
        let inference = Arc::new(ScriptedInference::new(&["answer"]));
        let s = Solver::new(
            inference.clone(),
            Arc::new(FakeRunner::new(Vec::new())),
            Arc::new(StaticRetriever::failing()),
        );
        let artifact = s.solve("Is 7 prime?", Topic::NumberTheory);
        assert_eq!(artifact.tier, Tier::Retrieval);
        assert!(artifact.evidence.is_empty());
    }
}

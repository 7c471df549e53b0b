//! The request pipeline: parse, route, solve, review, remember.
//!
//! Stages run one after another and hand plain values forward. The only
//! fan-out is the review, where the verifier and the explainer run on scoped
//! threads. A human may edit the parsed problem between [`Mentor::parse`] and
//! [`Mentor::solve`].

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mentor_core::{
    CodeRunner, Feedback, Inference, MemoryEntry, MentorResult, ProblemRecord, Retriever,
    SolutionArtifact, Topic,
};
use mentor_store::MemoryLog;
use serde::Serialize;
use tracing::{debug, info};

use crate::explainer::Explainer;
use crate::parser::{Parser, DEFAULT_FAST_PATH_LEN};
use crate::router::{Route, Router};
use crate::solver::{Solver, DEFAULT_RETRIEVAL_K};
use crate::verifier::{Verdict, Verifier};

#[derive(Debug, Clone, Copy)]
pub struct MentorSettings {
    pub fast_path_len: usize,
    pub retrieval_k: usize,
}

impl Default for MentorSettings {
    fn default() -> Self {
        Self {
            fast_path_len: DEFAULT_FAST_PATH_LEN,
            retrieval_k: DEFAULT_RETRIEVAL_K,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Solved {
    pub problem: ProblemRecord,
    pub route: Route,
    pub solution: SolutionArtifact,
    pub route_time: Duration,
    pub solve_time: Duration,
}

impl Solved {
    pub fn topic(&self) -> Topic {
        self.route.topic
    }
}

/// Result of one review stage. A failed stage carries its error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum Analysis {
    Done(String),
    Failed(String),
}

impl Analysis {
    fn from_result(result: MentorResult<String>) -> Self {
        match result {
            Ok(text) => Self::Done(text),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Done(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub verification: Analysis,
    pub explanation: Analysis,
    pub elapsed: Duration,
}

impl Review {
    pub fn verdict(&self) -> Verdict {
        match &self.verification {
            Analysis::Done(text) => Verdict::from_reply(text),
            Analysis::Failed(_) => Verdict::Unclear,
        }
    }
}

/// Everything produced for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub input_type: String,
    pub solved: Solved,
    pub review: Review,
}

impl Trace {
    pub fn new(input_type: impl Into<String>, solved: Solved, review: Review) -> Self {
        Self {
            input_type: input_type.into(),
            solved,
            review,
        }
    }

    /// Stage name and wall time, in pipeline order.
    pub fn timings(&self) -> [(&'static str, Duration); 3] {
        [
            ("route", self.solved.route_time),
            ("solve", self.solved.solve_time),
            ("review", self.review.elapsed),
        ]
    }

    pub fn to_memory_entry(&self) -> MemoryEntry {
        MemoryEntry::new(
            self.solved.problem.problem_text.clone(),
            self.solved.topic(),
            self.solved.solution.evidence.clone(),
            self.solved.solution.text.clone(),
            self.review.verification.text().to_string(),
        )
        .with_input_type(self.input_type.clone())
    }
}

pub struct Mentor {
    parser: Parser,
    router: Router,
    solver: Solver,
    verifier: Verifier,
    explainer: Explainer,
}

impl Mentor {
    pub fn new(
        inference: Arc<dyn Inference>,
        runner: Arc<dyn CodeRunner>,
        retriever: Arc<dyn Retriever>,
        settings: MentorSettings,
    ) -> Self {
        Self {
            parser: Parser::new(inference.clone()).with_fast_path_len(settings.fast_path_len),
            router: Router::new(inference.clone()),
            solver: Solver::new(inference.clone(), runner, retriever)
                .with_retrieval_k(settings.retrieval_k),
            verifier: Verifier::new(inference.clone()),
            explainer: Explainer::new(inference),
        }
    }

    pub fn parse(&self, raw_text: &str) -> ProblemRecord {
        self.parser.parse(raw_text)
    }

    pub fn route(&self, problem_text: &str) -> Route {
        self.router.route(problem_text)
    }

    pub fn solve(&self, problem: ProblemRecord) -> Solved {
        let started = Instant::now();
        let route = self.router.route(&problem.problem_text);
        let route_time = started.elapsed();

        let started = Instant::now();
        let solution = self.solver.solve(&problem.problem_text, route.topic);
        let solve_time = started.elapsed();

        info!(
            topic = %route.topic,
            via = %route.via,
            tier = %solution.tier,
            "solved"
        );
        Solved {
            problem: problem.routed(route.topic),
            route,
            solution,
            route_time,
            solve_time,
        }
    }

    /// Verify and explain the solution concurrently.
    pub fn review(&self, solved: &Solved) -> Review {
        let problem = solved.problem.problem_text.as_str();
        let solution = solved.solution.text.as_str();
        let started = Instant::now();

        let (verification, explanation) = thread::scope(|s| {
            let verify = s.spawn(|| self.verifier.analyze(problem, solution));
            let explain = s.spawn(|| self.explainer.analyze(problem, solution));
            (join_analysis(verify), join_analysis(explain))
        });

        let review = Review {
            verification,
            explanation,
            elapsed: started.elapsed(),
        };
        debug!(verdict = %review.verdict(), "reviewed");
        review
    }

    /// Parse, solve and review without a human in the loop.
    pub fn run(&self, raw_text: &str, input_type: &str) -> Trace {
        let solved = self.solve(self.parse(raw_text));
        let review = self.review(&solved);
        Trace::new(input_type, solved, review)
    }
}

fn join_analysis(handle: thread::ScopedJoinHandle<'_, MentorResult<String>>) -> Analysis {
    match handle.join() {
        Ok(result) => Analysis::from_result(result),
        Err(_) => Analysis::Failed("review stage panicked".into()),
    }
}

/// Persist a trace when the reviewer approved it. Returns the new log
/// length, or `None` when nothing was written.
pub fn record_feedback(
    log: &MemoryLog,
    trace: &Trace,
    feedback: Feedback,
) -> MentorResult<Option<usize>> {
    match feedback {
        Feedback::Positive => {
            let len = log.append(trace.to_memory_entry())?;
            info!(entries = len, "solution saved to memory");
            Ok(Some(len))
        }
        Feedback::Negative => {
            debug!("negative feedback, trace discarded");
            Ok(None)
        }
    }
}

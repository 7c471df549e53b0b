pub mod explainer;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod router;
pub mod sandbox;
pub mod solver;
#[cfg(test)]
mod testing;
pub mod verifier;

pub use explainer::Explainer;
pub use parser::Parser;
pub use pipeline::{record_feedback, Analysis, Mentor, MentorSettings, Review, Solved, Trace};
pub use router::{Route, RouteVia, Router};
pub use sandbox::{PythonSandbox, SandboxSettings};
pub use solver::Solver;
pub use verifier::{Verdict, Verifier};

use std::fmt;
use std::sync::Arc;

use mentor_core::{Inference, Topic};
use serde::Serialize;
use tracing::{debug, warn};

use crate::prompts;

/// Keyword sets checked in order against the lower-cased problem text.
/// The first set with a matching phrase decides the topic.
pub const KEYWORD_RULES: [(Topic, &[&str]); 4] = [
    (
        Topic::Calculus,
        &[
            "dy/dx",
            "integrate",
            "derivative",
            "area under curve",
            "l'hopital",
            "taylor series",
        ],
    ),
    (
        Topic::LinearAlgebra,
        &[
            "eigenvalue",
            "eigenvector",
            "determinant",
            "matrix multiplication",
            "row echelon",
            "linear map",
        ],
    ),
    (
        Topic::Probability,
        &[
            "probability",
            "conditional distribution",
            "random variable",
            "bayes",
            "variance",
            "standard deviation",
        ],
    ),
    (
        Topic::Geometry,
        &[
            "triangle",
            "circle",
            "radius",
            "hypotenuse",
            "volume of",
            "surface area",
            "perimeter",
        ],
    ),
];

/// How a topic was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "keyword", rename_all = "snake_case")]
pub enum RouteVia {
    /// A keyword rule matched; carries the phrase.
    Keyword(&'static str),
    /// The model named a category.
    Model,
    /// The model answered but named no known category.
    Unrecognized,
    /// The model call failed.
    InferenceFailed,
}

impl RouteVia {
    pub fn is_default(self) -> bool {
        matches!(self, Self::Unrecognized | Self::InferenceFailed)
    }
}

impl fmt::Display for RouteVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => write!(f, "keyword \"{k}\""),
            Self::Model => write!(f, "model"),
            Self::Unrecognized => write!(f, "default (unrecognized model reply)"),
            Self::InferenceFailed => write!(f, "default (model unavailable)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub topic: Topic,
    pub via: RouteVia,
}

/// Assigns one of the closed topic categories to a problem. Total.
pub struct Router {
    inference: Arc<dyn Inference>,
}

impl Router {
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    pub fn classify(&self, problem_text: &str) -> Topic {
        self.route(problem_text).topic
    }

    pub fn route(&self, problem_text: &str) -> Route {
        if let Some(route) = match_keywords(problem_text) {
            debug!(topic = %route.topic, via = %route.via, "routed by keyword");
            return route;
        }

        let route = match self.inference.infer(&prompts::router(problem_text)) {
            Ok(reply) => match topic_from_reply(&reply) {
                Some(topic) => Route {
                    topic,
                    via: RouteVia::Model,
                },
                None => {
                    warn!(reply = %reply.trim(), "router reply named no category");
                    Route {
                        topic: Topic::default(),
                        via: RouteVia::Unrecognized,
                    }
                }
            },
            Err(e) => {
                warn!(error = %e, "router inference failed");
                Route {
                    topic: Topic::default(),
                    via: RouteVia::InferenceFailed,
                }
            }
        };
        debug!(topic = %route.topic, via = %route.via, "routed");
        route
    }
}

/// Keyword stage on its own; no model involved.
pub fn match_keywords(problem_text: &str) -> Option<Route> {
    let text = problem_text.to_lowercase();
    KEYWORD_RULES.iter().find_map(|(topic, phrases)| {
        phrases
            .iter()
            .copied()
            .find(|phrase| text.contains(phrase))
            .map(|phrase| Route {
                topic: *topic,
                via: RouteVia::Keyword(phrase),
            })
    })
}

/// Read a category out of free model text.
///
/// The reply is upper-cased with punctuation other than `_` removed, then
/// tokens are searched as substrings in enumeration order. ALGEBRA comes
/// first, so any reply mentioning LINEAR_ALGEBRA reads as ALGEBRA.
pub fn topic_from_reply(reply: &str) -> Option<Topic> {
    let normalized: String = reply
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let normalized = normalized.trim();

    Topic::ALL
        .into_iter()
        .find(|t| normalized.contains(t.token()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInference;

    fn router(replies: &[&str]) -> (Router, Arc<ScriptedInference>) {
        let inference = Arc::new(ScriptedInference::new(replies));
        (Router::new(inference.clone()), inference)
    }

    #[test]
    fn test_keyword_precedence() {
        let (r, inference) = router(&["GEOMETRY"]);
        let route = r.route("Find the derivative of the area of a circle of radius r");
        assert_eq!(route.topic, Topic::Calculus);
        assert_eq!(route.via, RouteVia::Keyword("derivative"));
        assert_eq!(inference.calls(), 0);
    }

    #[test]
    fn test_calculus_rules_before_linear_algebra() {
        let (r, inference) = router(&["LINEAR_ALGEBRA"]);
        let route = r.route("Find the derivative of the determinant of A");
        assert_eq!(route.topic, Topic::Calculus);
        assert_eq!(route.via, RouteVia::Keyword("derivative"));
        assert_eq!(inference.calls(), 0);
    }

    #[test]
    fn test_linear_algebra_reply_reads_as_algebra() {
        let (r, inference) = router(&["LINEAR_ALGEBRA"]);
        let route = r.route("Is the map x -> 2x injective?");
        assert_eq!(
            route,
            Route {
                topic: Topic::Algebra,
                via: RouteVia::Model
            }
        );
        assert_eq!(inference.calls(), 1);
    }

    #[test]
    fn test_keywords_ignore_case() {
        let (r, _) = router(&[]);
        assert_eq!(r.classify("Compute the Eigenvalues of A"), Topic::LinearAlgebra);
        assert_eq!(r.classify("What is the PROBABILITY of rain?"), Topic::Probability);
        assert_eq!(r.classify("Find the hypotenuse"), Topic::Geometry);
    }

    #[test]
    fn test_model_reply_with_noise() {
        let (r, inference) = router(&["Category: **NUMBER_THEORY**."]);
        let route = r.route("Is 97 prime?");
        assert_eq!(route.topic, Topic::NumberTheory);
        assert_eq!(route.via, RouteVia::Model);
        assert_eq!(inference.calls(), 1);
    }

    #[test]
    fn test_unrecognized_reply_defaults() {
        let (r, _) = router(&["I am not sure."]);
        let route = r.route("Is 97 prime?");
        assert_eq!(route.topic, Topic::Algebra);
        assert_eq!(route.via, RouteVia::Unrecognized);
        assert!(route.via.is_default());
    }

    #[test]
    fn test_inference_failure_defaults() {
        let (r, _) = router(&[]);
        let route = r.route("Is 97 prime?");
        assert_eq!(route.topic, Topic::Algebra);
        assert_eq!(route.via, RouteVia::InferenceFailed);
    }

    #[test]
    fn test_topic_from_reply() {
        assert_eq!(topic_from_reply(" statistics\n"), Some(Topic::Statistics));
        // ALGEBRA is found inside LINEAR_ALGEBRA when scanning substrings
        assert_eq!(topic_from_reply("LINEAR_ALGEBRA"), Some(Topic::Algebra));
        assert_eq!(topic_from_reply("linear algebra"), Some(Topic::Algebra));
        assert_eq!(
            topic_from_reply("It is LINEAR_ALGEBRA, clearly"),
            Some(Topic::Algebra)
        );
        assert_eq!(topic_from_reply(""), None);
    }
}

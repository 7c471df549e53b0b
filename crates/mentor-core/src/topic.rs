use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject area of a math problem. The declaration order is the enumeration
/// order used when scanning model output for a category token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    #[default]
    Algebra,
    Calculus,
    Probability,
    LinearAlgebra,
    Geometry,
    Statistics,
    NumberTheory,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::Algebra,
        Topic::Calculus,
        Topic::Probability,
        Topic::LinearAlgebra,
        Topic::Geometry,
        Topic::Statistics,
        Topic::NumberTheory,
    ];

    /// Upper-case token as it appears in prompts and in the memory log.
    pub fn token(self) -> &'static str {
        match self {
            Self::Algebra => "ALGEBRA",
            Self::Calculus => "CALCULUS",
            Self::Probability => "PROBABILITY",
            Self::LinearAlgebra => "LINEAR_ALGEBRA",
            Self::Geometry => "GEOMETRY",
            Self::Statistics => "STATISTICS",
            Self::NumberTheory => "NUMBER_THEORY",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|t| t.token() == wanted)
            .ok_or_else(|| format!("invalid topic: {s}"))
    }
}

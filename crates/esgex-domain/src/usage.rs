//! Token usage accounting

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Additive token tally
///
/// Accumulated across every extraction attempt that reported usage,
/// including attempts whose output was later rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the request (document + instruction + schema)
    pub prompt_tokens: u64,

    /// Tokens produced by the backend
    pub output_tokens: u64,

    /// Total as reported by the backend
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a tally from its three counters
    pub fn new(prompt_tokens: u64, output_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add another tally into this one
    pub fn record(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(mut self, rhs: TokenUsage) -> TokenUsage {
        self.record(&rhs);
        self
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        self.record(&rhs);
    }
}

impl std::iter::Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

impl fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt={} output={} total={}",
            self.prompt_tokens, self.output_tokens, self.total_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record() {
        let mut usage = TokenUsage::default();
        assert!(usage.is_empty());

        usage.record(&TokenUsage::new(100, 20, 120));
        usage += TokenUsage::new(50, 5, 55);

        assert_eq!(usage, TokenUsage::new(150, 25, 175));
        assert!(!usage.is_empty());
    }

    #[test]
    fn test_display() {
        let usage = TokenUsage::new(1, 2, 3);
        assert_eq!(usage.to_string(), "prompt=1 output=2 total=3");
    }

    proptest! {
        #[test]
        fn sum_matches_componentwise_totals(
            parts in prop::collection::vec((0u64..1_000_000, 0u64..1_000_000, 0u64..2_000_000), 0..20)
        ) {
            let total: TokenUsage = parts
                .iter()
                .map(|(p, o, t)| TokenUsage::new(*p, *o, *t))
                .sum();

            prop_assert_eq!(total.prompt_tokens, parts.iter().map(|p| p.0).sum::<u64>());
            prop_assert_eq!(total.output_tokens, parts.iter().map(|p| p.1).sum::<u64>());
            prop_assert_eq!(total.total_tokens, parts.iter().map(|p| p.2).sum::<u64>());
        }
    }
}

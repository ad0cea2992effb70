//! Token usage accounting.
//!
//! Every response carries a [`Usage`] record. The tool loop sums them
//! across iterations with `+=`.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Token counts for a single request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced by the model.
    pub output_tokens: u64,
    /// Tokens spent on reasoning, when reported.
    pub reasoning_tokens: Option<u64>,
    /// Tokens served from the provider's prompt cache, when reported.
    pub cache_read_tokens: Option<u64>,
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.saturating_add(y)),
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += &rhs;
        self
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self += &rhs;
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Self) {
        self.input_tokens = self.input_tokens.saturating_add(rhs.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(rhs.output_tokens);
        self.reasoning_tokens = add_optional(self.reasoning_tokens, rhs.reasoning_tokens);
        self.cache_read_tokens = add_optional(self.cache_read_tokens, rhs.cache_read_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_add() {
        let a = Usage {
            input_tokens: 10,
            output_tokens: 5,
            reasoning_tokens: Some(2),
            cache_read_tokens: None,
        };
        let b = Usage {
            input_tokens: 1,
            output_tokens: 1,
            reasoning_tokens: None,
            cache_read_tokens: Some(7),
        };
        let sum = a + b;
        assert_eq!(sum.input_tokens, 11);
        assert_eq!(sum.output_tokens, 6);
        assert_eq!(sum.reasoning_tokens, Some(2));
        assert_eq!(sum.cache_read_tokens, Some(7));
    }

    #[test]
    fn test_usage_add_assign_saturates() {
        let mut a = Usage {
            input_tokens: u64::MAX,
            ..Usage::default()
        };
        a += &Usage {
            input_tokens: 1,
            ..Usage::default()
        };
        assert_eq!(a.input_tokens, u64::MAX);
    }

    #[test]
    fn test_usage_optional_stays_none() {
        let mut a = Usage::default();
        a += Usage::default();
        assert!(a.reasoning_tokens.is_none());
        assert!(a.cache_read_tokens.is_none());
    }
}

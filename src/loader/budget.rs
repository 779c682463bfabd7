use std::fmt;

/// How many more failed attempts a load may absorb before it gives up.
///
/// The budget never changes in place: each failed attempt [`spend`](RetryBudget::spend)s it
/// into a new, smaller budget for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RetryBudget(u32);

impl RetryBudget {
    pub const DEFAULT: Self = Self(10);

    pub const fn new(retries: u32) -> Self {
        Self(retries)
    }

    pub const fn remaining(self) -> u32 {
        self.0
    }

    pub const fn is_exhausted(self) -> bool {
        self.0 == 0
    }

    /// Budget left for the next attempt, or `None` if there is nothing left to spend
    pub const fn spend(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(left) => Some(Self(left)),
            None => None,
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for RetryBudget {
    fn from(retries: u32) -> Self {
        Self::new(retries)
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} retries", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::RetryBudget;

    #[test]
    fn spends_down_to_zero() {
        let mut budget = RetryBudget::new(3);
        let mut spent = 0;
        while let Some(next) = budget.spend() {
            assert_eq!(next.remaining(), budget.remaining() - 1);
            budget = next;
            spent += 1;
        }
        assert_eq!(spent, 3);
        assert!(budget.is_exhausted());
        assert_eq!(budget.spend(), None);
    }

    #[test]
    fn spending_leaves_the_original_untouched() {
        let budget = RetryBudget::default();
        let _ = budget.spend();
        assert_eq!(budget.remaining(), 10);
    }
}

//! Configuration for question resolution.

/// Configuration for the question resolver.
///
/// Controls how much evidence an answer may carry and which absences count
/// as gaps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum evidence entries per answer (`None` = unbounded).
    pub max_evidence: Option<usize>,

    /// Whether reads with no recorded write make an answer partial.
    pub unresolved_is_gap: bool,

    /// Whether why-not answers include the data causes of the false
    /// evaluation, not just the evaluation and the branch taken instead.
    pub why_not_includes_causes: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_evidence: None,
            unresolved_is_gap: true,
            why_not_includes_causes: true,
        }
    }
}

impl ResolverConfig {
    /// Creates a configuration suited to interactive use: bounded answers.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            max_evidence: Some(256),
            ..Self::default()
        }
    }

    /// Creates a configuration that treats unresolved reads as external
    /// inputs (parameters, builtins, globals) rather than gaps.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            unresolved_is_gap: false,
            ..Self::default()
        }
    }

    /// Creates a configuration for terse why-not answers.
    #[must_use]
    pub fn terse() -> Self {
        Self {
            max_evidence: Some(32),
            unresolved_is_gap: true,
            why_not_includes_causes: false,
        }
    }

    /// Builder method to set the evidence limit.
    #[must_use]
    pub fn with_max_evidence(mut self, limit: Option<usize>) -> Self {
        self.max_evidence = limit;
        self
    }

    /// Builder method to set whether unresolved reads are gaps.
    #[must_use]
    pub fn with_unresolved_is_gap(mut self, gap: bool) -> Self {
        self.unresolved_is_gap = gap;
        self
    }

    /// Builder method to set whether why-not answers include causes.
    #[must_use]
    pub fn with_why_not_causes(mut self, include: bool) -> Self {
        self.why_not_includes_causes = include;
        self
    }
}

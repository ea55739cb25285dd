/// Canonical rule weights for the compatibility scorer (points out of 100).
pub const DEFAULT_WEIGHTS: Weights = Weights {
    mentorship: 25.0,
    investment: 25.0,
    hiring: 20.0,
    collaboration: 20.0,
    discussion: 15.0,
    shared_interest: 5.0,
    shared_interest_cap: 15.0,
    shared_skill: 5.0,
    shared_skill_cap: 15.0,
    location: 10.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    /// Mentor / Mentee complementarity.
    pub mentorship: f64,
    /// Investor / Investment Opportunity complementarity.
    pub investment: f64,
    /// Hiring Manager / Potential Hire complementarity.
    pub hiring: f64,
    /// Both sides want to collaborate.
    pub collaboration: f64,
    /// Both sides want to discuss.
    pub discussion: f64,
    pub shared_interest: f64,
    pub shared_interest_cap: f64,
    pub shared_skill: f64,
    pub shared_skill_cap: f64,
    pub location: f64,
}

impl Weights {
    /// Smallest weight among the preference rules.
    pub fn min_preference(&self) -> f64 {
        [
            self.mentorship,
            self.investment,
            self.hiring,
            self.collaboration,
            self.discussion,
        ]
        .into_iter()
        .fold(f64::INFINITY, f64::min)
    }
}

impl Default for Weights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

mod engine;
mod matching;
mod types;

pub use engine::{
    LifetimeTotals, aggregate, deflate, monthly_income, project, simulate, simulate_with_match,
};
pub use matching::{MatchFormula, MatchTier, compute_employer_match};
pub use types::{
    BalanceBreakdown, ContributionPolicy, InputBounds, SimulationInput, SimulationResult,
    YearProjection,
};

use super::matching::MatchFormula;
use super::types::{ContributionPolicy, SimulationInput, SimulationResult, YearProjection};

const MONTHS_PER_YEAR: f64 = 12.0;
// Upper bound on the preallocation; longer horizons still grow the vector.
const MAX_PREALLOCATED_YEARS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifetimeTotals {
    pub your_contributions: f64,
    pub employer_match: f64,
    pub investment_growth: f64,
    pub final_balance: f64,
    pub final_real_balance: f64,
}

/// Runs the full pipeline with the flat match formula described by `input`.
pub fn simulate(input: &SimulationInput, policy: &ContributionPolicy) -> SimulationResult {
    let employer_match = MatchFormula::Flat {
        percent: input.employer_match_percent,
        limit: input.employer_match_limit,
    };
    simulate_with_match(input, policy, &employer_match)
}

pub fn simulate_with_match(
    input: &SimulationInput,
    policy: &ContributionPolicy,
    employer_match: &MatchFormula,
) -> SimulationResult {
    let employer_match_amount =
        employer_match.annual_match(input.annual_contribution, input.annual_salary);
    let projections = project(input, employer_match_amount);
    let totals = aggregate(&projections, input.current_balance);

    SimulationResult {
        years_to_retirement: input.years_to_retirement(),
        employer_match_amount,
        starting_balance: input.current_balance,
        final_balance: totals.final_balance,
        final_real_balance: totals.final_real_balance,
        total_your_contributions: totals.your_contributions,
        total_employer_match: totals.employer_match,
        total_investment_growth: totals.investment_growth,
        monthly_income_nominal: monthly_income(totals.final_balance, policy.withdrawal_rate),
        monthly_income_real: monthly_income(totals.final_real_balance, policy.withdrawal_rate),
        projections,
    }
}

/// Year-by-year accumulation from the current age through the retirement age.
///
/// Entry 0 is the starting state. Each later year earns `expected_return` on
/// the balance held at the start of the year, then receives the flat
/// contribution and match; new money earns nothing in its deposit year.
pub fn project(input: &SimulationInput, employer_match_amount: f64) -> Vec<YearProjection> {
    let years = input.years_to_retirement();
    let mut projections = Vec::with_capacity(years.min(MAX_PREALLOCATED_YEARS) as usize + 1);

    let mut balance = input.current_balance;
    projections.push(YearProjection {
        year_index: 0,
        age: input.current_age,
        your_contribution: 0.0,
        employer_match: 0.0,
        investment_growth: 0.0,
        balance,
        real_balance: balance,
    });

    for year_index in 1..=years {
        let start_balance = balance;
        let investment_growth = start_balance * input.expected_return;
        let your_contribution = input.annual_contribution;
        let employer_match = employer_match_amount;
        balance = start_balance + investment_growth + your_contribution + employer_match;

        projections.push(YearProjection {
            year_index,
            age: input.current_age + year_index,
            your_contribution,
            employer_match,
            investment_growth,
            balance,
            real_balance: deflate(balance, input.inflation_rate, year_index),
        });
    }

    projections
}

/// Sums the per-year flows. Year 0 carries no flows, so the totals reconcile
/// with `starting_balance` to the final balance.
pub fn aggregate(projections: &[YearProjection], starting_balance: f64) -> LifetimeTotals {
    let mut totals = LifetimeTotals {
        your_contributions: 0.0,
        employer_match: 0.0,
        investment_growth: 0.0,
        final_balance: starting_balance,
        final_real_balance: starting_balance,
    };

    for year in projections.iter().filter(|year| year.year_index > 0) {
        totals.your_contributions += year.your_contribution;
        totals.employer_match += year.employer_match;
        totals.investment_growth += year.investment_growth;
    }

    if let Some(last) = projections.last() {
        totals.final_balance = last.balance;
        totals.final_real_balance = last.real_balance;
    }
    totals
}

/// Converts a nominal amount at `year_index` into year-0 purchasing power.
pub fn deflate(nominal_amount: f64, inflation_rate: f64, year_index: u32) -> f64 {
    if year_index == 0 || inflation_rate == 0.0 {
        return nominal_amount;
    }
    let exponent = i32::try_from(year_index).unwrap_or(i32::MAX);
    let factor = (1.0 + inflation_rate).powi(exponent);
    if !factor.is_finite() || factor <= 0.0 {
        return 0.0;
    }
    nominal_amount / factor
}

pub fn monthly_income(balance: f64, withdrawal_rate: f64) -> f64 {
    balance * withdrawal_rate / MONTHS_PER_YEAR
}

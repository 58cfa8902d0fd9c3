use serde::Serialize;

/// Parameters for a single projection run. Rates are fractions, not percents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_balance: f64,
    pub annual_contribution: f64,
    pub annual_salary: f64,
    pub employer_match_percent: f64,
    pub employer_match_limit: f64,
    pub expected_return: f64,
    pub inflation_rate: f64,
}

/// Policy constants that change with legislation rather than with the saver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionPolicy {
    pub annual_contribution_limit: f64,
    pub catch_up_contribution: f64,
    pub catch_up_age: u32,
    pub withdrawal_rate: f64,
}

impl Default for ContributionPolicy {
    fn default() -> Self {
        Self {
            annual_contribution_limit: 23_000.0,
            catch_up_contribution: 7_500.0,
            catch_up_age: 50,
            withdrawal_rate: 0.04,
        }
    }
}

impl ContributionPolicy {
    pub fn contribution_limit_for_age(&self, age: u32) -> f64 {
        let base = self.annual_contribution_limit.max(0.0);
        if age >= self.catch_up_age {
            base + self.catch_up_contribution.max(0.0)
        } else {
            base
        }
    }
}

/// Declared valid range of every input parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputBounds {
    pub min_age: u32,
    pub max_current_age: u32,
    pub max_retirement_age: u32,
    pub max_balance: f64,
    pub max_salary: f64,
    pub min_expected_return: f64,
    pub max_expected_return: f64,
    pub max_inflation_rate: f64,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            min_age: 18,
            max_current_age: 75,
            max_retirement_age: 80,
            max_balance: 5_000_000.0,
            max_salary: 1_000_000.0,
            min_expected_return: -0.10,
            max_expected_return: 0.15,
            max_inflation_rate: 0.10,
        }
    }
}

impl SimulationInput {
    /// Returns a copy with every field forced into `bounds` and the
    /// contribution held under the age-dependent cap from `policy`.
    pub fn clamped(&self, bounds: &InputBounds, policy: &ContributionPolicy) -> Self {
        let current_age = self
            .current_age
            .clamp(bounds.min_age, bounds.max_current_age.max(bounds.min_age));
        let retirement_age = self
            .retirement_age
            .clamp(bounds.min_age, bounds.max_retirement_age.max(bounds.min_age));
        let contribution_cap = policy.contribution_limit_for_age(current_age);

        Self {
            current_age,
            retirement_age,
            current_balance: soft_clamp(self.current_balance, 0.0, bounds.max_balance),
            annual_contribution: soft_clamp(self.annual_contribution, 0.0, contribution_cap),
            annual_salary: soft_clamp(self.annual_salary, 0.0, bounds.max_salary),
            employer_match_percent: soft_clamp(self.employer_match_percent, 0.0, 1.0),
            employer_match_limit: soft_clamp(self.employer_match_limit, 0.0, 1.0),
            expected_return: soft_clamp(
                self.expected_return,
                bounds.min_expected_return,
                bounds.max_expected_return,
            ),
            inflation_rate: soft_clamp(self.inflation_rate, 0.0, bounds.max_inflation_rate),
        }
    }

    /// Number of simulated years after the starting year; zero when the
    /// retirement age is not after the current age.
    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }
}

// NaN and -inf land on the lower bound, +inf on the upper bound.
fn soft_clamp(value: f64, lo: f64, hi: f64) -> f64 {
    let hi = hi.max(lo);
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearProjection {
    pub year_index: u32,
    pub age: u32,
    pub your_contribution: f64,
    pub employer_match: f64,
    pub investment_growth: f64,
    pub balance: f64,
    pub real_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub years_to_retirement: u32,
    pub employer_match_amount: f64,
    pub starting_balance: f64,
    pub final_balance: f64,
    pub final_real_balance: f64,
    pub total_your_contributions: f64,
    pub total_employer_match: f64,
    pub total_investment_growth: f64,
    pub monthly_income_nominal: f64,
    pub monthly_income_real: f64,
    pub projections: Vec<YearProjection>,
}

impl SimulationResult {
    pub fn breakdown(&self) -> BalanceBreakdown {
        BalanceBreakdown {
            starting_balance: self.starting_balance,
            your_contributions: self.total_your_contributions,
            employer_match: self.total_employer_match,
            investment_growth: self.total_investment_growth,
        }
    }
}

/// The four sources that make up the final nominal balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBreakdown {
    pub starting_balance: f64,
    pub your_contributions: f64,
    pub employer_match: f64,
    pub investment_growth: f64,
}

impl BalanceBreakdown {
    pub fn total(&self) -> f64 {
        self.starting_balance + self.your_contributions + self.employer_match + self.investment_growth
    }

    /// Each category as a fraction of the total, in field order.
    pub fn shares(&self) -> [f64; 4] {
        let total = self.total();
        if total.abs() <= 1e-12 {
            return [0.0; 4];
        }
        [
            self.starting_balance / total,
            self.your_contributions / total,
            self.employer_match / total,
            self.investment_growth / total,
        ]
    }
}

use serde::Serialize;

/// Annual employer dollars for a flat "X% of contributions up to Y% of salary"
/// formula. Contributions above `employer_match_limit` of salary earn no
/// additional match.
pub fn compute_employer_match(
    annual_contribution: f64,
    annual_salary: f64,
    employer_match_percent: f64,
    employer_match_limit: f64,
) -> f64 {
    let Some(contribution_rate) = contribution_rate(annual_contribution, annual_salary) else {
        return 0.0;
    };
    let matched_rate = contribution_rate.min(employer_match_limit);
    annual_salary * matched_rate * employer_match_percent
}

/// One band of a tiered formula: `match_percent` of the contribution rate
/// between the previous tier's `up_to` and this one's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTier {
    pub match_percent: f64,
    pub up_to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchFormula {
    Flat { percent: f64, limit: f64 },
    Tiered(Vec<MatchTier>),
}

impl MatchFormula {
    /// Builds a tiered formula, ordering bands by their upper edge.
    pub fn tiered(mut tiers: Vec<MatchTier>) -> Self {
        tiers.sort_by(|a, b| a.up_to.total_cmp(&b.up_to));
        Self::Tiered(tiers)
    }

    pub fn annual_match(&self, annual_contribution: f64, annual_salary: f64) -> f64 {
        match self {
            Self::Flat { percent, limit } => {
                compute_employer_match(annual_contribution, annual_salary, *percent, *limit)
            }
            Self::Tiered(tiers) => tiered_match(tiers, annual_contribution, annual_salary),
        }
    }
}

fn tiered_match(tiers: &[MatchTier], annual_contribution: f64, annual_salary: f64) -> f64 {
    let Some(contribution_rate) = contribution_rate(annual_contribution, annual_salary) else {
        return 0.0;
    };

    let mut band_start = 0.0_f64;
    let mut matched = 0.0;
    for tier in tiers {
        let band_end = tier.up_to.max(band_start);
        let in_band = (contribution_rate.min(band_end) - band_start).max(0.0);
        matched += annual_salary * in_band * tier.match_percent;
        band_start = band_end;
        if contribution_rate <= band_start {
            break;
        }
    }
    matched
}

// None when the salary cannot serve as a denominator.
fn contribution_rate(annual_contribution: f64, annual_salary: f64) -> Option<f64> {
    if !annual_salary.is_finite() || annual_salary <= 0.0 || !annual_contribution.is_finite() {
        return None;
    }
    Some(annual_contribution.max(0.0) / annual_salary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn flat_match_caps_at_limit_for_reference_saver() {
        // 12k on 80k is 15% of salary, matched only up to 6%.
        assert_approx(compute_employer_match(12_000.0, 80_000.0, 0.5, 0.06), 2_400.0);
    }

    #[test]
    fn flat_match_below_limit_matches_full_contribution() {
        // 3% of salary contributed, dollar-for-dollar.
        assert_approx(compute_employer_match(3_000.0, 100_000.0, 1.0, 0.06), 3_000.0);
    }

    #[test]
    fn contributions_above_limit_earn_no_extra_match() {
        let at_limit = compute_employer_match(4_800.0, 80_000.0, 0.5, 0.06);
        let above_limit = compute_employer_match(20_000.0, 80_000.0, 0.5, 0.06);
        assert_approx(at_limit, 2_400.0);
        assert_approx(above_limit, at_limit);
    }

    #[test]
    fn zero_salary_yields_zero_match() {
        let matched = compute_employer_match(12_000.0, 0.0, 0.5, 0.06);
        assert!(matched.is_finite());
        assert_approx(matched, 0.0);
    }

    #[test]
    fn negative_or_nan_salary_yields_zero_match() {
        assert_approx(compute_employer_match(12_000.0, -1.0, 0.5, 0.06), 0.0);
        assert_approx(compute_employer_match(12_000.0, f64::NAN, 0.5, 0.06), 0.0);
        assert_approx(compute_employer_match(12_000.0, f64::INFINITY, 0.5, 0.06), 0.0);
    }

    #[test]
    fn flat_formula_delegates_to_compute_employer_match() {
        let formula = MatchFormula::Flat {
            percent: 0.5,
            limit: 0.06,
        };
        assert_approx(formula.annual_match(12_000.0, 80_000.0), 2_400.0);
    }

    #[test]
    fn tiered_formula_matches_each_band_at_its_own_rate() {
        // 100% of the first 3%, 50% of the next 2%.
        let formula = MatchFormula::tiered(vec![
            MatchTier {
                match_percent: 0.5,
                up_to: 0.05,
            },
            MatchTier {
                match_percent: 1.0,
                up_to: 0.03,
            },
        ]);

        assert_approx(formula.annual_match(2_000.0, 100_000.0), 2_000.0);
        assert_approx(formula.annual_match(4_000.0, 100_000.0), 3_500.0);
        assert_approx(formula.annual_match(5_000.0, 100_000.0), 4_000.0);
        assert_approx(formula.annual_match(15_000.0, 100_000.0), 4_000.0);
        assert_approx(formula.annual_match(15_000.0, 0.0), 0.0);
    }

    #[test]
    fn single_tier_equals_flat_formula() {
        let tiered = MatchFormula::tiered(vec![MatchTier {
            match_percent: 0.5,
            up_to: 0.06,
        }]);
        for contribution in [0.0, 1_000.0, 4_800.0, 12_000.0] {
            assert_approx(
                tiered.annual_match(contribution, 80_000.0),
                compute_employer_match(contribution, 80_000.0, 0.5, 0.06),
            );
        }
    }

    proptest! {
        #[test]
        fn prop_match_never_grows_past_limit(
            salary in 1_000u32..500_000,
            limit_bp in 0u32..10_000,
            percent_bp in 0u32..10_000,
            extra in 0u32..100_000
        ) {
            let salary = salary as f64;
            let limit = limit_bp as f64 / 10_000.0;
            let percent = percent_bp as f64 / 10_000.0;
            let at_limit = compute_employer_match(salary * limit, salary, percent, limit);
            let above = compute_employer_match(salary * limit + extra as f64, salary, percent, limit);
            prop_assert!((at_limit - above).abs() <= 1e-6);
            prop_assert!(above <= salary * limit * percent + 1e-6);
        }
    }
}

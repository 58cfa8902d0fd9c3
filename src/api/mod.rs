use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    BalanceBreakdown, ContributionPolicy, InputBounds, MatchFormula, MatchTier, SimulationInput,
    SimulationResult, simulate_with_match,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API JSON payload: {0}")]
    InvalidJson(String),
    #[error("Invalid API query string: {0}")]
    InvalidQuery(String),
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("{field} must be >= 0")]
    Negative { field: &'static str },
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("matchTiers[{index}]: {reason}")]
    InvalidTier { index: usize, reason: &'static str },
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMatchTier {
    match_percent: f64,
    up_to_percent: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    current_balance: Option<f64>,
    annual_contribution: Option<f64>,
    annual_salary: Option<f64>,
    employer_match: Option<f64>,
    employer_match_limit: Option<f64>,
    expected_return: Option<f64>,
    inflation_rate: Option<f64>,

    contribution_limit: Option<f64>,
    catch_up_contribution: Option<f64>,
    catch_up_age: Option<u32>,
    withdrawal_rate: Option<f64>,

    // JSON bodies only; query strings cannot carry sequences.
    match_tiers: Option<Vec<ApiMatchTier>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Deterministic 401(k) projection: contributions, employer match, growth and retirement income"
)]
struct Cli {
    #[arg(long, default_value_t = 35)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long, default_value_t = 50_000.0)]
    current_balance: f64,
    #[arg(
        long,
        default_value_t = 12_000.0,
        help = "Your annual contribution; capped at the contribution limit for your age"
    )]
    annual_contribution: f64,
    #[arg(long, default_value_t = 80_000.0)]
    annual_salary: f64,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Employer match in percent of each matched dollar, e.g. 50"
    )]
    employer_match: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Contribution in percent of salary up to which the employer matches"
    )]
    employer_match_limit: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected annual nominal return in percent"
    )]
    expected_return: f64,
    #[arg(long, default_value_t = 3.0, help = "Expected annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 23_000.0,
        help = "Annual employee contribution limit"
    )]
    contribution_limit: f64,
    #[arg(
        long,
        default_value_t = 7_500.0,
        help = "Additional contribution allowed from the catch-up age"
    )]
    catch_up_contribution: f64,
    #[arg(long, default_value_t = 50)]
    catch_up_age: u32,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Annual withdrawal rate in retirement, in percent"
    )]
    withdrawal_rate: f64,
}

#[derive(Debug)]
struct ApiRequest {
    input: SimulationInput,
    policy: ContributionPolicy,
    employer_match: MatchFormula,
}

// Match terms are reported through `employer_match`, which reflects the
// formula actually applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInput {
    current_age: u32,
    retirement_age: u32,
    current_balance: f64,
    annual_contribution: f64,
    annual_salary: f64,
    expected_return: f64,
    inflation_rate: f64,
}

impl From<&SimulationInput> for ResponseInput {
    fn from(input: &SimulationInput) -> Self {
        Self {
            current_age: input.current_age,
            retirement_age: input.retirement_age,
            current_balance: input.current_balance,
            annual_contribution: input.annual_contribution,
            annual_salary: input.annual_salary,
            expected_return: input.expected_return,
            inflation_rate: input.inflation_rate,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    input: ResponseInput,
    employer_match: MatchFormula,
    policy: ContributionPolicy,
    contribution_limit: f64,
    breakdown: BalanceBreakdown,
    #[serde(flatten)]
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Parses process arguments, runs one projection and prints it as JSON.
pub fn run_cli() -> Result<(), ApiError> {
    let cli = Cli::parse();
    let request = build_request(cli, None)?;
    let response = run_request(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_request(cli: Cli, tiers: Option<Vec<ApiMatchTier>>) -> Result<ApiRequest, ApiError> {
    for (field, value) in [
        ("currentBalance", cli.current_balance),
        ("annualContribution", cli.annual_contribution),
        ("annualSalary", cli.annual_salary),
        ("employerMatch", cli.employer_match),
        ("employerMatchLimit", cli.employer_match_limit),
        ("expectedReturn", cli.expected_return),
        ("inflationRate", cli.inflation_rate),
        ("contributionLimit", cli.contribution_limit),
        ("catchUpContribution", cli.catch_up_contribution),
        ("withdrawalRate", cli.withdrawal_rate),
    ] {
        if !value.is_finite() {
            return Err(ApiError::NonFinite { field });
        }
    }

    if cli.contribution_limit < 0.0 {
        return Err(ApiError::Negative { field: "contributionLimit" });
    }
    if cli.catch_up_contribution < 0.0 {
        return Err(ApiError::Negative { field: "catchUpContribution" });
    }
    if !(0.0..=100.0).contains(&cli.withdrawal_rate) {
        return Err(ApiError::OutOfRange {
            field: "withdrawalRate",
            min: 0.0,
            max: 100.0,
        });
    }

    let policy = ContributionPolicy {
        annual_contribution_limit: cli.contribution_limit,
        catch_up_contribution: cli.catch_up_contribution,
        catch_up_age: cli.catch_up_age,
        withdrawal_rate: cli.withdrawal_rate / 100.0,
    };

    let raw = SimulationInput {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        current_balance: cli.current_balance,
        annual_contribution: cli.annual_contribution,
        annual_salary: cli.annual_salary,
        employer_match_percent: cli.employer_match / 100.0,
        employer_match_limit: cli.employer_match_limit / 100.0,
        expected_return: cli.expected_return / 100.0,
        inflation_rate: cli.inflation_rate / 100.0,
    };
    let input = raw.clamped(&InputBounds::default(), &policy);
    if input != raw {
        log::debug!("clamped simulation input from {raw:?} to {input:?}");
    }

    let employer_match = match tiers {
        Some(tiers) => MatchFormula::tiered(convert_tiers(&tiers)?),
        None => MatchFormula::Flat {
            percent: input.employer_match_percent,
            limit: input.employer_match_limit,
        },
    };

    Ok(ApiRequest {
        input,
        policy,
        employer_match,
    })
}

fn convert_tiers(tiers: &[ApiMatchTier]) -> Result<Vec<MatchTier>, ApiError> {
    if tiers.is_empty() {
        return Err(ApiError::InvalidTier {
            index: 0,
            reason: "at least one tier is required",
        });
    }

    tiers
        .iter()
        .enumerate()
        .map(|(index, tier)| {
            if !(0.0..=100.0).contains(&tier.match_percent) {
                return Err(ApiError::InvalidTier {
                    index,
                    reason: "matchPercent must be between 0 and 100",
                });
            }
            if tier.up_to_percent <= 0.0 || tier.up_to_percent > 100.0 {
                return Err(ApiError::InvalidTier {
                    index,
                    reason: "upToPercent must be above 0 and at most 100",
                });
            }
            Ok(MatchTier {
                match_percent: tier.match_percent / 100.0,
                up_to: tier.up_to_percent / 100.0,
            })
        })
        .collect()
}

fn run_request(request: &ApiRequest) -> SimulateResponse {
    let result = simulate_with_match(&request.input, &request.policy, &request.employer_match);
    log::debug!(
        "projected {} years to age {}: final balance {:.2}, real {:.2}",
        result.years_to_retirement,
        request.input.retirement_age,
        result.final_balance,
        result.final_real_balance
    );
    build_simulate_response(request, result)
}

fn build_simulate_response(request: &ApiRequest, result: SimulationResult) -> SimulateResponse {
    SimulateResponse {
        input: ResponseInput::from(&request.input),
        employer_match: request.employer_match.clone(),
        policy: request.policy,
        contribution_limit: request
            .policy
            .contribution_limit_for_age(request.input.current_age),
        breakdown: result.breakdown(),
        result,
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    log::info!("nestegg HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    let payload = payload
        .map(|Query(payload)| payload)
        .map_err(|rejection| ApiError::InvalidQuery(rejection.body_text()));
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    let payload = payload
        .map(|Json(payload)| payload)
        .map_err(|rejection| ApiError::InvalidJson(rejection.body_text()));
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: Result<SimulatePayload, ApiError>) -> Response {
    let request = match payload.and_then(api_request_from_payload) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("rejected simulate request: {err}");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    json_response(StatusCode::OK, run_request(&request))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, ApiError> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| ApiError::InvalidJson(e.to_string()))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, ApiError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.current_balance {
        cli.current_balance = v;
    }
    if let Some(v) = payload.annual_contribution {
        cli.annual_contribution = v;
    }
    if let Some(v) = payload.annual_salary {
        cli.annual_salary = v;
    }
    if let Some(v) = payload.employer_match {
        cli.employer_match = v;
    }
    if let Some(v) = payload.employer_match_limit {
        cli.employer_match_limit = v;
    }
    if let Some(v) = payload.expected_return {
        cli.expected_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }

    if let Some(v) = payload.contribution_limit {
        cli.contribution_limit = v;
    }
    if let Some(v) = payload.catch_up_contribution {
        cli.catch_up_contribution = v;
    }
    if let Some(v) = payload.catch_up_age {
        cli.catch_up_age = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        cli.withdrawal_rate = v;
    }

    build_request(cli, payload.match_tiers)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 35,
        retirement_age: 65,
        current_balance: 50_000.0,
        annual_contribution: 12_000.0,
        annual_salary: 80_000.0,
        employer_match: 50.0,
        employer_match_limit: 6.0,
        expected_return: 7.0,
        inflation_rate: 3.0,
        contribution_limit: 23_000.0,
        catch_up_contribution: 7_500.0,
        catch_up_age: 50,
        withdrawal_rate: 4.0,
    }
}

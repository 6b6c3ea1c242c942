use napi::Result as NapiResult;
use napi_derive::napi;

use credit_capital_core::capital::{self, CapitalInput};
use credit_capital_core::Framework;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_input(input_json: &str) -> NapiResult<CapitalInput> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Capital charges
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_irc(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let output = capital::calculate_irc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_drc(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let output = capital::calculate_drc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Issuer breakdown and comparison
// ---------------------------------------------------------------------------

/// `framework` is "irc" or "drc".
#[napi]
pub fn calculate_capital_by_issuer(input_json: String, framework: String) -> NapiResult<String> {
    let framework: Framework =
        serde_json::from_value(serde_json::Value::String(framework.to_lowercase()))
            .map_err(to_napi_error)?;
    let input = parse_input(&input_json)?;
    let output = capital::calculate_capital_by_issuer(&input, framework).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_irc_vs_drc(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let output = capital::compare_irc_vs_drc(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[napi]
pub fn list_transition_matrices() -> NapiResult<String> {
    let listings = capital::list_transition_matrices().map_err(to_napi_error)?;
    serde_json::to_string(&listings).map_err(to_napi_error)
}

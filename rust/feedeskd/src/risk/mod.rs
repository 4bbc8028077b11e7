//! Poverty risk assessment relayed to a hosted chat-completion model.
//!
//! Nothing is scored locally: the case is rendered into a fixed prompt, the
//! model is forced to answer through the `analyze_poverty_risk` tool, and the
//! tool arguments are validated and handed back.

mod gateway;

pub use gateway::GatewayClient;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const TOOL_NAME: &str = "analyze_poverty_risk";

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("{} not configured", crate::config::API_KEY_VAR)]
    MissingCredential,

    #[error("AI gateway error: {0}")]
    Gateway(u16),

    #[error("No tool call in response")]
    NoToolCall,

    #[error("Invalid analysis in response: {0}")]
    InvalidAnalysis(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Education {
    #[serde(rename = "No formal education")]
    NoFormal,
    Primary,
    Secondary,
    #[serde(rename = "Higher education")]
    Higher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Employment {
    Unemployed,
    #[serde(rename = "Part-time")]
    PartTime,
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Self-employed")]
    SelfEmployed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    Rural,
    Urban,
    #[serde(rename = "Peri-urban")]
    PeriUrban,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthAccess {
    None,
    Limited,
    Moderate,
    Good,
}

/// Wire label of a unit enum, as it appears in the request JSON.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRequest {
    pub income: f64,
    pub education: Education,
    pub employment: Employment,
    pub household_size: u32,
    pub location: LocationType,
    pub health_access: HealthAccess,
}

impl RiskRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, RiskError> {
        let req: Self =
            serde_json::from_slice(body).map_err(|e| RiskError::InvalidInput(e.to_string()))?;
        req.validate()?;
        Ok(req)
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        if !self.income.is_finite() || self.income < 0.0 {
            return Err(RiskError::InvalidInput(
                "income must be a non-negative number".into(),
            ));
        }
        if self.household_size == 0 {
            return Err(RiskError::InvalidInput(
                "householdSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub key_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub sdg_targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_PROMPT: &str = "\
You are an analyst specialized in household poverty risk and socioeconomic vulnerability.
Assess the case you are given across these dimensions:
- Economic: income level and stability of employment
- Human capital: level of education
- Social: household size and type of location
- Services: access to healthcare

Return, through the provided tool:
1. A poverty risk score from 0 to 100, where 100 is the highest risk
2. A risk category: Low, Medium, High or Critical
3. The key risk factors you identified
4. Concrete, actionable recommendations to reduce poverty risk
5. The SDG 1 targets that apply to this case";

/// Renders the fixed prompt for one case. Same input, same bytes.
pub fn render_prompt(req: &RiskRequest) -> Prompt {
    let user = format!(
        "Assess the poverty risk of the following case:\n\
         \n\
         Monthly income: ${income} (USD)\n\
         Education level: {education}\n\
         Employment status: {employment}\n\
         Household size: {household} people\n\
         Location type: {location}\n\
         Healthcare access: {health}\n\
         \n\
         Give a detailed assessment with specific recommendations.",
        income = req.income,
        education = label(&req.education),
        employment = label(&req.employment),
        household = req.household_size,
        location = label(&req.location),
        health = label(&req.health_access),
    );
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Function-calling schema the model must answer through.
pub fn analysis_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Structured poverty risk assessment of one household",
            "parameters": {
                "type": "object",
                "properties": {
                    "riskScore": {
                        "type": "number",
                        "description": "Poverty risk score from 0 to 100"
                    },
                    "riskCategory": {
                        "type": "string",
                        "enum": ["Low", "Medium", "High", "Critical"],
                        "description": "Overall risk category"
                    },
                    "keyFactors": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Key risk factors identified"
                    },
                    "recommendations": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Actionable recommendations"
                    },
                    "sdgTargets": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Relevant SDG 1 targets"
                    }
                },
                "required": ["riskScore", "riskCategory", "keyFactors", "recommendations", "sdgTargets"]
            }
        }
    })
}

/// Chat-completion request body for one case.
pub fn completion_body(model: &str, prompt: &Prompt) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": prompt.system },
            { "role": "user", "content": prompt.user }
        ],
        "tools": [analysis_tool()],
        "tool_choice": { "type": "function", "function": { "name": TOOL_NAME } }
    })
}

/// Extracts and validates the forced tool call from a completion response.
pub fn parse_tool_call(response: &Value) -> Result<RiskAnalysis, RiskError> {
    let call = response
        .pointer("/choices/0/message/tool_calls/0")
        .filter(|c| !c.is_null())
        .ok_or(RiskError::NoToolCall)?;
    let arguments = call
        .pointer("/function/arguments")
        .ok_or_else(|| RiskError::InvalidAnalysis("tool call has no arguments".into()))?;

    // Most gateways send the arguments as a JSON-encoded string.
    let analysis: RiskAnalysis = match arguments {
        Value::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    }
    .map_err(|e| RiskError::InvalidAnalysis(e.to_string()))?;

    if !(0.0..=100.0).contains(&analysis.risk_score) {
        return Err(RiskError::InvalidAnalysis(format!(
            "riskScore {} outside 0..=100",
            analysis.risk_score
        )));
    }
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RiskRequest {
        RiskRequest {
            income: 150.0,
            education: Education::Primary,
            employment: Employment::Unemployed,
            household_size: 6,
            location: LocationType::Rural,
            health_access: HealthAccess::Limited,
        }
    }

    fn completion(arguments: Value) -> Value {
        json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "type": "function",
                        "function": { "name": TOOL_NAME, "arguments": arguments }
                    }]
                }
            }]
        })
    }

    #[test]
    fn request_uses_form_labels_on_the_wire() {
        let body = br#"{"income":150,"education":"No formal education","employment":"Self-employed",
                        "householdSize":6,"location":"Peri-urban","healthAccess":"None"}"#;
        let req = RiskRequest::from_json(body).expect("parse");
        assert_eq!(req.education, Education::NoFormal);
        assert_eq!(req.employment, Employment::SelfEmployed);
        assert_eq!(req.location, LocationType::PeriUrban);
        assert_eq!(req.health_access, HealthAccess::None);
    }

    #[test]
    fn request_rejects_out_of_range_fields() {
        let bad_income = br#"{"income":-1,"education":"Primary","employment":"Unemployed",
                              "householdSize":2,"location":"Rural","healthAccess":"Good"}"#;
        assert!(matches!(
            RiskRequest::from_json(bad_income),
            Err(RiskError::InvalidInput(_))
        ));
        let empty_household = br#"{"income":10,"education":"Primary","employment":"Unemployed",
                                   "householdSize":0,"location":"Rural","healthAccess":"Good"}"#;
        assert!(RiskRequest::from_json(empty_household).is_err());
        let unknown_level = br#"{"income":10,"education":"PhD","employment":"Unemployed",
                                 "householdSize":2,"location":"Rural","healthAccess":"Good"}"#;
        assert!(RiskRequest::from_json(unknown_level).is_err());
    }

    #[test]
    fn prompt_is_deterministic_and_mentions_every_field() {
        let a = render_prompt(&sample());
        let b = render_prompt(&sample());
        assert_eq!(a, b);
        for needle in ["$150 (USD)", "Primary", "Unemployed", "6 people", "Rural", "Limited"] {
            assert!(a.user.contains(needle), "missing {needle} in {}", a.user);
        }
    }

    #[test]
    fn body_forces_the_analysis_tool() {
        let body = completion_body("m", &render_prompt(&sample()));
        assert_eq!(body["tool_choice"]["function"]["name"], TOOL_NAME);
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn parses_string_and_object_arguments() {
        let args = json!({
            "riskScore": 82,
            "riskCategory": "Critical",
            "keyFactors": ["No income source"],
            "recommendations": ["Cash transfer enrollment"],
            "sdgTargets": ["1.3"]
        });
        let from_string = parse_tool_call(&completion(Value::String(args.to_string()))).expect("string args");
        let from_object = parse_tool_call(&completion(args)).expect("object args");
        assert_eq!(from_string, from_object);
        assert_eq!(from_string.risk_category, RiskCategory::Critical);
        assert_eq!(from_string.risk_score, 82.0);
    }

    #[test]
    fn missing_tool_call_is_reported() {
        let plain = json!({ "choices": [{ "message": { "content": "hello" } }] });
        let err = parse_tool_call(&plain).expect_err("no tool call");
        assert_eq!(err.to_string(), "No tool call in response");
        assert!(matches!(parse_tool_call(&json!({})), Err(RiskError::NoToolCall)));
    }

    #[test]
    fn out_of_range_score_and_unknown_category_are_rejected() {
        let high = json!({
            "riskScore": 140, "riskCategory": "High",
            "keyFactors": [], "recommendations": [], "sdgTargets": []
        });
        assert!(matches!(parse_tool_call(&completion(high)), Err(RiskError::InvalidAnalysis(_))));
        let odd = json!({
            "riskScore": 40, "riskCategory": "Severe",
            "keyFactors": [], "recommendations": [], "sdgTargets": []
        });
        assert!(matches!(parse_tool_call(&completion(odd)), Err(RiskError::InvalidAnalysis(_))));
    }
}

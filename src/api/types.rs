use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One next-step or starting-step row from the statistics backend.
///
/// Process and activity endpoints name their key field differently, so both
/// are kept and `key()` picks whichever is present. Group entries are either
/// sent by the backend or synthesized client-side from a shared process
/// prefix; their member entries ride along in `children`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StepEntry {
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub percentage: f32,
    #[serde(default)]
    pub percentage_of_total: Option<f32>,
    #[serde(default)]
    pub avg_duration_minutes: Option<f64>,
    #[serde(default)]
    pub median_duration: Option<f64>,
    #[serde(default)]
    pub max_duration: Option<f64>,
    #[serde(default)]
    pub mean_cumulative_time: Option<f64>,
    #[serde(default)]
    pub median_cumulative_time: Option<f64>,
    #[serde(default)]
    pub avg_remaining_steps: Option<f64>,
    #[serde(default, rename = "isGroup")]
    pub is_group: bool,
    #[serde(default)]
    pub children: Vec<StepEntry>,
    #[serde(default)]
    pub activity_count: Option<usize>,
}

impl StepEntry {
    pub fn key(&self) -> &str {
        self.node_name
            .as_deref()
            .or(self.process.as_deref())
            .unwrap_or("")
    }

    /// Activity node names follow a `Process | Activity` convention; the
    /// prefix drives client-side grouping when the backend sends a flat list.
    pub fn process_prefix(&self) -> &str {
        if let Some(process) = self.process.as_deref()
            && !process.is_empty()
        {
            return process;
        }
        let name = self.key();
        name.split(" | ").next().unwrap_or(name)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Terminations {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub percentage: f32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NextStepsPayload {
    #[serde(default)]
    pub next_steps: Vec<StepEntry>,
    #[serde(default)]
    pub terminations: Terminations,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartingProcessesPayload {
    #[serde(default)]
    pub total_claims: u64,
    #[serde(default)]
    pub starting_processes: Vec<StepEntry>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct StartingNodesPayload {
    #[serde(default)]
    pub total_claims: u64,
    #[serde(default)]
    pub starting_nodes: Vec<StepEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimAtStep {
    #[serde(rename = "Claim_Number", deserialize_with = "string_or_number")]
    pub claim_number: String,
    #[serde(default)]
    pub remaining_duration: f64,
    #[serde(default)]
    pub total_duration: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimsAtStepPayload {
    #[serde(default)]
    pub claims: Vec<ClaimAtStep>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimStep {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub active_minutes: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimPathPayload {
    #[serde(default)]
    pub path: Vec<ClaimStep>,
    #[serde(default)]
    pub total_steps: usize,
    #[serde(default)]
    pub claim_info: Option<Value>,
    #[serde(default)]
    pub exposures: Vec<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClaimNumbersPayload {
    #[serde(default, deserialize_with = "string_or_number_list")]
    pub claim_numbers: Vec<String>,
}

/// Claim numbers are strings with leading zeros in one dataset and plain
/// integers in another; both decode to the string form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

fn string_or_number_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected a string or number, got {other}"
            ))),
        })
        .collect()
}

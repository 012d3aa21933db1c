use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::types::{
    ClaimAtStep, ClaimNumbersPayload, ClaimPathPayload, ClaimsAtStepPayload, NextStepsPayload,
    StartingNodesPayload, StartingProcessesPayload, StepEntry,
};
use crate::flow::{FlowLevel, FlowMode};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid API base URL {0}")]
    BadUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}")]
    Status { status: u16 },
    #[error("resource not found")]
    NotFound,
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Blocking client for the claim-statistics backend. Cheap to clone; worker
/// threads each take their own copy.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|error| ApiError::BadUrl(format!("{base_url:?}: {error}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BadUrl(format!("{base_url:?}: not a base URL")));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base, http })
    }

    /// Starting nodes for a fresh tree, together with the overall claim count.
    /// At the activity level the backend sends a flat list, so entries sharing
    /// a process prefix are folded into group buckets here.
    pub fn starting(
        &self,
        level: FlowLevel,
        mode: FlowMode,
    ) -> Result<(u64, Vec<StepEntry>), ApiError> {
        match level {
            FlowLevel::Process => {
                let payload: StartingProcessesPayload = self.get(
                    &["starting-processes"],
                    &[("mode", mode.query_value().to_owned())],
                )?;
                Ok((payload.total_claims, payload.starting_processes))
            }
            FlowLevel::Activity => {
                let payload: StartingNodesPayload =
                    self.get(&["activity-flow", "starting-nodes"], &[])?;
                Ok((payload.total_claims, group_by_process(payload.starting_nodes)))
            }
        }
    }

    /// Steps that follow `path`. The backend separates the one-step and the
    /// multi-step process queries, so the dispatch lives here rather than in
    /// every caller.
    pub fn next_steps(
        &self,
        level: FlowLevel,
        mode: FlowMode,
        path: &[String],
    ) -> Result<NextStepsPayload, ApiError> {
        match level {
            FlowLevel::Process if path.len() == 1 => self.get(
                &["process-flow", &path[0]],
                &[
                    ("filter_type", "starting".to_owned()),
                    ("mode", mode.query_value().to_owned()),
                ],
            ),
            FlowLevel::Process => self.get(
                &["process-flow-after-path"],
                &[
                    ("path", level.joined_path(path)),
                    ("mode", mode.query_value().to_owned()),
                ],
            ),
            FlowLevel::Activity => {
                let mut payload: NextStepsPayload = self.get(
                    &["activity-flow", "next-steps"],
                    &[("path", level.joined_path(path))],
                )?;
                payload.next_steps = group_by_process(payload.next_steps);
                Ok(payload)
            }
        }
    }

    pub fn claims_at_step(
        &self,
        level: FlowLevel,
        mode: FlowMode,
        path: &[String],
    ) -> Result<Vec<ClaimAtStep>, ApiError> {
        let payload: ClaimsAtStepPayload = self.get(
            &["claims-at-step"],
            &[
                ("path", level.joined_path(path)),
                ("type", level.query_type().to_owned()),
                ("mode", mode.query_value().to_owned()),
            ],
        )?;
        Ok(payload.claims)
    }

    /// Full journey of one claim. A missing claim comes back as 404, surfaced
    /// as `ApiError::NotFound` so the UI can word it differently.
    pub fn claim_path(
        &self,
        claim_number: &str,
        mode: FlowMode,
    ) -> Result<ClaimPathPayload, ApiError> {
        self.get(
            &["claim-path", claim_number],
            &[("mode", mode.query_value().to_owned())],
        )
    }

    pub fn claim_numbers(&self) -> Result<Vec<String>, ApiError> {
        let payload: ClaimNumbersPayload = self.get(&["claim-numbers"], &[])?;
        Ok(payload.claim_numbers)
    }

    fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments);
        debug!(%url, "GET");
        let mut request = self.http.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send()?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Appends path segments with percent-encoding; step names contain spaces
    /// and slashes.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Folds a flat activity list into per-process buckets. A prefix shared by at
/// least two entries becomes a synthetic group carrying its members; lone
/// entries pass through untouched. Output is ordered by descending count.
fn group_by_process(entries: Vec<StepEntry>) -> Vec<StepEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<StepEntry>> = HashMap::new();
    for entry in entries {
        let prefix = entry.process_prefix().to_owned();
        if !buckets.contains_key(&prefix) {
            order.push(prefix.clone());
        }
        buckets.entry(prefix).or_default().push(entry);
    }

    let mut grouped = Vec::with_capacity(order.len());
    for prefix in order {
        let Some(mut members) = buckets.remove(&prefix) else {
            continue;
        };
        if members.len() == 1 {
            grouped.extend(members);
            continue;
        }
        members.sort_by(|a, b| b.count.cmp(&a.count));
        let count = members.iter().map(|member| member.count).sum();
        let percentage = members.iter().map(|member| member.percentage).sum();
        grouped.push(StepEntry {
            node_name: Some(prefix),
            count,
            percentage,
            is_group: true,
            activity_count: Some(members.len()),
            children: members,
            ..StepEntry::default()
        });
    }
    grouped.sort_by(|a, b| b.count.cmp(&a.count));
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(name: &str, count: u64) -> StepEntry {
        StepEntry {
            node_name: Some(name.to_owned()),
            count,
            percentage: count as f32,
            ..StepEntry::default()
        }
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = ApiClient::new("http://127.0.0.1:8000/api").unwrap();
        let url = client.endpoint(&["process-flow", "Total Loss"]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/api/process-flow/Total%20Loss"
        );
    }

    #[test]
    fn endpoint_tolerates_a_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:8000/api/").unwrap();
        let url = client.endpoint(&["claim-numbers"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/claim-numbers");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::BadUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:ops@example.com"),
            Err(ApiError::BadUrl(_))
        ));
    }

    #[test]
    fn shared_prefixes_become_groups() {
        let grouped = group_by_process(vec![
            activity("Intake | Open", 30),
            activity("Review | Desk", 40),
            activity("Intake | Triage", 20),
            activity("Payment", 15),
        ]);

        assert_eq!(grouped.len(), 3);

        // Intake (50) outranks Review (40) outranks Payment (15).
        assert_eq!(grouped[0].key(), "Intake");
        assert!(grouped[0].is_group);
        assert_eq!(grouped[0].count, 50);
        assert_eq!(grouped[0].activity_count, Some(2));
        assert_eq!(grouped[0].children[0].key(), "Intake | Open");

        assert_eq!(grouped[1].key(), "Review | Desk");
        assert!(!grouped[1].is_group);

        assert_eq!(grouped[2].key(), "Payment");
        assert!(!grouped[2].is_group);
    }

    #[test]
    fn lone_entries_keep_their_stats() {
        let mut lone = activity("Payment", 9);
        lone.avg_duration_minutes = Some(12.0);
        let grouped = group_by_process(vec![lone]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].avg_duration_minutes, Some(12.0));
        assert!(!grouped[0].is_group);
    }
}

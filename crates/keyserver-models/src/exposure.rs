use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-level report type tag carried by a remote `ExposureKey`. Distinct
/// from the internal three-value `ReportType` taxonomy the Transform step
/// maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportTypeTag {
    ConfirmedTest,
    ConfirmedClinicalDiagnosis,
    Revoked,
    SelfReport,
    Recursive,
}

/// One remote exposure key record as received over the federation fetch
/// protocol, before Transform & Validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureKey {
    /// Base64-encoded 16-byte device-generated identifier.
    pub key_data: String,
    pub interval_number: i32,
    pub interval_count: i32,
    pub report_type: Option<ReportTypeTag>,
    /// 0 means "not set"; Transform back-fills from `report_type` when so.
    pub transmission_risk_level: i32,
    /// Symptom-onset offset in days, if the remote supplied one.
    pub days_since_onset_of_symptoms: Option<i32>,
    pub traveler: bool,
    pub regions: Vec<String>,
}

/// The internal three-value report type taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Confirmed,
    Likely,
    Negative,
}

impl ReportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Confirmed => "confirmed",
            ReportType::Likely => "likely",
            ReportType::Negative => "negative",
        }
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(ReportType::Confirmed),
            "likely" => Ok(ReportType::Likely),
            "negative" => Ok(ReportType::Negative),
            other => Err(format!("unknown report type '{other}'")),
        }
    }
}

/// The internal exposure entity.
///
/// The core only produces and stamps these; the Exposure Store's upsert
/// semantics (idempotent dedup by `exposure_key`) are the external store's
/// responsibility. `keyserver-db` owns the row <-> `Exposure` mapping since
/// `regions`/`report_type` don't map onto plain SQL columns 1:1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub exposure_key: String,
    pub interval_number: i32,
    pub interval_count: i32,
    pub report_type: ReportType,
    pub transmission_risk_level: i32,
    pub days_since_onset_of_symptoms: Option<i32>,
    pub regions: Vec<String>,
    pub traveler: bool,
    pub local_provenance: bool,
    pub federation_sync_id: Option<i64>,
    pub federation_query_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_type_round_trips_through_str() {
        for rt in [ReportType::Confirmed, ReportType::Likely, ReportType::Negative] {
            let s = rt.as_str();
            let parsed: ReportType = s.parse().unwrap();
            assert_eq!(parsed, rt);
        }
    }

    #[test]
    fn report_type_rejects_unknown_string() {
        assert!("bogus".parse::<ReportType>().is_err());
    }
}

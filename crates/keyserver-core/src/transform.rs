use chrono::{DateTime, Utc};
use keyserver_models::{Exposure, ExposureKey, ReportType, ReportTypeTag};
use thiserror::Error;

const INTERVAL_SECONDS: i64 = 600;
const MAX_END_INTERVAL_SPAN: i32 = 144;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("missing or unsupported report type")]
    InvalidReportType,
    #[error("interval_number {interval_number} is outside the validation window [{min_start_interval}, {max_start_interval}]")]
    IntervalOutOfWindow {
        interval_number: i32,
        min_start_interval: i32,
        max_start_interval: i32,
    },
    #[error("interval_number + interval_count exceeds the maximum end interval")]
    IntervalSpanTooLarge,
}

/// Feature flags and tunables that gate Transform & Validate; mirrors the
/// `ACCEPT_SELF_REPORT` / `ACCEPT_RECURSIVE` / `MAX_INTERVAL_AGE` /
/// `MAX_MAGNITUDE_SYMPTOM_ONSET_DAYS` configuration knobs.
#[derive(Debug, Clone, Copy)]
pub struct TransformPolicy {
    pub accept_self_report: bool,
    pub accept_recursive: bool,
    pub max_interval_age_seconds: i64,
    pub max_magnitude_symptom_onset_days: i32,
}

fn interval_number(at: DateTime<Utc>) -> i32 {
    (at.timestamp() / INTERVAL_SECONDS) as i32
}

/// Maps the wire-level report type tag onto the internal taxonomy and a
/// default transmission-risk level used only when the remote omitted (or
/// zeroed) its own value.
fn map_report_type(
    tag: ReportTypeTag,
    policy: &TransformPolicy,
) -> Result<(ReportType, i32), TransformError> {
    match tag {
        ReportTypeTag::ConfirmedTest => Ok((ReportType::Confirmed, 6)),
        ReportTypeTag::ConfirmedClinicalDiagnosis => Ok((ReportType::Likely, 4)),
        ReportTypeTag::Revoked => Ok((ReportType::Negative, 0)),
        ReportTypeTag::SelfReport if policy.accept_self_report => Ok((ReportType::Likely, 2)),
        ReportTypeTag::Recursive if policy.accept_recursive => Ok((ReportType::Likely, 2)),
        ReportTypeTag::SelfReport | ReportTypeTag::Recursive => Err(TransformError::InvalidReportType),
    }
}

/// Converts one untrusted remote `ExposureKey` into the internal `Exposure`
/// entity, applying interval-window and risk-range policy. Idempotent:
/// running it twice on the same input and the same `now` produces the same
/// output (or the same rejection) — the transform is a pure function of
/// its inputs plus the policy and clock it's given.
pub fn transform_and_validate(
    key: &ExposureKey,
    policy: &TransformPolicy,
    now: DateTime<Utc>,
    sync_id: i64,
    query_id: &str,
) -> Result<Exposure, TransformError> {
    let tag = key.report_type.ok_or(TransformError::InvalidReportType)?;
    let (report_type, default_risk) = map_report_type(tag, policy)?;

    let transmission_risk_level = if key.transmission_risk_level == 0 {
        default_risk
    } else {
        key.transmission_risk_level
    };

    let days_since_onset_of_symptoms = key.days_since_onset_of_symptoms.filter(|days| {
        days.unsigned_abs() <= policy.max_magnitude_symptom_onset_days as u32
    });

    let min_start_interval =
        interval_number(now - chrono::Duration::seconds(policy.max_interval_age_seconds));
    let max_start_interval = interval_number(now);
    let max_end_interval = max_start_interval + MAX_END_INTERVAL_SPAN;

    if key.interval_number < min_start_interval || key.interval_number > max_start_interval {
        return Err(TransformError::IntervalOutOfWindow {
            interval_number: key.interval_number,
            min_start_interval,
            max_start_interval,
        });
    }
    if key.interval_number + key.interval_count > max_end_interval {
        return Err(TransformError::IntervalSpanTooLarge);
    }

    let mut regions: Vec<String> = key
        .regions
        .iter()
        .map(|r| r.trim().to_ascii_uppercase())
        .collect();
    regions.sort();

    Ok(Exposure {
        exposure_key: key.key_data.clone(),
        interval_number: key.interval_number,
        interval_count: key.interval_count,
        report_type,
        transmission_risk_level,
        days_since_onset_of_symptoms,
        regions,
        traveler: key.traveler,
        local_provenance: false,
        federation_sync_id: Some(sync_id),
        federation_query_id: Some(query_id.to_string()),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TransformPolicy {
        TransformPolicy {
            accept_self_report: false,
            accept_recursive: false,
            max_interval_age_seconds: 14 * 24 * 3600,
            max_magnitude_symptom_onset_days: 14,
        }
    }

    fn key_at(now: DateTime<Utc>, offset_intervals: i32) -> ExposureKey {
        ExposureKey {
            key_data: "key".into(),
            interval_number: interval_number(now) + offset_intervals,
            interval_count: 144,
            report_type: Some(ReportTypeTag::ConfirmedTest),
            transmission_risk_level: 0,
            days_since_onset_of_symptoms: None,
            traveler: false,
            regions: vec![" us ".to_string(), "ca".to_string()],
        }
    }

    #[test]
    fn valid_key_is_transformed_and_backfills_risk() {
        let now = Utc::now();
        let key = key_at(now, 0);
        let exposure = transform_and_validate(&key, &policy(), now, 1, "q1").unwrap();
        assert_eq!(exposure.report_type, ReportType::Confirmed);
        assert_eq!(exposure.transmission_risk_level, 6);
        assert_eq!(exposure.regions, vec!["CA", "US"]);
    }

    #[test]
    fn missing_report_type_is_rejected() {
        let now = Utc::now();
        let mut key = key_at(now, 0);
        key.report_type = None;
        assert_eq!(
            transform_and_validate(&key, &policy(), now, 1, "q1"),
            Err(TransformError::InvalidReportType)
        );
    }

    #[test]
    fn self_report_is_rejected_unless_the_feature_flag_is_set() {
        let now = Utc::now();
        let mut key = key_at(now, 0);
        key.report_type = Some(ReportTypeTag::SelfReport);

        assert_eq!(
            transform_and_validate(&key, &policy(), now, 1, "q1"),
            Err(TransformError::InvalidReportType)
        );

        let mut accepting = policy();
        accepting.accept_self_report = true;
        let exposure = transform_and_validate(&key, &accepting, now, 1, "q1").unwrap();
        assert_eq!(exposure.report_type, ReportType::Likely);
    }

    #[test]
    fn stale_key_below_the_window_floor_is_rejected() {
        let now = Utc::now();
        let key = key_at(now, -100_000);
        assert!(matches!(
            transform_and_validate(&key, &policy(), now, 1, "q1"),
            Err(TransformError::IntervalOutOfWindow { .. })
        ));
    }

    #[test]
    fn key_extending_past_the_max_end_interval_is_rejected() {
        let now = Utc::now();
        let mut key = key_at(now, 0);
        key.interval_count = 145;
        assert_eq!(
            transform_and_validate(&key, &policy(), now, 1, "q1"),
            Err(TransformError::IntervalSpanTooLarge)
        );
    }

    #[test]
    fn out_of_range_symptom_onset_is_dropped_not_rejected() {
        let now = Utc::now();
        let mut key = key_at(now, 0);
        key.days_since_onset_of_symptoms = Some(30);
        let exposure = transform_and_validate(&key, &policy(), now, 1, "q1").unwrap();
        assert_eq!(exposure.days_since_onset_of_symptoms, None);
    }

    #[test]
    fn transform_is_idempotent_on_the_same_input_and_clock() {
        let now = Utc::now();
        let key = key_at(now, 0);
        let first = transform_and_validate(&key, &policy(), now, 1, "q1").unwrap();
        let second = transform_and_validate(&key, &policy(), now, 1, "q1").unwrap();
        assert_eq!(first, second);
    }
}

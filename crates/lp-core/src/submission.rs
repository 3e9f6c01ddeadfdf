//! Request submission planning.
//!
//! An NTR submission lists samples and catalog test methods. Test methods
//! belong to capabilities, and every capability works its own queue, so one
//! submission is split into one request per capability. Planning happens
//! here without touching the database; [`crate::db::RequestRepository`]
//! allocates run numbers and writes the planned batches in one transaction.

use crate::models::{Priority, RequestType, TestMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Errors detected while planning a submission.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("At least one sample is required")]
    NoSamples,

    #[error("At least one test method is required")]
    NoTestMethods,

    #[error("Sample names must not be empty")]
    EmptySampleName,

    #[error("Duplicate sample name: {0}")]
    DuplicateSample(String),

    #[error("Test method {0} does not exist")]
    UnknownTestMethod(Uuid),

    #[error("Test method {0} is not active")]
    InactiveTestMethod(String),

    #[error("Test method {0} is listed more than once")]
    DuplicateTestMethod(String),

    #[error("Test method {method} refers to unknown sample '{sample}'")]
    UnknownSample { method: String, sample: String },

    #[error("Test method {0} has an empty sample selection")]
    EmptySampleSelection(String),

    #[error("Reservation end must be after reservation start")]
    InvalidReservationWindow,
}

/// A sample as described by the researcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDraft {
    /// Name, unique within the submission.
    pub name: String,
    pub sample_type: Option<String>,
    pub description: Option<String>,
}

impl SampleDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sample_type: None,
            description: None,
        }
    }
}

/// One requested test method in an NTR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtrLine {
    pub test_method_id: Uuid,
    /// Sample names this method applies to; `None` means every sample.
    pub samples: Option<Vec<String>>,
    pub remarks: Option<String>,
}

/// Normal Test Request submission.
#[derive(Debug, Clone)]
pub struct NtrSubmission {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub title: String,
    pub priority: Priority,
    pub details: serde_json::Value,
    pub samples: Vec<SampleDraft>,
    pub lines: Vec<NtrLine>,
}

/// Analysis Solution Request submission.
#[derive(Debug, Clone)]
pub struct AsrSubmission {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub capability_id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub problem_statement: String,
    pub objective: Option<String>,
    pub samples: Vec<SampleDraft>,
}

/// Equipment Reservation submission.
#[derive(Debug, Clone)]
pub struct ErSubmission {
    pub requester_id: Uuid,
    pub io_id: Option<Uuid>,
    pub equipment_id: Uuid,
    pub title: String,
    pub reservation_start: DateTime<Utc>,
    pub reservation_end: DateTime<Utc>,
    pub purpose: Option<String>,
}

impl ErSubmission {
    /// Checks that the reservation window is not empty or inverted.
    pub fn validate_window(&self) -> Result<(), SubmissionError> {
        if self.reservation_end <= self.reservation_start {
            return Err(SubmissionError::InvalidReservationWindow);
        }
        Ok(())
    }

    /// Returns true if this reservation overlaps `[start, end)`.
    ///
    /// Windows that merely touch (one ends when the other starts) do not overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.reservation_start < end && start < self.reservation_end
    }
}

/// A testing sample to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSample {
    pub test_method_id: Option<Uuid>,
    pub sample: SampleDraft,
    pub remarks: Option<String>,
}

/// Everything one capability receives from a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityBatch {
    pub capability_id: Uuid,
    /// Test methods in submission order.
    pub test_method_ids: Vec<Uuid>,
    /// Testing samples, method by method, samples in submission order.
    pub samples: Vec<PlannedSample>,
}

/// Checks sample names: at least one sample, names non-empty and unique.
pub fn validate_samples(samples: &[SampleDraft]) -> Result<(), SubmissionError> {
    if samples.is_empty() {
        return Err(SubmissionError::NoSamples);
    }

    let mut seen = HashSet::new();
    for sample in samples {
        let name = sample.name.trim();
        if name.is_empty() {
            return Err(SubmissionError::EmptySampleName);
        }
        if !seen.insert(name) {
            return Err(SubmissionError::DuplicateSample(name.to_string()));
        }
    }
    Ok(())
}

/// Splits an NTR into one batch per capability.
///
/// Batches come out in order of the first line that mentions their
/// capability. Every (line, selected sample) pair yields one planned sample.
pub fn plan_ntr(
    methods: &[TestMethod],
    lines: &[NtrLine],
    samples: &[SampleDraft],
) -> Result<Vec<CapabilityBatch>, SubmissionError> {
    validate_samples(samples)?;
    if lines.is_empty() {
        return Err(SubmissionError::NoTestMethods);
    }

    let catalog: HashMap<Uuid, &TestMethod> = methods.iter().map(|m| (m.id, m)).collect();
    let by_name: HashMap<&str, &SampleDraft> =
        samples.iter().map(|s| (s.name.trim(), s)).collect();

    let mut batches: Vec<CapabilityBatch> = Vec::new();
    let mut batch_index: HashMap<Uuid, usize> = HashMap::new();
    let mut seen_methods = HashSet::new();

    for line in lines {
        let method = catalog
            .get(&line.test_method_id)
            .ok_or(SubmissionError::UnknownTestMethod(line.test_method_id))?;

        if !method.is_active {
            return Err(SubmissionError::InactiveTestMethod(method.code.clone()));
        }
        if !seen_methods.insert(method.id) {
            return Err(SubmissionError::DuplicateTestMethod(method.code.clone()));
        }

        let selected: Vec<&SampleDraft> = match &line.samples {
            None => samples.iter().collect(),
            Some(names) if names.is_empty() => {
                return Err(SubmissionError::EmptySampleSelection(method.code.clone()))
            }
            Some(names) => names
                .iter()
                .map(|name| {
                    by_name.get(name.trim()).copied().ok_or_else(|| {
                        SubmissionError::UnknownSample {
                            method: method.code.clone(),
                            sample: name.clone(),
                        }
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        let idx = *batch_index.entry(method.capability_id).or_insert_with(|| {
            batches.push(CapabilityBatch {
                capability_id: method.capability_id,
                test_method_ids: Vec::new(),
                samples: Vec::new(),
            });
            batches.len() - 1
        });

        let batch = &mut batches[idx];
        batch.test_method_ids.push(method.id);
        batch
            .samples
            .extend(selected.into_iter().map(|sample| PlannedSample {
                test_method_id: Some(method.id),
                sample: sample.clone(),
                remarks: line.remarks.clone(),
            }));
    }

    Ok(batches)
}

/// Plans an ASR: a single batch for the chosen capability, one testing
/// sample per submitted sample, without a catalog method.
pub fn plan_asr(
    capability_id: Uuid,
    samples: &[SampleDraft],
) -> Result<CapabilityBatch, SubmissionError> {
    validate_samples(samples)?;
    Ok(CapabilityBatch {
        capability_id,
        test_method_ids: Vec::new(),
        samples: samples
            .iter()
            .map(|sample| PlannedSample {
                test_method_id: None,
                sample: sample.clone(),
                remarks: None,
            })
            .collect(),
    })
}

/// Renders a request number: `{TYPE}-{SHORT}-{YYMM}-{NNNN}`.
pub fn format_request_number(
    kind: RequestType,
    short_name: &str,
    date: DateTime<Utc>,
    run_no: i64,
) -> String {
    format!(
        "{}-{}-{}-{:04}",
        kind.number_prefix(),
        short_name,
        date.format("%y%m"),
        run_no
    )
}

/// Renders a testing sample code: `{request_number}-S{NN}`, 1-based.
pub fn format_sample_code(request_number: &str, seq: usize) -> String {
    format!("{}-S{:02}", request_number, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn method(code: &str, capability_id: Uuid) -> TestMethod {
        TestMethod::new(code, code, capability_id)
    }

    fn line(method: &TestMethod, samples: Option<&[&str]>) -> NtrLine {
        NtrLine {
            test_method_id: method.id,
            samples: samples.map(|names| names.iter().map(|s| s.to_string()).collect()),
            remarks: None,
        }
    }

    fn samples(names: &[&str]) -> Vec<SampleDraft> {
        names.iter().map(|n| SampleDraft::named(*n)).collect()
    }

    #[test]
    fn test_groups_by_capability_in_first_appearance_order() {
        let rheology = Uuid::new_v4();
        let thermal = Uuid::new_v4();
        let mfr = method("MFR", rheology);
        let dsc = method("DSC", thermal);
        let visc = method("VISC", rheology);

        let batches = plan_ntr(
            &[mfr.clone(), dsc.clone(), visc.clone()],
            &[line(&mfr, None), line(&dsc, None), line(&visc, None)],
            &samples(&["A", "B"]),
        )
        .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].capability_id, rheology);
        assert_eq!(batches[0].test_method_ids, vec![mfr.id, visc.id]);
        assert_eq!(batches[1].capability_id, thermal);
        assert_eq!(batches[1].test_method_ids, vec![dsc.id]);

        // method-major order: MFR/A, MFR/B, VISC/A, VISC/B
        let names: Vec<(Option<Uuid>, &str)> = batches[0]
            .samples
            .iter()
            .map(|p| (p.test_method_id, p.sample.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (Some(mfr.id), "A"),
                (Some(mfr.id), "B"),
                (Some(visc.id), "A"),
                (Some(visc.id), "B"),
            ]
        );
    }

    #[test]
    fn test_sample_selection_limits_pairs() {
        let cap = Uuid::new_v4();
        let tensile = method("TENSILE", cap);
        let batches = plan_ntr(
            &[tensile.clone()],
            &[line(&tensile, Some(&["B"]))],
            &samples(&["A", "B", "C"]),
        )
        .unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].samples.len(), 1);
        assert_eq!(batches[0].samples[0].sample.name, "B");
    }

    #[test]
    fn test_unknown_sample_is_rejected() {
        let cap = Uuid::new_v4();
        let tensile = method("TENSILE", cap);
        let err = plan_ntr(
            &[tensile.clone()],
            &[line(&tensile, Some(&["Z"]))],
            &samples(&["A"]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::UnknownSample {
                method: "TENSILE".to_string(),
                sample: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let tensile = method("TENSILE", Uuid::new_v4());
        let err = plan_ntr(&[tensile.clone()], &[line(&tensile, Some(&[]))], &samples(&["A"]))
            .unwrap_err();
        assert_eq!(err, SubmissionError::EmptySampleSelection("TENSILE".to_string()));
    }

    #[test]
    fn test_unknown_and_inactive_methods() {
        let cap = Uuid::new_v4();
        let known = method("DSC", cap);
        let ghost = method("GHOST", cap);

        let err = plan_ntr(&[known.clone()], &[line(&ghost, None)], &samples(&["A"])).unwrap_err();
        assert_eq!(err, SubmissionError::UnknownTestMethod(ghost.id));

        let mut retired = method("OLD", cap);
        retired.is_active = false;
        let err =
            plan_ntr(&[retired.clone()], &[line(&retired, None)], &samples(&["A"])).unwrap_err();
        assert_eq!(err, SubmissionError::InactiveTestMethod("OLD".to_string()));
    }

    #[test]
    fn test_duplicate_method_is_rejected() {
        let dsc = method("DSC", Uuid::new_v4());
        let err = plan_ntr(
            &[dsc.clone()],
            &[line(&dsc, None), line(&dsc, None)],
            &samples(&["A"]),
        )
        .unwrap_err();
        assert_eq!(err, SubmissionError::DuplicateTestMethod("DSC".to_string()));
    }

    #[test]
    fn test_sample_validation() {
        assert_eq!(validate_samples(&[]), Err(SubmissionError::NoSamples));
        assert_eq!(
            validate_samples(&samples(&["A", " "])),
            Err(SubmissionError::EmptySampleName)
        );
        assert_eq!(
            validate_samples(&samples(&["A", "A "])),
            Err(SubmissionError::DuplicateSample("A".to_string()))
        );
    }

    #[test]
    fn test_no_lines_is_rejected() {
        assert_eq!(
            plan_ntr(&[], &[], &samples(&["A"])),
            Err(SubmissionError::NoTestMethods)
        );
    }

    #[test]
    fn test_plan_asr() {
        let cap = Uuid::new_v4();
        let batch = plan_asr(cap, &samples(&["X", "Y"])).unwrap();
        assert_eq!(batch.capability_id, cap);
        assert!(batch.test_method_ids.is_empty());
        assert_eq!(batch.samples.len(), 2);
        assert!(batch.samples.iter().all(|p| p.test_method_id.is_none()));
    }

    #[test]
    fn test_request_number_format() {
        let date = Utc.with_ymd_and_hms(2024, 10, 3, 8, 0, 0).unwrap();
        assert_eq!(
            format_request_number(RequestType::Ntr, "RHE", date, 7),
            "NTR-RHE-2410-0007"
        );
        assert_eq!(
            format_request_number(RequestType::Er, "MIC", date, 12345),
            "ER-MIC-2410-12345"
        );
    }

    #[test]
    fn test_sample_code_format() {
        assert_eq!(
            format_sample_code("NTR-RHE-2410-0007", 3),
            "NTR-RHE-2410-0007-S03"
        );
        assert_eq!(format_sample_code("ASR-AN-2410-0001", 120), "ASR-AN-2410-0001-S120");
    }

    #[test]
    fn test_reservation_window() {
        let start = Utc.with_ymd_and_hms(2024, 10, 3, 8, 0, 0).unwrap();
        let mut er = ErSubmission {
            requester_id: Uuid::new_v4(),
            io_id: None,
            equipment_id: Uuid::new_v4(),
            title: "Rheometer slot".to_string(),
            reservation_start: start,
            reservation_end: start,
            purpose: None,
        };
        assert_eq!(
            er.validate_window(),
            Err(SubmissionError::InvalidReservationWindow)
        );
        er.reservation_end = start + chrono::Duration::hours(2);
        assert!(er.validate_window().is_ok());
    }

    #[test]
    fn test_reservation_overlap() {
        let start = Utc.with_ymd_and_hms(2024, 10, 3, 8, 0, 0).unwrap();
        let hours = chrono::Duration::hours;
        let er = ErSubmission {
            requester_id: Uuid::new_v4(),
            io_id: None,
            equipment_id: Uuid::new_v4(),
            title: "Rheometer slot".to_string(),
            reservation_start: start,
            reservation_end: start + hours(2),
            purpose: None,
        };

        assert!(er.overlaps(start + hours(1), start + hours(3)));
        assert!(er.overlaps(start - hours(1), start + hours(5)));
        assert!(!er.overlaps(start + hours(2), start + hours(4)));
        assert!(!er.overlaps(start - hours(2), start));
    }
}

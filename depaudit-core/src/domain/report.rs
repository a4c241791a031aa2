//! Audit reports and severity accounting

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Severity levels tracked by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Moderate,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Per-severity vulnerability counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SeverityCounts {
    pub info: u64,
    pub low: u64,
    pub moderate: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Info => self.info,
            Severity::Low => self.low,
            Severity::Moderate => self.moderate,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    fn slot(&mut self, severity: Severity) -> &mut u64 {
        match severity {
            Severity::Info => &mut self.info,
            Severity::Low => &mut self.low,
            Severity::Moderate => &mut self.moderate,
            Severity::High => &mut self.high,
            Severity::Critical => &mut self.critical,
        }
    }

    /// Sum over the five tracked severities
    pub fn total(&self) -> u64 {
        Severity::ALL
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(self.get(*s)))
    }

    pub fn add(&mut self, other: &SeverityCounts) {
        for severity in Severity::ALL {
            let slot = self.slot(severity);
            *slot = slot.saturating_add(other.get(severity));
        }
    }
}

/// Why a scan document cannot be accepted as a report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportShapeError {
    #[error("report must be a JSON object")]
    NotAnObject,

    #[error("scan tool reported an error: {0}")]
    ToolError(String),

    #[error("\"metadata\" must be an object")]
    MetadataNotObject,

    #[error("\"metadata.vulnerabilities\" must be an object")]
    VulnerabilitiesNotObject,

    #[error("\"metadata.vulnerabilities.{0}\" must be a non-negative integer")]
    InvalidCount(String),
}

/// A vulnerability report as produced by the scan tool.
///
/// The document is kept whole; only `metadata.vulnerabilities` is
/// interpreted. Construction guarantees that mapping exists and that every
/// tracked severity in it is a non-negative integer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AuditReport(Value);

impl AuditReport {
    /// Normalize a scan tool document into a report.
    ///
    /// Inserts an empty `metadata.vulnerabilities` mapping when the tool
    /// emitted none.
    pub fn from_scan_output(document: Value) -> Result<Self, ReportShapeError> {
        let Value::Object(mut root) = document else {
            return Err(ReportShapeError::NotAnObject);
        };

        if !root.contains_key("metadata")
            && let Some(error) = root.get("error")
        {
            return Err(ReportShapeError::ToolError(describe_tool_error(error)));
        }

        let metadata = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(metadata) = metadata else {
            return Err(ReportShapeError::MetadataNotObject);
        };

        let vulnerabilities = metadata
            .entry("vulnerabilities")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(vulnerabilities) = vulnerabilities else {
            return Err(ReportShapeError::VulnerabilitiesNotObject);
        };

        for severity in Severity::ALL {
            if let Some(count) = vulnerabilities.get(severity.as_str())
                && count.as_u64().is_none()
            {
                return Err(ReportShapeError::InvalidCount(severity.as_str().to_string()));
            }
        }

        Ok(Self(Value::Object(root)))
    }

    /// The full document
    pub fn document(&self) -> &Value {
        &self.0
    }

    pub fn into_document(self) -> Value {
        self.0
    }

    /// Counts for the tracked severities; unknown keys such as `total` are ignored.
    pub fn vulnerability_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        let Some(vulnerabilities) = self
            .0
            .pointer("/metadata/vulnerabilities")
            .and_then(Value::as_object)
        else {
            return counts;
        };

        for severity in Severity::ALL {
            if let Some(n) = vulnerabilities.get(severity.as_str()).and_then(Value::as_u64) {
                *counts.slot(severity) = n;
            }
        }
        counts
    }

    /// True when no tracked severity has a finding
    pub fn is_safe(&self) -> bool {
        self.vulnerability_counts().total() == 0
    }
}

impl<'de> Deserialize<'de> for AuditReport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        AuditReport::from_scan_output(value).map_err(serde::de::Error::custom)
    }
}

fn describe_tool_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("summary")
            .or_else(|| map.get("message"))
            .or_else(|| map.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_npm_audit_document_counts() {
        let report = AuditReport::from_scan_output(json!({
            "auditReportVersion": 2,
            "vulnerabilities": {},
            "metadata": {
                "vulnerabilities": {
                    "info": 0, "low": 1, "moderate": 2, "high": 0, "critical": 3, "total": 6
                }
            }
        }))
        .unwrap();

        let counts = report.vulnerability_counts();
        assert_eq!(counts.low, 1);
        assert_eq!(counts.moderate, 2);
        assert_eq!(counts.critical, 3);
        assert_eq!(counts.total(), 6);
        assert!(!report.is_safe());
    }

    #[test]
    fn test_missing_mapping_is_inserted() {
        let report = AuditReport::from_scan_output(json!({ "auditReportVersion": 2 })).unwrap();
        assert_eq!(
            report.document().pointer("/metadata/vulnerabilities"),
            Some(&json!({}))
        );
        assert!(report.is_safe());
    }

    #[test]
    fn test_tool_error_document_rejected() {
        let err = AuditReport::from_scan_output(json!({
            "error": { "code": "ENOLOCK", "summary": "This command requires an existing lockfile." }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ReportShapeError::ToolError("This command requires an existing lockfile.".into())
        );
    }

    #[test]
    fn test_malformed_shapes_rejected() {
        assert_eq!(
            AuditReport::from_scan_output(json!("text")).unwrap_err(),
            ReportShapeError::NotAnObject
        );
        assert_eq!(
            AuditReport::from_scan_output(json!({ "metadata": [] })).unwrap_err(),
            ReportShapeError::MetadataNotObject
        );
        assert_eq!(
            AuditReport::from_scan_output(json!({ "metadata": { "vulnerabilities": 3 } }))
                .unwrap_err(),
            ReportShapeError::VulnerabilitiesNotObject
        );
        assert_eq!(
            AuditReport::from_scan_output(json!({
                "metadata": { "vulnerabilities": { "high": -1 } }
            }))
            .unwrap_err(),
            ReportShapeError::InvalidCount("high".into())
        );
    }

    #[test]
    fn test_deserialize_applies_normalization() {
        let report: AuditReport = serde_json::from_str(r#"{"metadata":{}}"#).unwrap();
        assert!(report.document().pointer("/metadata/vulnerabilities").is_some());
        assert!(serde_json::from_str::<AuditReport>("[1]").is_err());
    }

    proptest! {
        #[test]
        fn prop_total_is_sum_of_severities(
            info in 0u64..1000, low in 0u64..1000, moderate in 0u64..1000,
            high in 0u64..1000, critical in 0u64..1000,
        ) {
            let counts = SeverityCounts { info, low, moderate, high, critical };
            prop_assert_eq!(counts.total(), info + low + moderate + high + critical);

            let mut doubled = counts;
            doubled.add(&counts);
            prop_assert_eq!(doubled.total(), counts.total() * 2);
        }
    }
}

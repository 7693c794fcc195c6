//! Downloadable session summary.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::pipeline::PipelineSummary;

/// The JSON document written by "Save summary".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryExport {
    pub patient_context: String,
    pub problems_identified: Vec<String>,
    pub possible_solutions: Vec<String>,
    pub response: String,
    #[serde(serialize_with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
}

fn iso_millis<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl SummaryExport {
    /// `patient-summary-YYYY-MM-DD.json`, dated by the export timestamp (UTC).
    pub fn file_name(&self) -> String {
        format!("patient-summary-{}.json", self.timestamp.format("%Y-%m-%d"))
    }

    /// Pretty-printed JSON, two-space indented.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the export to `path`. When `path` is a directory the file is
    /// created inside it under [`file_name`](Self::file_name).
    pub fn write_to(&self, path: &Path) -> io::Result<PathBuf> {
        let target = if path.is_dir() {
            path.join(self.file_name())
        } else {
            path.to_path_buf()
        };
        let json = self.to_json_pretty().map_err(io::Error::other)?;
        std::fs::write(&target, json)?;
        Ok(target)
    }
}

impl From<&PipelineSummary> for SummaryExport {
    fn from(summary: &PipelineSummary) -> Self {
        Self {
            patient_context: summary.context.clone(),
            problems_identified: summary.problems.clone(),
            possible_solutions: summary.solutions.clone(),
            response: summary.response.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> SummaryExport {
        SummaryExport {
            patient_context: "work stress".into(),
            problems_identified: vec!["Work Stress".into()],
            possible_solutions: vec!["Cbt".into()],
            response: "Consider CBT.".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 1).unwrap(),
        }
    }

    #[test]
    fn file_name_uses_utc_date() {
        assert_eq!(sample().file_name(), "patient-summary-2026-03-09.json");
    }

    #[test]
    fn serializes_camel_case_with_iso_timestamp() {
        let value: serde_json::Value =
            serde_json::from_str(&sample().to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["patientContext"], "work stress");
        assert_eq!(value["problemsIdentified"][0], "Work Stress");
        assert_eq!(value["possibleSolutions"][0], "Cbt");
        assert_eq!(value["response"], "Consider CBT.");
        assert_eq!(value["timestamp"], "2026-03-09T23:59:01.000Z");
    }

    #[test]
    fn write_to_directory_uses_dated_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let written = sample().write_to(dir.path()).unwrap();

        assert_eq!(written, dir.path().join("patient-summary-2026-03-09.json"));
        let text = std::fs::read_to_string(&written).unwrap();
        assert!(text.contains("\"patientContext\": \"work stress\""));
    }

    #[test]
    fn write_to_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        assert_eq!(sample().write_to(&path).unwrap(), path);
        assert!(path.exists());
    }

    #[test]
    fn from_pipeline_summary() {
        let summary = PipelineSummary {
            context: "ctx".into(),
            problems: vec!["Anxiety".into()],
            solutions: vec!["Cbt".into()],
            response: "ok".into(),
        };
        let export = SummaryExport::from(&summary);
        assert_eq!(export.patient_context, "ctx");
        assert_eq!(export.possible_solutions, ["Cbt"]);
    }
}

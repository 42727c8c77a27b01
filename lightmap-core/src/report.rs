// Completeness reports for a geocoded dataset

use crate::artifact;
use crate::model::{LighthouseDataset, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub total: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    pub pending: usize,
    /// Keyed by state code; records without one are under `"??"`.
    pub by_state: BTreeMap<String, StateCounts>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &LighthouseDataset) -> Self {
        let mut summary = DatasetSummary {
            total: dataset.len(),
            ..Self::default()
        };

        for record in &dataset.lighthouses {
            let resolved = record.is_resolved();
            match &record.resolution {
                _ if resolved => summary.resolved += 1,
                Resolution::NotFound => summary.not_found += 1,
                Resolution::Failed { .. } => summary.failed += 1,
                // Claims to be resolved but has no usable coordinates
                Resolution::Resolved => summary.failed += 1,
                Resolution::Pending => summary.pending += 1,
            }

            let state = record
                .state
                .as_deref()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "??".to_string());
            let counts = summary.by_state.entry(state).or_default();
            counts.total += 1;
            if resolved {
                counts.resolved += 1;
            }
        }

        summary
    }

    pub fn unresolved(&self) -> usize {
        self.total - self.resolved
    }

    /// Share of records with coordinates, 0-100.
    pub fn coverage_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.resolved as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub summary: DatasetSummary,
    pub unresolved: Vec<UnresolvedEntry>,
}

pub fn gather_report_data(dataset: &LighthouseDataset) -> ReportData {
    let unresolved = dataset
        .unresolved()
        .map(|record| UnresolvedEntry {
            name: record.name.clone(),
            state: record.state.clone(),
            outcome: record.resolution.as_str().to_string(),
            reason: match &record.resolution {
                Resolution::Failed { reason } => Some(reason.clone()),
                Resolution::Resolved => Some("missing or invalid coordinates".to_string()),
                _ => None,
            },
        })
        .collect();

    ReportData {
        source: dataset.source.clone(),
        summary: DatasetSummary::from_dataset(dataset),
        unresolved,
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let summary = &data.summary;
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                        LIGHTHOUSE DATASET REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    if let Some(ref source) = data.source {
        report.push_str(&format!("Source:       {}\n", source));
    }
    report.push_str(&format!("Lighthouses:  {}\n", summary.total));
    report.push_str(&format!(
        "Resolved:     {} ({:.1}%)\n",
        summary.resolved,
        summary.coverage_percent()
    ));
    report.push_str(&format!("Not found:    {}\n", summary.not_found));
    report.push_str(&format!("Failed:       {}\n", summary.failed));
    if summary.pending > 0 {
        report.push_str(&format!("Pending:      {}\n", summary.pending));
    }
    report.push('\n');

    if !summary.by_state.is_empty() {
        report.push_str(RULE);
        report.push_str("BY STATE\n");
        report.push_str(RULE);
        report.push('\n');
        for (state, counts) in &summary.by_state {
            report.push_str(&format!(
                "  {:<4} {:>5} / {:<5}\n",
                state, counts.resolved, counts.total
            ));
        }
        report.push('\n');
    }

    if !data.unresolved.is_empty() {
        report.push_str(RULE);
        report.push_str("UNRESOLVED\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &data.unresolved {
            report.push_str(&format!("  [{}] {}", entry.outcome.to_uppercase(), entry.name));
            if let Some(ref state) = entry.state {
                report.push_str(&format!(", {}", state));
            }
            if let Some(ref reason) = entry.reason {
                report.push_str(&format!(" ({})", reason));
            }
            report.push('\n');
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "lightmap",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "source": data.source,
            "summary": {
                "total": data.summary.total,
                "resolved": data.summary.resolved,
                "unresolved": data.summary.unresolved(),
                "coverage_percent": (data.summary.coverage_percent() * 10.0).round() / 10.0,
                "breakdown": {
                    "not_found": data.summary.not_found,
                    "failed": data.summary.failed,
                    "pending": data.summary.pending
                }
            },
            "by_state": data.summary.by_state,
            "unresolved": data.unresolved
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> artifact::Result<()> {
    artifact::write_atomic(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LighthouseRecord;
    use lightmap_scanner::Coordinates;

    fn dataset() -> LighthouseDataset {
        let mut boston = LighthouseRecord::new("Boston Light");
        boston.state = Some("MA".to_string());
        boston.resolve(Coordinates::new(42.3275, -70.8908).unwrap());

        let mut unknown = LighthouseRecord::new("Unknown Rock Light");
        unknown.state = Some("ma".to_string());
        unknown.mark_not_found();

        let mut flaky = LighthouseRecord::new("Flaky Point");
        flaky.mark_failed("HTTP 503 (gave up after 3 retries)");

        LighthouseDataset::new(Some("https://example.com".to_string()), vec![boston, unknown, flaky])
    }

    #[test]
    fn test_summary_counts() {
        let summary = DatasetSummary::from_dataset(&dataset());
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unresolved(), 2);
        assert_eq!(
            summary.by_state.get("MA"),
            Some(&StateCounts {
                total: 2,
                resolved: 1
            })
        );
        assert_eq!(summary.by_state.get("??").map(|c| c.total), Some(1));
    }

    #[test]
    fn test_resolved_without_coordinates_counts_as_failed() {
        let mut broken = LighthouseRecord::new("Hand edited");
        broken.resolution = Resolution::Resolved;
        let summary = DatasetSummary::from_dataset(&LighthouseDataset::new(None, vec![broken]));
        assert_eq!(summary.resolved, 0);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_text_report_lists_unresolved() {
        let report = generate_text_report(&gather_report_data(&dataset()));
        assert!(report.contains("LIGHTHOUSE DATASET REPORT"));
        assert!(report.contains("Resolved:     1 (33.3%)"));
        assert!(report.contains("[NOT_FOUND] Unknown Rock Light, ma"));
        assert!(report.contains("[FAILED] Flaky Point (HTTP 503"));
        assert!(!report.contains("[RESOLVED]"));
    }

    #[test]
    fn test_json_report_structure() {
        let json = generate_json_report(&gather_report_data(&dataset())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let report = &value["report"];
        assert_eq!(report["metadata"]["generator"], "lightmap");
        assert_eq!(report["summary"]["total"], 3);
        assert_eq!(report["summary"]["unresolved"], 2);
        assert_eq!(report["by_state"]["MA"]["resolved"], 1);
        assert_eq!(report["unresolved"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_dataset() {
        let summary = DatasetSummary::from_dataset(&LighthouseDataset::default());
        assert_eq!(summary.coverage_percent(), 0.0);
        let report = generate_text_report(&gather_report_data(&LighthouseDataset::default()));
        assert!(!report.contains("UNRESOLVED"));
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("csv"), None);
    }
}

use super::Diagnostic;
use itertools::Itertools;

/// Formats validation diagnostics into a human-readable report.
pub struct DiagnosticFormatter;

impl DiagnosticFormatter {
    /// One header line per location, followed by its issues.
    pub fn format_report(diagnostics: &[Diagnostic]) -> String {
        if diagnostics.is_empty() {
            return "No issues found.".to_string();
        }

        let mut report = String::new();
        for (location, group) in &diagnostics.iter().chunk_by(|d| d.location.as_str()) {
            report.push_str(location);
            report.push_str(":\n");
            for diagnostic in group {
                report.push_str(&format!("  - {}\n", diagnostic.error));
            }
        }
        report.push_str(&format!(
            "{} issue{} found.",
            diagnostics.len(),
            if diagnostics.len() == 1 { "" } else { "s" }
        ));
        report
    }

    /// A single line, for logs.
    pub fn format_line(diagnostics: &[Diagnostic]) -> String {
        diagnostics.iter().join("; ")
    }
}

use crate::models::{ReportFinding, ReportSection, Severity, XssReport};

pub fn format_finding_markdown(finding: &ReportFinding) -> String {
    let slot = match &finding.object_name {
        Some(name) => format!("`{}` ({}, rule {})", name, finding.schema_object, finding.generation_rule),
        None => format!("{} (rule {})", finding.schema_object, finding.generation_rule),
    };
    format!(
        "#### {}\n\n**Output elements:** {}\n**Occurrences:** {}\n\n**Injected value:**\n```\n{}\n```\n\n**Evidence:**\n```html\n{}\n```\n",
        slot,
        finding.elements.join(", "),
        finding.occurrences,
        finding.injected_value,
        finding.evidence,
    )
}

pub fn format_section_markdown(section: &ReportSection) -> String {
    let mut out = format!(
        "### {}\n\n**Rule:** `{}`\n**Severity:** {}\n\n{}\n\n",
        section.title, section.rule_id, section.severity, section.summary
    );
    for finding in &section.findings {
        out.push_str(&format_finding_markdown(finding));
        out.push('\n');
    }
    out
}

pub fn format_executive_summary(sections: &[ReportSection]) -> String {
    let count = |severity: Severity| -> usize {
        sections
            .iter()
            .filter(|s| s.severity == severity)
            .map(|s| s.findings.len())
            .sum()
    };
    let total: usize = sections.iter().map(|s| s.findings.len()).sum();

    format!(
        "## Executive Summary\n\n| Severity | Count |\n|---|---|\n| Critical | {} |\n| High | {} |\n| Medium | {} |\n| Low | {} |\n| Info | {} |\n| **Total** | **{}** |\n",
        count(Severity::Critical),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low),
        count(Severity::Info),
        total
    )
}

pub fn format_report_markdown(report: &XssReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("# XSS Report: {}\n\n", report.stylesheet));
    out.push_str(&format!(
        "- Generated: {}\n- Tool version: {}\n- Schema version: {}\n- Documents analyzed: {}\n- Documents failed: {}\n- Mutations proposed: {}\n",
        report.generated_at.to_rfc3339(),
        report.tool_version,
        report.statistics.schema_version,
        report.statistics.documents_analyzed,
        report.statistics.documents_failed,
        report.statistics.mutations_proposed,
    ));
    if !report.complete {
        out.push_str("\n> **Incomplete:** at least one rule failed to consolidate its results.\n");
    }
    out.push('\n');
    out.push_str(&format_executive_summary(&report.sections));

    let mut sections: Vec<&ReportSection> = report.sections.iter().collect();
    sections.sort_by_key(|s| s.severity.rank());
    for section in sections {
        out.push_str("\n---\n\n");
        out.push_str(&format_section_markdown(section));
    }
    out
}

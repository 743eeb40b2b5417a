use std::fmt::Write as _;

use serde_json::json;

use crate::opportunity::Opportunity;
use crate::semantic::{Hit, SearchReport};

/// Maximum description length shown in text output (characters)
const DESCRIPTION_PREVIEW_CHARS: usize = 200;

const MISSING: &str = "N/A";

/// Render one result for terminal display. `rank` starts at 1.
pub fn format_hit(hit: &Hit, rank: usize) -> String {
    let opp = Opportunity::from_payload(&hit.opportunity);

    let location = opp
        .location
        .map(|l| match (l.name, l.address) {
            (Some(name), Some(address)) => format!("{name} ({address})"),
            (Some(name), None) => name,
            (None, Some(address)) => address,
            (None, None) => MISSING.to_string(),
        })
        .unwrap_or_else(|| MISSING.to_string());

    let (days, times) = opp
        .schedule
        .map(|s| (s.days.unwrap_or_default().join(", "), s.times.unwrap_or_default()))
        .unwrap_or_default();

    let categories = opp
        .tags
        .and_then(|t| t.categories)
        .unwrap_or_default()
        .join(", ");

    let description = opp
        .activity_description
        .map(|d| preview(&d, DESCRIPTION_PREVIEW_CHARS))
        .unwrap_or_else(|| MISSING.to_string());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{rank}. {} (Similarity: {:.3})",
        opp.activity_name.as_deref().unwrap_or("Unknown"),
        hit.similarity
    );
    let _ = writeln!(out, "   Location:    {location}");
    let _ = writeln!(
        out,
        "   Age Range:   {}",
        opp.age_range.as_deref().unwrap_or(MISSING)
    );
    let _ = writeln!(out, "   Cost:        {}", opp.cost.as_deref().unwrap_or(MISSING));
    let _ = writeln!(out, "   Schedule:    {}", format!("{days} {times}").trim());
    let _ = writeln!(out, "   Categories:  {categories}");
    let _ = writeln!(out, "   Description: {description}");
    let _ = writeln!(out, "   URL:         {}", opp.url.as_deref().unwrap_or(MISSING));
    out
}

/// Render a whole report for terminal display.
pub fn format_report(report: &SearchReport) -> String {
    if report.results.is_empty() {
        return format!("No results found.\n{}", skipped_note(report));
    }

    let rule = "=".repeat(80);
    let mut out = format!(
        "\nTop {} results for '{}':\n{rule}\n",
        report.results.len(),
        report.query
    );
    for (i, hit) in report.results.iter().enumerate() {
        out.push('\n');
        out.push_str(&format_hit(hit, i + 1));
    }
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&skipped_note(report));
    out
}

/// One line counting opportunities left out of ranking, empty if none were.
fn skipped_note(report: &SearchReport) -> String {
    match report.skipped.len() {
        0 => String::new(),
        n => format!(
            "({n} of {} opportunities skipped: missing or incompatible embeddings)\n",
            n + report.eligible
        ),
    }
}

/// JSON array of `{"opportunity": .., "similarity": ..}` objects.
pub fn results_json(report: &SearchReport) -> serde_json::Value {
    json!(report.results)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

use std::fmt::Write;

use chrono::NaiveDate;

use crate::grades;
use crate::models::{Opportunity, ResultRecord, StudentProfile};

pub fn build_transcript(
    student: &StudentProfile,
    generated_on: NaiveDate,
    results: &[ResultRecord],
    eligible: &[Opportunity],
) -> String {
    let term_averages = grades::per_term_averages(results);
    let cumulative = grades::cumulative_average(results);

    let mut output = String::new();

    let _ = writeln!(output, "# Academic Transcript");
    let _ = writeln!(
        output,
        "{} ({}), {} term {}, cohort {}",
        student.display_name,
        student.registration_id,
        student.branch,
        student.current_term,
        student.cohort_label
    );
    let _ = writeln!(output, "Generated on {generated_on}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Term Averages");

    if term_averages.is_empty() {
        let _ = writeln!(output, "No results recorded yet.");
    } else {
        let _ = writeln!(output, "| Term | SGPA |");
        let _ = writeln!(output, "|------|------|");
        for (term, average) in &term_averages {
            let shown = average.map_or_else(|| "-".to_string(), |avg| avg.to_string());
            let _ = writeln!(output, "| {term} | {shown} |");
        }
    }

    let _ = writeln!(output);
    match cumulative {
        Some(average) => {
            let _ = writeln!(output, "Cumulative average: {average}");
        }
        None => {
            let _ = writeln!(output, "Cumulative average: not available");
        }
    }

    for term in term_averages.keys() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Term {term}");
        for result in results.iter().filter(|result| result.term == *term) {
            let _ = writeln!(
                output,
                "- {} {} ({} credits, {}): grade {}, total {}",
                result.subject_code,
                result.subject_name,
                result.credit_weight,
                result.exam_category,
                result.letter_grade.as_deref().unwrap_or("-"),
                result
                    .total_score
                    .map_or_else(|| "-".to_string(), |total| format!("{total:.0}"))
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Eligible Placements");

    if eligible.is_empty() {
        let _ = writeln!(output, "No upcoming placements match this profile.");
    } else {
        for opportunity in eligible {
            let minimum = opportunity
                .minimum_average
                .map_or_else(|| "none".to_string(), |minimum| format!("{minimum:.2}"));
            let _ = write!(
                output,
                "- {}: {} (minimum average {minimum}",
                opportunity.organization, opportunity.role
            );
            if let Some(apply_by) = opportunity.apply_by {
                let _ = write!(output, ", apply by {}", apply_by.date_naive());
            }
            let _ = writeln!(output, ")");
        }
    }

    output
}

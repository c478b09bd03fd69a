use crate::models::Opportunity;

pub const ALL_BRANCHES: &str = "All";

/// Branch membership plus the minimum-average threshold.
///
/// A student without a cumulative average passes the threshold check. An
/// average of exactly zero counts as not yet computed. Callers narrow the
/// postings to the upcoming ones first.
pub fn is_eligible(branch: &str, cumulative_average: Option<f64>, opportunity: &Opportunity) -> bool {
    let branch_eligible = opportunity
        .eligible_groups
        .iter()
        .any(|group| group == branch || group == ALL_BRANCHES);

    let average_eligible = match (
        opportunity.minimum_average,
        cumulative_average.filter(|average| *average != 0.0),
    ) {
        (Some(minimum), Some(average)) => average >= minimum,
        _ => true,
    };

    branch_eligible && average_eligible
}

pub fn eligible_opportunities(
    branch: &str,
    cumulative_average: Option<f64>,
    opportunities: &[Opportunity],
) -> Vec<Opportunity> {
    opportunities
        .iter()
        .filter(|opportunity| is_eligible(branch, cumulative_average, opportunity))
        .cloned()
        .collect()
}

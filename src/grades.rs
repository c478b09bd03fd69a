use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::models::ResultRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterGrade {
    S,
    APlus,
    A,
    BPlus,
    B,
    C,
    P,
    F,
}

impl LetterGrade {
    pub fn points(self) -> u64 {
        match self {
            LetterGrade::S => 10,
            LetterGrade::APlus => 9,
            LetterGrade::A => 8,
            LetterGrade::BPlus => 7,
            LetterGrade::B => 6,
            LetterGrade::C => 5,
            LetterGrade::P => 4,
            LetterGrade::F => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedGrade(pub String);

impl fmt::Display for UnrecognizedGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized letter grade {:?}", self.0)
    }
}

impl std::error::Error for UnrecognizedGrade {}

impl FromStr for LetterGrade {
    type Err = UnrecognizedGrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(LetterGrade::S),
            "A+" => Ok(LetterGrade::APlus),
            "A" => Ok(LetterGrade::A),
            "B+" => Ok(LetterGrade::BPlus),
            "B" => Ok(LetterGrade::B),
            "C" => Ok(LetterGrade::C),
            "P" => Ok(LetterGrade::P),
            "F" => Ok(LetterGrade::F),
            other => Err(UnrecognizedGrade(other.to_string())),
        }
    }
}

/// A grade-point average held exactly in hundredths, e.g. `757` is 7.57.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GradePointAverage(u64);

impl GradePointAverage {
    /// Rounds `weighted_points / credits` half-up to two decimals.
    fn from_ratio(weighted_points: u64, credits: u64) -> Option<Self> {
        if credits == 0 {
            return None;
        }
        Some(Self((200 * weighted_points + credits) / (2 * credits)))
    }

    pub fn hundredths(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for GradePointAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.hundredths();
        write!(f, "{}.{:02}", hundredths / 100, hundredths % 100)
    }
}

impl Serialize for GradePointAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Credit-weighted grade-point average over the given records.
///
/// Records without a recognized letter grade or without a positive credit
/// weight are skipped and do not count toward the denominator. Marks never
/// enter the formula. Returns `None` when nothing qualifies.
pub fn term_average(results: &[ResultRecord]) -> Option<GradePointAverage> {
    let mut total_credits = 0u64;
    let mut weighted_points = 0u64;

    for result in results {
        let Some(grade) = result
            .letter_grade
            .as_deref()
            .and_then(|grade| grade.parse::<LetterGrade>().ok())
        else {
            continue;
        };
        let Ok(credits) = u64::try_from(result.credit_weight) else {
            continue;
        };

        total_credits += credits;
        weighted_points += grade.points() * credits;
    }

    GradePointAverage::from_ratio(weighted_points, total_credits)
}

/// Same formula across every term a student has results for.
pub fn cumulative_average(results: &[ResultRecord]) -> Option<GradePointAverage> {
    term_average(results)
}

pub fn per_term_averages(results: &[ResultRecord]) -> BTreeMap<i32, Option<GradePointAverage>> {
    let mut by_term: BTreeMap<i32, Vec<ResultRecord>> = BTreeMap::new();
    for result in results {
        by_term.entry(result.term).or_default().push(result.clone());
    }

    by_term
        .into_iter()
        .map(|(term, records)| (term, term_average(&records)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExamCategory;
    use uuid::Uuid;

    fn result(term: i32, grade: Option<&str>, credits: i32) -> ResultRecord {
        ResultRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            term,
            subject_name: "Engineering Mathematics".to_string(),
            subject_code: "21MAT31".to_string(),
            internal_score: None,
            external_score: None,
            total_score: None,
            letter_grade: grade.map(str::to_string),
            credit_weight: credits,
            exam_category: ExamCategory::Regular,
            academic_year: "2023-24".to_string(),
        }
    }

    #[test]
    fn point_table_matches_grade_letters() {
        let table = [
            ("S", 10),
            ("A+", 9),
            ("A", 8),
            ("B+", 7),
            ("B", 6),
            ("C", 5),
            ("P", 4),
            ("F", 0),
        ];
        for (letter, points) in table {
            assert_eq!(letter.parse::<LetterGrade>().map(LetterGrade::points), Ok(points));
        }
        assert!("a+".parse::<LetterGrade>().is_err());
        assert!("E".parse::<LetterGrade>().is_err());
    }

    #[test]
    fn weights_points_by_credits() {
        let records = vec![result(3, Some("A"), 4), result(3, Some("B+"), 3)];
        let average = term_average(&records);
        assert_eq!(average.map(|avg| avg.to_string()), Some("7.57".to_string()));
    }

    #[test]
    fn failing_grade_still_counts_credits() {
        let records = vec![result(1, Some("F"), 3), result(1, Some("S"), 4)];
        assert_eq!(
            term_average(&records).map(GradePointAverage::hundredths),
            Some(571)
        );
    }

    #[test]
    fn rounds_half_up() {
        // 8.125 -> 8.13
        let records = vec![result(2, Some("A+"), 1), result(2, Some("A"), 7)];
        assert_eq!(term_average(&records).map(|avg| avg.to_string()), Some("8.13".to_string()));
    }

    #[test]
    fn undefined_without_recognized_grades() {
        assert_eq!(term_average(&[]), None);

        let records = vec![result(4, None, 4), result(4, Some("X"), 3)];
        assert_eq!(term_average(&records), None);
    }

    #[test]
    fn unrecognized_grades_do_not_dilute_average() {
        let records = vec![
            result(5, Some("S"), 4),
            result(5, Some("AB"), 3),
            result(5, None, 2),
        ];
        assert_eq!(term_average(&records).map(|avg| avg.to_string()), Some("10.00".to_string()));
    }

    #[test]
    fn cumulative_average_spans_terms() {
        let records = vec![
            result(1, Some("S"), 4),
            result(2, Some("B"), 4),
            result(2, Some("Absent"), 4),
        ];
        let terms = per_term_averages(&records);
        assert_eq!(terms.get(&1).copied().flatten().map(|a| a.hundredths()), Some(1000));
        assert_eq!(terms.get(&2).copied().flatten().map(|a| a.hundredths()), Some(600));
        assert_eq!(cumulative_average(&records).map(|a| a.hundredths()), Some(800));
    }

    #[test]
    fn reports_undefined_terms_individually() {
        let records = vec![result(1, Some("A"), 4), result(2, None, 4)];
        let terms = per_term_averages(&records);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms.get(&2).copied().flatten(), None);
    }
}

use std::io::Read;

use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::grades::{self, GradePointAverage};
use crate::models::{NewResult, ResultId, ResultRecord};
use crate::portal::{Caller, Portal};

impl Portal {
    pub async fn student_results(
        &self,
        caller: Caller,
        term: Option<i32>,
    ) -> PortalResult<Vec<ResultRecord>> {
        let Some(student) = self.student_for(caller).await? else {
            return Ok(Vec::new());
        };
        self.store.results_for_student(student.id, term).await
    }

    pub async fn add_result(&self, caller: Caller, input: NewResult) -> PortalResult<ResultId> {
        let student = self.require_student(caller).await?;
        input.validate()?;

        let record = input.into_record(student.id);
        if let Some(grade) = record.letter_grade.as_deref() {
            if grade.parse::<grades::LetterGrade>().is_err() {
                warn!(grade, subject_code = %record.subject_code, "grade will not count toward averages");
            }
        }
        self.store.insert_result(&record).await?;
        Ok(record.id)
    }

    /// `None` when the caller has no profile or the term has no gradable results.
    pub async fn term_average_for(
        &self,
        caller: Caller,
        term: i32,
    ) -> PortalResult<Option<GradePointAverage>> {
        let Some(student) = self.student_for(caller).await? else {
            return Ok(None);
        };
        let results = self.store.results_for_student(student.id, Some(term)).await?;
        Ok(grades::term_average(&results))
    }

    /// Recomputes the cumulative average from every stored result and writes
    /// it to the profile. An undefined average clears the stored value.
    pub async fn refresh_cumulative_average(
        &self,
        caller: Caller,
    ) -> PortalResult<Option<GradePointAverage>> {
        let student = self.require_student(caller).await?;
        let results = self.store.results_for_student(student.id, None).await?;
        let average = grades::cumulative_average(&results);

        self.store
            .set_cumulative_average(student.id, average.map(GradePointAverage::as_f64))
            .await?;
        info!(student_id = %student.id, average = ?average.map(|a| a.to_string()), "cumulative average refreshed");
        Ok(average)
    }

    /// Imports result rows from CSV. Every row is validated before any is
    /// stored, so a bad file inserts nothing.
    pub async fn import_results_csv<R: Read>(&self, caller: Caller, reader: R) -> PortalResult<usize> {
        let student = self.require_student(caller).await?;

        let mut reader = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        for (line, row) in reader.deserialize::<NewResult>().enumerate() {
            let row = row?;
            row.validate().map_err(|e| match e {
                PortalError::Invalid { field, reason } => PortalError::Invalid {
                    field,
                    reason: format!("{reason} (row {})", line + 1),
                },
                other => other,
            })?;
            rows.push(row);
        }

        let inserted = rows.len();
        for row in rows {
            self.store.insert_result(&row.into_record(student.id)).await?;
        }
        info!(student_id = %student.id, inserted, "results imported");
        Ok(inserted)
    }
}

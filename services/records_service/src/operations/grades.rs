use service_core::operation_error::{Code, OperationError};

use crate::error::{not_found, RecordsResult};
use crate::model::{Assignment, Course, CourseGrade, EntityKind, Student};
use crate::operations::relationships::course_entry;
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, Patch};

/// Mean over the grades that are set. Unset grades count neither toward the sum nor the count.
pub fn aggregate(grades: impl IntoIterator<Item = Option<f64>>) -> CourseGrade {
    let graded: Vec<f64> = grades.into_iter().flatten().collect();
    CourseGrade::mean(&graded)
}

/// Recomputes the student's grade in the course from their submissions to the course's
/// assignments and stores it on their enrollment. Calling it again without intervening grading
/// yields the same grade.
///
/// # Errors
///
/// `NotFound` if the course is missing, or if the student is not enrolled in it.
#[tracing::instrument(skip(store))]
pub async fn recompute_course_grade(store: &EntityStore, student_id: &str, course_id: &str) -> RecordsResult<CourseGrade> {
    let course = store.get::<Course>(course_id).await?;

    let mut grades = Vec::with_capacity(course.assignment_ids.len());
    for assignment_id in &course.assignment_ids {
        match store.try_get::<Assignment>(assignment_id).await? {
            Some(assignment) => grades.push(assignment.submissions.get(student_id).and_then(|s| s.grade)),
            None => tracing::warn!(%assignment_id, "Skipping missing assignment."),
        }
    }
    let grade = aggregate(grades);

    let enrollment = course_entry(course_id);
    let patch = Patch::new()
        .set(enrollment.clone().field(Attr::Grade), grade)
        .map_err(patch_error)?
        .require(enrollment);
    store.update::<Student>(student_id, &patch).await.map_err(|e| match e.code() {
        Code::NotFound => not_found(EntityKind::Enrollment, format!("{}/{}", student_id, course_id)),
        _ => e,
    })?;

    tracing::info!(%grade, "Recomputed course grade.");
    Ok(grade)
}

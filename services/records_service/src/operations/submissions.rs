use service_core::endpoint_error::EndpointError;

use crate::clock::Clock;
use crate::error::{not_found, require_id, RecordsError, RecordsResult};
use crate::model::{ArtifactRef, Assignment, CourseGrade, EntityKind, Submission};
use crate::operations::grades::recompute_course_grade;
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, FieldPath, Patch};

fn submission_entry(student_id: &str) -> FieldPath {
    FieldPath::attr(Attr::Submissions).key(student_id)
}

/// The student's submission entry, which must have been created when the assignment was attached.
#[tracing::instrument(skip(store))]
pub async fn get_submission(store: &EntityStore, assignment_id: &str, student_id: &str) -> RecordsResult<Submission> {
    let mut assignment = store.get::<Assignment>(assignment_id).await?;

    assignment
        .submissions
        .remove(student_id)
        .ok_or_else(|| not_found(EntityKind::Submission, student_id))
}

/// Records the student's submitted file, stamped with the current time. Only students with a
/// submission entry can submit; no entry is created here.
#[tracing::instrument(skip(store, clock))]
pub async fn record_submission(
    store: &EntityStore,
    clock: &dyn Clock,
    student_id: &str,
    assignment_id: &str,
    artifact: ArtifactRef,
) -> RecordsResult<()> {
    require_id(student_id, "Student id")?;
    require_id(artifact.as_str(), "Artifact")?;
    get_submission(store, assignment_id, student_id).await?;

    let entry = submission_entry(student_id);
    let patch = Patch::new()
        .set(entry.clone().field(Attr::Artifact), &artifact)
        .map_err(patch_error)?
        .set(entry.clone().field(Attr::SubmissionDate), clock.now())
        .map_err(patch_error)?
        .require(entry);

    store.update::<Assignment>(assignment_id, &patch).await
}

/// Sets the grade and/or the response on the student's submission. The course grade is
/// recomputed, and returned, only when both are given in the same call and the student is still
/// enrolled. A dropped student's submission is graded without touching any course grade.
///
/// # Errors
///
/// `Validation` when neither is given or the grade is not a finite number. `NotFound` when the
/// student has no submission entry.
#[tracing::instrument(skip(store, response))]
pub async fn grade_submission(
    store: &EntityStore,
    student_id: &str,
    course_id: &str,
    assignment_id: &str,
    grade: Option<f64>,
    response: Option<String>,
) -> RecordsResult<Option<CourseGrade>> {
    require_id(student_id, "Student id")?;
    if grade.is_none() && response.is_none() {
        return Err(EndpointError::validation("A grade or a response must be provided."));
    }
    if matches!(grade, Some(g) if !g.is_finite()) {
        return Err(EndpointError::validation("Grade must be a finite number."));
    }
    get_submission(store, assignment_id, student_id).await?;

    let entry = submission_entry(student_id);
    let mut patch = Patch::new().require(entry.clone());
    if let Some(grade) = grade {
        patch = patch.set(entry.clone().field(Attr::Grade), grade).map_err(patch_error)?;
    }
    if let Some(response) = &response {
        patch = patch.set(entry.field(Attr::TeacherResponse), response).map_err(patch_error)?;
    }
    store.update::<Assignment>(assignment_id, &patch).await?;

    // Partial updates leave the course grade alone until a full grade and response arrive.
    if grade.is_none() || response.is_none() {
        return Ok(None);
    }
    match recompute_course_grade(store, student_id, course_id).await {
        Ok(grade) => Ok(Some(grade)),
        Err(e) if matches!(e.as_operation(), Some(RecordsError::NotFound(EntityKind::Enrollment, _))) => {
            tracing::warn!("Graded a student no longer enrolled, course grade left alone.");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

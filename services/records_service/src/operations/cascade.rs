use service_core::endpoint_error::EndpointError;

use crate::artifacts::ArtifactStore;
use crate::error::{RecordsError, RecordsResult};
use crate::model::{ArtifactRef, Assignment, Course};
use crate::operations::relationships::{unlink_course_from_students, unlink_course_from_teacher};
use crate::store::EntityStore;

/// Deletes a course and everything hanging off it, in this order: the teacher's link, every
/// enrolled student's enrollment, the submitted artifacts of all of its assignments, the
/// assignments, and finally the course itself.
///
/// Artifacts are deleted before any assignment so that no stored submission ever points at a
/// file that is already gone. Nothing is rolled back on failure; re-issuing the call resumes
/// where it stopped.
///
/// # Errors
///
/// `NotFound` if the course does not exist. `PartialCleanup` with the references that could
/// not be deleted; the assignments and the course are then left in place.
#[tracing::instrument(skip(store, artifacts))]
pub async fn delete_course(store: &EntityStore, artifacts: &dyn ArtifactStore, course_id: &str) -> RecordsResult<()> {
    let course = store.get::<Course>(course_id).await?;

    unlink_course_from_teacher(store, &course.teacher_id, course_id).await?;
    unlink_course_from_students(store, &course.student_ids, course_id).await?;

    let mut assignments = Vec::with_capacity(course.assignment_ids.len());
    for assignment_id in &course.assignment_ids {
        match store.try_get::<Assignment>(assignment_id).await? {
            Some(assignment) => assignments.push(assignment),
            None => tracing::warn!(%assignment_id, "Assignment already deleted."),
        }
    }

    let refs: Vec<ArtifactRef> = assignments
        .iter()
        .flat_map(|a| a.artifacts().cloned())
        .collect();
    if !refs.is_empty() {
        artifacts.delete_artifacts(&refs).await.map_err(|e| {
            tracing::error!(failed = ?e.failed, "Artifact cleanup incomplete, keeping assignments.");
            EndpointError::operation(RecordsError::PartialCleanup(e.failed))
        })?;
    }

    for assignment in &assignments {
        store.delete::<Assignment>(&assignment.id).await?;
    }
    store.delete::<Course>(course_id).await?;

    tracing::info!(
        students = course.student_ids.len(),
        assignments = assignments.len(),
        artifacts = refs.len(),
        "Deleted course."
    );
    Ok(())
}

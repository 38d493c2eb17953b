//! Writes to both sides of every denormalized link. Nothing else in the crate patches a course
//! roster, a course's assignment list, an account's course set or an assignment's submissions
//! keys.
//!
//! Each link is two single-document updates. The authoritative side (the course) is written
//! first, so an interruption leaves a roster entry without its enrollment, which
//! [`super::reconcile::reconcile`] repairs, rather than the reverse.

use std::collections::BTreeSet;

use service_core::endpoint_error::EndpointError;
use service_core::operation_error::{Code, OperationError};

use crate::error::{require_id, RecordsError, RecordsResult};
use crate::model::{
    Assignment, Course, CourseAssignment, CourseEnrollment, EntityKind, Student, Submission, Teacher,
};
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, FieldPath, Patch};

pub(crate) fn course_entry(course_id: &str) -> FieldPath {
    FieldPath::attr(Attr::Courses).key(course_id)
}

/// Adds the course to the teacher's course set. Attaching twice changes nothing.
#[tracing::instrument(skip(store))]
pub async fn attach_course_to_teacher(store: &EntityStore, teacher_id: &str, course_id: &str) -> RecordsResult<()> {
    require_id(teacher_id, "Teacher id")?;
    require_id(course_id, "Course id")?;

    let patch = Patch::new()
        .set_if_absent(course_entry(course_id), CourseAssignment::new(course_id))
        .map_err(patch_error)?;

    store.update::<Teacher>(teacher_id, &patch).await
}

/// Enrolls every student in `student_ids` into the course: the ids are added to the roster, then
/// an ungraded, currently-taking enrollment is added to each student that does not have one yet.
///
/// # Errors
///
/// `Validation` for an empty `student_ids`. `NotFound` if the course or any of the students is
/// missing, in which case nothing was written.
#[tracing::instrument(skip(store))]
pub async fn enroll_students(store: &EntityStore, student_ids: &[String], course_id: &str) -> RecordsResult<()> {
    require_id(course_id, "Course id")?;
    if student_ids.is_empty() {
        return Err(EndpointError::validation("At least one student id must be provided."));
    }
    for id in student_ids {
        require_id(id, "Student id")?;
    }
    let student_ids: BTreeSet<&str> = student_ids.iter().map(String::as_str).collect();

    store.get::<Course>(course_id).await?;
    for id in &student_ids {
        store.get::<Student>(id).await?;
    }

    let roster = Patch::new().add_to_set(FieldPath::attr(Attr::StudentIds), student_ids.iter().copied());
    store.update::<Course>(course_id, &roster).await?;

    let enrollment = Patch::new()
        .set_if_absent(course_entry(course_id), CourseEnrollment::new(course_id))
        .map_err(patch_error)?;
    for id in &student_ids {
        store.update::<Student>(id, &enrollment).await?;
    }

    tracing::info!(count = student_ids.len(), "Enrolled students.");
    Ok(())
}

/// Appends the assignment to the course, then gives every student currently on the roster an
/// empty submission entry. Students enrolled afterwards get no entry.
///
/// An assignment belongs to at most one course: the first attach records the owner on the
/// assignment, and attaching it anywhere else fails with `AlreadyExists`. Attaching it again to
/// its own course changes nothing. Enrollments that land between the append and the roster read
/// are not guarded against.
#[tracing::instrument(skip(store))]
pub async fn attach_assignment_to_course(store: &EntityStore, course_id: &str, assignment_id: &str) -> RecordsResult<()> {
    require_id(course_id, "Course id")?;
    require_id(assignment_id, "Assignment id")?;

    let course = store.get::<Course>(course_id).await?;
    let assignment = store.get::<Assignment>(assignment_id).await?;
    claim_assignment(store, assignment, course_id).await?;
    if course.assignment_ids.iter().any(|id| id == assignment_id) {
        tracing::debug!("Assignment already attached.");
        return Ok(());
    }

    let append = Patch::new()
        .push(FieldPath::attr(Attr::AssignmentIds), [assignment_id])
        .map_err(patch_error)?;
    store.update::<Course>(course_id, &append).await?;

    // Read the roster only after the append landed.
    let roster = store.get::<Course>(course_id).await?.student_ids;
    let mut placeholders = Patch::new();
    for student_id in &roster {
        placeholders = placeholders
            .set_if_absent(
                FieldPath::attr(Attr::Submissions).key(student_id.as_str()),
                Submission::default(),
            )
            .map_err(patch_error)?;
    }
    if !placeholders.is_empty() {
        store.update::<Assignment>(assignment_id, &placeholders).await?;
    }

    tracing::info!(placeholders = roster.len(), "Attached assignment.");
    Ok(())
}

/// Records `course_id` as the assignment's owner unless another course got there first.
async fn claim_assignment(store: &EntityStore, assignment: Assignment, course_id: &str) -> RecordsResult<()> {
    let owner = match assignment.course_id {
        Some(owner) => owner,
        None => {
            let claim = Patch::new()
                .set_if_absent(FieldPath::attr(Attr::CourseId), course_id)
                .map_err(patch_error)?;
            store.update::<Assignment>(&assignment.id, &claim).await?;
            // A concurrent attach may have claimed it between the read and the write.
            store.get::<Assignment>(&assignment.id).await?.course_id.unwrap_or_default()
        }
    };

    if owner != course_id {
        tracing::warn!(%owner, "Assignment is attached to another course.");
        return Err(EndpointError::operation(RecordsError::AlreadyExists(
            EntityKind::Assignment,
            assignment.id,
        )));
    }
    Ok(())
}

/// Removes the course from the teacher's course set. A missing teacher has nothing to unlink.
#[tracing::instrument(skip(store))]
pub async fn unlink_course_from_teacher(store: &EntityStore, teacher_id: &str, course_id: &str) -> RecordsResult<()> {
    let patch = Patch::new().remove(course_entry(course_id));

    ignore_missing(store.update::<Teacher>(teacher_id, &patch).await, "teacher")
}

/// Removes the course from each student's course set. Missing students are skipped.
#[tracing::instrument(skip(store, student_ids))]
pub async fn unlink_course_from_students<'a>(
    store: &EntityStore,
    student_ids: impl IntoIterator<Item = &'a String>,
    course_id: &str,
) -> RecordsResult<()> {
    let patch = Patch::new().remove(course_entry(course_id));

    for student_id in student_ids {
        ignore_missing(store.update::<Student>(student_id, &patch).await, "student")?;
    }

    Ok(())
}

/// Drops a single student from the course: roster first, then the enrollment. The student's
/// submission entries are kept.
#[tracing::instrument(skip(store))]
pub async fn unenroll_student(store: &EntityStore, student_id: &str, course_id: &str) -> RecordsResult<()> {
    require_id(student_id, "Student id")?;
    require_id(course_id, "Course id")?;

    store.get::<Student>(student_id).await?;

    let roster = Patch::new().remove_from_set(FieldPath::attr(Attr::StudentIds), [student_id]);
    store.update::<Course>(course_id, &roster).await?;

    let enrollment = Patch::new().remove(course_entry(course_id));
    store.update::<Student>(student_id, &enrollment).await
}

fn ignore_missing(result: RecordsResult<()>, what: &str) -> RecordsResult<()> {
    match result {
        Err(e) if e.code() == Code::NotFound => {
            tracing::warn!(error = %e, "Skipped unlinking a missing {}.", what);
            Ok(())
        }
        other => other,
    }
}

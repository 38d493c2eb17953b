//! Repairs the cross-document links after interrupted operations.
//!
//! A course's roster and its teacher id are taken as the truth; account course sets are made to
//! agree with them. An assignment id is kept only on the course the assignment names as its
//! owner. Every repair is a single idempotent field update, so the pass can run
//! alongside regular traffic and be repeated at will.

use std::collections::{BTreeSet, HashMap};

use crate::error::RecordsResult;
use crate::model::{Assignment, Course, CourseAssignment, CourseEnrollment, Student, Teacher};
use crate::operations::relationships::course_entry;
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, FieldPath, Patch};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub enrollments_added: usize,
    pub enrollments_removed: usize,
    pub teacher_links_added: usize,
    pub teacher_links_removed: usize,
    pub assignment_ids_dropped: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

#[tracing::instrument(skip(store))]
pub async fn reconcile(store: &EntityStore) -> RecordsResult<ReconcileReport> {
    let courses: HashMap<String, Course> = store
        .all::<Course>()
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();
    let students = store.all::<Student>().await?;
    let teachers = store.all::<Teacher>().await?;
    let assignment_owners: HashMap<String, Option<String>> = store
        .all::<Assignment>()
        .await?
        .into_iter()
        .map(|a| (a.id, a.course_id))
        .collect();

    let mut report = ReconcileReport::default();
    let student_ids: BTreeSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let teacher_ids: BTreeSet<&str> = teachers.iter().map(|t| t.id.as_str()).collect();

    for course in courses.values() {
        let enrollment = Patch::new()
            .set_if_absent(course_entry(&course.id), CourseEnrollment::new(&course.id))
            .map_err(patch_error)?;
        for student_id in &course.student_ids {
            if !student_ids.contains(student_id.as_str()) {
                tracing::warn!(course_id = %course.id, %student_id, "Roster lists a missing student.");
                continue;
            }
            if !enrolled(&students, student_id, &course.id) {
                store.update::<Student>(student_id, &enrollment).await?;
                report.enrollments_added += 1;
            }
        }

        if teacher_ids.contains(course.teacher_id.as_str()) {
            if !teaching(&teachers, &course.teacher_id, &course.id) {
                let link = Patch::new()
                    .set_if_absent(course_entry(&course.id), CourseAssignment::new(&course.id))
                    .map_err(patch_error)?;
                store.update::<Teacher>(&course.teacher_id, &link).await?;
                report.teacher_links_added += 1;
            }
        } else {
            tracing::warn!(course_id = %course.id, teacher_id = %course.teacher_id, "Course owned by a missing teacher.");
        }

        let kept: Vec<&String> = course
            .assignment_ids
            .iter()
            .filter(|id| match assignment_owners.get(*id) {
                Some(Some(owner)) => *owner == course.id,
                Some(None) => true,
                None => false,
            })
            .collect();
        if kept.len() != course.assignment_ids.len() {
            let patch = Patch::new()
                .set(FieldPath::attr(Attr::AssignmentIds), &kept)
                .map_err(patch_error)?;
            store.update::<Course>(&course.id, &patch).await?;
            report.assignment_ids_dropped += course.assignment_ids.len() - kept.len();
        }
    }

    for student in &students {
        for course_id in student.courses.keys() {
            let on_roster = courses
                .get(course_id)
                .map_or(false, |c| c.student_ids.contains(&student.id));
            if !on_roster {
                store
                    .update::<Student>(&student.id, &Patch::new().remove(course_entry(course_id)))
                    .await?;
                report.enrollments_removed += 1;
            }
        }
    }

    for teacher in &teachers {
        for course_id in teacher.courses.keys() {
            let owns = courses.get(course_id).map_or(false, |c| c.teacher_id == teacher.id);
            if !owns {
                store
                    .update::<Teacher>(&teacher.id, &Patch::new().remove(course_entry(course_id)))
                    .await?;
                report.teacher_links_removed += 1;
            }
        }
    }

    tracing::info!(?report, "Reconciled records.");
    Ok(report)
}

fn enrolled(students: &[Student], student_id: &str, course_id: &str) -> bool {
    students
        .iter()
        .find(|s| s.id == student_id)
        .map_or(false, |s| s.courses.contains_key(course_id))
}

fn teaching(teachers: &[Teacher], teacher_id: &str, course_id: &str) -> bool {
    teachers
        .iter()
        .find(|t| t.id == teacher_id)
        .map_or(false, |t| t.courses.contains_key(course_id))
}

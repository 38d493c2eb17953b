pub mod account;
pub mod assignment;
pub mod course;
pub mod grade;

use std::fmt::{Display, Formatter};

pub use account::{Account, CourseAssignment, CourseEnrollment, Role, Student, Teacher};
pub use assignment::{ArtifactRef, Assignment, Submission};
pub use course::{Announcement, Course};
pub use grade::CourseGrade;

/// What a `NotFound`/`AlreadyExists` error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Student,
    Teacher,
    /// A student or a teacher, when the caller does not know which.
    Account,
    Course,
    Assignment,
    /// A student's entry in an assignment's submissions.
    Submission,
    /// A student's entry in their course set.
    Enrollment,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum Collection {
    Students,
    Teachers,
    Courses,
    Assignments,
}

/// Attribute names as they appear in stored documents. Must match the serde names of the model
/// types, which are all `PascalCase`.
// FIXME Derive this from the model structs instead of keeping it in sync by hand.
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum Attr {
    Id,
    Username,
    FailedLoginAttempts,
    LockAccountUntil,
    Courses,
    Grade,
    Name,
    StudentIds,
    AssignmentIds,
    Announcements,
    Prompt,
    DueDate,
    CourseId,
    Submissions,
    SubmissionDate,
    Artifact,
    TeacherResponse,
}

impl Collection {
    /// Whether documents of this collection carry a `Username` that can be looked up.
    pub fn has_usernames(&self) -> bool {
        matches!(self, Collection::Students | Collection::Teachers)
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for Attr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

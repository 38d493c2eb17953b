use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use validator::Validate;

use super::{CourseGrade, EntityKind};
use crate::store::{Collection, Entity};

#[derive(Serialize, Deserialize, PartialEq, Clone, Copy, Debug, Eq, Hash)]
pub enum Role {
    Student,
    Teacher,
}

/// A student account. `id` is chosen by the caller (e.g. a university id), never generated.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, TypedBuilder, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Student {
    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Student id must be provided."))]
    pub id: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "First name must be provided."))]
    pub first_name: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Last name must be provided."))]
    pub last_name: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Username must be provided."))]
    pub username: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Hashed password must be provided."))]
    pub hashed_password: String,

    #[serde(default)]
    #[builder(default)]
    pub failed_login_attempts: u32,

    #[builder(default = Utc::now())]
    pub lock_account_until: DateTime<Utc>,

    /// Keyed by course id.
    #[serde(default)]
    #[builder(default)]
    pub courses: BTreeMap<String, CourseEnrollment>,
}

/// A teacher account, same identity and credential shape as [`Student`].
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, TypedBuilder, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Teacher {
    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Teacher id must be provided."))]
    pub id: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "First name must be provided."))]
    pub first_name: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Last name must be provided."))]
    pub last_name: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Username must be provided."))]
    pub username: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Hashed password must be provided."))]
    pub hashed_password: String,

    #[serde(default)]
    #[builder(default)]
    pub failed_login_attempts: u32,

    #[builder(default = Utc::now())]
    pub lock_account_until: DateTime<Utc>,

    /// Keyed by course id.
    #[serde(default)]
    #[builder(default)]
    pub courses: BTreeMap<String, CourseAssignment>,
}

/// A student or a teacher, tagged with which one it is.
#[derive(PartialEq, Clone, Debug)]
pub enum Account {
    Student(Student),
    Teacher(Teacher),
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CourseEnrollment {
    pub course_id: String,
    pub grade: CourseGrade,
    pub is_currently_taking: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CourseAssignment {
    pub course_id: String,
    pub is_currently_teaching: bool,
}

impl CourseEnrollment {
    pub fn new(course_id: impl Into<String>) -> Self {
        CourseEnrollment {
            course_id: course_id.into(),
            grade: CourseGrade::Ungraded,
            is_currently_taking: true,
        }
    }
}

impl CourseAssignment {
    pub fn new(course_id: impl Into<String>) -> Self {
        CourseAssignment {
            course_id: course_id.into(),
            is_currently_teaching: true,
        }
    }
}

impl Role {
    pub fn collection(&self) -> Collection {
        match self {
            Role::Student => Collection::Students,
            Role::Teacher => Collection::Teachers,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Role::Student => EntityKind::Student,
            Role::Teacher => EntityKind::Teacher,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Account {
    pub fn role(&self) -> Role {
        match self {
            Account::Student(_) => Role::Student,
            Account::Teacher(_) => Role::Teacher,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Account::Student(s) => &s.id,
            Account::Teacher(t) => &t.id,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Account::Student(s) => &s.username,
            Account::Teacher(t) => &t.username,
        }
    }

    pub fn hashed_password(&self) -> &str {
        match self {
            Account::Student(s) => &s.hashed_password,
            Account::Teacher(t) => &t.hashed_password,
        }
    }

    pub(crate) fn hashed_password_mut(&mut self) -> &mut String {
        match self {
            Account::Student(s) => &mut s.hashed_password,
            Account::Teacher(t) => &mut t.hashed_password,
        }
    }

    pub fn failed_login_attempts(&self) -> u32 {
        match self {
            Account::Student(s) => s.failed_login_attempts,
            Account::Teacher(t) => t.failed_login_attempts,
        }
    }

    pub fn lock_account_until(&self) -> DateTime<Utc> {
        match self {
            Account::Student(s) => s.lock_account_until,
            Account::Teacher(t) => t.lock_account_until,
        }
    }
}

impl Entity for Student {
    const COLLECTION: Collection = Collection::Students;
    const KIND: EntityKind = EntityKind::Student;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Teacher {
    const COLLECTION: Collection = Collection::Teachers;
    const KIND: EntityKind = EntityKind::Teacher;

    fn id(&self) -> &str {
        &self.id
    }
}

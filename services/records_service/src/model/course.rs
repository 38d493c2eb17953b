use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;
use validator::Validate;

use super::EntityKind;
use crate::store::{Collection, Entity};

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, TypedBuilder, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Course {
    #[builder(default = Uuid::new_v4().to_string(), setter(into))]
    #[validate(length(min = 1))]
    pub id: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Course name must be provided."))]
    pub name: String,

    /// Owning teacher. Not enforced by the datastore.
    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Teacher id must be provided."))]
    pub teacher_id: String,

    /// The authoritative roster. Only ever written through set additions/removals, never as a
    /// whole, so an empty roster is left out of the stored document.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    #[builder(default)]
    pub student_ids: BTreeSet<String>,

    /// In attachment order.
    #[serde(default)]
    #[builder(default)]
    pub assignment_ids: Vec<String>,

    #[serde(default)]
    #[builder(default)]
    pub announcements: Vec<Announcement>,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Announcement {
    pub name: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Entity for Course {
    const COLLECTION: Collection = Collection::Courses;
    const KIND: EntityKind = EntityKind::Course;

    fn id(&self) -> &str {
        &self.id
    }
}

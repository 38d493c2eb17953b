use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;
use validator::Validate;

use super::EntityKind;
use crate::store::{Collection, Entity};

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, TypedBuilder, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct Assignment {
    #[builder(default = Uuid::new_v4().to_string(), setter(into))]
    #[validate(length(min = 1))]
    pub id: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Assignment name must be provided."))]
    pub name: String,

    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Prompt must be provided."))]
    pub prompt: String,

    pub due_date: DateTime<Utc>,

    /// The course this assignment is attached to. Set once, on the first attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub course_id: Option<String>,

    /// Keyed by student id. Populated once, when the assignment is attached to its course.
    #[serde(default)]
    #[builder(default)]
    pub submissions: BTreeMap<String, Submission>,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_response: Option<String>,
}

/// Reference to a submitted file held by the artifact store. Opaque to this service.
#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        ArtifactRef(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Assignment {
    /// Every artifact referenced by this assignment's submissions.
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.submissions.values().filter_map(|s| s.artifact.as_ref())
    }
}

impl Entity for Assignment {
    const COLLECTION: Collection = Collection::Assignments;
    const KIND: EntityKind = EntityKind::Assignment;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn placeholder_submission_is_an_empty_map() {
        assert_eq!(json!({}), serde_json::to_value(Submission::default()).unwrap());
    }

    #[test]
    fn artifacts_skips_submissions_without_files() {
        let mut submissions = BTreeMap::new();
        submissions.insert("s1".to_string(), Submission::default());
        submissions.insert(
            "s2".to_string(),
            Submission {
                artifact: Some(ArtifactRef::new("s2-essay.pdf")),
                ..Default::default()
            },
        );
        let assignment = Assignment::builder()
            .name("Essay")
            .prompt("Write.")
            .due_date(Utc::now())
            .submissions(submissions)
            .build();

        let artifacts: Vec<_> = assignment.artifacts().collect();

        assert_eq!(vec![&ArtifactRef::new("s2-essay.pdf")], artifacts);
    }
}

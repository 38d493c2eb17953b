use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::artifacts::{ArtifactCleanupError, ArtifactStore};
use crate::clock::Clock;
use crate::credentials::{CredentialError, SecretVerifier};
use crate::model::{ArtifactRef, Course, Student, Teacher};
use crate::store::EntityStore;

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new() -> Self {
        FixedClock(Mutex::new(Utc.with_ymd_and_hms(2026, 9, 1, 9, 0, 0).unwrap()))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Remembers every deleted reference and fails the ones it was told to.
#[derive(Default)]
pub struct RecordingArtifactStore {
    deleted: Mutex<Vec<ArtifactRef>>,
    failing: BTreeSet<ArtifactRef>,
}

impl RecordingArtifactStore {
    pub fn failing(refs: impl IntoIterator<Item = &'static str>) -> Self {
        RecordingArtifactStore {
            deleted: Mutex::default(),
            failing: refs.into_iter().map(ArtifactRef::new).collect(),
        }
    }

    pub fn deleted(&self) -> Vec<ArtifactRef> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for RecordingArtifactStore {
    async fn delete_artifacts(&self, refs: &[ArtifactRef]) -> Result<(), ArtifactCleanupError> {
        let (failed, ok): (Vec<_>, Vec<_>) = refs.iter().cloned().partition(|r| self.failing.contains(r));
        self.deleted.lock().unwrap().extend(ok);

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ArtifactCleanupError { failed })
        }
    }
}

/// Treats the stored hash as the plaintext itself.
pub struct PlainTextVerifier;

impl SecretVerifier for PlainTextVerifier {
    fn compare_secret(&self, plaintext: &str, hash: &str) -> Result<bool, CredentialError> {
        Ok(plaintext == hash)
    }
}

pub fn student(id: &str) -> Student {
    Student::builder()
        .id(id)
        .first_name("Student")
        .last_name(id)
        .username(format!("{}-user", id))
        .hashed_password(format!("{}-pass", id))
        .lock_account_until(FixedClock::new().now())
        .build()
}

pub fn teacher(id: &str) -> Teacher {
    Teacher::builder()
        .id(id)
        .first_name("Teacher")
        .last_name(id)
        .username(format!("{}-user", id))
        .hashed_password(format!("{}-pass", id))
        .lock_account_until(FixedClock::new().now())
        .build()
}

pub async fn seed_students(store: &EntityStore, ids: &[&str]) {
    for id in ids {
        store.create(&student(id)).await.unwrap();
    }
}

pub async fn seed_teacher(store: &EntityStore, id: &str) {
    store.create(&teacher(id)).await.unwrap();
}

/// A course owned by `teacher_id` with nothing linked to it yet.
pub async fn seed_course(store: &EntityStore, id: &str, teacher_id: &str) -> Course {
    let course = Course::builder().id(id).name(format!("Course {}", id)).teacher_id(teacher_id).build();
    store.create(&course).await.unwrap();
    course
}

pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

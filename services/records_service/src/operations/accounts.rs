use service_core::endpoint_error::EndpointError;
use typed_builder::TypedBuilder;
use validator::Validate;
use zeroize::Zeroize;

use crate::clock::Clock;
use crate::credentials::SecretVerifier;
use crate::error::{require_id, RecordsError, RecordsResult};
use crate::model::{Account, EntityKind, Student, Teacher};
use crate::operations::lockout::{is_locked, record_failed_login, reset_attempts};
use crate::store::entity_store::describe;
use crate::store::EntityStore;

/// Signup details shared by students and teachers. `hashed_password` is already hashed.
#[derive(Clone, Debug, TypedBuilder, Validate)]
pub struct NewAccount {
    #[builder(setter(into))]
    #[validate(length(min = 1, message = "Account id must be provided."))]
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
}

#[tracing::instrument(skip(store, clock, input), fields(id = %input.id, username = %input.username))]
pub async fn register_student(store: &EntityStore, clock: &dyn Clock, input: NewAccount) -> RecordsResult<Student> {
    ensure_unclaimed(store, &input).await?;

    let student = Student::builder()
        .id(input.id)
        .first_name(input.first_name)
        .last_name(input.last_name)
        .username(input.username)
        .hashed_password(input.hashed_password)
        .lock_account_until(clock.now())
        .build();
    store.create(&student).await?;

    tracing::info!("Registered student.");
    Ok(student)
}

#[tracing::instrument(skip(store, clock, input), fields(id = %input.id, username = %input.username))]
pub async fn register_teacher(store: &EntityStore, clock: &dyn Clock, input: NewAccount) -> RecordsResult<Teacher> {
    ensure_unclaimed(store, &input).await?;

    let teacher = Teacher::builder()
        .id(input.id)
        .first_name(input.first_name)
        .last_name(input.last_name)
        .username(input.username)
        .hashed_password(input.hashed_password)
        .lock_account_until(clock.now())
        .build();
    store.create(&teacher).await?;

    tracing::info!("Registered teacher.");
    Ok(teacher)
}

/// Ids and usernames are unique across students and teachers together. Checked before the
/// insert, so two concurrent signups can still both succeed.
async fn ensure_unclaimed(store: &EntityStore, input: &NewAccount) -> RecordsResult<()> {
    input
        .validate()
        .map_err(|e| EndpointError::validation(describe(&e)))?;

    if find_credential_by_id(store, &input.id).await?.is_some() {
        return Err(EndpointError::operation(RecordsError::AlreadyExists(
            EntityKind::Account,
            input.id.clone(),
        )));
    }
    if find_credential_by_username(store, &input.username).await?.is_some() {
        return Err(EndpointError::operation(RecordsError::AlreadyExists(
            EntityKind::Account,
            input.username.clone(),
        )));
    }

    Ok(())
}

/// The account with this username, students first.
#[tracing::instrument(skip(store))]
pub async fn find_credential_by_username(store: &EntityStore, username: &str) -> RecordsResult<Option<Account>> {
    require_id(username, "Username")?;

    if let Some(student) = store.find_by_username::<Student>(username).await? {
        return Ok(Some(Account::Student(student)));
    }
    Ok(store.find_by_username::<Teacher>(username).await?.map(Account::Teacher))
}

/// The account with this id, students first.
#[tracing::instrument(skip(store))]
pub async fn find_credential_by_id(store: &EntityStore, id: &str) -> RecordsResult<Option<Account>> {
    require_id(id, "Account id")?;

    if let Some(student) = store.try_get::<Student>(id).await? {
        return Ok(Some(Account::Student(student)));
    }
    Ok(store.try_get::<Teacher>(id).await?.map(Account::Teacher))
}

/// Checks a login attempt. A locked account is refused before the secret is even compared. The
/// plaintext is wiped once compared, and the returned account carries no password hash.
///
/// # Errors
///
/// `NotFound` for an unknown username, `AccountLocked` while the lock window runs,
/// `InvalidCredentials` for a wrong secret (which also counts as a failed login).
#[tracing::instrument(skip(store, clock, verifier, plaintext))]
pub async fn authenticate(
    store: &EntityStore,
    clock: &dyn Clock,
    verifier: &dyn SecretVerifier,
    username: &str,
    plaintext: &mut String,
) -> RecordsResult<Account> {
    let mut account = find_credential_by_username(store, username)
        .await?
        .ok_or_else(|| EndpointError::operation(RecordsError::NotFound(EntityKind::Account, username.to_owned())))?;

    let status = is_locked(store, clock, username).await?;
    if status.locked {
        plaintext.zeroize();
        tracing::info!("Refused login to locked account.");
        return Err(EndpointError::operation(RecordsError::AccountLocked(
            account.lock_account_until(),
        )));
    }

    let matches = verifier.compare_secret(plaintext, account.hashed_password());
    plaintext.zeroize();
    account.hashed_password_mut().zeroize();

    let matches = matches.map_err(|e| {
        tracing::error!(error = ?e, "Password verification failed.");
        EndpointError::internal()
    })?;
    if !matches {
        record_failed_login(store, clock, username).await?;
        return Err(EndpointError::operation(RecordsError::InvalidCredentials));
    }

    if account.failed_login_attempts() > 0 {
        reset_attempts(store, account.id(), account.role()).await?;
    }
    tracing::info!(role = %account.role(), "Authenticated.");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use service_core::operation_error::{Code, OperationError};

    use super::*;
    use crate::credentials::{hash_password, Argon2Verifier};
    use crate::model::Role;
    use crate::test_support::{seed_students, seed_teacher, FixedClock, PlainTextVerifier};

    fn new_account(id: &str, username: &str) -> NewAccount {
        NewAccount::builder()
            .id(id)
            .first_name("Grace")
            .last_name("Hopper")
            .username(username)
            .hashed_password("secret")
            .build()
    }

    #[tokio::test]
    async fn registration_starts_unlocked_without_courses() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();

        let teacher = register_teacher(&store, &clock, new_account("t1", "grace")).await.unwrap();

        assert_eq!(0, teacher.failed_login_attempts);
        assert_eq!(clock.now(), teacher.lock_account_until);
        assert!(teacher.courses.is_empty());
        let account = find_credential_by_id(&store, "t1").await.unwrap().unwrap();
        assert_eq!(Role::Teacher, account.role());
    }

    #[tokio::test]
    async fn usernames_are_unique_across_roles() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        register_teacher(&store, &clock, new_account("t1", "grace")).await.unwrap();

        let err = register_student(&store, &clock, new_account("s1", "grace")).await.unwrap_err();

        assert_eq!(Code::AlreadyExists, err.code());
        assert!(find_credential_by_id(&store, "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ids_are_unique_across_roles() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        register_student(&store, &clock, new_account("10442", "ada")).await.unwrap();

        let err = register_teacher(&store, &clock, new_account("10442", "grace")).await.unwrap_err();

        assert!(matches!(
            err.as_operation(),
            Some(RecordsError::AlreadyExists(EntityKind::Account, id)) if id == "10442"
        ));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();

        let err = register_student(&store, &clock, new_account("s1", "")).await.unwrap_err();

        assert_eq!(Code::InvalidArgument, err.code());
    }

    #[tokio::test]
    async fn lookups_tag_the_role() {
        let store = EntityStore::in_memory();
        seed_students(&store, &["s1"]).await;
        seed_teacher(&store, "t1").await;

        let student = find_credential_by_username(&store, "s1-user").await.unwrap().unwrap();
        let teacher = find_credential_by_id(&store, "t1").await.unwrap().unwrap();

        assert_eq!(Role::Student, student.role());
        assert_eq!(Role::Teacher, teacher.role());
        assert_eq!("t1-user", teacher.username());
        assert!(find_credential_by_id(&store, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_secret_counts_as_failure() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        seed_students(&store, &["s1"]).await;

        let err = authenticate(&store, &clock, &PlainTextVerifier, "s1-user", &mut "wrong".to_string())
            .await
            .unwrap_err();

        assert_eq!(Code::Unauthenticated, err.code());
        let student: Student = store.get("s1").await.unwrap();
        assert_eq!(1, student.failed_login_attempts);
    }

    #[tokio::test]
    async fn locked_account_refuses_correct_secret() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        seed_students(&store, &["s1"]).await;
        authenticate(&store, &clock, &PlainTextVerifier, "s1-user", &mut "wrong".to_string())
            .await
            .unwrap_err();

        let err = authenticate(&store, &clock, &PlainTextVerifier, "s1-user", &mut "s1-pass".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err.as_operation(), Some(RecordsError::AccountLocked(_))));
    }

    #[tokio::test]
    async fn success_after_lock_expires_resets_count() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        seed_students(&store, &["s1"]).await;
        authenticate(&store, &clock, &PlainTextVerifier, "s1-user", &mut "wrong".to_string())
            .await
            .unwrap_err();
        clock.advance(Duration::milliseconds(3));

        let mut plaintext = "s1-pass".to_string();
        let account = authenticate(&store, &clock, &PlainTextVerifier, "s1-user", &mut plaintext)
            .await
            .unwrap();

        assert_eq!("s1", account.id());
        assert!(account.hashed_password().is_empty());
        assert!(plaintext.is_empty());
        let student: Student = store.get("s1").await.unwrap();
        assert_eq!(0, student.failed_login_attempts);
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();

        let err = authenticate(&store, &clock, &PlainTextVerifier, "nobody", &mut "x".to_string())
            .await
            .unwrap_err();

        assert_eq!(Code::NotFound, err.code());
    }

    #[tokio::test]
    async fn argon2_hashes_authenticate() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        let input = NewAccount::builder()
            .id("t1")
            .first_name("Grace")
            .last_name("Hopper")
            .username("grace")
            .hashed_password(hash_password("cobol").unwrap())
            .build();
        register_teacher(&store, &clock, input).await.unwrap();

        let account = authenticate(&store, &clock, &Argon2Verifier, "grace", &mut "cobol".to_string())
            .await
            .unwrap();

        assert_eq!(Role::Teacher, account.role());
    }
}

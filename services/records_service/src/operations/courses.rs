use chrono::{DateTime, Utc};
use service_core::endpoint_error::EndpointError;

use crate::clock::Clock;
use crate::error::{require_id, RecordsResult};
use crate::model::{Announcement, Assignment, Course, CourseGrade, Student, Teacher};
use crate::operations::relationships::{attach_assignment_to_course, attach_course_to_teacher, enroll_students};
use crate::store::entity_store::patch_error;
use crate::store::{Attr, EntityStore, FieldPath, Patch};

/// A course as listed for one of its students.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentCourse {
    pub course_id: String,
    pub name: String,
    pub grade: CourseGrade,
    pub is_currently_taking: bool,
}

/// A course as listed for its teacher.
#[derive(Clone, Debug, PartialEq)]
pub struct TeacherCourse {
    pub course_id: String,
    pub name: String,
    pub is_currently_teaching: bool,
}

/// Fields of an assignment that can be changed after creation. `None` leaves a field as it is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssignmentInfo {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Creates a course owned by `teacher_id`, links it to the teacher and enrolls `student_ids`.
///
/// The course exists from the first write on; if a later step fails it is left partly linked.
#[tracing::instrument(skip(store))]
pub async fn create_course(store: &EntityStore, teacher_id: &str, name: &str, student_ids: &[String]) -> RecordsResult<Course> {
    require_id(teacher_id, "Teacher id")?;
    store.get::<Teacher>(teacher_id).await?;

    let course = Course::builder().name(name).teacher_id(teacher_id).build();
    store.create(&course).await?;
    tracing::info!(course_id = %course.id, "Created course.");

    attach_course_to_teacher(store, teacher_id, &course.id).await?;
    if !student_ids.is_empty() {
        enroll_students(store, student_ids, &course.id).await?;
    }

    store.get(&course.id).await
}

#[tracing::instrument(skip(store))]
pub async fn create_assignment(store: &EntityStore, name: &str, prompt: &str, due_date: DateTime<Utc>) -> RecordsResult<Assignment> {
    let assignment = Assignment::builder().name(name).prompt(prompt).due_date(due_date).build();
    store.create(&assignment).await?;

    tracing::info!(assignment_id = %assignment.id, "Created assignment.");
    Ok(assignment)
}

/// Creates an assignment and attaches it to the course, which must already exist.
#[tracing::instrument(skip(store))]
pub async fn create_assignment_for_course(
    store: &EntityStore,
    course_id: &str,
    name: &str,
    prompt: &str,
    due_date: DateTime<Utc>,
) -> RecordsResult<Assignment> {
    require_id(course_id, "Course id")?;
    store.get::<Course>(course_id).await?;

    let assignment = create_assignment(store, name, prompt, due_date).await?;
    attach_assignment_to_course(store, course_id, &assignment.id).await?;

    store.get(&assignment.id).await
}

#[tracing::instrument(skip(store))]
pub async fn update_assignment_info(store: &EntityStore, assignment_id: &str, info: AssignmentInfo) -> RecordsResult<()> {
    require_id(assignment_id, "Assignment id")?;
    if info == AssignmentInfo::default() {
        return Err(EndpointError::validation("At least one assignment field must be provided."));
    }

    let mut patch = Patch::new();
    if let Some(name) = info.name {
        require_id(&name, "Assignment name")?;
        patch = patch.set(FieldPath::attr(Attr::Name), name).map_err(patch_error)?;
    }
    if let Some(prompt) = info.prompt {
        require_id(&prompt, "Prompt")?;
        patch = patch.set(FieldPath::attr(Attr::Prompt), prompt).map_err(patch_error)?;
    }
    if let Some(due_date) = info.due_date {
        patch = patch.set(FieldPath::attr(Attr::DueDate), due_date).map_err(patch_error)?;
    }

    store.update::<Assignment>(assignment_id, &patch).await
}

/// Appends an announcement stamped with the current time.
#[tracing::instrument(skip(store, clock))]
pub async fn post_announcement(
    store: &EntityStore,
    clock: &dyn Clock,
    course_id: &str,
    name: &str,
    description: &str,
) -> RecordsResult<Announcement> {
    require_id(name, "Announcement name")?;

    let announcement = Announcement {
        name: name.to_owned(),
        description: description.to_owned(),
        timestamp: clock.now(),
    };
    let patch = Patch::new()
        .push(FieldPath::attr(Attr::Announcements), [&announcement])
        .map_err(patch_error)?;
    store.update::<Course>(course_id, &patch).await?;

    Ok(announcement)
}

/// The course's assignments in attachment order.
#[tracing::instrument(skip(store))]
pub async fn assignments_for_course(store: &EntityStore, course_id: &str) -> RecordsResult<Vec<Assignment>> {
    let course = store.get::<Course>(course_id).await?;

    let mut assignments = Vec::with_capacity(course.assignment_ids.len());
    for assignment_id in &course.assignment_ids {
        match store.try_get::<Assignment>(assignment_id).await? {
            Some(assignment) => assignments.push(assignment),
            None => tracing::warn!(%assignment_id, "Skipping dangling assignment reference."),
        }
    }

    Ok(assignments)
}

#[tracing::instrument(skip(store))]
pub async fn courses_for_student(store: &EntityStore, student_id: &str) -> RecordsResult<Vec<StudentCourse>> {
    let student = store.get::<Student>(student_id).await?;

    let mut courses = Vec::with_capacity(student.courses.len());
    for (course_id, enrollment) in student.courses {
        match store.try_get::<Course>(&course_id).await? {
            Some(course) => courses.push(StudentCourse {
                course_id,
                name: course.name,
                grade: enrollment.grade,
                is_currently_taking: enrollment.is_currently_taking,
            }),
            None => tracing::warn!(%course_id, "Skipping dangling course reference."),
        }
    }

    Ok(courses)
}

#[tracing::instrument(skip(store))]
pub async fn courses_for_teacher(store: &EntityStore, teacher_id: &str) -> RecordsResult<Vec<TeacherCourse>> {
    let teacher = store.get::<Teacher>(teacher_id).await?;

    let mut courses = Vec::with_capacity(teacher.courses.len());
    for (course_id, link) in teacher.courses {
        match store.try_get::<Course>(&course_id).await? {
            Some(course) => courses.push(TeacherCourse {
                course_id,
                name: course.name,
                is_currently_teaching: link.is_currently_teaching,
            }),
            None => tracing::warn!(%course_id, "Skipping dangling course reference."),
        }
    }

    Ok(courses)
}

/// Fetches every student in `ids`, in order.
pub async fn students(store: &EntityStore, ids: &[String]) -> RecordsResult<Vec<Student>> {
    let mut students = Vec::with_capacity(ids.len());
    for id in ids {
        students.push(store.get(id).await?);
    }
    Ok(students)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use service_core::operation_error::{Code, OperationError};

    use super::*;
    use crate::error::RecordsError;
    use crate::model::EntityKind;
    use crate::test_support::{ids, seed_students, seed_teacher, FixedClock};

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 12, 1, 23, 59, 0).unwrap()
    }

    #[tokio::test]
    async fn create_course_links_teacher_and_students() {
        let store = EntityStore::in_memory();
        seed_teacher(&store, "t1").await;
        seed_students(&store, &["s1", "s2"]).await;

        let course = create_course(&store, "t1", "Compilers", &ids(&["s1", "s2"])).await.unwrap();

        assert_eq!(2, course.student_ids.len());
        let teacher_courses = courses_for_teacher(&store, "t1").await.unwrap();
        assert_eq!(
            vec![TeacherCourse {
                course_id: course.id.clone(),
                name: "Compilers".to_string(),
                is_currently_teaching: true,
            }],
            teacher_courses
        );
        let student_courses = courses_for_student(&store, "s2").await.unwrap();
        assert_eq!(CourseGrade::Ungraded, student_courses[0].grade);
    }

    #[tokio::test]
    async fn create_course_without_students() {
        let store = EntityStore::in_memory();
        seed_teacher(&store, "t1").await;

        let course = create_course(&store, "t1", "Compilers", &[]).await.unwrap();

        assert!(course.student_ids.is_empty());
        assert_eq!("t1", course.teacher_id);
    }

    #[tokio::test]
    async fn create_course_needs_a_teacher() {
        let store = EntityStore::in_memory();

        let err = create_course(&store, "ghost", "Compilers", &[]).await.unwrap_err();

        assert!(matches!(
            err.as_operation(),
            Some(RecordsError::NotFound(EntityKind::Teacher, _))
        ));
        assert!(store.all::<Course>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn assignments_listed_in_attachment_order() {
        let store = EntityStore::in_memory();
        seed_teacher(&store, "t1").await;
        let course = create_course(&store, "t1", "Compilers", &[]).await.unwrap();

        let first = create_assignment_for_course(&store, &course.id, "Lexer", "Tokenize.", due()).await.unwrap();
        let second = create_assignment_for_course(&store, &course.id, "Parser", "Parse.", due()).await.unwrap();

        let names: Vec<_> = assignments_for_course(&store, &course.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(vec![first.id, second.id], names);
    }

    #[tokio::test]
    async fn dangling_assignment_ids_are_skipped() {
        let store = EntityStore::in_memory();
        seed_teacher(&store, "t1").await;
        let course = create_course(&store, "t1", "Compilers", &[]).await.unwrap();
        let assignment = create_assignment_for_course(&store, &course.id, "Lexer", "Tokenize.", due())
            .await
            .unwrap();
        store.delete::<Assignment>(&assignment.id).await.unwrap();

        assert!(assignments_for_course(&store, &course.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_assignment_info_sets_given_fields() {
        let store = EntityStore::in_memory();
        let assignment = create_assignment(&store, "Lexer", "Tokenize.", due()).await.unwrap();
        let later = due() + Duration::days(7);

        update_assignment_info(
            &store,
            &assignment.id,
            AssignmentInfo {
                prompt: Some("Tokenize everything.".to_string()),
                due_date: Some(later),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let stored: Assignment = store.get(&assignment.id).await.unwrap();
        assert_eq!("Lexer", stored.name);
        assert_eq!("Tokenize everything.", stored.prompt);
        assert_eq!(later, stored.due_date);
    }

    #[tokio::test]
    async fn update_assignment_info_needs_a_field() {
        let store = EntityStore::in_memory();
        let assignment = create_assignment(&store, "Lexer", "Tokenize.", due()).await.unwrap();

        let err = update_assignment_info(&store, &assignment.id, AssignmentInfo::default())
            .await
            .unwrap_err();

        assert_eq!(Code::InvalidArgument, err.code());
    }

    #[tokio::test]
    async fn announcements_are_appended() {
        let store = EntityStore::in_memory();
        let clock = FixedClock::new();
        seed_teacher(&store, "t1").await;
        let course = create_course(&store, "t1", "Compilers", &[]).await.unwrap();

        post_announcement(&store, &clock, &course.id, "Welcome", "Hi.").await.unwrap();
        clock.advance(Duration::hours(1));
        post_announcement(&store, &clock, &course.id, "Exam", "Friday.").await.unwrap();

        let stored: Course = store.get(&course.id).await.unwrap();
        let names: Vec<_> = stored.announcements.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(vec!["Welcome", "Exam"], names);
        assert_eq!(clock.now(), stored.announcements[1].timestamp);
    }

    #[tokio::test]
    async fn students_fails_on_first_missing() {
        let store = EntityStore::in_memory();
        seed_students(&store, &["s1"]).await;

        assert_eq!(1, students(&store, &ids(&["s1"])).await.unwrap().len());
        let err = students(&store, &ids(&["s1", "ghost"])).await.unwrap_err();
        assert_eq!(Code::NotFound, err.code());
    }
}

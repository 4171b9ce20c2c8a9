//! Integration tests for datadeck-core
//!
//! End-to-end flows across the session lifecycle, conflict resolution, and
//! roster generation, run against a real in-memory database.

use datadeck_core::domain::identity::{
    District, IdentityRepository, NewUser, Principal, Role, School, User,
};
use datadeck_core::domain::module::{Module, ModuleRepository};
use datadeck_core::domain::session::{
    NewSession, SessionManager, SessionStatusFilter,
};
use datadeck_core::domain::student::{pin, CharacterTheme, StudentGenerator};
use datadeck_core::error::Error;
use datadeck_core::storage::{Database, DatabaseConfig};
use std::collections::HashSet;
use uuid::Uuid;

struct Fixture {
    db: Database,
    manager: SessionManager,
    identity: IdentityRepository,
    teacher: User,
    module: Module,
    school_id: Uuid,
    district_id: Uuid,
}

async fn fixture() -> Fixture {
    let db = Database::in_memory()
        .await
        .expect("Failed to create test database");
    let pool = db.pool().clone();

    let identity = IdentityRepository::new(pool.clone());
    let district = District::new("Lakeview USD");
    identity.create_district(&district).await.unwrap();
    let school = School::new(district.id, "Lakeview Elementary");
    identity.create_school(&school).await.unwrap();

    let teacher = identity
        .create_user(NewUser {
            username: "msrivera".into(),
            email: "rivera@example.org".into(),
            password_hash: "hash".into(),
            first_name: Some("Maria".into()),
            last_name: Some("Rivera".into()),
            role: Role::Teacher,
            school_id: Some(school.id),
            district_id: Some(district.id),
        })
        .await
        .unwrap();

    let module = Module::new("Weather Data", Some("Graphing daily weather".into()), 1);
    ModuleRepository::new(pool.clone())
        .create(&module)
        .await
        .unwrap();

    Fixture {
        manager: SessionManager::new(pool),
        identity,
        teacher,
        module,
        school_id: school.id,
        district_id: district.id,
        db,
    }
}

fn session_input(fx: &Fixture, name: &str, section: i64, theme: CharacterTheme) -> NewSession {
    NewSession {
        name: name.into(),
        section,
        module_id: fx.module.id,
        character_theme: theme,
    }
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    // Create with a full roster
    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 3 Weather", 3, CharacterTheme::Animals),
            25,
            false,
        )
        .await
        .unwrap();

    assert_eq!(created.students.len(), 25);
    assert!(!created.session.is_paused);
    assert!(!created.session.is_archived);

    // Roster is alphabetical and every PIN verifies
    let roster = fx
        .manager
        .list_students(principal, created.session.id)
        .await
        .unwrap();
    assert_eq!(roster.len(), 25);
    let mut sorted = roster.iter().map(|s| s.character_name.clone()).collect::<Vec<_>>();
    sorted.sort();
    assert_eq!(
        sorted,
        roster.iter().map(|s| s.character_name.clone()).collect::<Vec<_>>()
    );

    // Pause, resume, archive, unarchive
    fx.manager.pause(principal, created.session.id).await.unwrap();
    fx.manager.unpause(principal, created.session.id).await.unwrap();
    let archived = fx.manager.archive(principal, created.session.id).await.unwrap();
    assert!(archived.name.starts_with("Period 3 Weather [Archived "));
    let restored = fx.manager.unarchive(principal, created.session.id).await.unwrap();
    assert_eq!(restored.name, "Period 3 Weather");

    // Delete removes the roster and accounts
    let student_user_id = created.students[0].student.user_id;
    fx.manager.delete(principal, created.session.id).await.unwrap();
    assert!(fx.identity.get_user(student_user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_conflict_then_archive_and_replace() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let first = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Fall Unit", 2, CharacterTheme::Space),
            10,
            false,
        )
        .await
        .unwrap();

    // Second create for the same section is refused, naming the holder
    let err = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Winter Unit", 2, CharacterTheme::Space),
            10,
            false,
        )
        .await
        .unwrap_err();
    match &err {
        Error::Conflict {
            session_id,
            session_name,
        } => {
            assert_eq!(*session_id, first.session.id);
            assert_eq!(session_name, "Fall Unit");
        }
        other => panic!("Expected Conflict, got {:?}", other),
    }
    assert!(err.is_user_recoverable());

    // Retrying with auto-archive succeeds and retires the holder
    let second = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Winter Unit", 2, CharacterTheme::Space),
            10,
            true,
        )
        .await
        .unwrap();

    let archived = second.archived_previous.unwrap();
    assert_eq!(archived.id, first.session.id);
    assert!(archived.is_archived);

    // The first session's roster survives archiving
    let old_roster = fx
        .manager
        .list_students(principal, first.session.id)
        .await
        .unwrap();
    assert_eq!(old_roster.len(), 10);

    let active = fx
        .manager
        .list(principal, principal.id, SessionStatusFilter::Active)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.session.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_creates_resolve_to_one_winner() {
    // A file-backed WAL database with a real pool, so the two creates
    // genuinely contend for the write lock instead of sharing one
    // connection.
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DatabaseConfig::with_path(dir.path().join("race.db")))
        .await
        .unwrap();
    let pool = db.pool().clone();

    let identity = IdentityRepository::new(pool.clone());
    let district = District::new("Lakeview USD");
    identity.create_district(&district).await.unwrap();
    let school = School::new(district.id, "Lakeview Elementary");
    identity.create_school(&school).await.unwrap();
    let teacher = identity
        .create_user(NewUser {
            username: "msrivera".into(),
            email: "rivera@example.org".into(),
            password_hash: "hash".into(),
            first_name: Some("Maria".into()),
            last_name: Some("Rivera".into()),
            role: Role::Teacher,
            school_id: Some(school.id),
            district_id: Some(district.id),
        })
        .await
        .unwrap();
    let module = Module::new("Weather Data", None, 1);
    ModuleRepository::new(pool.clone()).create(&module).await.unwrap();

    let manager = SessionManager::new(pool);
    let principal = teacher.as_principal();
    let input = |name: &str| NewSession {
        name: name.into(),
        section: 1,
        module_id: module.id,
        character_theme: CharacterTheme::Animals,
    };

    let (a, b) = tokio::join!(
        manager.resolve_and_create(principal, input("First in"), 5, false),
        manager.resolve_and_create(principal, input("Second in"), 5, false),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) => (w, l),
        (Err(l), Ok(w)) => (w, l),
        (Ok(_), Ok(_)) => panic!("both creates claimed the same slot"),
        (Err(a), Err(b)) => panic!("neither create succeeded: {:?} / {:?}", a, b),
    };

    // The loser must learn who holds the slot, never a raw database error
    match loser {
        Error::Conflict {
            session_id,
            session_name,
        } => {
            assert_eq!(session_id, winner.session.id);
            assert_eq!(session_name, winner.session.name);
        }
        other => panic!("Expected Conflict for the losing create, got {:?}", other),
    }

    // Exactly one session exists, with its full roster
    let sessions = manager
        .list(principal, principal.id, SessionStatusFilter::All)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, winner.session.id);
    let roster = manager.list_students(principal, winner.session.id).await.unwrap();
    assert_eq!(roster.len(), 5);

    db.close().await;
}

#[tokio::test]
async fn test_session_codes_unique_and_well_formed() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let mut codes = HashSet::new();
    for section in 1..=6 {
        let created = fx
            .manager
            .resolve_and_create(
                principal,
                session_input(&fx, "Class", section, CharacterTheme::Animals),
                2,
                false,
            )
            .await
            .unwrap();

        let code = created.session.session_code;
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(codes.insert(code), "duplicate session code");
    }
}

#[tokio::test]
async fn test_pins_distinct_within_full_roster() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Full house", 1, CharacterTheme::Animals),
            40,
            false,
        )
        .await
        .unwrap();

    assert_eq!(created.students.len(), 40);

    let pins: HashSet<_> = created.students.iter().map(|g| g.pin.clone()).collect();
    assert_eq!(pins.len(), 40);

    let names: HashSet<_> = created
        .students
        .iter()
        .map(|g| g.student.character_name.clone())
        .collect();
    assert_eq!(names.len(), 40);

    for generated in &created.students {
        assert!(pin::verify_pin(&generated.pin, &generated.student.pin_hash));
        assert!(generated
            .student
            .username
            .starts_with(&format!("student_{}_", created.session.session_code)));
        assert!(generated.student.avatar_path.starts_with("avatars/animals/"));
    }
}

#[tokio::test]
async fn test_theme_pool_exhaustion_leaves_no_trace() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let err = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Fantasy class", 1, CharacterTheme::Fantasy),
            30,
            false,
        )
        .await
        .unwrap_err();

    match err {
        Error::GenerationExhausted {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 24);
            assert_eq!(requested, 30);
        }
        other => panic!("Expected GenerationExhausted, got {:?}", other),
    }

    let sessions = fx
        .manager
        .list(principal, principal.id, SessionStatusFilter::All)
        .await
        .unwrap();
    assert!(sessions.is_empty());

    // No orphaned student accounts either
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'student'")
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_roster_generation_is_atomic() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    // An existing session whose roster holds one animal name
    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 1", 1, CharacterTheme::Animals),
            1,
            false,
        )
        .await
        .unwrap();
    let session = created.session.clone();

    // Generating the entire 40-name pool into the same session must collide
    // with the existing name at some point; nothing may survive the failure
    let pool = fx.db.pool();
    let mut tx = pool.begin().await.unwrap();
    let result = StudentGenerator::generate(&mut tx, &session, 40).await;
    assert!(matches!(result, Err(Error::IntegrityViolation(_))));
    tx.rollback().await.unwrap();

    let roster = fx
        .manager
        .list_students(principal, session.id)
        .await
        .unwrap();
    assert_eq!(roster.len(), 1);
}

#[tokio::test]
async fn test_observer_sees_only_own_school() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    fx.manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Visible", 1, CharacterTheme::Animals),
            2,
            false,
        )
        .await
        .unwrap();

    // A teacher at another school in the same district
    let other_school = School::new(fx.district_id, "Hillside Middle");
    fx.identity.create_school(&other_school).await.unwrap();
    let far_teacher = fx
        .identity
        .create_user(NewUser {
            username: "fartea".into(),
            email: "far@example.org".into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
            role: Role::Teacher,
            school_id: Some(other_school.id),
            district_id: Some(fx.district_id),
        })
        .await
        .unwrap();
    fx.manager
        .resolve_and_create(
            far_teacher.as_principal(),
            session_input(&fx, "Hidden", 1, CharacterTheme::Space),
            2,
            false,
        )
        .await
        .unwrap();

    let observer = fx
        .identity
        .create_user(NewUser {
            username: "observer1".into(),
            email: "obs@example.org".into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
            role: Role::Observer,
            school_id: Some(fx.school_id),
            district_id: Some(fx.district_id),
        })
        .await
        .unwrap();

    let visible = fx
        .manager
        .list_for_observer(&observer, SessionStatusFilter::All)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name, "Visible");

    // Observers cannot mutate what they can see
    let result = fx
        .manager
        .archive(observer.as_principal(), visible[0].id)
        .await;
    assert!(matches!(result, Err(Error::Authorization(_))));
}

#[tokio::test]
async fn test_other_teacher_gets_authorization_not_not_found() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Mine", 1, CharacterTheme::Animals),
            2,
            false,
        )
        .await
        .unwrap();

    let rival = Principal::new(Uuid::new_v4(), Role::Teacher);
    let result = fx.manager.get(rival, created.session.id).await;
    assert!(matches!(result, Err(Error::Authorization(_))));

    // A genuinely missing session is NotFound
    let result = fx.manager.get(principal, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_reset_all_pins() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 1", 1, CharacterTheme::Animals),
            5,
            false,
        )
        .await
        .unwrap();

    let old_hashes: Vec<_> = created
        .students
        .iter()
        .map(|g| g.student.pin_hash.clone())
        .collect();

    let reset = fx
        .manager
        .reset_all_pins(principal, created.session.id)
        .await
        .unwrap();
    assert_eq!(reset.len(), 5);

    for generated in &reset {
        assert!(pin::verify_pin(&generated.pin, &generated.student.pin_hash));
        assert!(!old_hashes.contains(&generated.student.pin_hash));

        // The backing user account committed in the same transaction
        let (password_hash,): (String,) =
            sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
                .bind(generated.student.user_id.to_string())
                .fetch_one(fx.db.pool())
                .await
                .unwrap();
        assert_eq!(password_hash, generated.student.pin_hash);
    }
}

#[tokio::test]
async fn test_teacher_wide_student_listing() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    fx.manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 1", 1, CharacterTheme::Animals),
            4,
            false,
        )
        .await
        .unwrap();
    fx.manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 2", 2, CharacterTheme::Space),
            6,
            false,
        )
        .await
        .unwrap();

    let all = fx
        .manager
        .students()
        .list_for_teacher(principal.id)
        .await
        .unwrap();
    assert_eq!(all.len(), 10);
    assert!(all.iter().all(|s| s.teacher_id == principal.id));
}

#[tokio::test]
async fn test_remove_single_student() {
    let fx = fixture().await;
    let principal = fx.teacher.as_principal();

    let created = fx
        .manager
        .resolve_and_create(
            principal,
            session_input(&fx, "Period 1", 1, CharacterTheme::Animals),
            3,
            false,
        )
        .await
        .unwrap();

    let victim = &created.students[0].student;
    assert!(fx.manager.remove_student(principal, victim.id).await.unwrap());

    let roster = fx
        .manager
        .list_students(principal, created.session.id)
        .await
        .unwrap();
    assert_eq!(roster.len(), 2);
    assert!(fx.identity.get_user(victim.user_id).await.unwrap().is_none());
}

//! DataDeck CLI - classroom session and roster management

use clap::{Parser, Subcommand};
use datadeck_core::config::Config;
use datadeck_core::domain::identity::{District, IdentityRepository, NewUser, Role, School, User};
use datadeck_core::domain::module::{Module, ModuleRepository};
use datadeck_core::domain::session::{NewSession, SessionManager, SessionStatusFilter};
use datadeck_core::domain::student::{CharacterTheme, GeneratedStudent};
use datadeck_core::error::Error;
use datadeck_core::storage::{Database, DatabaseConfig};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "datadeck")]
#[command(author, version, about = "Classroom session and roster management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the SQLite database (defaults to the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Username of the acting user
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    acting_user: Option<String>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage classroom sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage students within a session
    Student {
        #[command(subcommand)]
        action: StudentAction,
    },

    /// Manage curriculum modules
    Module {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Seed a demo district, school, users, and modules
    Seed,

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a new session with a generated student roster
    Start {
        /// Session name
        name: String,
        /// Class section (period), 1-based
        #[arg(short, long)]
        section: i64,
        /// Module name or ID
        #[arg(short, long)]
        module: String,
        /// Character theme (animals, superheroes, fantasy, space)
        #[arg(short, long, default_value = "animals")]
        theme: String,
        /// Number of students to generate
        #[arg(long)]
        students: Option<usize>,
        /// Archive any existing active session for this section
        #[arg(long)]
        replace: bool,
    },
    /// List sessions
    List {
        /// Status filter (active, paused, archived, all)
        #[arg(short, long, default_value = "active")]
        status: String,
    },
    /// Show session details
    Show { id: String },
    /// Archive a session
    Archive { id: String },
    /// Restore an archived session
    Unarchive { id: String },
    /// Pause student logins
    Pause { id: String },
    /// Resume student logins
    Resume { id: String },
    /// Delete a session and its entire roster
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum StudentAction {
    /// List a session's roster
    List {
        /// Session ID
        session: String,
    },
    /// Reset one student's PIN
    ResetPin {
        /// Student ID
        student: String,
    },
    /// Reset every PIN in a session
    ResetAllPins {
        /// Session ID
        session: String,
    },
    /// Remove a student from a session
    Remove {
        /// Student ID
        student: String,
    },
}

#[derive(Subcommand)]
enum ModuleAction {
    /// List modules available for new sessions
    List {
        /// Include deactivated modules
        #[arg(long)]
        all: bool,
    },
    /// Add a module
    Add {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, default_value_t = 0)]
        sort_order: i64,
    },
}

/// Global options, separated from the parsed command so the command can be
/// moved into its handler
struct Ctx {
    database: Option<PathBuf>,
    acting_user: Option<String>,
    format: OutputFormat,
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("datadeck=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        command,
        database,
        acting_user,
        format,
        quiet,
    } = Cli::parse();
    let cli = Ctx {
        database,
        acting_user,
        format,
        quiet,
    };

    let config = Config::load()?;
    let db = open_database(&cli, &config).await?;

    match command {
        Commands::Session { action } => cmd_session(&cli, &config, &db, action).await,
        Commands::Student { action } => cmd_student(&cli, &db, action).await,
        Commands::Module { action } => cmd_module(&cli, &db, action).await,
        Commands::Seed => cmd_seed(&cli, &db).await,
        Commands::Doctor => cmd_doctor(&cli, &db).await,
    }
}

async fn open_database(cli: &Ctx, config: &Config) -> anyhow::Result<Database> {
    let path = match &cli.database {
        Some(path) => path.clone(),
        None => config.database_path()?,
    };
    let db_config =
        DatabaseConfig::with_path(path).max_connections(config.database.max_connections);
    Database::new(db_config).await
}

/// Resolve the acting user from --as
async fn acting_user(cli: &Ctx, db: &Database) -> anyhow::Result<User> {
    let username = cli
        .acting_user
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("This command requires --as <username>"))?;

    let identity = IdentityRepository::new(db.pool().clone());
    identity
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Unknown user '{}'. Run `datadeck seed` for a demo setup.", username))
}

fn parse_id(kind: &str, raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| anyhow::anyhow!("Invalid {} ID: {}", kind, raw))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_session(
    cli: &Ctx,
    config: &Config,
    db: &Database,
    action: SessionAction,
) -> anyhow::Result<()> {
    let user = acting_user(cli, db).await?;
    let principal = user.as_principal();
    let manager = SessionManager::new(db.pool().clone())
        .with_code_length(config.generation.session_code_length as usize);

    match action {
        SessionAction::Start {
            name,
            section,
            module,
            theme,
            students,
            replace,
        } => {
            let theme = CharacterTheme::from_str(&theme).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown theme '{}'. Choose one of: animals, superheroes, fantasy, space",
                    theme
                )
            })?;
            let module = resolve_module(db, &module).await?;
            let count = students.unwrap_or(config.generation.default_student_count as usize);

            let input = NewSession {
                name,
                section,
                module_id: module.id,
                character_theme: theme,
            };

            let created = match manager
                .resolve_and_create(principal, input, count, replace)
                .await
            {
                Ok(created) => created,
                Err(Error::Conflict { session_name, .. }) => {
                    return Err(anyhow::anyhow!(
                        "An active session '{}' already exists for section {}. \
                         Re-run with --replace to archive it and start fresh.",
                        session_name,
                        section
                    ));
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(previous) = &created.archived_previous {
                if !cli.quiet {
                    println!("Archived previous session '{}'.", previous.name);
                }
            }

            if !cli.quiet {
                println!("Session started!");
                println!("  ID: {}", created.session.id);
                println!("  Name: {}", created.session.name);
                println!("  Section: {}", created.session.section);
                println!("  Join code: {}", created.session.session_code);
                println!("  Theme: {}", created.session.character_theme);
                println!();
                println!("Student roster (PINs shown once, save them now):");
            }
            print_roster(&created.students);
        }

        SessionAction::List { status } => {
            let filter = SessionStatusFilter::from_str(&status).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown status '{}'. Choose one of: active, paused, archived, all",
                    status
                )
            })?;

            let sessions = if user.role == Role::Observer {
                manager.list_for_observer(&user, filter).await?
            } else {
                manager.list(principal, principal.id, filter).await?
            };

            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
                return Ok(());
            }

            if sessions.is_empty() {
                if !cli.quiet {
                    println!("No sessions found.");
                }
            } else {
                for s in sessions {
                    let mut flags = Vec::new();
                    if s.is_paused {
                        flags.push("paused");
                    }
                    if s.is_archived {
                        flags.push("archived");
                    }
                    let suffix = if flags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", flags.join(", "))
                    };
                    println!(
                        "  {} - section {} - {} ({}){}",
                        s.id, s.section, s.name, s.session_code, suffix
                    );
                }
            }
        }

        SessionAction::Show { id } => {
            let session = manager.get(principal, parse_id("session", &id)?).await?;
            println!("Session: {}", session.name);
            println!("  ID: {}", session.id);
            println!("  Section: {}", session.section);
            println!("  Join code: {}", session.session_code);
            println!("  Theme: {}", session.character_theme);
            println!("  Paused: {}", session.is_paused);
            println!("  Archived: {}", session.is_archived);
            if let Some(archived_at) = session.archived_at {
                println!("  Archived at: {}", archived_at.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("  Created: {}", session.created_at.format("%Y-%m-%d %H:%M:%S"));
        }

        SessionAction::Archive { id } => {
            let session = manager.archive(principal, parse_id("session", &id)?).await?;
            if !cli.quiet {
                println!("Session archived as '{}'.", session.name);
            }
        }

        SessionAction::Unarchive { id } => {
            let result = manager.unarchive(principal, parse_id("session", &id)?).await;
            match result {
                Ok(session) => {
                    if !cli.quiet {
                        println!("Session '{}' restored.", session.name);
                    }
                }
                Err(Error::Conflict { session_name, .. }) => {
                    return Err(anyhow::anyhow!(
                        "Cannot restore: active session '{}' now occupies that section. \
                         Archive it first.",
                        session_name
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }

        SessionAction::Pause { id } => {
            manager.pause(principal, parse_id("session", &id)?).await?;
            if !cli.quiet {
                println!("Session paused. Student logins are blocked.");
            }
        }

        SessionAction::Resume { id } => {
            manager.unpause(principal, parse_id("session", &id)?).await?;
            if !cli.quiet {
                println!("Session resumed. Students can log in again.");
            }
        }

        SessionAction::Delete { id, force } => {
            if !force {
                println!(
                    "Warning: this permanently deletes the session and every student in it."
                );
                println!("Use --force to confirm deletion.");
                return Ok(());
            }
            manager.delete(principal, parse_id("session", &id)?).await?;
            if !cli.quiet {
                println!("Session deleted.");
            }
        }
    }

    Ok(())
}

async fn cmd_student(cli: &Ctx, db: &Database, action: StudentAction) -> anyhow::Result<()> {
    let user = acting_user(cli, db).await?;
    let principal = user.as_principal();
    let manager = SessionManager::new(db.pool().clone());

    match action {
        StudentAction::List { session } => {
            let roster = manager
                .list_students(principal, parse_id("session", &session)?)
                .await?;

            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&roster)?);
                return Ok(());
            }

            if roster.is_empty() {
                if !cli.quiet {
                    println!("No students in this session.");
                }
            } else {
                for s in roster {
                    println!("  {} - {} ({})", s.id, s.character_name, s.username);
                }
            }
        }

        StudentAction::ResetPin { student } => {
            let reset = manager
                .reset_student_pin(principal, parse_id("student", &student)?)
                .await?;
            println!(
                "New PIN for {}: {}",
                reset.student.character_name, reset.pin
            );
            if !cli.quiet {
                println!("(Shown once; it cannot be recovered later.)");
            }
        }

        StudentAction::ResetAllPins { session } => {
            let reset = manager
                .reset_all_pins(principal, parse_id("session", &session)?)
                .await?;
            if !cli.quiet {
                println!("New PINs (shown once, save them now):");
            }
            print_roster(&reset);
        }

        StudentAction::Remove { student } => {
            manager
                .remove_student(principal, parse_id("student", &student)?)
                .await?;
            if !cli.quiet {
                println!("Student removed.");
            }
        }
    }

    Ok(())
}

async fn cmd_module(cli: &Ctx, db: &Database, action: ModuleAction) -> anyhow::Result<()> {
    let modules = ModuleRepository::new(db.pool().clone());

    match action {
        ModuleAction::List { all } => {
            let listed = if all {
                modules.list_all().await?
            } else {
                modules.list_active().await?
            };

            if listed.is_empty() {
                if !cli.quiet {
                    println!("No modules found. Add one with: datadeck module add <name>");
                }
            } else {
                for m in listed {
                    let flag = if m.is_active { "" } else { " [inactive]" };
                    match &m.description {
                        Some(desc) => println!("  {} - {}{}", m.name, desc, flag),
                        None => println!("  {}{}", m.name, flag),
                    }
                }
            }
        }

        ModuleAction::Add {
            name,
            description,
            sort_order,
        } => {
            let module = Module::new(name, description, sort_order);
            modules.create(&module).await?;
            if !cli.quiet {
                println!("Module '{}' added ({}).", module.name, module.id);
            }
        }
    }

    Ok(())
}

async fn cmd_seed(cli: &Ctx, db: &Database) -> anyhow::Result<()> {
    let identity = IdentityRepository::new(db.pool().clone());

    if identity.find_user_by_username("demo_teacher").await?.is_some() {
        if !cli.quiet {
            println!("Demo data already seeded.");
        }
        return Ok(());
    }

    let district = District::new("Lakeview Unified");
    identity.create_district(&district).await?;
    let school = School::new(district.id, "Lakeview Elementary");
    identity.create_school(&school).await?;

    identity
        .create_user(NewUser {
            username: "demo_teacher".into(),
            email: "teacher@datadeck.local".into(),
            password_hash: "unset".into(),
            first_name: Some("Demo".into()),
            last_name: Some("Teacher".into()),
            role: Role::Teacher,
            school_id: Some(school.id),
            district_id: Some(district.id),
        })
        .await?;
    identity
        .create_user(NewUser {
            username: "demo_observer".into(),
            email: "observer@datadeck.local".into(),
            password_hash: "unset".into(),
            first_name: Some("Demo".into()),
            last_name: Some("Observer".into()),
            role: Role::Observer,
            school_id: Some(school.id),
            district_id: Some(district.id),
        })
        .await?;
    identity
        .create_user(NewUser {
            username: "demo_admin".into(),
            email: "admin@datadeck.local".into(),
            password_hash: "unset".into(),
            first_name: Some("Demo".into()),
            last_name: Some("Admin".into()),
            role: Role::Admin,
            school_id: None,
            district_id: None,
        })
        .await?;

    let modules = ModuleRepository::new(db.pool().clone());
    modules
        .create(&Module::new(
            "Weather Data",
            Some("Graphing daily temperature and rainfall".into()),
            1,
        ))
        .await?;
    modules
        .create(&Module::new(
            "Animal Habitats",
            Some("Sorting and counting local wildlife".into()),
            2,
        ))
        .await?;
    modules
        .create(&Module::new(
            "Sports Stats",
            Some("Averages and charts from game results".into()),
            3,
        ))
        .await?;

    if !cli.quiet {
        println!("Seeded demo data:");
        println!("  District: Lakeview Unified / Lakeview Elementary");
        println!("  Users: demo_teacher, demo_observer, demo_admin");
        println!("  Modules: Weather Data, Animal Habitats, Sports Stats");
        println!();
        println!("Try: datadeck --as demo_teacher session start \"Period 1\" \\");
        println!("         --section 1 --module \"Weather Data\" --theme animals");
    }

    Ok(())
}

async fn cmd_doctor(cli: &Ctx, db: &Database) -> anyhow::Result<()> {
    db.health_check().await?;
    let status = db.migration_status().await?;

    if !cli.quiet {
        println!("Database: {}", db.path().display());
        println!("  Health: ok");
        println!(
            "  Schema version: {} (target {})",
            status.current_version, status.target_version
        );
        if status.needs_migration {
            println!("  Migrations: pending");
        } else {
            println!("  Migrations: up to date");
        }
    }

    Ok(())
}

async fn resolve_module(db: &Database, raw: &str) -> anyhow::Result<Module> {
    let modules = ModuleRepository::new(db.pool().clone());

    if let Ok(id) = Uuid::parse_str(raw) {
        if let Some(module) = modules.get(id).await? {
            return Ok(module);
        }
    }

    modules
        .list_all()
        .await?
        .into_iter()
        .find(|m| m.name.eq_ignore_ascii_case(raw))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Module '{}' not found. Run `datadeck module list` to see available modules.",
                raw
            )
        })
}

fn print_roster(students: &[GeneratedStudent]) {
    for generated in students {
        println!(
            "  {:<20} {:<24} PIN {}",
            generated.student.character_name, generated.student.username, generated.pin
        );
    }
}

//! Lessons CLI - Browse and add lessons in the catalog.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lesson_core::{Audience, LessonsConfig, RecordId, RecordSource};
use lesson_entry::{EntryService, LessonForm, Status, StatusKind};
use lesson_rest::RestClient;
use lesson_view::{
    sample_course_data, AssembleOptions, CourseLoader, DataOrigin, GradeFilter, LoadOutcome,
    ViewFilter,
};

/// Lessons - Browse and add curriculum lessons
#[derive(Parser)]
#[command(name = "lessons")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/lessons/config.toml, then ./lessons.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the course grouped by unit
    Browse {
        /// Grade level: All, Elementary, Middle or High
        #[arg(short, long, default_value = "All")]
        grade: GradeFilter,

        /// Show only the unit with this exact name
        #[arg(short, long)]
        unit: Option<String>,

        /// Filter units by name
        #[arg(short, long, default_value = "")]
        search: String,

        /// List unit names with lesson counts only
        #[arg(long, conflicts_with = "json")]
        units_only: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Use the built-in sample course instead of the backend
        #[arg(long)]
        sample: bool,
    },

    /// Show the most recently uploaded lesson
    Latest {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List lessons for one grade level, newest first
    Grade {
        /// Elementary, Middle or High
        grade: Audience,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Add a lesson, optionally uploading its plan and slides
    Add(AddArgs),

    /// Manage topics
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },

    /// Register an uploader (reuses an existing email)
    User {
        /// Display name
        name: String,

        /// Email address
        email: String,
    },
}

#[derive(Subcommand)]
enum TopicAction {
    /// Show the next free topic number in a unit
    Next {
        /// Curriculum group id
        unit: String,
    },

    /// Create a topic, or reuse one with the same name
    Add {
        /// Curriculum group id
        unit: String,

        /// Topic name
        name: String,

        /// Topic number (default: next free number)
        #[arg(short, long)]
        number: Option<i64>,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Lesson title
    #[arg(short, long)]
    title: String,

    /// Lesson id (default: new UUID)
    #[arg(long, default_value = "")]
    id: String,

    /// Curriculum group id
    #[arg(long, default_value = "")]
    group: String,

    /// Topic id
    #[arg(long, default_value = "")]
    topic: String,

    #[arg(long, default_value = "")]
    subject: String,

    /// Elementary, Middle or High
    #[arg(long, default_value = "")]
    audience: String,

    #[arg(long, default_value = "")]
    level: String,

    /// Lesson number within its topic
    #[arg(long, default_value = "")]
    number: String,

    /// Learning objectives as JSON (list of strings or a string)
    #[arg(long, default_value = "")]
    objectives: String,

    /// Materials as JSON
    #[arg(long, default_value = "")]
    materials: String,

    /// Teaching activities as JSON (list of strings or a string)
    #[arg(long, default_value = "")]
    activities: String,

    #[arg(long, default_value = "")]
    application: String,

    #[arg(long, default_value = "")]
    assessment: String,

    #[arg(long, default_value = "")]
    refs: String,

    /// Uploader
    #[arg(long, default_value = "")]
    uploaded_by: String,

    /// Lesson plan document to upload
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Slide deck to upload
    #[arg(long)]
    slides: Option<PathBuf>,
}

impl From<AddArgs> for LessonForm {
    fn from(args: AddArgs) -> Self {
        Self {
            id: args.id,
            title: args.title,
            curriculum_group_id: args.group,
            topic: args.topic,
            subject: args.subject,
            target_audience: args.audience,
            level: args.level,
            lesson_number: args.number,
            learning_objectives: args.objectives,
            materials: args.materials,
            teaching_activities: args.activities,
            application: args.application,
            assessment: args.assessment,
            refs: args.refs,
            uploaded_by: args.uploaded_by,
            lesson_plan: args.plan,
            slide_deck: args.slides,
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&PathBuf>) -> Result<LessonsConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => LessonsConfig::load(path)?,
        None => LessonsConfig::load_default()?,
    };
    config.apply_env();
    Ok(config)
}

fn get_client(config: &LessonsConfig) -> Arc<RestClient> {
    match RestClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!(
                "Set the backend in a config file or via LESSONS_API_URL and LESSONS_API_KEY."
            );
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Browse {
            grade,
            unit,
            search,
            units_only,
            json,
            sample,
        } => {
            let outcome = if sample {
                LoadOutcome {
                    data: sample_course_data(),
                    origin: DataOrigin::Fallback,
                    advisory: None,
                }
            } else {
                let client = get_client(&config);
                let options =
                    AssembleOptions::from_config(&config.browse, Some(client.public_base()));
                CourseLoader::new(client, options).load().await
            };

            if let Some(advisory) = &outcome.advisory {
                eprintln!("Note: {}", advisory);
            }

            let mut filter = ViewFilter::new(grade).with_search(search);
            if let Some(unit) = unit {
                filter = filter.with_unit(unit);
            }
            let visible = filter.apply(&outcome.data);

            if json {
                println!("{}", serde_json::to_string_pretty(&visible)?);
            } else if units_only {
                print!("{}", render::sidebar(&outcome.data, &grade, &filter.search));
            } else {
                print!("{}", render::course(&visible));
            }
        }
        Commands::Latest { json } => {
            let client = get_client(&config);
            match client.latest_lesson().await? {
                Some(lesson) if json => println!("{}", serde_json::to_string_pretty(&lesson)?),
                Some(lesson) => print!("{}", render::record(&lesson)),
                None => println!("No lessons found."),
            }
        }
        Commands::Grade { grade, json } => {
            let client = get_client(&config);
            let lessons = client.lessons_for_audience(grade).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&lessons)?);
            } else if lessons.is_empty() {
                println!("No {} lessons found.", grade);
            } else {
                for lesson in &lessons {
                    print!("{}", render::record(lesson));
                }
            }
        }
        Commands::Add(args) => {
            let client = get_client(&config);
            let service = EntryService::new(client);
            let form = LessonForm::from(args);

            match service.submit(&form).await {
                Ok(report) => {
                    for file in &report.files {
                        match (&file.url, &file.error) {
                            (_, Some(error)) => eprintln!("  {} - Error: {}", file.path, error),
                            (Some(url), None) => println!("  {} - {}", file.path, url),
                            (None, None) => println!("  {} - OK", file.path),
                        }
                    }
                    if let Some(id) = &report.lesson.id {
                        info!("Lesson id {}", id);
                    }
                    exit_with(report.status());
                }
                Err(e) => exit_with(Status::from_error(&e)),
            }
        }
        Commands::Topic { action } => {
            let client = get_client(&config);
            let service = EntryService::new(client);
            match action {
                TopicAction::Next { unit } => {
                    let next = service.suggest_topic_number(&RecordId::from(unit)).await?;
                    println!("{}", next);
                }
                TopicAction::Add { unit, name, number } => {
                    let topic = service
                        .ensure_topic(&RecordId::from(unit), &name, number)
                        .await?;
                    println!(
                        "Topic '{}' is number {} (id {})",
                        topic.name.as_deref().unwrap_or(&name),
                        topic
                            .topic_number
                            .map_or_else(|| "-".to_string(), |n| n.to_string()),
                        topic.id
                    );
                }
            }
        }
        Commands::User { name, email } => {
            let client = get_client(&config);
            let service = EntryService::new(client);
            let user = service.ensure_user(&name, &email).await?;
            match &user.id {
                Some(id) => println!("User {} <{}> (id {})", user.name, user.email, id),
                None => println!("User {} <{}>", user.name, user.email),
            }
        }
    }

    Ok(())
}

fn exit_with(status: Status) {
    match status.kind {
        StatusKind::Success => println!("{}", status.message),
        StatusKind::Error => {
            eprintln!("{}", status.message);
            std::process::exit(1);
        }
    }
}

mod analytics;
mod auth;
mod config;
mod db;
mod drag;
mod error;
mod files;
mod filter;
mod models;
mod pipeline;
mod repository;
mod store;
mod tui;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use auth::AuthService;
use config::{Config, DATA_DIR_ENV, DataPaths};
use db::Database;
use error::AtsError;
use files::LocalFileStorage;
use filter::{ExperienceBucket, FilterCriteria};
use models::{Application, ApplicationPatch, NewApplication, ResumeRef, ResumeSource, ResumeUpload, Stage, User};
use pipeline::group_by_stage;
use repository::ApplicationRepository;

const LOG_ENV: &str = "ATS_LOG";

#[derive(Parser)]
#[command(name = "ats")]
#[command(about = "Applicant tracking - collect candidates and move them through your hiring pipeline")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the database, session and uploaded resumes
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create an account and sign in
    Signup {
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in
    Login {
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Add an application
    Add {
        /// Candidate name
        #[arg(short, long)]
        name: String,

        /// Role applied for
        #[arg(short, long)]
        role: String,

        /// Years of experience (0-50)
        #[arg(short, long, default_value = "0")]
        experience: u32,

        /// Initial status (applied, interview, offer, rejected)
        #[arg(short, long, default_value = "applied")]
        status: String,

        /// Link to an externally hosted resume
        #[arg(long, conflicts_with = "resume_file")]
        resume_link: Option<String>,

        /// PDF resume to upload
        #[arg(long)]
        resume_file: Option<PathBuf>,
    },

    /// List applications
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show applications grouped by status
    Board {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Show application details
    Show {
        /// Application ID
        id: i64,
    },

    /// Change application fields
    Edit {
        /// Application ID
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        role: Option<String>,

        #[arg(short, long)]
        experience: Option<u32>,

        /// Replace the resume with a link
        #[arg(long)]
        resume_link: Option<String>,
    },

    /// Move an application to another status
    Move {
        /// Application ID
        id: i64,

        /// Target status (applied, interview, offer, rejected)
        status: String,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: i64,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show pipeline analytics
    Stats,

    /// Open the interactive dashboard
    Dash,
}

#[derive(Args)]
struct FilterArgs {
    /// Search candidate names and roles
    #[arg(short = 'q', long)]
    search: Option<String>,

    /// Filter by exact role
    #[arg(short, long)]
    role: Option<String>,

    /// Filter by status (applied, interview, offer, rejected)
    #[arg(short, long)]
    status: Option<String>,

    /// Filter by experience (0-1, 1-3, 3-5, 5-10, 10+)
    #[arg(short, long)]
    experience: Option<String>,
}

impl FilterArgs {
    fn criteria(&self) -> Result<FilterCriteria> {
        Ok(FilterCriteria {
            search: self.search.clone().unwrap_or_default(),
            role: self.role.clone(),
            status: self.status.as_deref().map(str::parse::<Stage>).transpose()?,
            experience: self
                .experience
                .as_deref()
                .map(str::parse::<ExperienceBucket>)
                .transpose()?,
        })
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let env_dir = std::env::var(DATA_DIR_ENV).ok();
    let paths = DataPaths::new(config.resolve_data_dir(cli.data_dir.as_deref(), env_dir.as_deref()));

    let dashboard = matches!(cli.command, Commands::Dash);
    let log_file = paths.log_file();
    init_logging(&config.log_level, dashboard.then_some(log_file.as_path()))?;

    let db = Database::open(&paths.database())?;
    let files = LocalFileStorage::new(paths.resumes());
    let auth = AuthService::new(&db, paths.session());

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Signup { email, password } => {
            let password = read_password(password)?;
            let user = auth.sign_up(&email, &password)?;
            println!("Account created. Signed in as {}.", user.email);
        }

        Commands::Login { email, password } => {
            let password = read_password(password)?;
            let user = auth.sign_in(&email, &password)?;
            println!("Signed in as {}.", user.email);
        }

        Commands::Logout => {
            auth.sign_out()?;
            println!("Signed out.");
        }

        Commands::Whoami => match auth.current_user()? {
            Some(user) => println!("Signed in as {} (member since {}).", user.email, user.created_at.format("%b %-d, %Y")),
            None => println!("Not signed in."),
        },

        Commands::Add {
            name,
            role,
            experience,
            status,
            resume_link,
            resume_file,
        } => {
            let mut repo = load_repo(&db, &files, &auth)?;
            let mut new = NewApplication::new(name, role, experience);
            new.status = status.parse()?;
            new.resume = match (resume_link, resume_file) {
                (Some(url), _) => Some(ResumeSource::Link { url, file_name: None }),
                (None, Some(path)) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
                    Some(ResumeSource::Upload(ResumeUpload { file_name, bytes }))
                }
                (None, None) => None,
            };
            let app = repo.add(new)?;
            println!("Added application #{} ({}, {})", app.id, app.candidate_name, app.role);
        }

        Commands::List { filters } => {
            let criteria = filters.criteria()?;
            let repo = load_repo(&db, &files, &auth)?;
            let apps = filter::apply(repo.applications(), &criteria);
            if let Some(hint) = empty_hint(repo.applications(), apps.len()) {
                println!("{}", hint);
            } else {
                println!(
                    "{:<6} {:<10} {:<24} {:<20} {:>4} {:<14}",
                    "ID", "STATUS", "CANDIDATE", "ROLE", "EXP", "ADDED"
                );
                println!("{}", "-".repeat(83));
                for app in &apps {
                    println!(
                        "{:<6} {:<10} {:<24} {:<20} {:>4} {:<14}",
                        app.id,
                        app.status,
                        truncate(&app.candidate_name, 22),
                        truncate(&app.role, 18),
                        app.experience_years,
                        app.created_at.format("%b %-d, %Y")
                    );
                }
                if criteria.is_active() {
                    println!("\nShowing {} of {}", apps.len(), repo.applications().len());
                }
            }
        }

        Commands::Board { filters } => {
            let criteria = filters.criteria()?;
            let repo = load_repo(&db, &files, &auth)?;
            let apps = filter::apply(repo.applications(), &criteria);
            if let Some(hint) = empty_hint(repo.applications(), apps.len()) {
                println!("{}", hint);
            } else {
                for (stage, list) in group_by_stage(apps) {
                    println!("{} ({})", stage.title(), list.len());
                    for app in list {
                        let resume = if app.resume.is_some() { " [resume]" } else { "" };
                        println!(
                            "  #{:<5} {} - {} ({}y){}",
                            app.id,
                            truncate(&app.candidate_name, 24),
                            truncate(&app.role, 20),
                            app.experience_years,
                            resume
                        );
                    }
                    println!();
                }
            }
        }

        Commands::Show { id } => {
            let repo = load_repo(&db, &files, &auth)?;
            let app = repo.get(id).ok_or(AtsError::NotFound(id))?;
            print_application(app);
        }

        Commands::Edit {
            id,
            name,
            role,
            experience,
            resume_link,
        } => {
            let mut repo = load_repo(&db, &files, &auth)?;
            let patch = ApplicationPatch {
                candidate_name: name,
                role,
                experience_years: experience,
                status: None,
                resume: resume_link.map(|url| ResumeRef {
                    url,
                    file_path: None,
                    file_name: None,
                    file_size: None,
                }),
            };
            let app = repo.update(id, patch)?;
            println!("Updated application #{}", app.id);
        }

        Commands::Move { id, status } => {
            let stage: Stage = status.parse()?;
            let mut repo = load_repo(&db, &files, &auth)?;
            let from = repo.get(id).ok_or(AtsError::NotFound(id))?.status;
            if from == stage {
                println!("Application #{} is already in {}.", id, stage.title());
            } else {
                let app = repo.update(id, ApplicationPatch::status(stage))?;
                println!("Moved {} from {} to {}.", app.candidate_name, from.title(), stage.title());
            }
        }

        Commands::Delete { id, yes } => {
            let mut repo = load_repo(&db, &files, &auth)?;
            let name = repo.get(id).ok_or(AtsError::NotFound(id))?.candidate_name.clone();
            let prompt = format!(
                "Are you sure you want to delete the application from {}? This cannot be undone.",
                name
            );
            if yes || confirm(&prompt)? {
                repo.delete(id)?;
                println!("Deleted application #{}", id);
            } else {
                println!("Cancelled.");
            }
        }

        Commands::Stats => {
            let repo = load_repo(&db, &files, &auth)?;
            print_stats(&analytics::summarize(repo.applications()));
        }

        Commands::Dash => {
            let repo = ApplicationRepository::new(&db, &files);
            tui::run_dashboard(repo, &auth, config.drag_activation_distance)?;
        }
    }

    Ok(())
}

fn require_user(auth: &AuthService) -> Result<User> {
    auth.current_user()?
        .ok_or_else(|| anyhow!("Not signed in. Run 'ats login <email>' first."))
}

fn load_repo<'a>(
    db: &'a Database,
    files: &'a LocalFileStorage,
    auth: &AuthService,
) -> Result<ApplicationRepository<'a>> {
    let user = require_user(auth)?;
    let mut repo = ApplicationRepository::new(db, files);
    repo.load(user)?;
    Ok(repo)
}

fn empty_hint(all: &[Application], visible: usize) -> Option<&'static str> {
    if all.is_empty() {
        Some("No applications yet. Add one with 'ats add --name <name> --role <role>'.")
    } else if visible == 0 {
        Some("No applications match your current filters.")
    } else {
        None
    }
}

fn print_application(app: &Application) {
    println!("Application #{}", app.id);
    println!("Candidate: {}", app.candidate_name);
    println!("Role: {}", app.role);
    println!("Experience: {} years", app.experience_years);
    println!("Status: {}", app.status.title());
    if let Some(resume) = &app.resume {
        let label = resume.file_name.as_deref().unwrap_or("link");
        println!("Resume: {}", label);
        for line in textwrap::wrap(&resume.url, textwrap::Options::new(72).break_words(true)) {
            println!("  {}", line);
        }
        if let Some(size) = resume.file_size {
            println!("  {:.1} KiB", size as f64 / 1024.0);
        }
    }
    println!("Added: {}", app.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M"));
}

fn print_stats(summary: &analytics::Summary) {
    println!("Total candidates: {}", summary.total);
    println!("Avg experience:   {:.1}y", summary.avg_experience);
    println!("Conversion rate:  {:.1}%", summary.conversion_rate);
    println!("Offers made:      {}", summary.offers());

    println!("\nPipeline:");
    for stage in Stage::ALL {
        let share = summary.stage_share(stage);
        println!(
            "  {:<10} {:>4}  {:<25} {:>5.1}%",
            stage.title(),
            summary.by_stage[&stage],
            "#".repeat((share / 4.0).round() as usize),
            share
        );
    }

    if !summary.roles.is_empty() {
        let axis = summary.role_axis_max() as f64;
        println!("\nBy role:");
        for role in &summary.roles {
            let width = (role.count as f64 / axis * 25.0).round() as usize;
            println!("  {:<20} {:>4}  {}", truncate(&role.role, 18), role.count, "#".repeat(width));
        }
    }
}

fn read_password(arg: Option<String>) -> Result<String> {
    if let Some(password) = arg {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

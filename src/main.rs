mod cli;

use memo::app::{App, SyncOutcome};
use memo::config::Config;
use memo::sync::ProgressFn;
use memo::sync::progress::describe_progress;
use memo::task::{CountdownTask, DeadlineTask, Identifiable, Span};
use memo::utils::paths::{ensure_memo_dir_exists, get_crash_log_path, get_logs_dir, get_memo_dir};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Local, Utc};
use clap::Parser;
use cli::{Cli, Commands, CountdownCommand, SyncCommand, TodoCommand, parse_when};
use std::fs;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Install a panic hook that writes crash information to a log file
fn install_crash_handler(crash_log_path: PathBuf) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut crash_report = format!("=== CRASH at {} ===\n", timestamp);

        if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            crash_report.push_str(&format!("Message: {}\n", message));
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            crash_report.push_str(&format!("Message: {}\n", message));
        }

        if let Some(location) = panic_info.location() {
            crash_report.push_str(&format!(
                "Location: {}:{}:{}\n",
                location.file(),
                location.line(),
                location.column()
            ));
        }

        crash_report.push_str(&format!(
            "\nBacktrace:\n{}\n\n",
            std::backtrace::Backtrace::force_capture()
        ));

        if let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&crash_log_path)
        {
            let _ = file.write_all(crash_report.as_bytes());
            eprintln!("\nCrash logged to: {}", crash_log_path.display());
        }

        default_hook(panic_info);
    }));
}

/// Initialize file-based logging.
///
/// Logs are written to <memo dir>/logs/memo.log, rolling daily.
/// RUST_LOG overrides the configured level.
fn init_file_logging(
    memo_dir: &Path,
    default_level: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = get_logs_dir(memo_dir);

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Could not create logs directory: {}", e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "memo.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let memo_dir = get_memo_dir()?;
    ensure_memo_dir_exists(&memo_dir)?;
    install_crash_handler(get_crash_log_path(&memo_dir));

    let config = Config::load(&memo_dir)?;
    let _log_guard = init_file_logging(&memo_dir, &config.log_level);
    tracing::info!(dir = %memo_dir.display(), "memo starting");

    let mut app = App::open(&config, &memo_dir).await?;

    match cli.command {
        Commands::Todo { command } => handle_todo(&app, command).await,
        Commands::Countdown { command } => handle_countdown(&app, command).await,
        Commands::Sync { command } => handle_sync(&mut app, command).await,
    }
}

/// Resolve a full id or a unique prefix of one.
fn resolve_id<'a, T: Identifiable + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    input: &str,
) -> Result<String> {
    let matches: Vec<&str> = items
        .into_iter()
        .map(|t| t.id())
        .filter(|id| id.starts_with(input))
        .collect();

    if let Some(exact) = matches.iter().find(|id| **id == input) {
        return Ok(exact.to_string());
    }
    match matches.as_slice() {
        [] => Err(anyhow!("No task with id '{input}'")),
        [only] => Ok(only.to_string()),
        _ => Err(anyhow!("Id prefix '{input}' is ambiguous")),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_local(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "ended".to_string();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() - days * 24;
    if days > 0 {
        format!("{days}d {hours}h left")
    } else {
        format!("{}h {}m left", hours, remaining.num_minutes() - hours * 60)
    }
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn print_todo(task: &DeadlineTask, now: DateTime<Utc>) {
    let overdue = if task.is_overdue(now) { "  (overdue)" } else { "" };
    println!(
        "{}  {} {}  due {}{}",
        short_id(&task.id),
        checkbox(task.is_completed),
        task.title,
        format_local(&task.deadline),
        overdue
    );
}

fn print_countdown(task: &CountdownTask, now: DateTime<Utc>) {
    let recurring = if task.is_recurring { "  (recurring)" } else { "" };
    println!(
        "{}  {} {}  {} from {}, {}{}",
        short_id(&task.id),
        checkbox(task.is_completed),
        task.title,
        task.duration,
        format_local(&task.start_time),
        format_remaining(task.remaining(now)),
        recurring
    );
}

async fn handle_todo(app: &App, command: TodoCommand) -> Result<()> {
    let repo = &app.todos;
    match command {
        TodoCommand::Add { title, deadline } => {
            let task = DeadlineTask::new(title, parse_when(&deadline)?);
            let id = task.id.clone();
            repo.add(task).await?;
            println!("✓ Todo added ({})", short_id(&id));
        }
        TodoCommand::List => {
            let items = repo.snapshot();
            if items.is_empty() {
                println!("No todos!");
                return Ok(());
            }
            let now = Utc::now();
            for task in &items {
                print_todo(task, now);
            }
        }
        TodoCommand::Toggle { id } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            let task = repo.toggle(&id).await?;
            print_todo(&task, Utc::now());
        }
        TodoCommand::Edit {
            id,
            title,
            deadline,
        } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            let mut task = repo.get(&id).ok_or_else(|| anyhow!("No task with id '{id}'"))?;
            let deadline = match deadline {
                Some(d) => parse_when(&d)?,
                None => task.deadline,
            };
            let title = title.unwrap_or_else(|| task.title.clone());
            task.update(title, deadline);
            repo.update(&id, task.clone()).await?;
            print_todo(&task, Utc::now());
        }
        TodoCommand::Remove { id } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            repo.remove(&id).await?;
            println!("✓ Todo removed");
        }
        TodoCommand::Clear { yes } => {
            if confirm("Delete every todo?", yes)? {
                repo.clear().await?;
                println!("✓ All todos deleted");
            }
        }
    }
    Ok(())
}

async fn handle_countdown(app: &App, command: CountdownCommand) -> Result<()> {
    let repo = &app.countdowns;
    match command {
        CountdownCommand::Add {
            title,
            duration,
            start,
            recurring,
        } => {
            check_duration(&duration)?;
            let start = match start {
                Some(s) => parse_when(&s)?,
                None => Utc::now(),
            };
            let task = CountdownTask::new(title, start, duration, recurring);
            let id = task.id.clone();
            repo.add(task).await?;
            println!("✓ Countdown added ({})", short_id(&id));
        }
        CountdownCommand::List => {
            let items = repo.snapshot();
            if items.is_empty() {
                println!("No countdowns!");
                return Ok(());
            }
            let now = Utc::now();
            for task in &items {
                print_countdown(task, now);
            }
        }
        CountdownCommand::Toggle { id } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            let task = repo.toggle(&id).await?;
            if task.is_recurring {
                println!("✓ Recurring countdown restarted");
            }
            print_countdown(&task, Utc::now());
        }
        CountdownCommand::Edit {
            id,
            title,
            duration,
            start,
            recurring,
        } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            let mut task = repo.get(&id).ok_or_else(|| anyhow!("No task with id '{id}'"))?;
            let start = match start {
                Some(s) => parse_when(&s)?,
                None => task.start_time,
            };
            let title = title.unwrap_or_else(|| task.title.clone());
            let duration = duration.unwrap_or(task.duration);
            check_duration(&duration)?;
            let recurring = recurring.unwrap_or(task.is_recurring);
            task.update(title, start, duration, recurring);
            repo.update(&id, task.clone()).await?;
            print_countdown(&task, Utc::now());
        }
        CountdownCommand::Remove { id } => {
            let id = resolve_id(&repo.snapshot(), &id)?;
            repo.remove(&id).await?;
            println!("✓ Countdown removed");
        }
        CountdownCommand::Clear { yes } => {
            if confirm("Delete every countdown?", yes)? {
                repo.clear().await?;
                println!("✓ All countdowns deleted");
            }
        }
    }
    Ok(())
}

fn check_duration(duration: &Span) -> Result<()> {
    if duration.is_zero() {
        bail!("A countdown needs a duration of at least one day");
    }
    Ok(())
}

fn progress_printer(label: &'static str) -> ProgressFn {
    Arc::new(move |done, total| {
        eprint!("\r{label}: {}   ", describe_progress(done, total));
    })
}

fn require_remote(app: &App) -> Result<()> {
    if !app.is_sync_configured() {
        bail!("Remote backup is not configured. Run `memo sync login` first");
    }
    Ok(())
}

async fn handle_sync(app: &mut App, command: SyncCommand) -> Result<()> {
    match command {
        SyncCommand::Login {
            url,
            user,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => dialoguer::Password::new()
                    .with_prompt("WebDAV password")
                    .interact()?,
            };
            if app.connect_remote(&url, &user, &password).await? {
                println!("✓ Connected to {url}; credentials saved");
            } else {
                bail!("Could not connect to {url}. See the log for details");
            }
        }
        SyncCommand::Status => match app.credentials() {
            Some(creds) => {
                println!("Remote: {}", creds.url);
                println!("User:   {}", creds.username);
                println!("File:   {}", app.sync_client().remote_path());
            }
            None => println!("Remote backup is not configured"),
        },
        SyncCommand::Test => {
            require_remote(app)?;
            if app.test_remote().await {
                println!("✓ Remote reachable");
            } else {
                bail!("Remote unreachable. See the log for details");
            }
        }
        SyncCommand::Upload => {
            require_remote(app)?;
            let outcome = app.backup(Some(progress_printer("Uploading"))).await;
            eprintln!();
            report_outcome("Backup", outcome)?;
        }
        SyncCommand::Download { yes } => {
            require_remote(app)?;
            if !confirm("Replace all local tasks with the remote copy?", yes)? {
                return Ok(());
            }
            let outcome = app.restore(Some(progress_printer("Downloading"))).await?;
            eprintln!();
            report_outcome("Restore", outcome)?;
            println!(
                "{} todos, {} countdowns",
                app.todos.snapshot().len(),
                app.countdowns.snapshot().len()
            );
        }
        SyncCommand::Logout => {
            app.disconnect_remote()?;
            println!("✓ Credentials removed");
        }
    }
    Ok(())
}

fn report_outcome(action: &str, outcome: SyncOutcome) -> Result<()> {
    match outcome {
        SyncOutcome::Completed => {
            println!("✓ {action} complete");
            Ok(())
        }
        SyncOutcome::Failed => bail!("{action} failed. See the log for details"),
        SyncOutcome::Busy => bail!("Another transfer is already running"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_id_by_prefix() {
        let now = Utc::now();
        let a = DeadlineTask::with_id(Some("abc123".to_string()), "A", now, false);
        let b = DeadlineTask::with_id(Some("abd456".to_string()), "B", now, false);
        let items = vec![a, b];

        assert_eq!(resolve_id(&items, "abc").unwrap(), "abc123");
        assert_eq!(resolve_id(&items, "abd456").unwrap(), "abd456");
        assert!(resolve_id(&items, "ab").is_err());
        assert!(resolve_id(&items, "zzz").is_err());
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::hours(50)), "2d 2h left");
        assert_eq!(format_remaining(Duration::minutes(90)), "1h 30m left");
        assert_eq!(format_remaining(Duration::seconds(-5)), "ended");
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(check_duration(&Span::default()).is_err());
        assert!(check_duration(&"0y0m0d".parse().unwrap()).is_err());
        assert!(check_duration(&Span::days(1)).is_ok());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}

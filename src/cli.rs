use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use memo::task::Span;

#[derive(Parser, Debug)]
#[command(name = "memo")]
#[command(about = "Deadline todos and countdowns with WebDAV backup", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage todos with a deadline
    Todo {
        #[command(subcommand)]
        command: TodoCommand,
    },
    /// Manage countdowns
    Countdown {
        #[command(subcommand)]
        command: CountdownCommand,
    },
    /// Back up or restore the task database over WebDAV
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TodoCommand {
    Add {
        title: String,
        /// Due time: RFC 3339, "YYYY-MM-DD HH:MM" or "YYYY-MM-DD" (end of day)
        #[arg(short, long)]
        deadline: String,
    },
    List,
    /// Mark done, or not done again
    Toggle { id: String },
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        deadline: Option<String>,
    },
    Remove { id: String },
    /// Delete every todo
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CountdownCommand {
    Add {
        title: String,
        /// Length such as "7d", "1m", "1y2m3d"
        #[arg(short, long, default_value = "7d")]
        duration: Span,
        /// Start time; defaults to now
        #[arg(short, long)]
        start: Option<String>,
        /// Restart automatically when completed
        #[arg(short, long)]
        recurring: bool,
    },
    List,
    Toggle { id: String },
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        duration: Option<Span>,
        #[arg(short, long)]
        start: Option<String>,
        #[arg(short, long)]
        recurring: Option<bool>,
    },
    Remove { id: String },
    /// Delete every countdown
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Test a WebDAV server and save its credentials
    Login {
        #[arg(long)]
        url: String,
        #[arg(short, long)]
        user: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Show whether remote backup is configured
    Status,
    /// Re-test the saved credentials
    Test,
    /// Upload the local database
    Upload,
    /// Replace local tasks with the remote copy
    Download {
        #[arg(short, long)]
        yes: bool,
    },
    /// Forget the saved credentials
    Logout,
}

/// Parse a user-supplied point in time. Times without an offset are local.
pub fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d").map(|d| {
                d.and_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN))
            })
        })
        .map_err(|_| {
            anyhow!("Invalid time '{input}'. Use YYYY-MM-DD, YYYY-MM-DD HH:MM or RFC 3339")
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{input}' does not exist in the local time zone"))
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stint_ipc::format::{format_duration, format_time_of_day, parse_timestamp};
use stint_ipc::{send_command, Command, Interval, Response, TimerState};

#[derive(Parser)]
#[command(name = "stintctl")]
#[command(about = "Control the Stint stopwatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new interval
    Start,
    /// Pause and record the running interval
    Pause,
    /// Start if idle, pause if running
    Toggle,
    /// Discard all intervals and stop the timer
    Reset {
        /// Required when intervals would be discarded
        #[arg(short, long)]
        yes: bool,
    },
    /// Get timer status
    Status,
    /// List recorded intervals
    List,
    /// Delete an interval
    Delete { id: u64 },
    /// Set the comment of an interval
    Comment { id: u64, text: String },
    /// Move the bounds of an interval
    Edit {
        id: u64,
        /// RFC 3339, epoch milliseconds, or HH:MM[:SS] on the interval's day
        #[arg(short, long)]
        start: Option<String>,
        /// RFC 3339, epoch milliseconds, or HH:MM[:SS] on the interval's day
        #[arg(short, long)]
        end: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Convert CLI command to IPC command
    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Pause => Command::Pause,
        Commands::Toggle => Command::Toggle,
        Commands::Reset { yes } => {
            if !yes {
                let count = interval_count(send_command(Command::Status).await?)?;
                if count > 0 {
                    bail!("reset would discard {} interval(s); pass --yes to confirm", count);
                }
            }
            Command::Reset
        }
        Commands::Status => Command::Status,
        Commands::List => Command::ListIntervals,
        Commands::Delete { id } => Command::DeleteInterval { id },
        Commands::Comment { id, text } => Command::Comment { id, text },
        Commands::Edit { id, start, end } => edit_command(id, start, end).await?,
    };

    // Send command and get response
    let response = send_command(command).await?;

    // Handle response
    match response {
        Response::Ok => println!("OK"),
        Response::Started => println!("Started"),
        Response::Paused(interval) => {
            println!("Paused after {}", format_duration(interval.duration))
        }
        Response::Unchanged => println!("Unchanged"),
        Response::Status(status) => {
            println!("State: {:?}", status.state);
            println!("Total: {}", format_duration(status.total_ms));
            if status.state == TimerState::Running {
                println!("Current: {}", format_duration(status.current_ms));
            }
            println!("Intervals: {}", status.intervals);
        }
        Response::Intervals(intervals) => {
            for interval in &intervals {
                print_interval(interval);
            }
        }
        Response::Interval(interval) => print_interval(&interval),
        Response::NotFound(id) => bail!("no interval with id {}", id),
        Response::Error(e) => bail!(e),
    }

    Ok(())
}

fn interval_count(response: Response) -> Result<usize> {
    match response {
        Response::Status(status) => Ok(status.intervals),
        Response::Error(e) => bail!(e),
        other => bail!("unexpected response: {:?}", other),
    }
}

async fn edit_command(id: u64, start: Option<String>, end: Option<String>) -> Result<Command> {
    if start.is_none() && end.is_none() {
        bail!("nothing to edit; pass --start and/or --end");
    }

    let current = match send_command(Command::ListIntervals).await? {
        Response::Intervals(intervals) => intervals.into_iter().find(|i| i.id == id),
        Response::Error(e) => bail!(e),
        other => bail!("unexpected response: {:?}", other),
    };
    let current = current.with_context(|| format!("no interval with id {}", id))?;

    let start_time = resolve(start.as_deref(), current.start_time)?;
    let end_time = resolve(end.as_deref(), current.end_time)?;
    Ok(Command::EditInterval {
        id,
        start_time,
        end_time,
    })
}

fn resolve(input: Option<&str>, current: i64) -> Result<i64> {
    match input {
        Some(text) => parse_timestamp(text, current)
            .with_context(|| format!("could not parse time '{}'", text)),
        None => Ok(current),
    }
}

fn print_interval(interval: &Interval) {
    println!(
        "{:>4}  {:>11} - {:>11}  {}  {}",
        interval.id,
        format_time_of_day(interval.start_time),
        format_time_of_day(interval.end_time),
        format_duration(interval.duration),
        interval.comment
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_keeps_current_when_absent() {
        assert_eq!(resolve(None, 42).unwrap(), 42);
    }

    #[test]
    fn resolve_parses_epoch_and_rejects_garbage() {
        assert_eq!(resolve(Some("1000"), 42).unwrap(), 1_000);
        assert!(resolve(Some("yesterday-ish"), 42).is_err());
    }

    #[test]
    fn cli_parses_edit_flags() {
        let cli = Cli::try_parse_from(["stintctl", "edit", "3", "--start", "09:00", "-e", "10:30"])
            .unwrap();
        match cli.command {
            Commands::Edit { id, start, end } => {
                assert_eq!(id, 3);
                assert_eq!(start.as_deref(), Some("09:00"));
                assert_eq!(end.as_deref(), Some("10:30"));
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn reset_requires_explicit_flag_to_skip_check() {
        let cli = Cli::try_parse_from(["stintctl", "reset"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { yes: false }));

        let cli = Cli::try_parse_from(["stintctl", "reset", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { yes: true }));
    }
}

//! Screen state layered over the ledger. Key handling and IPC commands both
//! funnel through [`App`].

use crate::config::Config;
use crate::ledger::{LedgerError, TimerLedger};
use stint_ipc::format::{format_time_24h, parse_time_of_day};
use stint_ipc::{Command, Interval, Response, TimerStatus};
use tracing::warn;

pub struct App {
    pub ledger: TimerLedger,
    pub config: Config,
    /// Row index into the interval table.
    pub selected: usize,
    pub mode: AppMode,
    pub input_buffer: String,
    /// Last error shown in the status bar until the next action.
    pub message: Option<String>,
    pub should_quit: bool,
}

/// What keystrokes currently mean. Editing modes carry the target interval id.
#[derive(Default, Clone, PartialEq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    EditingComment(u64),
    EditingStart(u64),
    EditingEnd(u64),
    ConfirmReset,
    ShowHelp,
}

impl AppMode {
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            AppMode::EditingComment(_) | AppMode::EditingStart(_) | AppMode::EditingEnd(_)
        )
    }
}

impl App {
    pub fn new(ledger: TimerLedger, config: Config) -> Self {
        Self {
            ledger,
            config,
            selected: 0,
            mode: AppMode::Normal,
            input_buffer: String::new(),
            message: None,
            should_quit: false,
        }
    }

    pub fn now(&self) -> i64 {
        self.ledger.now()
    }

    pub fn selected_interval(&self) -> Option<&Interval> {
        self.ledger.intervals().get(self.selected)
    }

    /// Space bar: pause if running, start otherwise.
    pub fn toggle_timer(&mut self) {
        self.message = None;
        let result = if self.ledger.is_running() {
            let result = self.ledger.pause().map(|_| ());
            // Follow the newest interval.
            self.selected = self.ledger.intervals().len().saturating_sub(1);
            result
        } else {
            self.ledger.start().map(|_| ())
        };
        self.report(result);
    }

    /// Resets immediately, or asks first when history would be lost.
    pub fn request_reset(&mut self) {
        if self.config.behavior.confirm_reset && !self.ledger.intervals().is_empty() {
            self.mode = AppMode::ConfirmReset;
        } else {
            self.reset_timer();
        }
    }

    pub fn confirm_reset(&mut self, confirmed: bool) {
        self.mode = AppMode::Normal;
        if confirmed {
            self.reset_timer();
        }
    }

    pub fn reset_timer(&mut self) {
        self.message = None;
        let result = self.ledger.reset();
        self.selected = 0;
        self.report(result);
    }

    pub fn delete_selected_interval(&mut self) {
        self.message = None;
        if let Some(id) = self.selected_interval().map(|interval| interval.id) {
            let result = self.ledger.delete_interval(id);
            self.clamp_selection();
            self.report(result);
        }
    }

    pub fn begin_edit_comment(&mut self) {
        if let Some(interval) = self.selected_interval().cloned() {
            self.input_buffer = interval.comment;
            self.mode = AppMode::EditingComment(interval.id);
        }
    }

    /// Opens the start-time editor prefilled with `HH:MM:SS`.
    pub fn begin_edit_start(&mut self) {
        if let Some(interval) = self.selected_interval().cloned() {
            self.input_buffer = format_time_24h(interval.start_time);
            self.mode = AppMode::EditingStart(interval.id);
        }
    }

    pub fn begin_edit_end(&mut self) {
        if let Some(interval) = self.selected_interval().cloned() {
            self.input_buffer = format_time_24h(interval.end_time);
            self.mode = AppMode::EditingEnd(interval.id);
        }
    }

    pub fn move_selection_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        let len = self.ledger.intervals().len();
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }

    /// Appends to the input buffer; `'\n'` submits it.
    pub fn handle_char(&mut self, c: char) {
        if !self.mode.is_input() {
            return;
        }
        if c == '\n' {
            self.submit_input();
        } else {
            self.input_buffer.push(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if self.mode.is_input() {
            self.input_buffer.pop();
        }
    }

    pub fn cancel_input(&mut self) {
        self.mode = AppMode::Normal;
        self.input_buffer.clear();
    }

    fn submit_input(&mut self) {
        self.message = None;
        let input = std::mem::take(&mut self.input_buffer);
        match std::mem::take(&mut self.mode) {
            AppMode::EditingComment(id) => {
                let result = self.ledger.update_comment(id, input);
                self.report(result);
            }
            AppMode::EditingStart(id) => self.edit_bound(id, &input, Bound::Start),
            AppMode::EditingEnd(id) => self.edit_bound(id, &input, Bound::End),
            other => self.mode = other,
        }
    }

    fn edit_bound(&mut self, id: u64, input: &str, bound: Bound) {
        let Some(interval) = self.ledger.get(id).cloned() else {
            return;
        };
        let base = match bound {
            Bound::Start => interval.start_time,
            Bound::End => interval.end_time,
        };
        let Some(timestamp) = parse_time_of_day(base, input) else {
            self.message = Some(format!("Invalid time '{}', expected HH:MM[:SS]", input.trim()));
            return;
        };
        let (start, end) = match bound {
            Bound::Start => (timestamp, interval.end_time),
            Bound::End => (interval.start_time, timestamp),
        };
        let result = self.ledger.edit_interval(id, start, end);
        self.report(result);
    }

    /// Applies a command received over IPC.
    pub fn handle_command(&mut self, command: Command) -> Response {
        let response = match command {
            Command::Start => match self.ledger.start() {
                Ok(true) => Response::Started,
                Ok(false) => Response::Unchanged,
                Err(e) => Response::Error(e.to_string()),
            },
            Command::Pause => self.pause_response(),
            Command::Toggle => {
                if self.ledger.is_running() {
                    self.pause_response()
                } else {
                    match self.ledger.start() {
                        Ok(_) => Response::Started,
                        Err(e) => Response::Error(e.to_string()),
                    }
                }
            }
            Command::Reset => match self.ledger.reset() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error(e.to_string()),
            },
            Command::Status => Response::Status(self.status()),
            Command::ListIntervals => Response::Intervals(self.ledger.intervals().to_vec()),
            Command::DeleteInterval { id } => {
                interval_response(id, self.ledger.delete_interval(id))
            }
            Command::Comment { id, text } => {
                interval_response(id, self.ledger.update_comment(id, text))
            }
            Command::EditInterval {
                id,
                start_time,
                end_time,
            } => interval_response(id, self.ledger.edit_interval(id, start_time, end_time)),
        };
        self.clamp_selection();
        response
    }

    pub fn status(&self) -> TimerStatus {
        self.ledger.status(self.now())
    }

    fn pause_response(&mut self) -> Response {
        match self.ledger.pause() {
            Ok(Some(interval)) => Response::Paused(interval),
            Ok(None) => Response::Unchanged,
            Err(e) => Response::Error(e.to_string()),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.ledger.intervals().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn report<T>(&mut self, result: Result<T, LedgerError>) {
        if let Err(e) = result {
            warn!(error = %e, "timer operation failed");
            self.message = Some(e.to_string());
        }
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn interval_response(id: u64, result: Result<Option<Interval>, LedgerError>) -> Response {
    match result {
        Ok(Some(interval)) => Response::Interval(interval),
        Ok(None) => Response::NotFound(id),
        Err(e) => Response::Error(e.to_string()),
    }
}

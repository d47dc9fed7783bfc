use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::debug;

use crate::alarm::model::{SchedulerState, format_fire_at};
use crate::controller::AlarmController;
use crate::selection::Chooser;

const HELP: &str = "\
Commands:
  select             choose a playlist, then a track
  set HH:MM:SS       arm the alarm (24-hour, zero-padded)
  cancel             cancel the pending alarm
  stop               pause playback
  status             show status, alarm and selected track
  help               show this help
  quit               exit";

#[derive(Debug, Clone, Eq, PartialEq)]
enum Command {
    Select,
    Set(String),
    Cancel,
    Stop,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    match verb.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "select" => Command::Select,
        "set" | "alarm" => Command::Set(rest.to_string()),
        "cancel" => Command::Cancel,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(verb.to_string()),
    }
}

/// Line-oriented front end over stdin/stdout (or any reader/writer pair).
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, controller: &AlarmController) -> Result<()> {
        writeln!(self.output, "Spotify alarm clock. Type 'help' for commands.")?;
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                writeln!(self.output)?;
                return Ok(());
            };

            let command = parse_command(&line);
            debug!(?command, "console command");
            match command {
                Command::Empty => continue,
                Command::Quit => return Ok(()),
                Command::Help => {
                    writeln!(self.output, "{HELP}")?;
                    continue;
                }
                Command::Unknown(verb) => {
                    writeln!(self.output, "Unknown command '{verb}'. Type 'help'.")?;
                    continue;
                }
                Command::Status => {
                    self.print_overview(controller)?;
                    continue;
                }
                Command::Select => {
                    let _ = controller.select_track(self);
                }
                Command::Set(time) => {
                    let _ = controller.set_alarm(&time);
                }
                Command::Cancel => {
                    controller.cancel_alarm();
                }
                Command::Stop => {
                    let _ = controller.stop();
                }
            }
            self.print_status(controller)?;
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn print_status(&mut self, controller: &AlarmController) -> Result<()> {
        if let Some(status) = controller.status() {
            writeln!(self.output, "{status}")?;
        }
        Ok(())
    }

    fn print_overview(&mut self, controller: &AlarmController) -> Result<()> {
        match controller.status() {
            Some(status) => writeln!(self.output, "status: {status}")?,
            None => writeln!(self.output, "status: -")?,
        }
        match controller.scheduler_state() {
            SchedulerState::Waiting(spec) => writeln!(
                self.output,
                "alarm: waiting until {}",
                format_fire_at(&spec.fire_at)
            )?,
            state => writeln!(self.output, "alarm: {}", state.label())?,
        }
        match controller.selection() {
            Some(track) => writeln!(self.output, "track: {}", track.display_label)?,
            None => writeln!(self.output, "track: none")?,
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Chooser for Console<R, W> {
    fn choose(&mut self, title: &str, prompt: &str, labels: &[String]) -> Option<usize> {
        let _ = writeln!(self.output, "== {title} ==");
        for (index, label) in labels.iter().enumerate() {
            let _ = writeln!(self.output, "{:>4}) {label}", index + 1);
        }
        loop {
            let _ = write!(self.output, "{prompt} [1-{}, empty to cancel] ", labels.len());
            let _ = self.output.flush();
            let line = match self.read_line() {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return None,
            };
            let answer = line.trim();
            if answer.is_empty()
                || answer.eq_ignore_ascii_case("q")
                || answer.eq_ignore_ascii_case("cancel")
            {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(number) if (1..=labels.len()).contains(&number) => return Some(number - 1),
                _ => {
                    let _ = writeln!(
                        self.output,
                        "Please enter a number between 1 and {}.",
                        labels.len()
                    );
                }
            }
        }
    }
}

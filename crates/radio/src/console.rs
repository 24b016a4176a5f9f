use library::{SkipOutcome, Transport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::RadioConfig;
use crate::state::RadioState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Reload,
    Skip,
    Play,
    Pause,
    Queue,
    Status,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str, config: &RadioConfig) -> Option<Command> {
    let word = line.trim();
    if word.is_empty() {
        return None;
    }
    let command = if word.eq_ignore_ascii_case(config.reload_command.trim()) {
        Command::Reload
    } else if word.eq_ignore_ascii_case(config.skip_command.trim()) {
        Command::Skip
    } else {
        match word.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "queue" => Command::Queue,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            _ => Command::Unknown(word.to_string()),
        }
    };
    Some(command)
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run(state: RadioState) {
    info!(
        "Commands: {}, {}, play, pause, queue, status, quit",
        state.config.reload_command, state.config.skip_command
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("Failed to read console input: {}", err);
                break;
            }
        };
        let command = match parse_command(&line, &state.config) {
            Some(command) => command,
            None => continue,
        };
        if command == Command::Quit {
            break;
        }
        execute(&state, command);
    }
}

pub fn execute(state: &RadioState, command: Command) {
    match command {
        Command::Reload => {
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator.reload().await;
            });
        }
        Command::Skip => {
            let skipper = state.skipper.clone();
            tokio::spawn(async move {
                match skipper.skip().await {
                    SkipOutcome::Skipped => {}
                    outcome => info!("Skip ignored: {:?}", outcome),
                }
            });
        }
        Command::Play => state.transport.play(),
        Command::Pause => state.transport.pause(),
        Command::Queue => log_queue(state),
        Command::Status => log_status(state),
        Command::Quit => {}
        Command::Unknown(word) => warn!("Unknown command: {}", word),
    }
}

fn log_queue(state: &RadioState) {
    let current = state.transport.current_index();
    for (idx, track) in state.transport.snapshot().iter().enumerate() {
        let marker = if Some(idx) == current { ">" } else { " " };
        info!("{} {:>3} {}", marker, idx, track.display_key());
    }
}

fn log_status(state: &RadioState) {
    let orchestrator = &state.orchestrator;
    info!(
        "phase={} loading={} playing={} tracks={} queue={}",
        orchestrator.phase(),
        orchestrator.is_loading(),
        state.transport.is_playing(),
        orchestrator.view().len(),
        state.transport.snapshot().len()
    );
    if let Some(summary) = orchestrator.last_summary() {
        match serde_json::to_string(&summary) {
            Ok(json) => info!("last reload: {}", json),
            Err(err) => warn!("Failed to encode reload summary: {}", err),
        }
    }
}

//! Free-text command surface
//!
//! Phrases such as `record macro loot_run` or `play macro loot_run at 2x` are
//! parsed into a [`MacroCommand`] and run against a [`MacroEngine`]. Every
//! command yields exactly one line of outcome text, rejections included.

use crate::engine::MacroEngine;
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq)]
pub enum MacroCommand {
    /// `None` records under a generated `macro_<unix seconds>` name
    Record { name: Option<String> },
    StopRecording,
    Play { name: String, speed: Option<f64> },
    List,
    Delete { name: String },
    StopPlayback,
    Status,
}

static RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:record\s+macro|start\s+recording|create\s+macro)(?:\s+(\w+))?$").unwrap()
});
static STOP_RECORDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:stop\s+recording|end\s+recording|stop\s+macro|finish\s+macro)$").unwrap()
});
static PLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:play|run|execute)\s+macro(?:\s+(\w+)(?:\s+at\s+(\d*\.?\d+)\s*x?)?)?$")
        .unwrap()
});
static LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:list|show|available)\s+macros?$").unwrap());
static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:delete|remove)\s+macro\s+(\w+)$").unwrap()
});
static STOP_PLAYBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:stop|cancel)\s+(?:playback|playing)$").unwrap()
});
static STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^macros?\s+status$").unwrap());

impl MacroCommand {
    /// Recognise a macro command; `None` if the text is something else
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(caps) = RECORD.captures(&text) {
            let name = caps.get(1).map(|m| m.as_str().to_string());
            return Some(MacroCommand::Record { name });
        }
        if STOP_RECORDING.is_match(&text) {
            return Some(MacroCommand::StopRecording);
        }
        if let Some(caps) = PLAY.captures(&text) {
            let name = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let speed = caps.get(2).and_then(|m| m.as_str().parse().ok());
            return Some(MacroCommand::Play { name, speed });
        }
        if LIST.is_match(&text) {
            return Some(MacroCommand::List);
        }
        if let Some(caps) = DELETE.captures(&text) {
            return Some(MacroCommand::Delete {
                name: caps[1].to_string(),
            });
        }
        if STOP_PLAYBACK.is_match(&text) {
            return Some(MacroCommand::StopPlayback);
        }
        if STATUS.is_match(&text) {
            return Some(MacroCommand::Status);
        }
        None
    }
}

impl MacroEngine {
    /// Run a parsed command and describe the outcome in one line
    pub fn execute(&self, command: &MacroCommand) -> String {
        match command {
            MacroCommand::Record { name } => {
                let name = name
                    .clone()
                    .unwrap_or_else(|| format!("macro_{}", Utc::now().timestamp()));
                let description = format!(
                    "Recorded via command at {}",
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                );
                match self.start_recording(&name, &description) {
                    Ok(()) => format!("Started recording macro '{}'", name),
                    Err(e) => e.to_string(),
                }
            }
            MacroCommand::StopRecording => match self.stop_recording() {
                Ok(summary) => summary.to_string(),
                Err(e) => e.to_string(),
            },
            MacroCommand::Play { name, .. } if name.is_empty() => {
                "Please specify a macro name".to_string()
            }
            MacroCommand::Play { name, speed } => match self.play(name, *speed) {
                Ok(started) => started.to_string(),
                Err(e) => e.to_string(),
            },
            MacroCommand::List => self.describe_macros(),
            MacroCommand::Delete { name } => match self.delete_macro(name) {
                Ok(info) => format!("Deleted macro '{}'", info.name),
                Err(e) => e.to_string(),
            },
            MacroCommand::StopPlayback => match self.stop_playback() {
                Ok(report) => report.to_string(),
                Err(e) => e.to_string(),
            },
            MacroCommand::Status => self.status().to_string(),
        }
    }

    /// Parse and run `text`; `None` if it is not a macro command
    pub fn execute_text(&self, text: &str) -> Option<String> {
        MacroCommand::parse(text).map(|command| self.execute(&command))
    }

    fn describe_macros(&self) -> String {
        let names = self.list_macros();
        if names.is_empty() {
            return "No macros available".to_string();
        }
        let entries: Vec<String> = names
            .iter()
            .map(|name| match self.macro_info(name) {
                Ok(info) => format!(
                    "{} ({} actions, {:.1}s)",
                    name,
                    info.action_count,
                    info.duration_ms as f64 / 1000.0
                ),
                Err(_) => name.clone(),
            })
            .collect();
        format!("Available macros ({}): {}", names.len(), entries.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionRecord};
    use crate::config::MacroConfig;
    use crate::testing::ScriptedSynthesizer;
    use macrobot_input::Point;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn parses_the_dispatcher_phrases() {
        let cases = [
            ("record macro loot_run", MacroCommand::Record { name: Some("loot_run".into()) }),
            ("Start Recording farm", MacroCommand::Record { name: Some("farm".into()) }),
            ("record macro", MacroCommand::Record { name: None }),
            ("stop recording", MacroCommand::StopRecording),
            ("finish   macro", MacroCommand::StopRecording),
            (
                "play macro loot_run",
                MacroCommand::Play { name: "loot_run".into(), speed: None },
            ),
            (
                "run macro loot_run at 2x",
                MacroCommand::Play { name: "loot_run".into(), speed: Some(2.0) },
            ),
            (
                "execute macro a at 0.5",
                MacroCommand::Play { name: "a".into(), speed: Some(0.5) },
            ),
            ("list macros", MacroCommand::List),
            ("available macro", MacroCommand::List),
            ("delete macro old", MacroCommand::Delete { name: "old".into() }),
            ("stop playback", MacroCommand::StopPlayback),
            ("macro status", MacroCommand::Status),
        ];
        for (text, expected) in cases {
            assert_eq!(MacroCommand::parse(text), Some(expected), "{}", text);
        }
    }

    #[test]
    fn ignores_unrelated_text() {
        assert_eq!(MacroCommand::parse("open chests"), None);
        assert_eq!(MacroCommand::parse("record macro two words"), None);
        assert_eq!(MacroCommand::parse(""), None);
    }

    fn engine() -> (tempfile::TempDir, MacroEngine) {
        let dir = tempfile::tempdir().unwrap();
        let config = MacroConfig {
            store_path: Some(dir.path().join("macros.json")),
            recording_interval_ms: 10,
            ..Default::default()
        };
        let engine = MacroEngine::from_config(Arc::new(ScriptedSynthesizer::new()), &config);
        (dir, engine)
    }

    #[test]
    fn every_outcome_is_one_line() {
        let (_dir, engine) = engine();
        let script = [
            ("list macros", "No macros available"),
            ("stop recording", "No recording in progress"),
            ("record macro farm", "Started recording macro 'farm'"),
            (
                "record macro other",
                "Already recording macro 'farm'. Stop current recording first.",
            ),
            ("play macro farm", "Cannot play macro while recording 'farm'"),
            ("stop recording", "Recorded macro 'farm' with 0 actions (0.0s)"),
            ("list macros", "Available macros (1): farm (0 actions, 0.0s)"),
            ("play macro", "Please specify a macro name"),
            ("play macro ghost", "Macro 'ghost' not found"),
            ("delete macro farm", "Deleted macro 'farm'"),
            ("delete macro farm", "Macro 'farm' not found"),
            ("stop playback", "No macro currently playing"),
        ];
        for (text, expected) in script {
            let outcome = engine.execute_text(text).unwrap();
            assert_eq!(outcome, expected, "{}", text);
            assert!(!outcome.contains('\n'));
        }
    }

    #[test]
    fn unnamed_recording_gets_generated_name() {
        let (_dir, engine) = engine();
        let outcome = engine.execute(&MacroCommand::Record { name: None });
        assert!(outcome.starts_with("Started recording macro 'macro_"), "{}", outcome);
        engine.stop_recording().unwrap();

        let names = engine.list_macros();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("macro_"));
        assert!(engine
            .macro_info(&names[0])
            .unwrap()
            .description
            .starts_with("Recorded via command at "));
    }

    #[test]
    fn play_command_honours_speed() {
        let (_dir, engine) = engine();
        let step = ActionRecord::new(Action::move_to(Point::new(1, 1)), Duration::from_millis(10));
        engine.create_macro("hop", "", vec![step]).unwrap();

        assert_eq!(
            engine.execute_text("play macro hop at 2x").unwrap(),
            "Playing macro 'hop' (1 actions) at 2x"
        );
        let report = engine
            .wait_for_playback(Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert!(report.completed());
        assert!(engine
            .execute_text("macro status")
            .unwrap()
            .starts_with("1 macros stored"));
    }
}

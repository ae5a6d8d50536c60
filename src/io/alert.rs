use std::io::Write;
use std::process::{Command, Stdio};

use crate::model::config::AlertConfig;
use crate::ops::scan::AlertEvent;

/// Where fired alerts go. Both calls are fire-and-forget: implementations
/// swallow their own failures.
pub trait AlertSink {
    /// Short audible cue
    fn play_cue(&self);
    /// Visible notification
    fn raise_alert(&self, title: &str, body: &str);
}

/// Rings the terminal bell
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn play_cue(&self) {
        let mut out = std::io::stdout();
        if let Err(e) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            log::debug!("bell failed error={}", e);
        }
    }

    fn raise_alert(&self, _title: &str, _body: &str) {}
}

/// Desktop notification through the platform's command-line notifier
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, body: &str) -> Option<Command> {
        #[cfg(target_os = "macos")]
        {
            let script = format!(
                "display notification {} with title {}",
                applescript_quote(body),
                applescript_quote(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            Some(cmd)
        }
        #[cfg(target_os = "linux")]
        {
            let mut cmd = Command::new("notify-send");
            cmd.args(["--app-name=taskmaster", title, body]);
            Some(cmd)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            let _ = (title, body);
            None
        }
    }
}

#[cfg(target_os = "macos")]
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl AlertSink for DesktopNotifier {
    fn play_cue(&self) {}

    fn raise_alert(&self, title: &str, body: &str) {
        let Some(mut cmd) = Self::command(title, body) else {
            return;
        };
        let spawned = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                // Reap off the UI thread
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => log::warn!("desktop notification failed error={}", e),
        }
    }
}

/// Turns scan events into sink calls according to the alert switches.
pub struct AlertDispatcher {
    pub sound: bool,
    pub desktop: bool,
    pub sinks: Vec<Box<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(sound: bool, desktop: bool, sinks: Vec<Box<dyn AlertSink>>) -> Self {
        AlertDispatcher {
            sound,
            desktop,
            sinks,
        }
    }

    /// Terminal bell plus desktop notifications, gated by config
    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(
            config.sound,
            config.desktop,
            vec![Box::new(TerminalBell), Box::new(DesktopNotifier)],
        )
    }

    /// No sinks at all
    pub fn silent() -> Self {
        Self::new(false, false, Vec::new())
    }

    /// One cue for the whole batch, one alert per event
    pub fn dispatch(&self, events: &[AlertEvent]) {
        if events.is_empty() {
            return;
        }
        if self.sound {
            for sink in &self.sinks {
                sink.play_cue();
            }
        }
        if self.desktop {
            for event in events {
                log::info!(
                    "alert task={} boundary={} at={}",
                    event.task_id,
                    event.boundary.label(),
                    event.at.to_rfc3339()
                );
                let body = event.body();
                for sink in &self.sinks {
                    sink.raise_alert(event.title(), &body);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingSink};
    use super::*;
    use crate::model::task::Boundary;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn event(text: &str, boundary: Boundary) -> AlertEvent {
        AlertEvent {
            task_id: format!("id-{text}"),
            text: text.to_string(),
            boundary,
            at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn dispatcher(sound: bool, desktop: bool) -> (AlertDispatcher, RecordingSink) {
        let sink = RecordingSink::default();
        let d = AlertDispatcher::new(sound, desktop, vec![Box::new(sink.clone())]);
        (d, sink)
    }

    #[test]
    fn test_one_cue_per_batch() {
        let (d, sink) = dispatcher(true, true);
        d.dispatch(&[event("a", Boundary::Start), event("b", Boundary::End)]);
        assert_eq!(
            *sink.calls.borrow(),
            vec![
                Call::Cue,
                Call::Alert("Task started".into(), "\"a\" has started.".into()),
                Call::Alert("Task due".into(), "\"b\" is due now.".into()),
            ]
        );
    }

    #[test]
    fn test_empty_batch_is_silent() {
        let (d, sink) = dispatcher(true, true);
        d.dispatch(&[]);
        assert!(sink.calls.borrow().is_empty());
    }

    #[test]
    fn test_switches() {
        let (d, sink) = dispatcher(false, true);
        d.dispatch(&[event("a", Boundary::End)]);
        assert_eq!(sink.calls.borrow().len(), 1);
        assert!(matches!(sink.calls.borrow()[0], Call::Alert(..)));

        let (d, sink) = dispatcher(true, false);
        d.dispatch(&[event("a", Boundary::End), event("b", Boundary::End)]);
        assert_eq!(*sink.calls.borrow(), vec![Call::Cue]);
    }

    #[test]
    fn test_from_config_reads_switches() {
        let d = AlertDispatcher::from_config(&AlertConfig {
            sound: false,
            desktop: true,
        });
        assert!(!d.sound);
        assert!(d.desktop);
        assert_eq!(d.sinks.len(), 2);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot presenter: prints every published snapshot as one JSON line.

use robolab_sequencer::{Conveyor, Crane, Subscription};
use serde::Serialize;
use std::io::Write;

/// Keeps the subscriptions that feed the output alive
#[derive(Debug, Default)]
pub struct Presenter {
    subscriptions: Vec<Subscription>,
}

impl Presenter {
    /// Create a presenter with no attached robots
    pub fn new() -> Self {
        Self::default()
    }

    /// Print every snapshot of a crane
    pub fn attach_crane(&mut self, crane: &Crane) {
        self.subscriptions
            .push(crane.subscribe(|snapshot| emit("crane", snapshot)));
    }

    /// Print every snapshot of a conveyor
    pub fn attach_conveyor(&mut self, belt: &Conveyor) {
        self.subscriptions
            .push(belt.subscribe(|snapshot| emit("conveyor", snapshot)));
    }

    /// Number of robots attached
    pub fn attached(&self) -> usize {
        self.subscriptions.len()
    }
}

#[derive(Serialize)]
struct Line<'a, S> {
    kind: &'a str,
    #[serde(flatten)]
    snapshot: &'a S,
}

/// Render a snapshot as a JSON line
pub fn render<S: Serialize>(kind: &str, snapshot: &S) -> serde_json::Result<String> {
    serde_json::to_string(&Line { kind, snapshot })
}

fn emit<S: Serialize>(kind: &str, snapshot: &S) {
    let line = match render(kind, snapshot) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!("Failed to render {kind} snapshot: {e}");
            return;
        }
    };
    if let Err(e) = writeln!(std::io::stdout().lock(), "{line}") {
        tracing::warn!("Failed to write {kind} snapshot: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robolab_sequencer::{Command, CraneConfig};

    #[test]
    fn test_render_crane_line() {
        let crane = Crane::new(CraneConfig::new("CR-J")).unwrap();
        crane.issue_command(Command::PowerOn);

        let line = render("crane", &crane.snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["kind"], "crane");
        assert_eq!(value["serial"], "CR-J");
        assert_eq!(value["state"]["command_state"], "power-on");
        assert_eq!(value["state"]["sub_state"], serde_json::Value::Null);
    }

    #[test]
    fn test_attach_keeps_subscriptions() {
        let crane = Crane::new(CraneConfig::default()).unwrap();
        let mut presenter = Presenter::new();
        presenter.attach_crane(&crane);
        assert_eq!(presenter.attached(), 1);
    }
}

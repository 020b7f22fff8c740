//! Host game process detection.

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Answers whether the host game is currently running.
///
/// Deployment refuses to start while the game holds its mods folder open.
pub trait ProcessManager: Send + Sync {
    fn is_host_game_running(&self) -> bool;
}

/// Process names that identify a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub game_process_names: Vec<String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            game_process_names: vec![
                "TS4_x64.exe".to_string(),
                "TS4.exe".to_string(),
                "Sims4.exe".to_string(),
            ],
        }
    }
}

/// [`ProcessManager`] backed by a `sysinfo` process snapshot.
#[derive(Debug, Clone, Default)]
pub struct SysinfoProcessManager {
    config: ProcessConfig,
}

impl SysinfoProcessManager {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    /// Configured names that currently match a running process.
    pub fn running_game_processes(&self) -> Vec<String> {
        let system = System::new_all();

        self.config
            .game_process_names
            .iter()
            .filter(|name| {
                let name: &str = name.as_str();
                system.processes_by_name(name.as_ref()).next().is_some()
            })
            .cloned()
            .collect()
    }
}

impl ProcessManager for SysinfoProcessManager {
    fn is_host_game_running(&self) -> bool {
        let running = self.running_game_processes();
        if !running.is_empty() {
            tracing::info!("Host game running: {}", running.join(", "));
        }
        !running.is_empty()
    }
}

//! Broker-tuning configuration (spec §9 "Configuration"): the listen
//! socket and the capacity bounds the broker was compiled with. Loading
//! *this* config file is the one place spec.md's "configuration file
//! loading" Non-goal does not apply — that Non-goal is about device/runtime
//! configuration, not the broker's own process settings.

use serde::Deserialize;

use xrbroker_proto::limits::{MAX_CLIENTS, MAX_DEVICES, MAX_LAYERS, MAX_SLOTS};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Path of the Unix domain socket to listen on, unless overridden by
    /// systemd socket activation (`LISTEN_FDS`/`LISTEN_PID`).
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    #[serde(default)]
    pub limits: ConfiguredLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            limits: ConfiguredLimits::default(),
        }
    }
}

fn default_socket_path() -> String {
    "/run/xrbroker/broker.sock".to_string()
}

/// The capacity bounds the operator believes the broker was built with.
/// These array sizes are compiled into the wire structs
/// (`xrbroker-proto::limits`) and cannot be changed at runtime; this struct
/// exists so a mismatched config is caught and reported at startup instead
/// of silently truncating client state (spec §9).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConfiguredLimits {
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,
    #[serde(default = "default_max_layers")]
    pub max_layers: usize,
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
}

impl Default for ConfiguredLimits {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            max_slots: default_max_slots(),
            max_layers: default_max_layers(),
            max_devices: default_max_devices(),
        }
    }
}

fn default_max_clients() -> usize {
    MAX_CLIENTS
}
fn default_max_slots() -> usize {
    MAX_SLOTS
}
fn default_max_layers() -> usize {
    MAX_LAYERS
}
fn default_max_devices() -> usize {
    MAX_DEVICES
}

impl ConfiguredLimits {
    /// The wire layout's array sizes are fixed at compile time; a config
    /// file that disagrees with them cannot be honored, only reported.
    pub fn mismatches_compiled_limits(&self) -> Vec<String> {
        let mut mismatches = Vec::new();
        if self.max_clients != MAX_CLIENTS {
            mismatches.push(format!(
                "max_clients: configured {} but compiled with {}",
                self.max_clients, MAX_CLIENTS
            ));
        }
        if self.max_slots != MAX_SLOTS {
            mismatches.push(format!(
                "max_slots: configured {} but compiled with {}",
                self.max_slots, MAX_SLOTS
            ));
        }
        if self.max_layers != MAX_LAYERS {
            mismatches.push(format!(
                "max_layers: configured {} but compiled with {}",
                self.max_layers, MAX_LAYERS
            ));
        }
        if self.max_devices != MAX_DEVICES {
            mismatches.push(format!(
                "max_devices: configured {} but compiled with {}",
                self.max_devices, MAX_DEVICES
            ));
        }
        mismatches
    }
}

//! Node configuration
//!
//! Loaded from a TOML file; every section falls back to defaults that match
//! a three-node LAN deployment.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::MAX_PIXELS;
use crate::constants::*;
use crate::error::ConfigError;
use crate::input::keys::{KeyAction, KeyBindings};
use crate::peers::{PeerDirectory, PeerId, PeerInfo};
use crate::protocol::HEADER_SIZE;

/// Complete node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    pub peers: Vec<PeerInfo>,
    pub network: NetworkConfig,
    pub camera: CameraConfig,
    pub codec: CodecConfig,
    pub stream: StreamConfig,
    pub transition: TransitionConfig,
    pub effects: EffectConfig,
    pub buttons: ButtonConfig,
    /// Single-character key -> action
    pub keys: BTreeMap<String, KeyAction>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let peer = |id: &str, last_octet: u8, name: &str| PeerInfo {
            id: PeerId::new(id),
            address: [192, 168, 1, last_octet].into(),
            name: name.to_string(),
        };

        let keys = [
            ("q", KeyAction::Quit),
            ("m", KeyAction::RotateView),
            ("1", KeyAction::RotateView),
            ("s", KeyAction::Skip),
        ]
        .into_iter()
        .map(|(k, a)| (k.to_string(), a))
        .collect();

        Self {
            node: NodeConfig::default(),
            peers: vec![
                peer("nano_A", 101, "Jetson_A"),
                peer("nano_B", 102, "Jetson_B"),
                peer("nano_C", 103, "Jetson_C"),
            ],
            network: NetworkConfig::default(),
            camera: CameraConfig::default(),
            codec: CodecConfig::default(),
            stream: StreamConfig::default(),
            transition: TransitionConfig::default(),
            effects: EffectConfig::default(),
            buttons: ButtonConfig::default(),
            keys,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's id; must appear in `peers`
    pub id: PeerId,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: PeerId::new("nano_A"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port every node listens on and sends to
    pub udp_port: u16,
    /// Maximum datagram size including the chunk header
    pub max_datagram: usize,
    pub receive_timeout_ms: u64,
    /// Lifetime of an incomplete frame before its chunks are discarded
    pub reassembly_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            max_datagram: DEFAULT_MAX_DATAGRAM,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
            reassembly_timeout_ms: DEFAULT_REASSEMBLY_TIMEOUT.as_millis() as u64,
        }
    }
}

impl NetworkConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.reassembly_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// `"test-pattern"`, `"device:N"` (opencv builds), or a path to a raw
    /// clip file played in a loop
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// Capture rate cap; 0 disables limiting
    pub fps_limit: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: "test-pattern".to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            fps_limit: DEFAULT_FPS_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// 1 (smallest) to 100 (lossless)
    pub quality: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Decoded frames kept per peer
    pub cache_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cache_depth: DEFAULT_CACHE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Directory holding transition clips; missing or empty disables clips
    pub clip_dir: PathBuf,
    /// Chance in [0, 1] that a switch plays a clip
    pub probability: f64,
    /// Output resolution clips are scaled to
    pub width: u32,
    pub height: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            clip_dir: PathBuf::from("clips"),
            probability: DEFAULT_TRANSITION_PROBABILITY,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub glitch_duration_ms: u64,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            glitch_duration_ms: DEFAULT_GLITCH_DURATION.as_millis() as u64,
        }
    }
}

impl EffectConfig {
    pub fn glitch_duration(&self) -> Duration {
        Duration::from_millis(self.glitch_duration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Serial device path, `"auto"` to detect, or absent to disable
    pub port: Option<String>,
    /// Serial line rate
    pub baud: u32,
    /// Key injected when the button release message arrives
    pub release_key: char,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            release_key: '1',
        }
    }
}

impl AppConfig {
    /// Default config file location for this user
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lan-video-mesh").map(|dirs| dirs.config_dir().join("node.toml"))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load from an explicit path, else the default location, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::info!("No config file found, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.codec.quality) {
            return Err(ConfigError::invalid("codec.quality", format!("{} not in 1-100", self.codec.quality)));
        }
        if !(0.0..=1.0).contains(&self.transition.probability) {
            return Err(ConfigError::invalid(
                "transition.probability",
                format!("{} not in [0, 1]", self.transition.probability),
            ));
        }
        if self.network.max_datagram <= HEADER_SIZE || self.network.max_datagram > MAX_UDP_PAYLOAD {
            return Err(ConfigError::invalid(
                "network.max_datagram",
                format!("{} not in {}..={}", self.network.max_datagram, HEADER_SIZE + 1, MAX_UDP_PAYLOAD),
            ));
        }
        let max_receive_timeout = LOOP_JOIN_TIMEOUT.as_millis() as u64;
        if !(1..=max_receive_timeout).contains(&self.network.receive_timeout_ms) {
            return Err(ConfigError::invalid(
                "network.receive_timeout_ms",
                format!("{} not in 1..={}", self.network.receive_timeout_ms, max_receive_timeout),
            ));
        }
        if self.network.reassembly_timeout_ms == 0 {
            return Err(ConfigError::invalid("network.reassembly_timeout_ms", "must be non-zero"));
        }
        if self.stream.cache_depth == 0 {
            return Err(ConfigError::invalid("stream.cache_depth", "must be at least 1"));
        }
        if !resolution_in_range(self.camera.width, self.camera.height) {
            return Err(ConfigError::invalid(
                "camera",
                format!("{}x{} is empty or above {} pixels", self.camera.width, self.camera.height, MAX_PIXELS),
            ));
        }
        if !resolution_in_range(self.transition.width, self.transition.height) {
            return Err(ConfigError::invalid(
                "transition",
                format!(
                    "{}x{} is empty or above {} pixels",
                    self.transition.width, self.transition.height, MAX_PIXELS
                ),
            ));
        }
        if self.buttons.port.is_some() && self.buttons.baud == 0 {
            return Err(ConfigError::invalid("buttons.baud", "must be non-zero"));
        }
        if !self.peers.iter().any(|p| p.id == self.node.id) {
            return Err(ConfigError::invalid("node.id", format!("{} is not listed in peers", self.node.id)));
        }
        for (i, peer) in self.peers.iter().enumerate() {
            if self.peers[..i].iter().any(|p| p.id == peer.id) {
                return Err(ConfigError::invalid("peers", format!("duplicate id {}", peer.id)));
            }
        }
        self.key_bindings()?;
        Ok(())
    }

    pub fn peer_directory(&self) -> PeerDirectory {
        PeerDirectory::new(self.peers.clone())
    }

    /// Key table as byte key codes
    pub fn key_bindings(&self) -> Result<KeyBindings, ConfigError> {
        let mut bindings = KeyBindings::new();
        for (key, action) in &self.keys {
            let mut bytes = key.bytes();
            match (bytes.next(), bytes.next()) {
                (Some(code), None) => bindings.bind(code, *action),
                _ => {
                    return Err(ConfigError::invalid("keys", format!("{:?} is not a single ASCII key", key)));
                }
            }
        }
        Ok(bindings)
    }
}

fn resolution_in_range(width: u32, height: u32) -> bool {
    width > 0
        && height > 0
        && (width as usize)
            .checked_mul(height as usize)
            .map(|pixels| pixels <= MAX_PIXELS)
            .unwrap_or(false)
}

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use osd_protocol::{MAX_FRAME_BODY, MAX_MESSAGE_SIZE};
use osd_types::{PeerAddr, PeerId};
use serde::{Deserialize, Serialize};

use crate::error::{OsdError, OsdResult};
use crate::liveness::{AlwaysAnswer, LivenessPolicy, PlayDead};

/// Which [`ObjectStore`](osd_store::ObjectStore) backend the daemon opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Daemon configuration, loadable from TOML. Missing keys take defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsdConfig {
    /// This daemon's identity.
    pub whoami: u32,
    pub bind_addr: SocketAddr,
    /// Parent of the per-daemon `osd<whoami>/` directory.
    pub data_dir: PathBuf,
    pub store: StoreBackend,
    /// Identities that never answer pings.
    pub play_dead: Vec<u32>,
    pub max_message_size: usize,
}

impl Default for OsdConfig {
    fn default() -> Self {
        Self {
            whoami: 0,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6800)),
            data_dir: PathBuf::from("./osddata"),
            store: StoreBackend::File,
            play_dead: Vec::new(),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl OsdConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> OsdResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> OsdResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| OsdError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> OsdResult<String> {
        toml::to_string_pretty(self).map_err(|e| OsdError::Config(e.to_string()))
    }

    pub fn validate(&self) -> OsdResult<()> {
        if self.max_message_size == 0 {
            return Err(OsdError::Config(
                "max_message_size must be greater than zero".into(),
            ));
        }
        if self.max_message_size > MAX_FRAME_BODY {
            return Err(OsdError::Config(format!(
                "max_message_size must be at most {MAX_FRAME_BODY}"
            )));
        }
        if self.store == StoreBackend::File && self.data_dir.as_os_str().is_empty() {
            return Err(OsdError::Config(
                "data_dir is required for the file store".into(),
            ));
        }
        Ok(())
    }

    pub fn identity(&self) -> PeerId {
        PeerId(self.whoami)
    }

    /// Address this daemon stamps on its replies.
    pub fn local_peer_addr(&self) -> PeerAddr {
        PeerAddr::new(self.identity(), 0)
    }

    pub fn liveness_policy(&self) -> Box<dyn LivenessPolicy> {
        if self.play_dead.is_empty() {
            Box::new(AlwaysAnswer)
        } else {
            Box::new(PlayDead::new(self.play_dead.iter().copied().map(PeerId)))
        }
    }
}

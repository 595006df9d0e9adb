//! MME Configuration
//!
//! YAML configuration under the top-level `mme:` section. Missing keys take
//! their defaults; a missing file yields the default configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::PlmnId;
use crate::ids::RUNTIME_M_TMSI_SEED;

/// S1AP port
pub const OGS_S1AP_SCTP_PORT: u16 = 36412;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// S1AP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S1apConf {
    pub addr: IpAddr,
    pub port: u16,
}

impl Default for S1apConf {
    fn default() -> Self {
        Self {
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: OGS_S1AP_SCTP_PORT,
        }
    }
}

/// PLMN ID as decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlmnConf {
    pub mcc: String,
    pub mnc: String,
}

impl Default for PlmnConf {
    fn default() -> Self {
        Self { mcc: "001".to_string(), mnc: "01".to_string() }
    }
}

impl PlmnConf {
    pub fn plmn_id(&self) -> PlmnId {
        PlmnId::new(&self.mcc, &self.mnc)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if self.mcc.len() != 3 || !digits(&self.mcc) {
            return Err(ConfigError::ValidationError(format!("invalid MCC '{}'", self.mcc)));
        }
        if !(2..=3).contains(&self.mnc.len()) || !digits(&self.mnc) {
            return Err(ConfigError::ValidationError(format!("invalid MNC '{}'", self.mnc)));
        }
        Ok(())
    }
}

/// Served GUMMEI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GummeiConf {
    pub plmn_id: PlmnConf,
    pub mme_gid: u16,
    pub mme_code: u8,
}

impl Default for GummeiConf {
    fn default() -> Self {
        Self { plmn_id: PlmnConf::default(), mme_gid: 1, mme_code: 0x1a }
    }
}

/// Served TAI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaiConf {
    #[serde(default)]
    pub plmn_id: PlmnConf,
    pub tac: u16,
}

/// MME configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MmeConfig {
    /// MME name sent in S1 Setup Response
    pub mme_name: String,
    /// S1AP listener
    pub s1ap: S1apConf,
    /// Served GUMMEI
    pub gummei: GummeiConf,
    /// Served TAIs; empty means any TAC is accepted
    pub tai: Vec<TaiConf>,
    /// Relative MME capacity
    pub relative_capacity: u8,
    /// First M-TMSI handed out
    pub m_tmsi_seed: u32,
}

impl Default for MmeConfig {
    fn default() -> Self {
        Self {
            mme_name: "nextgcore-mme".to_string(),
            s1ap: S1apConf::default(),
            gummei: GummeiConf::default(),
            tai: vec![TaiConf { plmn_id: PlmnConf::default(), tac: 7 }],
            relative_capacity: 255,
            m_tmsi_seed: RUNTIME_M_TMSI_SEED,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mme: Option<MmeConfig>,
}

impl MmeConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let config = match file.mme {
            Some(config) => config,
            None => {
                log::warn!("No 'mme' section in config file");
                MmeConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading configuration from: {}", path.display());

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Could not read config file '{}': {}. Using defaults.", path.display(), e);
                return Ok(MmeConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source });
            }
        };
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mme_name.is_empty() {
            return Err(ConfigError::ValidationError("mme_name is empty".to_string()));
        }
        self.gummei.plmn_id.validate()?;
        for tai in &self.tai {
            tai.plmn_id.validate()?;
        }
        Ok(())
    }

    /// Listen address of the S1AP server
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.s1ap.addr, self.s1ap.port)
    }

    /// PLMN of the served GUMMEI
    pub fn served_plmn(&self) -> PlmnId {
        self.gummei.plmn_id.plmn_id()
    }

    /// Whether a TAC is served; true for any TAC when no TAI is configured
    pub fn serves_tac(&self, tac: u16) -> bool {
        self.tai.is_empty() || self.tai.iter().any(|t| t.tac == tac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MmeConfig::default();
        assert_eq!(config.bind_addr().port(), OGS_S1AP_SCTP_PORT);
        assert_eq!(config.m_tmsi_seed, 0xf000);
        assert_eq!(config.served_plmn().to_bcd(), "00101");
        assert!(config.serves_tac(7));
        assert!(!config.serves_tac(8));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
mme:
  mme_name: mme-test
  s1ap:
    addr: 10.0.0.1
    port: 5000
  gummei:
    plmn_id:
      mcc: "310"
      mnc: "410"
    mme_gid: 4
    mme_code: 2
  tai:
    - plmn_id:
        mcc: "310"
        mnc: "410"
      tac: 100
    - tac: 101
  relative_capacity: 10
"#;
        let config = MmeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.mme_name, "mme-test");
        assert_eq!(config.bind_addr(), "10.0.0.1:5000".parse().unwrap());
        assert_eq!(config.served_plmn().to_bcd(), "310410");
        assert_eq!(config.gummei.mme_gid, 4);
        assert_eq!(config.tai.len(), 2);
        assert!(config.serves_tac(101));
        assert_eq!(config.relative_capacity, 10);
        // Not in the file
        assert_eq!(config.m_tmsi_seed, RUNTIME_M_TMSI_SEED);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = MmeConfig::from_yaml_str("logger:\n  level: info\n").unwrap();
        assert_eq!(config, MmeConfig::default());
    }

    #[test]
    fn test_empty_tai_serves_any_tac() {
        let config = MmeConfig::from_yaml_str("mme:\n  tai: []\n").unwrap();
        assert!(config.serves_tac(1234));
    }

    #[test]
    fn test_invalid_plmn_rejected() {
        let yaml = "mme:\n  gummei:\n    plmn_id:\n      mcc: \"01\"\n      mnc: \"01\"\n";
        assert!(matches!(
            MmeConfig::from_yaml_str(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_sample_config_parses() {
        let config = MmeConfig::from_yaml_str(include_str!("../mme.yaml")).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.2:36412".parse().unwrap());
        assert_eq!(config.m_tmsi_seed, RUNTIME_M_TMSI_SEED);
        assert!(config.serves_tac(1));
    }

    #[test]
    fn test_load_missing_file() {
        let config = MmeConfig::load("/nonexistent/nextgcore/mme.yaml").unwrap();
        assert_eq!(config, MmeConfig::default());
    }
}

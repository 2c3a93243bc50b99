//! JSON configuration for a quorum read: how many replicas are queried, how their replies are merged
//! and how long a caller is willing to wait for the merged result.
use std::{hash::Hash, path::Path, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    merge::{threshold::ThresholdMerger, Merger},
    vote::voter::{BytesVoter, HashVoter},
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Number of replicas each read fans out to
    pub replicas: usize,
    pub get_timeout_ms: u64,
    pub merger: MergerConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergerConfig {
    /// Quorum read: at least `threshold` replicas must agree
    Threshold(ThresholdConfig),
    /// First replica (in replica order) that has a value
    First,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThresholdConfig {
    pub threshold: usize,
    #[serde(default)]
    pub voter: VoterKind,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterKind {
    #[default]
    Hash,
    Bytes,
}

impl Config {
    /// Reads and validates the config stored at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let stringified_json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&stringified_json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig {
                reason: "replicas must be at least 1".to_string(),
            });
        }

        if let MergerConfig::Threshold(ThresholdConfig { threshold, .. }) = &self.merger {
            if *threshold == 0 || *threshold > self.replicas {
                return Err(Error::InvalidConfig {
                    reason: format!(
                        "threshold ({}) must be between 1 and replicas ({})",
                        threshold, self.replicas
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_millis(self.get_timeout_ms)
    }

    /// Builds the merger described by this config. Replies are `Option<V>` (`None` meaning "no value").
    pub fn merger<V>(&self) -> Result<Arc<dyn Merger<Option<V>>>>
    where
        V: Hash + AsRef<[u8]> + PartialEq + Clone + Send + Sync + 'static,
    {
        match &self.merger {
            MergerConfig::Threshold(ThresholdConfig { threshold, voter }) => {
                let merger = match voter {
                    VoterKind::Hash => {
                        ThresholdMerger::<V>::with_voter(*threshold, Arc::new(HashVoter))?
                    }
                    VoterKind::Bytes => {
                        ThresholdMerger::<V>::with_voter(*threshold, Arc::new(BytesVoter))?
                    }
                };
                Ok(Arc::new(merger))
            }
            MergerConfig::First => Ok(Arc::new(|values: Vec<Option<V>>| -> Result<Option<V>> {
                Ok(values.into_iter().flatten().next())
            })),
        }
    }
}

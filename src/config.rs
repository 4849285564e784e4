use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    algo::AgentConfig,
    checkpoint::validate_slot,
    error::{Error, Result},
    gym::LevelConfig,
    train::TrainerConfig,
};

/// Everything needed to set up a training session
///
/// Deserializes from JSON; any field left out of the file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub trainer: TrainerConfig,
    pub level: LevelConfig,
    pub checkpoint_dir: PathBuf,
    /// Slot restored into the agent before training, when present
    pub resume_slot: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let trainer = TrainerConfig::default();
        Self {
            agent: AgentConfig::default(),
            resume_slot: Some(trainer.best_slot.clone()),
            trainer,
            level: LevelConfig::default(),
            checkpoint_dir: PathBuf::from("saved_agents"),
        }
    }
}

impl Config {
    /// Read and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| Error::io(format!("open {}", path.display()), e))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.agent.validate()?;
        self.trainer.validate()?;
        self.level.validate()?;
        if self.checkpoint_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "`checkpoint_dir` must not be empty".into(),
            ));
        }
        match &self.resume_slot {
            Some(slot) => validate_slot(slot),
            None => Ok(()),
        }
    }
}

use qjack::training::TrainingConfig;
use qjack::{GameRules, Hyperparameters, RulesPreset};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "~/.qjack.yml";
const DEFAULT_CONFIG_FILE_NAME: &str = ".qjack.yml";
/// Preset name meaning `GameRules::default()`.
const DEFAULT_PRESET: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown rules preset {0:?}")]
    Preset(String),

    #[error("Cannot find home directory")]
    NoHomeDir,
}

impl From<ConfigError> for qjack::Error {
    fn from(error: ConfigError) -> Self {
        qjack::Error::InvalidConfig(error.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rule: ConfigRule,
    pub agent: ConfigAgent,
    pub training: ConfigTraining,
}

/// A named preset with optional per-field overrides on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRule {
    pub preset: String,
    pub number_of_decks: Option<u8>,
    pub dealer_hit_on_soft17: Option<bool>,
    pub payout_blackjack: Option<f64>,
    pub allow_das: Option<bool>,
    pub allow_late_surrender: Option<bool>,
    pub penetration: Option<f64>,
}

impl Default for ConfigRule {
    fn default() -> Self {
        ConfigRule {
            preset: String::from(DEFAULT_PRESET),
            number_of_decks: None,
            dealer_hit_on_soft17: None,
            payout_blackjack: None,
            allow_das: None,
            allow_late_surrender: None,
            penetration: None,
        }
    }
}

impl TryInto<GameRules> for ConfigRule {
    type Error = ConfigError;

    fn try_into(self) -> Result<GameRules, Self::Error> {
        let base = if self.preset == DEFAULT_PRESET {
            GameRules::default()
        } else {
            let preset: RulesPreset = self
                .preset
                .parse()
                .map_err(|_| ConfigError::Preset(self.preset.clone()))?;
            GameRules::from_preset(preset)
        };

        Ok(GameRules {
            num_decks: self.number_of_decks.unwrap_or(base.num_decks),
            dealer_hits_soft17: self.dealer_hit_on_soft17.unwrap_or(base.dealer_hits_soft17),
            blackjack_payout: self.payout_blackjack.unwrap_or(base.blackjack_payout),
            double_after_split: self.allow_das.unwrap_or(base.double_after_split),
            surrender: self.allow_late_surrender.unwrap_or(base.surrender),
            penetration: self.penetration.unwrap_or(base.penetration),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigAgent {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
    pub seed: Option<u64>,
}

impl Default for ConfigAgent {
    fn default() -> Self {
        let params = Hyperparameters::default();
        ConfigAgent {
            learning_rate: params.learning_rate,
            discount_factor: params.discount_factor,
            epsilon: params.epsilon,
            epsilon_decay: params.epsilon_decay,
            epsilon_min: params.epsilon_min,
            seed: None,
        }
    }
}

impl ConfigAgent {
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            learning_rate: self.learning_rate,
            discount_factor: self.discount_factor,
            epsilon: self.epsilon,
            epsilon_decay: self.epsilon_decay,
            epsilon_min: self.epsilon_min,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigTraining {
    pub episodes: u64,
    pub eval_frequency: u64,
    pub eval_games: usize,
    pub checkpoint_frequency: u64,
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    pub report_dir: Option<PathBuf>,
    pub verbose: bool,
    pub early_stopping_patience: usize,
    pub min_improvement: f64,
    pub seed: Option<u64>,
}

impl Default for ConfigTraining {
    fn default() -> Self {
        let training = TrainingConfig::default();
        ConfigTraining {
            episodes: training.num_episodes,
            eval_frequency: training.eval_frequency,
            eval_games: training.eval_games,
            checkpoint_frequency: training.checkpoint_frequency,
            checkpoint_dir: training.checkpoint_dir,
            log_dir: training.log_dir,
            report_dir: Some(PathBuf::from("./reports")),
            verbose: training.verbose,
            early_stopping_patience: training.early_stopping_patience,
            min_improvement: training.min_improvement,
            seed: training.seed,
        }
    }
}

impl Config {
    /// Combines the three sections into the trainer's configuration.
    pub fn training_config(&self) -> Result<TrainingConfig, ConfigError> {
        let training = &self.training;
        Ok(TrainingConfig {
            num_episodes: training.episodes,
            eval_frequency: training.eval_frequency,
            eval_games: training.eval_games,
            checkpoint_frequency: training.checkpoint_frequency,
            checkpoint_dir: training.checkpoint_dir.clone(),
            log_dir: training.log_dir.clone(),
            report_dir: training.report_dir.clone(),
            verbose: training.verbose,
            early_stopping_patience: training.early_stopping_patience,
            min_improvement: training.min_improvement,
            game_rules: self.rule.clone().try_into()?,
            rules_name: self.rule.preset.clone(),
            hyperparameters: self.agent.hyperparameters(),
            seed: training.seed,
        })
    }
}

/// Reads the content of a given config file and parses it to a Config.
pub fn parse_config_from_file(filename: &Path) -> Result<Config, ConfigError> {
    let file_content = fs::read_to_string(filename).map_err(|source| ConfigError::Io {
        path: filename.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&file_content)?)
}

/// Loads `path`, or `~/.qjack.yml` when `path` is the default. A missing
/// default file yields the built-in defaults; a missing explicit file is an error.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    if path != DEFAULT_CONFIG_PATH {
        return parse_config_from_file(Path::new(path));
    }
    let home_dir = home::home_dir().ok_or(ConfigError::NoHomeDir)?;
    let config_file_path = home_dir.join(DEFAULT_CONFIG_FILE_NAME);
    if config_file_path.is_file() {
        parse_config_from_file(&config_file_path)
    } else {
        Ok(Config::default())
    }
}

/// Terminal logging at Info, plus a Debug file log at `<log_dir>/<unix-seconds>.log`
/// when a directory is given.
pub fn init_logging(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![term];

    if let Some(dir) = log_dir {
        let time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs();
        fs::create_dir_all(dir)?;
        let file = fs::File::create(dir.join(format!("{}.log", time)))?;
        loggers.push(simplelog::WriteLogger::new(
            log::LevelFilter::Debug,
            config,
            file,
        ));
    }
    simplelog::CombinedLogger::init(loggers)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_typical_config_rule() -> ConfigRule {
        ConfigRule {
            preset: String::from("atlantic-city"),
            number_of_decks: Some(4),
            penetration: Some(0.5),
            ..Default::default()
        }
    }

    #[test]
    fn can_convert_rule() {
        let config_rule = get_typical_config_rule();
        let converted_rule: GameRules = config_rule.try_into().unwrap();
        assert_eq!(converted_rule.num_decks, 4);
        assert_eq!(converted_rule.penetration, 0.5);
        assert!(converted_rule.surrender);
        assert!(!converted_rule.dealer_hits_soft17);
    }

    #[test]
    fn default_preset_is_default_rules() {
        let converted_rule: GameRules = ConfigRule::default().try_into().unwrap();
        assert_eq!(converted_rule, GameRules::default());
    }

    #[test]
    fn should_return_error_when_converting_rule() {
        let mut config_rule = get_typical_config_rule();
        config_rule.preset = String::from("Not a preset");
        let convert_result: Result<GameRules, ConfigError> = config_rule.try_into();
        assert!(matches!(convert_result, Err(ConfigError::Preset(_))));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = concat!(
            "rule:\n  preset: downtown\n",
            "agent:\n  learning_rate: 0.2\n",
            "training:\n  episodes: 5000\n",
        );
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let training = config.training_config().unwrap();
        assert_eq!(training.num_episodes, 5000);
        assert_eq!(training.eval_frequency, 10_000);
        assert_eq!(training.game_rules, GameRules::downtown());
        assert_eq!(training.rules_name, "downtown");
        assert_eq!(training.hyperparameters.learning_rate, 0.2);
        assert_eq!(training.hyperparameters.discount_factor, 0.95);
    }

    #[test]
    fn parse_file_and_report_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qjack.yml");
        fs::write(&path, "training:\n  early_stopping_patience: 0\n").unwrap();

        let config = parse_config_from_file(&path).unwrap();
        assert_eq!(config.training.early_stopping_patience, 0);
        assert!(matches!(
            load_config(dir.path().join("absent.yml").to_str().unwrap()),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "training: [1, 2").unwrap();
        assert!(matches!(
            parse_config_from_file(&path),
            Err(ConfigError::Yaml(_))
        ));
    }
}

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub paths: PathsConfig,
    pub postprocess: PostprocessConfig,
    pub llm: LlmSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            paths: PathsConfig::default(),
            postprocess: PostprocessConfig::default(),
            llm: LlmSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub base_dir: PathBuf,
    pub template: PathBuf,
    pub customer_reference: PathBuf,
    pub hs_reference: PathBuf,
    /// Per-run job directories (uploaded copies, extracted JSON) live here.
    pub work_dir: PathBuf,
    /// Each run writes its workbook into its own sub-directory.
    pub output_dir: PathBuf,
    pub serial_db: PathBuf,
    pub legacy_serial_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            template: PathBuf::from("data/templates/pib_template.xlsx"),
            customer_reference: PathBuf::from("data/reference/customer_list.xlsx"),
            hs_reference: PathBuf::from("data/reference/hs_code.xlsx"),
            work_dir: PathBuf::from("data/intermediate"),
            output_dir: PathBuf::from("data/output"),
            serial_db: PathBuf::from("data/state/serial.db"),
            legacy_serial_file: PathBuf::from("data/state/serial_tracker.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    /// Fail the run when a reference table is missing instead of degrading.
    pub require_references: bool,
    pub fuzzy_cutoff: f64,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            require_references: true,
            fuzzy_cutoff: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Remote,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    /// Upper bound on PDF text sent per document.
    pub max_chars: usize,
    pub remote: RemoteEndpoint,
    pub ollama: OllamaEndpoint,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Remote,
            max_chars: 24_000,
            remote: RemoteEndpoint::default(),
            ollama: OllamaEndpoint::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteEndpoint {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for RemoteEndpoint {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaEndpoint {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaEndpoint {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "qwen3:8b".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve a configured path against `paths.base_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.base_dir.join(path)
        }
    }

    pub fn template(&self) -> PathBuf {
        self.resolve(&self.paths.template)
    }

    pub fn customer_reference(&self) -> PathBuf {
        self.resolve(&self.paths.customer_reference)
    }

    pub fn hs_reference(&self) -> PathBuf {
        self.resolve(&self.paths.hs_reference)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.resolve(&self.paths.work_dir)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.paths.output_dir)
    }

    pub fn serial_db(&self) -> PathBuf {
        self.resolve(&self.paths.serial_db)
    }

    pub fn legacy_serial_file(&self) -> PathBuf {
        self.resolve(&self.paths.legacy_serial_file)
    }
}

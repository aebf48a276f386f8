use std::fs::File;
use std::io::{Write, BufRead, BufReader};
use std::path::{Path, PathBuf};
use anyhow::{Result, Context, anyhow, ensure};
use tracing::info;

pub const DEFAULT_DB_PATH: &str = "database/library.db";
pub const DEFAULT_MAX_WORKERS: usize = 100;
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;
pub const DEFAULT_BASE_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub library_path: Option<PathBuf>,
    /// Upper bound on concurrent tag extractions.
    pub max_workers: usize,
    /// Queue length that forces a flush mid-scan.
    pub buffer_size: usize,
    pub base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            library_path: None,
            max_workers: DEFAULT_MAX_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from an env file, falling back to defaults for
    /// anything the file does not set. A missing file is not an error.
    pub fn load(env_path: &Path) -> Result<Self> {
        let settings = if env_path.exists() {
            let settings = load_from_env(env_path)
                .with_context(|| format!("Failed to load settings from {:?}", env_path))?;
            info!("Loaded settings from {:?}", env_path);
            settings
        } else {
            Self::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, env_path: &Path) -> Result<()> {
        save_to_env(env_path, self)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_workers >= 1, "max_workers must be at least 1");
        ensure!(self.buffer_size >= 1, "buffer_size must be at least 1");
        Ok(())
    }
}

fn load_from_env(path: &Path) -> Result<Settings> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut settings = Settings::default();

    for line in reader.lines() {
        let line = line?;
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            match key.trim() {
                "JUKEBOX_DB_PATH" => settings.db_path = PathBuf::from(value),
                "JUKEBOX_LIBRARY_PATH" => settings.library_path = Some(PathBuf::from(value)),
                "JUKEBOX_MAX_WORKERS" => settings.max_workers = parse_count(key, value)?,
                "JUKEBOX_BUFFER_SIZE" => settings.buffer_size = parse_count(key, value)?,
                "JUKEBOX_BASE_URL" => settings.base_url = value.trim_end_matches('/').to_string(),
                _ => {}
            }
        }
    }

    Ok(settings)
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| anyhow!("{} must be a positive integer, got '{}'", key.trim(), value))
}

fn save_to_env(path: &Path, settings: &Settings) -> Result<()> {
    let mut file = File::create(path).context("Failed to create .env file")?;
    writeln!(file, "JUKEBOX_DB_PATH={}", settings.db_path.display())?;
    if let Some(library_path) = &settings.library_path {
        writeln!(file, "JUKEBOX_LIBRARY_PATH={}", library_path.display())?;
    }
    writeln!(file, "JUKEBOX_MAX_WORKERS={}", settings.max_workers)?;
    writeln!(file, "JUKEBOX_BUFFER_SIZE={}", settings.buffer_size)?;
    writeln!(file, "JUKEBOX_BASE_URL={}", settings.base_url)?;
    Ok(())
}

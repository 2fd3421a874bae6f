use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub geocode: GeocodeConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Raw customer export (CSV with the spreadsheet's original headers).
    pub customers_csv: PathBuf,
    /// State boundary dataset, GeoJSON or Shapefile.
    pub boundaries: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodeConfig {
    pub cache: PathBuf,
    pub endpoint: String,
    pub user_agent: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_save_every")]
    pub save_every: usize,
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_save_every() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Normalized records written by `import`, read back by `serve`.
    pub customers_json: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [input]
            customers_csv = "data/clientes.csv"
            boundaries = "static/brasil_estados.geojson"

            [geocode]
            cache = "data/geocache.json"
            endpoint = "https://nominatim.openstreetmap.org/search"
            user_agent = "mapa-cobertura-etl/1.0"

            [output]
            customers_json = "data/clientes.json"

            [server]
            port = 8000
            static_dir = "static"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.geocode.delay_ms, 1000);
        assert_eq!(config.geocode.save_every, 100);
    }
}

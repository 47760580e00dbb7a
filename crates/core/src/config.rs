use std::path::Path;

use looper_transport::SessionConfig;

/// Load and validate a session configuration from a TOML file. Missing fields
/// fall back to the defaults.
pub fn load_config(path: &Path) -> anyhow::Result<SessionConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: SessionConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_config_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tempo = 90.0\npreroll_elements = 2400").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tempo, 90.0);
        assert_eq!(config.preroll_elements, 2_400);
        assert_eq!(config.sample_rate, 48_000);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tempo = 0.0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("no/such/looper.toml")).is_err());
    }
}

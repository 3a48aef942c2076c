//! `toolweave config` — Configuration management commands.

use toolweave_config::AppConfig;

pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn path() {
    println!("{}", config_file().display());
}

pub fn init() {
    println!("# {}", config_file().display());
    println!("{}", AppConfig::default_toml());
}

fn config_file() -> std::path::PathBuf {
    AppConfig::default_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        assert!(config_file().to_str().unwrap().ends_with("config.toml"));
    }

    #[test]
    fn default_toml_round_trips() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.agent.max_iterations, 10);
        assert_eq!(parsed.execution.max_workers, 5);
    }
}

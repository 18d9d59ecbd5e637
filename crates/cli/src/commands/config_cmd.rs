//! `smartday config`: print the default configuration.

use smartday_config::AppConfig;

pub fn run(path_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path_only {
        println!("{}", AppConfig::config_dir().join("config.toml").display());
    } else {
        println!("{}", AppConfig::default_toml());
    }
    Ok(())
}

use std::path::Path;

use crate::config::Config;

pub fn cmd_init_config(path: Option<&Path>) -> anyhow::Result<()> {
    let path = path.map_or_else(Config::default_config_path, Path::to_path_buf);

    if Config::create_default_if_missing(&path)? {
        println!("Created default config at {}", path.display());
        println!("Set [auth] credentials and [user_info].base_url before starting the service.");
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    println!("Configuration is valid.");
    println!();
    // Secrets are never serialized.
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

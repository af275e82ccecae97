//! Config command implementation.

use anyhow::Result;

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load();
            let content = toml::to_string_pretty(&config)?;
            if content.trim().is_empty() {
                println!("# No configuration set ({})", Config::path().display());
            } else {
                print!("{}", content);
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, &value)?;
            config.save()?;
            println!("Set {:?} = {}", key, value);
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load();
            config.unset(key);
            config.save()?;
            println!("Unset {:?}", key);
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
    }
    Ok(())
}

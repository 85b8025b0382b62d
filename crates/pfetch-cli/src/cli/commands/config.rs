//! `pfetch config` – show where the config lives and what it resolves to.

use anyhow::Result;
use pfetch_core::config;

pub fn run_config() -> Result<()> {
    let path = config::config_path()?;
    let cfg = config::load_or_init()?;
    let template = cfg.validate();
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&cfg)?);
    if let Err(e) = template {
        println!("# invalid: {}", e);
    }
    Ok(())
}

use std::path::Path;

use anyhow::Context;
use plays_core::config::{Config, WarnLevel};
use plays_core::content::ContentStore;
use plays_core::{io, paths};

pub fn run(root: &Path) -> anyhow::Result<()> {
    io::ensure_dir(root)?;

    let config_path = paths::config_path(root);
    let config = if config_path.is_file() {
        println!("Using existing {}", config_path.display());
        Config::load(root).context("failed to load configuration")?
    } else {
        let config = Config::default();
        config.save(root)?;
        println!("Created {}", config_path.display());
        config
    };

    for warning in config.validate() {
        let label = match warning.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("{label}: {}", warning.message);
    }

    let store = ContentStore::new(root, &config)?;
    store.ensure_ready()?;
    println!("Playbooks: {}", store.playbooks_dir().display());
    println!("Inventory: {}", store.inventory_path().display());
    Ok(())
}

//! Config command implementation.

use anyhow::Result;
use cvgo_core::Config;

pub fn run(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

//! Offsets command implementation.

use std::path::Path;

use anyhow::Result;
use cvgo_core::{Config, ResolvedOffsets};

/// Render resolved offsets as an aligned table
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub fn format_table(offsets: &ResolvedOffsets) -> String {
    let name_width = offsets
        .entries
        .iter()
        .map(|entry| entry.name.len())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let module_width = offsets
        .entries
        .iter()
        .map(|entry| entry.module.len())
        .max()
        .unwrap_or(0)
        .max("Module".len());

    let mut out = format!(
        "{:<name_width$}  {:<module_width$}  {:>10}  {:>18}\n",
        "Name", "Module", "Offset", "Address"
    );
    for entry in &offsets.entries {
        out.push_str(&format!(
            "{:<name_width$}  {:<module_width$}  {:>10}  {:>18}\n",
            entry.name,
            entry.module,
            format!("0x{:X}", entry.offset),
            format!("0x{:X}", entry.address),
        ));
    }
    out
}

#[cfg(target_os = "windows")]
pub fn run(config: &Config, signatures: Option<&Path>, output: Option<&Path>) -> Result<()> {
    use anyhow::Context;
    use cvgo_core::{ModuleTable, OffsetFinder, builtin_signatures, load_signatures, save_offsets};
    use tracing::{info, warn};

    use crate::retry::wait_for_game;
    use crate::shutdown::ShutdownSignal;

    let signatures = match signatures {
        Some(path) => load_signatures(path)
            .with_context(|| format!("Failed to load signatures from {}", path.display()))?,
        None => builtin_signatures(),
    };
    info!(
        "Using {} signatures (version {})",
        signatures.signatures.len(),
        signatures.version
    );

    let shutdown = ShutdownSignal::install()?;
    let Some(process) = wait_for_game(&config.process, &shutdown)? else {
        return Ok(());
    };
    info!("Attached to {} (pid {})", config.process.name, process.pid());

    let mut wanted = config.process.modules.clone();
    for module in signatures.modules() {
        if !wanted.iter().any(|m| m.eq_ignore_ascii_case(&module)) {
            wanted.push(module);
        }
    }
    let modules = ModuleTable::load(&process, &wanted)?;
    for module in modules.iter() {
        info!(
            "  {} base {:#x} size {:#x}",
            module.name, module.base, module.size
        );
    }

    let resolved = OffsetFinder::new(&process, &modules).find_all(&signatures);
    if resolved.len() < signatures.signatures.len() {
        warn!(
            "{} of {} signatures could not be resolved",
            signatures.signatures.len() - resolved.len(),
            signatures.signatures.len()
        );
    }

    print!("{}", format_table(&resolved));

    if let Some(path) = output {
        save_offsets(path, &resolved)
            .with_context(|| format!("Failed to save offsets to {}", path.display()))?;
        info!("Saved offsets to {}", path.display());
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn run(_config: &Config, _signatures: Option<&Path>, _output: Option<&Path>) -> Result<()> {
    anyhow::bail!("The offsets command is only supported on Windows")
}

//! Scan command implementation.

use anyhow::{Result, anyhow};
use cvgo_core::{AddressingMode, Config, SignaturePattern};

/// Parse a signed number, hex with a `0x` prefix or decimal
pub fn parse_number(s: &str) -> Result<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|e| anyhow!("Invalid number {:?}: {}", s, e))?;

    Ok(if negative { -value } else { value })
}

/// Build the ad-hoc signature described by the command line
pub fn build_signature(
    module: &str,
    pattern: &str,
    offsets: &[String],
    extra: &str,
    truncated: bool,
) -> Result<SignaturePattern> {
    let offsets = offsets
        .iter()
        .map(|s| parse_number(s))
        .collect::<Result<Vec<_>>>()?;
    let mode = if truncated {
        AddressingMode::Truncated
    } else {
        AddressingMode::Relative
    };

    Ok(SignaturePattern::from_ida("adhoc", module, pattern)?
        .with_offsets(offsets)
        .with_extra(parse_number(extra)?)
        .with_mode(mode))
}

#[cfg(target_os = "windows")]
pub fn run(
    config: &Config,
    module: &str,
    pattern: &str,
    offsets: &[String],
    extra: &str,
    truncated: bool,
) -> Result<()> {
    use cvgo_core::{ModuleTable, ProcessAccess, SignatureScanner, WindowsProcess, resolve};
    use tracing::info;

    let signature = build_signature(module, pattern, offsets, extra, truncated)?;
    let process = WindowsProcess::find_and_open(&config.process.name)?;
    let modules = ModuleTable::load(&process, &[module])?;
    let record = modules.get(module)?;
    info!(
        "Scanning {} ({:#x}..{:#x}) for {}",
        record.name,
        record.base,
        record.end(),
        signature.ida_pattern()
    );

    let Some(matched) = SignatureScanner::new(&process).scan(record, &signature) else {
        println!("Pattern not found in {}", record.name);
        return Ok(());
    };
    println!("Match:   0x{:X} ({}+0x{:X})", matched, record.name, matched - record.base);

    let offset = resolve(
        &process,
        record.base,
        matched,
        signature.offsets(),
        signature.mode(),
        signature.extra(),
    );
    let address = process.pointer_width().wrap(record.base.wrapping_add(offset));
    println!("Offset:  0x{:X} ({})", offset, signature.mode());
    println!("Address: 0x{:X}", address);

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn run(
    _config: &Config,
    module: &str,
    pattern: &str,
    offsets: &[String],
    extra: &str,
    truncated: bool,
) -> Result<()> {
    build_signature(module, pattern, offsets, extra, truncated)?;
    anyhow::bail!("The scan command is only supported on Windows")
}

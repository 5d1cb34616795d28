use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// How the resolved chain value is turned into the final offset
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressingMode {
    /// `running + extra`
    #[default]
    Relative,
    /// `(running + extra) & 0xFFFF`; only valid for offsets below 64 KiB
    Truncated,
}

/// A byte signature locating a code site inside one module.
///
/// `mask` has one character per pattern byte: `?` matches any byte, anything
/// else requires the byte to match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignatureDef", into = "SignatureDef")]
pub struct SignaturePattern {
    name: String,
    module: String,
    bytes: Vec<u8>,
    mask: String,
    mode: AddressingMode,
    extra: i64,
    offsets: Vec<i64>,
}

impl SignaturePattern {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        bytes: Vec<u8>,
        mask: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mask = mask.into();
        validate_pattern(&name, &bytes, &mask)?;

        Ok(Self {
            name,
            module: module.into(),
            bytes,
            mask,
            mode: AddressingMode::Relative,
            extra: 0,
            offsets: Vec::new(),
        })
    }

    /// Build from an IDA-style pattern such as `"8D 34 85 ?? ?? ?? ??"`
    pub fn from_ida(
        name: impl Into<String>,
        module: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        let (bytes, mask) = parse_pattern(pattern)?;
        Self::new(name, module, bytes, mask)
    }

    pub fn with_mode(mut self, mode: AddressingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_extra(mut self, extra: i64) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_offsets(mut self, offsets: Vec<i64>) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &str {
        &self.mask
    }

    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    pub fn extra(&self) -> i64 {
        self.extra
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// IDA-style rendering of the pattern
    pub fn ida_pattern(&self) -> String {
        format_pattern(&self.bytes, &self.mask)
    }
}

fn validate_pattern(name: &str, bytes: &[u8], mask: &str) -> Result<()> {
    if bytes.is_empty() {
        return Err(Error::MalformedPattern(format!("{}: pattern is empty", name)));
    }
    if mask.len() != bytes.len() {
        return Err(Error::MalformedPattern(format!(
            "{}: pattern has {} bytes but mask has {} characters",
            name,
            bytes.len(),
            mask.len()
        )));
    }
    if let Some(c) = mask.chars().find(|&c| c != 'x' && c != '?') {
        return Err(Error::MalformedPattern(format!(
            "{}: invalid mask character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// On-disk form of a signature
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignatureDef {
    name: String,
    module: String,
    pattern: String,
    #[serde(default)]
    mode: AddressingMode,
    #[serde(default)]
    extra: i64,
    #[serde(default)]
    offsets: Vec<i64>,
}

impl TryFrom<SignatureDef> for SignaturePattern {
    type Error = Error;

    fn try_from(def: SignatureDef) -> Result<Self> {
        Ok(SignaturePattern::from_ida(def.name, def.module, &def.pattern)?
            .with_mode(def.mode)
            .with_extra(def.extra)
            .with_offsets(def.offsets))
    }
}

impl From<SignaturePattern> for SignatureDef {
    fn from(sig: SignaturePattern) -> Self {
        SignatureDef {
            pattern: sig.ida_pattern(),
            name: sig.name,
            module: sig.module,
            mode: sig.mode,
            extra: sig.extra,
            offsets: sig.offsets,
        }
    }
}

/// A named collection of signatures, as stored in a signature file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub signatures: Vec<SignaturePattern>,
}

impl SignatureSet {
    pub fn get(&self, name: &str) -> Option<&SignaturePattern> {
        self.signatures
            .iter()
            .find(|sig| sig.name.eq_ignore_ascii_case(name))
    }

    /// Distinct module names referenced by the set, in first-use order
    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = Vec::new();
        for sig in &self.signatures {
            if !modules.iter().any(|m| m.eq_ignore_ascii_case(&sig.module)) {
                modules.push(sig.module.clone());
            }
        }
        modules
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}

/// Split an IDA-style pattern into bytes and an `x`/`?` mask.
///
/// Wildcard positions (`?` or `??`) get a zero byte.
pub fn parse_pattern(pattern: &str) -> Result<(Vec<u8>, String)> {
    let mut bytes = Vec::new();
    let mut mask = String::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(0);
            mask.push('?');
            continue;
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::MalformedPattern(format!("invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(value);
        mask.push('x');
    }

    if bytes.is_empty() {
        return Err(Error::MalformedPattern("signature pattern is empty".to_string()));
    }

    Ok((bytes, mask))
}

pub fn format_pattern(bytes: &[u8], mask: &str) -> String {
    bytes
        .iter()
        .zip(mask.chars())
        .map(|(b, m)| match m {
            '?' => "??".to_string(),
            _ => format!("{:02X}", b),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Signatures for the game build the tracker was written against
pub fn builtin_signatures() -> SignatureSet {
    let builtin = |name: &str,
                   module: &str,
                   bytes: &[u8],
                   mask: &str,
                   mode: AddressingMode,
                   extra: i64,
                   offsets: &[i64]| SignaturePattern {
        name: name.to_string(),
        module: module.to_string(),
        bytes: bytes.to_vec(),
        mask: mask.to_string(),
        mode,
        extra,
        offsets: offsets.to_vec(),
    };

    SignatureSet {
        version: "builtin".to_string(),
        signatures: vec![
            builtin(
                "localPlayer",
                "client.dll",
                &[
                    0x8D, 0x34, 0x85, 0x00, 0x00, 0x00, 0x00, 0x89, 0x15, 0x00, 0x00, 0x00, 0x00,
                    0x8B, 0x41, 0x08, 0x8B, 0x48, 0x04, 0x83, 0xF9, 0xFF,
                ],
                "xxx????xx????xxxxxxxxx",
                AddressingMode::Relative,
                4,
                &[3],
            ),
            builtin(
                "forceAttack",
                "client.dll",
                &[
                    0x89, 0x0D, 0x00, 0x00, 0x00, 0x00, 0x8B, 0x0D, 0x00, 0x00, 0x00, 0x00, 0x8B,
                    0xF2, 0x8B, 0xC1, 0x83, 0xCE, 0x04,
                ],
                "xx????xx????xxxxxxx",
                AddressingMode::Relative,
                0,
                &[2],
            ),
            builtin(
                "dwClientState",
                "engine.dll",
                &[
                    0xA1, 0x00, 0x00, 0x00, 0x00, 0x33, 0xD2, 0x6A, 0x00, 0x6A, 0x00, 0x33, 0xC9,
                    0x89, 0xB0,
                ],
                "x????xxxxxxxxxx",
                AddressingMode::Relative,
                0,
                &[1],
            ),
            builtin(
                "viewAngles",
                "engine.dll",
                &[
                    0xF3, 0x0F, 0x11, 0x80, 0x00, 0x00, 0x00, 0x00, 0xD9, 0x46, 0x04, 0xD9, 0x05,
                ],
                "xxxx????xxxxx",
                AddressingMode::Truncated,
                0,
                &[4],
            ),
        ],
    }
}

//! Binary masks produced by the image preprocessing stage.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Point, Rect};
use crate::error::{Error, Result};

/// Square binary mask; zero is background, anything else foreground
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    resolution: usize,
    data: Vec<u8>,
}

impl Mask {
    /// Wrap row-major mask data of `resolution × resolution` bytes
    pub fn new(resolution: usize, data: Vec<u8>) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidMask("resolution is zero".to_string()));
        }
        let len = resolution.checked_mul(resolution).ok_or_else(|| {
            Error::InvalidMask(format!("resolution {} is too large", resolution))
        })?;
        if data.len() != len {
            return Err(Error::InvalidMask(format!(
                "expected {} bytes for a {}x{} mask, got {}",
                len,
                resolution,
                resolution,
                data.len()
            )));
        }
        Ok(Self { resolution, data })
    }

    /// All-background mask
    pub fn empty(resolution: usize) -> Self {
        Self {
            resolution,
            data: vec![0; resolution * resolution],
        }
    }

    pub fn from_fn(resolution: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut mask = Self::empty(resolution);
        for y in 0..resolution {
            for x in 0..resolution {
                if f(x, y) {
                    mask.data[y * resolution + x] = 255;
                }
            }
        }
        mask
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn set(&mut self, x: usize, y: usize, foreground: bool) {
        self.data[y * self.resolution + x] = if foreground { 255 } else { 0 };
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.resolution + x] != 0
    }

    /// Whether any pixel of `rect` (clipped to the mask) is foreground
    pub fn any_foreground(&self, rect: Rect) -> bool {
        let res = self.resolution as i32;
        let x0 = rect.x.clamp(0, res) as usize;
        let x1 = rect.right().clamp(0, res) as usize;
        let y0 = rect.y.clamp(0, res) as usize;
        let y1 = rect.bottom().clamp(0, res) as usize;

        (y0..y1).any(|y| {
            let row = &self.data[y * self.resolution..(y + 1) * self.resolution];
            row[x0..x1].iter().any(|&v| v != 0)
        })
    }

    /// Whether the `size × size` block with top-left `origin` has any foreground
    pub fn block_has_foreground(&self, origin: Point, size: i32) -> bool {
        self.any_foreground(Rect::new(origin.x, origin.y, size, size))
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Decode a binary PGM (`P5`) image; it must be square
    pub fn from_pgm(bytes: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let mut fields = [0usize; 3];

        if bytes.get(..2) != Some(b"P5".as_slice()) {
            return Err(Error::InvalidMask("not a binary PGM (P5) image".to_string()));
        }
        pos += 2;

        for field in fields.iter_mut() {
            // whitespace and comments between header fields
            loop {
                match bytes.get(pos).copied() {
                    Some(b) if b.is_ascii_whitespace() => pos += 1,
                    Some(b'#') => {
                        while bytes.get(pos).is_some_and(|&b| b != b'\n') {
                            pos += 1;
                        }
                    }
                    _ => break,
                }
            }

            let start = pos;
            while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            }
            *field = std::str::from_utf8(&bytes[start..pos])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::InvalidMask("malformed PGM header".to_string()))?;
        }

        let [width, height, max_value] = fields;
        if width != height {
            return Err(Error::InvalidMask(format!(
                "mask must be square, got {}x{}",
                width, height
            )));
        }
        if max_value == 0 || max_value > 255 {
            return Err(Error::InvalidMask(format!(
                "unsupported PGM max value {}",
                max_value
            )));
        }

        // single whitespace byte before the raster
        pos += 1;
        let end = width
            .checked_mul(height)
            .and_then(|len| len.checked_add(pos))
            .ok_or_else(|| {
                Error::InvalidMask(format!("PGM dimensions {}x{} are too large", width, height))
            })?;
        let raster = bytes
            .get(pos..end)
            .ok_or_else(|| Error::InvalidMask("truncated PGM raster".to_string()))?;
        Self::new(width, raster.to_vec())
    }

    pub fn to_pgm(&self) -> Vec<u8> {
        let mut out = format!("P5\n{} {}\n255\n", self.resolution, self.resolution).into_bytes();
        out.extend_from_slice(&self.data);
        out
    }
}

/// Supplier of one mask per frame
pub trait MaskSource {
    /// The next frame's mask, or `None` when the source is exhausted
    fn next_mask(&mut self) -> Result<Option<Mask>>;
}

impl<I: Iterator<Item = Mask>> MaskSource for I {
    fn next_mask(&mut self) -> Result<Option<Mask>> {
        Ok(self.next())
    }
}

/// Masks read from the `.pgm` files of a directory, in file name order
#[derive(Debug)]
pub struct PgmDirectory {
    paths: Vec<PathBuf>,
    next: usize,
}

impl PgmDirectory {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pgm"))
            })
            .collect();
        paths.sort();

        debug!(
            "Found {} mask files in {}",
            paths.len(),
            dir.as_ref().display()
        );
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl MaskSource for PgmDirectory {
    fn next_mask(&mut self) -> Result<Option<Mask>> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let bytes = fs::read(path)?;
        Mask::from_pgm(&bytes).map(Some).map_err(|e| match e {
            Error::InvalidMask(message) => {
                Error::InvalidMask(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }
}

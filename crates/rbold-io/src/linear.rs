//! Plain-text linear transform files.
//!
//! A transform file holds one or more 4x4 matrices as whitespace-separated
//! numbers, row-major, 16 values per matrix; `#` starts a comment line.
//! Multi-entry files carry one matrix per volume (motion-correction
//! series).

use anyhow::{bail, Context, Result};
use rbold_core::Affine;
use std::fmt::Write as _;
use std::path::Path;

/// Load a single rigid/affine transform.
pub fn load_rigid<P: AsRef<Path>>(path: P) -> Result<Affine> {
    let path = path.as_ref();
    let series = load_affine_series(path)?;
    match series.len() {
        1 => Ok(series.into_iter().next().expect("length checked")),
        n => bail!(
            "Expected a single transform in {}, found {n}",
            path.display()
        ),
    }
}

/// Load a multi-entry transform file, one 4x4 matrix per volume.
pub fn load_affine_series<P: AsRef<Path>>(path: P) -> Result<Vec<Affine>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transform file {}", path.display()))?;

    let mut values = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for token in line.split_whitespace() {
            let v: f64 = token
                .parse()
                .with_context(|| format!("Invalid number {token:?} in {}", path.display()))?;
            values.push(v);
        }
    }

    if values.is_empty() || values.len() % 16 != 0 {
        bail!(
            "Transform file {} holds {} values, expected a multiple of 16",
            path.display(),
            values.len()
        );
    }

    let mut series = Vec::with_capacity(values.len() / 16);
    for chunk in values.chunks_exact(16) {
        let mut rows = [[0.0f64; 4]; 4];
        for r in 0..4 {
            rows[r].copy_from_slice(&chunk[r * 4..(r + 1) * 4]);
        }
        series.push(Affine::from_rows(rows));
    }
    Ok(series)
}

/// Write transforms in the format `load_affine_series` reads.
pub fn write_affines<P: AsRef<Path>>(path: P, series: &[Affine]) -> Result<()> {
    let path = path.as_ref();
    let mut text = String::new();
    for affine in series {
        let m = affine.matrix();
        for r in 0..4 {
            writeln!(
                text,
                "{} {} {} {}",
                m[(r, 0)],
                m[(r, 1)],
                m[(r, 2)],
                m[(r, 3)]
            )
            .expect("writing to a String cannot fail");
        }
        text.push('\n');
    }
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write transform file {}", path.display()))
}

//! Language-agnostic structural complexity from indentation depth.
//!
//! Nesting depth is a serviceable proxy for branching without parsing:
//! for each non-blank line take the leading indentation in 4-space
//! units (tabs count as one unit), then score the file as mean depth
//! times maximum depth. Flat scripts score near zero; deeply nested
//! handlers score high on both factors.

use anyhow::{Context, Result};
use std::path::Path;

/// One indentation unit in spaces.
const INDENT_UNIT: f64 = 4.0;

/// Indentation complexity of source text.
pub fn indentation_complexity(content: &str) -> f64 {
    let mut total = 0.0;
    let mut max = 0.0f64;
    let mut lines = 0usize;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut spaces = 0u32;
        for ch in line.chars() {
            match ch {
                ' ' => spaces += 1,
                '\t' => spaces += 4,
                _ => break,
            }
        }
        let depth = f64::from(spaces) / INDENT_UNIT;
        total += depth;
        max = max.max(depth);
        lines += 1;
    }

    if lines == 0 {
        return 0.0;
    }
    let score = (total / lines as f64) * max;
    (score * 100.0).round() / 100.0
}

/// Read a file (up to `byte_cap` bytes) and score it. Oversized files
/// are scored on the capped prefix, truncated at the last full line;
/// non-UTF-8 content is decoded lossily.
pub fn file_complexity(path: &Path, byte_cap: u64) -> Result<f64> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {} for complexity", path.display()))?;

    // Cap against what was actually read; the file may have changed
    // size since any earlier stat of it.
    let cap = bytes.len().min(byte_cap as usize);
    let slice = if cap < bytes.len() {
        let capped = &bytes[..cap];
        match capped.iter().rposition(|&b| b == b'\n') {
            Some(pos) => &capped[..pos],
            None => capped,
        }
    } else {
        &bytes[..]
    };
    Ok(indentation_complexity(&String::from_utf8_lossy(slice)))
}

//! SPIR-V loading.

use crate::error::Result;
use std::path::Path;

/// Load a compiled SPIR-V module from disk as 32-bit words.
///
/// The bytecode is treated as an opaque blob; alignment and endianness are
/// handled by `ash::util::read_spv`.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let mut file = std::fs::File::open(path.as_ref())?;
    let words = ash::util::read_spv(&mut file)?;
    tracing::debug!(
        "Loaded shader {} ({} words)",
        path.as_ref().display(),
        words.len()
    );
    Ok(words)
}

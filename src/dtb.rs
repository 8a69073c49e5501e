use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::Result;

/// Device-tree conversion is delegated to the external `dtc` compiler.
pub fn dtc_available() -> bool {
    Command::new("dtc")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Decompiles a DTB image into source form. Returns false when dtc rejects
/// the input.
pub fn decompile(dtb: &Path, dts: &Path) -> Result<bool> {
    let status = Command::new("dtc")
        .args(["-q", "-I", "dtb", "-O", "dts", "-o"])
        .arg(dts)
        .arg(dtb)
        .status()?;
    Ok(status.success())
}

/// Compiles device-tree source back into a DTB image, padded to `size` bytes
/// so the result occupies the same space as the image it replaces.
pub fn compile(dts: &Path, dtb: &Path, size: usize) -> Result<bool> {
    let status = Command::new("dtc")
        .args(["-q", "-I", "dts", "-O", "dtb", "-S"])
        .arg(size.to_string())
        .arg("-o")
        .arg(dtb)
        .arg(dts)
        .status()?;
    Ok(status.success())
}

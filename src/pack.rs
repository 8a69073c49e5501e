use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::container::{SectionKind, Variant};
use crate::digest::{crc32_of, md5_of};
use crate::dtb;
use crate::error::FirmwareError;
use crate::romfs::RomFs;
use crate::view::put_u32_le;
use crate::{
    DTB_MAGIC, FIRMWARE_HEADER_SIZE, HEADER_CRC32_POSITION, MD5_SIZE, SECTION_CRC32_POSITION,
    SECTION_HEADER_SIZE, SECTION_LENGTH_POSITION, SECTION_TABLE_ENTRY_SIZE, SECTION_TABLE_POSITION,
    SLOT_LENGTH_POSITION, SLOT_MD5_POSITION, SLOT_SIZE,
};

/// Reassembles a firmware container from an unpacked directory. The result is
/// written to `output_file`, which must not exist yet; every CRC32 and MD5 in
/// the chain is recomputed, while header and footer bytes not owned by the
/// chain are carried over verbatim.
pub fn pack_firmware(input_dir: &str, output_file: &str) -> Result<()> {
    println!("Packing...");
    let folder = Path::new(input_dir);

    let footer_template = fs::read(folder.join("firmware.footer"))
        .with_context(|| format!("cannot find firmware.footer in {}", input_dir))?;
    let variant =
        Variant::probe(&footer_template).ok_or(FirmwareError::UnsupportedVariant)?;
    if footer_template.len() != variant.footer_size() {
        bail!(
            "firmware.footer must be {} bytes for a {} firmware, got {}",
            variant.footer_size(),
            variant,
            footer_template.len()
        );
    }

    let mut section_files: Vec<String> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_section_bin(name))
        .collect();
    section_files.sort();
    if section_files.is_empty() {
        bail!("no section images found in {}", input_dir);
    }

    let staging = tempfile::tempdir()?;

    println!("Backing up section data...");
    for (i, file_name) in section_files.iter().enumerate() {
        let stem = file_name.trim_end_matches(".bin");
        let mut body = fs::read(folder.join(file_name))
            .with_context(|| format!("cannot open {}", file_name))?;

        let kind = SectionKind::detect(&body);
        println!("{}: {}", file_name, kind);
        match kind {
            SectionKind::RomFs => {
                let listing = folder.join(format!("{}.files", stem));
                let romfs = RomFs::from_listing(&listing)
                    .with_context(|| format!("cannot rebuild ROMFS from {}", listing.display()))?;
                body = romfs.encode()?;
            }
            SectionKind::Dtb => {
                let dts_path = folder.join(format!("{}.dts", stem));
                if dts_path.exists() {
                    if !dtb::dtc_available() {
                        return Err(FirmwareError::ExternalToolMissing.into());
                    }
                    println!("Packing dts...");
                    let compiled = staging.path().join(format!("{}.bin", stem));
                    if !dtb::compile(&dts_path, &compiled, body.len())? {
                        bail!("dtc failed to compile {}", dts_path.display());
                    }
                    body = fs::read(&compiled)?;
                }
            }
            _ => {}
        }

        let header_path = folder.join(format!("{}.header", stem));
        let mut header = fs::read(&header_path)
            .with_context(|| format!("cannot open {}", header_path.display()))?;
        if header.len() != SECTION_HEADER_SIZE {
            bail!(
                "{} must be {} bytes, got {}",
                header_path.display(),
                SECTION_HEADER_SIZE,
                header.len()
            );
        }
        put_u32_le(
            &mut header[SECTION_CRC32_POSITION..],
            crc32_of(&body, 0),
        );
        put_u32_le(&mut header[SECTION_LENGTH_POSITION..], body.len() as u32);

        let mut blob = header;
        blob.extend_from_slice(&body);
        fs::write(staging.path().join(format!("section_{}", i)), &blob)?;
    }

    println!("Creating firmware...");
    let mut out = fs::read(folder.join("firmware.header"))
        .with_context(|| format!("cannot find firmware.header in {}", input_dir))?;
    if out.len() != FIRMWARE_HEADER_SIZE {
        bail!(
            "firmware.header must be {} bytes, got {}",
            FIRMWARE_HEADER_SIZE,
            out.len()
        );
    }

    let mut running = 0u32;
    let mut total_size = 0usize;
    for i in 0..section_files.len() {
        println!("Adding section {} data...", i);
        let blob = fs::read(staging.path().join(format!("section_{}", i)))?;
        running = crc32_of(&blob, running);

        let entry = SECTION_TABLE_POSITION + i * SECTION_TABLE_ENTRY_SIZE;
        let is_dtb = blob.len() >= SECTION_HEADER_SIZE + DTB_MAGIC.len()
            && blob[SECTION_HEADER_SIZE..SECTION_HEADER_SIZE + DTB_MAGIC.len()] == DTB_MAGIC;
        // The DTB slot keeps a zero length on disk; readers recover it from
        // the section header.
        put_u32_le(
            &mut out[entry..],
            if is_dtb { 0 } else { blob.len() as u32 },
        );
        put_u32_le(&mut out[entry + 4..], !running);

        total_size += blob.len();
        out.extend_from_slice(&blob);
    }

    println!("Adding camera firmware CRC32...");
    let firmware_crc32 = crc32_of(&out[FIRMWARE_HEADER_SIZE..FIRMWARE_HEADER_SIZE + total_size], 0);
    put_u32_le(&mut out[HEADER_CRC32_POSITION..], firmware_crc32);

    println!("Adding whole firmware MD5...");
    let internal_md5 = md5_of(&out[..FIRMWARE_HEADER_SIZE + total_size]);
    out.extend_from_slice(&internal_md5);

    let camera_size = out.len();
    let camera_md5 = md5_of(&out[..camera_size]);

    println!("Adding box firmware...");
    let box_data = fs::read(folder.join("box.bin"))
        .with_context(|| format!("cannot find box.bin in {}", input_dir))?;
    let box_md5 = md5_of(&box_data);
    let box_size = box_data.len();
    out.extend_from_slice(&box_data);

    let mut footer = footer_template;
    write_slot(&mut footer, 0, camera_size as u32, &camera_md5);
    write_slot(&mut footer, 1, box_size as u32, &box_md5);

    if variant == Variant::Go3 {
        println!("Adding camera bluetooth firmware...");
        let camera_bt = fs::read(folder.join("camera_bt.bin"))
            .with_context(|| format!("cannot find camera_bt.bin in {}", input_dir))?;
        write_slot(&mut footer, 2, camera_bt.len() as u32, &md5_of(&camera_bt));
        out.extend_from_slice(&camera_bt);

        println!("Adding box bluetooth firmware...");
        let box_bt = fs::read(folder.join("box_bt.bin"))
            .with_context(|| format!("cannot find box_bt.bin in {}", input_dir))?;
        write_slot(&mut footer, 3, box_bt.len() as u32, &md5_of(&box_bt));
        out.extend_from_slice(&box_bt);
    }

    println!("Adding footer...");
    out.extend_from_slice(&footer);

    let mut out_file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_file)
        .map_err(|e| anyhow!("cannot create {}: {}", output_file, e))?;
    out_file.write_all(&out)?;

    println!("Successfully packed Insta360 {} firmware:", variant);
    println!("  Output: {}", output_file);
    println!("  Camera firmware size: {} bytes", camera_size);
    println!("  Box firmware size: {} bytes", box_size);
    println!("  Total size: {} bytes", out.len());

    Ok(())
}

fn write_slot(footer: &mut [u8], slot: usize, length: u32, md5: &[u8; MD5_SIZE]) {
    let base = slot * SLOT_SIZE;
    put_u32_le(&mut footer[base + SLOT_LENGTH_POSITION..], length);
    footer[base + SLOT_MD5_POSITION..base + SLOT_MD5_POSITION + MD5_SIZE].copy_from_slice(md5);
}

fn is_section_bin(name: &str) -> bool {
    name.strip_prefix("section_")
        .and_then(|rest| rest.strip_suffix(".bin"))
        .map(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::container::{Firmware, SectionKind, Variant};
use crate::dtb;
use crate::romfs::RomFs;
use crate::{FIRMWARE_HEADER_SIZE, SECTION_HEADER_SIZE};

/// Writes the contents of a parsed firmware into `dst_path`: the raw header
/// and footer, one header/body pair per section, the box firmware and, on
/// GO 3, both Bluetooth firmwares. ROMFS sections are extracted into a
/// directory next to their image, DTB sections are decompiled when dtc is
/// installed.
pub fn unpack_firmware(firmware: &Firmware, dst_path: &str) -> Result<()> {
    println!("Unpacking...");
    let folder = Path::new(dst_path);
    fs::create_dir_all(folder)?;

    for (i, section) in firmware.sections.iter().enumerate() {
        println!("Exporting section {}", i);
        let header = firmware.view.read(section.header_start, SECTION_HEADER_SIZE)?;
        write_file(&folder.join(format!("section_{}.header", i)), header)?;

        let body = firmware.view.read(section.body_start, section.length as usize)?;
        let bin_path = folder.join(format!("section_{}.bin", i));
        write_file(&bin_path, body)?;

        match SectionKind::detect(body) {
            SectionKind::RomFs => {
                println!("Detected ROMFS section, unpacking...");
                let romfs = RomFs::decode(body)?;
                println!("ROMFS contains {} files", romfs.len());
                let files_dir = folder.join(format!("section_{}", i));
                fs::create_dir(&files_dir)?;
                let mut listing = String::new();
                for (name, data) in romfs.files() {
                    write_file(&files_dir.join(name), data)?;
                    listing.push_str(name);
                    listing.push('\n');
                }
                fs::write(folder.join(format!("section_{}.files", i)), listing)?;
            }
            SectionKind::Dtb => {
                println!("Detected DTB section...");
                if dtb::dtc_available() {
                    println!("Unpacking dtb...");
                    let dts_path = folder.join(format!("section_{}.dts", i));
                    if !dtb::decompile(&bin_path, &dts_path)? {
                        // keep the raw image authoritative when dtc balks
                        println!("dtc could not decompile section {}, skipping...", i);
                        let _ = fs::remove_file(&dts_path);
                    }
                } else {
                    println!("device-tree-compiler is not installed, skipping...");
                }
            }
            SectionKind::Ext2 => {
                println!("Detected Linux EXT2 filesystem section...");
            }
            _ => {}
        }
    }

    let header = firmware.view.read(0, FIRMWARE_HEADER_SIZE)?;
    write_file(&folder.join("firmware.header"), header)?;

    let footer = firmware
        .view
        .read(firmware.file_size - firmware.footer_size(), firmware.footer_size())?;
    write_file(&folder.join("firmware.footer"), footer)?;

    let mut cursor = firmware.camera_size();
    let box_data = firmware.view.read(cursor, firmware.box_fw.length as usize)?;
    write_file(&folder.join("box.bin"), box_data)?;
    cursor += firmware.box_fw.length as usize;

    if firmware.variant == Variant::Go3 {
        let camera_bt = firmware.camera_bt.as_ref().context("missing camera Bluetooth slot")?;
        let box_bt = firmware.box_bt.as_ref().context("missing box Bluetooth slot")?;

        let camera_bt_data = firmware.view.read(cursor, camera_bt.length as usize)?;
        write_file(&folder.join("camera_bt.bin"), camera_bt_data)?;
        cursor += camera_bt.length as usize;

        let box_bt_data = firmware.view.read(cursor, box_bt.length as usize)?;
        write_file(&folder.join("box_bt.bin"), box_bt_data)?;
    }

    Ok(())
}

fn write_file(path: &Path, buffer: &[u8]) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    file.write_all(buffer)?;
    Ok(())
}

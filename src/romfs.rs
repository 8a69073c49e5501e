use std::fs;
use std::path::Path;

use crate::digest::crc32_of;
use crate::error::{FirmwareError, Result};
use crate::view::{get_u32_le, put_u32_le, trim_nul};
use crate::{
    ROMFS_BLOCK_SIZE, ROMFS_ENTRY_SIZE, ROMFS_ENTRY_TABLE_POSITION, ROMFS_FILECOUNT_POSITION,
    ROMFS_FILE_NAME_SIZE, ROMFS_HEADER_SIZE, ROMFS_MAGIC, ROMFS_MAX_FILE_COUNT,
};

/// Flat file archive used inside camera firmware sections. A 40960-byte header
/// lists up to 538 entries; file data follows in 2048-byte blocks.
#[derive(Debug)]
pub struct RomFs {
    files: Vec<(String, Vec<u8>)>,
}

impl RomFs {
    pub fn new() -> RomFs {
        RomFs { files: Vec::new() }
    }

    pub fn add_file(&mut self, name: String, data: Vec<u8>) {
        self.files.push((name, data));
    }

    /// Removes the first entry with a matching name, if any.
    pub fn remove_file(&mut self, name: &str) {
        if let Some(index) = self.files.iter().position(|(n, _)| n == name) {
            self.files.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[(String, Vec<u8>)] {
        &self.files
    }

    /// Reads the archive out of `section_N.files` (one name per line) and the
    /// sibling `section_N/` directory.
    pub fn from_listing(listing: &Path) -> Result<RomFs> {
        let names = fs::read_to_string(listing)?;
        let folder = listing.with_extension("");
        let mut romfs = RomFs::new();
        for line in names.lines() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            let data = fs::read(folder.join(name))?;
            romfs.add_file(name.to_string(), data);
        }
        Ok(romfs)
    }

    pub fn decode(archive: &[u8]) -> Result<RomFs> {
        if archive.len() < ROMFS_HEADER_SIZE {
            return Err(FirmwareError::OutOfRange {
                offset: 0,
                len: ROMFS_HEADER_SIZE,
                size: archive.len(),
            });
        }
        if archive[..ROMFS_MAGIC.len()] != ROMFS_MAGIC {
            return Err(FirmwareError::BadMagic("ROMFS"));
        }
        let file_count = get_u32_le(&archive[ROMFS_FILECOUNT_POSITION..]) as usize;
        if file_count > ROMFS_MAX_FILE_COUNT {
            return Err(FirmwareError::TooManyRomFsFiles(file_count));
        }

        let mut romfs = RomFs::new();
        for i in 0..file_count {
            let base = ROMFS_ENTRY_TABLE_POSITION + i * ROMFS_ENTRY_SIZE;
            let entry = &archive[base..base + ROMFS_ENTRY_SIZE];
            let name = trim_nul(&entry[..ROMFS_FILE_NAME_SIZE]);
            let length = get_u32_le(&entry[ROMFS_FILE_NAME_SIZE..]) as usize;
            let offset = get_u32_le(&entry[ROMFS_FILE_NAME_SIZE + 4..]) as usize;
            let crc32 = get_u32_le(&entry[ROMFS_FILE_NAME_SIZE + 8..]);

            let end = offset
                .checked_add(length)
                .filter(|&end| end <= archive.len())
                .ok_or(FirmwareError::OutOfRange {
                    offset,
                    len: length,
                    size: archive.len(),
                })?;
            let data = &archive[offset..end];
            if crc32_of(data, 0) != crc32 {
                println!("Invalid file CRC32 for {}, skipping...", name);
                continue;
            }
            romfs.add_file(name, data.to_vec());
        }
        Ok(romfs)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.files.len() > ROMFS_MAX_FILE_COUNT {
            return Err(FirmwareError::TooManyRomFsFiles(self.files.len()));
        }
        for (name, _) in &self.files {
            if name.len() > ROMFS_FILE_NAME_SIZE {
                return Err(FirmwareError::NameTooLong(name.clone()));
            }
        }

        let data_size: usize = self
            .files
            .iter()
            .map(|(_, data)| data.len() + block_padding(data.len()))
            .sum();
        let mut archive = Vec::with_capacity(ROMFS_HEADER_SIZE + data_size);
        archive.extend_from_slice(&ROMFS_MAGIC);
        archive.extend_from_slice(&(self.files.len() as u32).to_le_bytes());

        let mut offset = ROMFS_HEADER_SIZE;
        for (name, data) in &self.files {
            let mut entry = [0u8; ROMFS_ENTRY_SIZE];
            entry[..name.len()].copy_from_slice(name.as_bytes());
            put_u32_le(&mut entry[ROMFS_FILE_NAME_SIZE..], data.len() as u32);
            put_u32_le(&mut entry[ROMFS_FILE_NAME_SIZE + 4..], offset as u32);
            put_u32_le(&mut entry[ROMFS_FILE_NAME_SIZE + 8..], crc32_of(data, 0));
            archive.extend_from_slice(&entry);
            offset += data.len() + block_padding(data.len());
        }
        archive.resize(ROMFS_HEADER_SIZE, 0);

        for (_, data) in &self.files {
            archive.extend_from_slice(data);
            archive.resize(archive.len() + block_padding(data.len()), 0);
        }
        Ok(archive)
    }
}

impl Default for RomFs {
    fn default() -> RomFs {
        RomFs::new()
    }
}

/// NUL padding after a file. An exact 2048 multiple still gets a full block.
fn block_padding(length: usize) -> usize {
    ROMFS_BLOCK_SIZE - length % ROMFS_BLOCK_SIZE
}

use std::fmt;
use std::path::Path;

use crate::digest::{crc32_seeded, md5_range};
use crate::error::{FirmwareError, Result};
use crate::view::{trim_nul, ByteView};
use crate::{
    CRC32_SIZE, DTB_MAGIC, EXT2_MAGIC, EXT2_MAGIC_POSITION, FIRMWARE_HEADER_SIZE, FOOTER_GO2_SIZE,
    FOOTER_GO3_SIZE, GO2_SIGNATURE, GO3_SIGNATURE, HEADER_CRC32_POSITION, HEADER_MAGIC,
    HEADER_MAGIC_POSITION, HEADER_NAME_SIZE, HEADER_ZEROS_POSITION, KERNEL_MAGIC,
    KERNEL_MAGIC_POSITION, MD5_SIZE, ROMFS_MAGIC, RTOS_MAGIC, SECTION_DATE_POSITION,
    SECTION_FLAGS_POSITION, SECTION_HEADER_SIZE, SECTION_LENGTH_POSITION,
    SECTION_LOADING_ADDRESS_POSITION, SECTION_MAGIC, SECTION_MAGIC_POSITION,
    SECTION_TABLE_COUNT, SECTION_TABLE_ENTRY_SIZE, SECTION_TABLE_POSITION,
    SECTION_VERSION_POSITION, SIGNATURE_SIZE, SLOT_FILENAME_POSITION, SLOT_FILENAME_SIZE,
    SLOT_LENGTH_POSITION, SLOT_MD5_POSITION, SLOT_SIZE, SLOT_VERSION_POSITION, SLOT_VERSION_SIZE,
};

/// Camera family, determined solely by the trailing footer signature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    Go2,
    Go3,
}

impl Variant {
    /// Probes the last 16 bytes of `tail` against the known signatures.
    pub fn probe(tail: &[u8]) -> Option<Variant> {
        if tail.len() < SIGNATURE_SIZE {
            return None;
        }
        let signature = &tail[tail.len() - SIGNATURE_SIZE..];
        if *signature == GO2_SIGNATURE {
            Some(Variant::Go2)
        } else if *signature == GO3_SIGNATURE {
            Some(Variant::Go3)
        } else {
            None
        }
    }

    pub fn footer_size(self) -> usize {
        match self {
            Variant::Go2 => FOOTER_GO2_SIZE,
            Variant::Go3 => FOOTER_GO3_SIZE,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Go2 => write!(f, "GO 2"),
            Variant::Go3 => write!(f, "GO 3"),
        }
    }
}

/// What a section body holds, detected from well-known magic bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Rtos,
    RomFs,
    Kernel,
    Ext2,
    Dtb,
    Unknown,
}

impl SectionKind {
    pub fn detect(body: &[u8]) -> SectionKind {
        if body.starts_with(&RTOS_MAGIC) {
            SectionKind::Rtos
        } else if body.starts_with(&ROMFS_MAGIC) {
            SectionKind::RomFs
        } else if body.len() >= KERNEL_MAGIC_POSITION + KERNEL_MAGIC.len()
            && body[KERNEL_MAGIC_POSITION..KERNEL_MAGIC_POSITION + KERNEL_MAGIC.len()]
                == KERNEL_MAGIC
        {
            SectionKind::Kernel
        } else if body.len() >= EXT2_MAGIC_POSITION + EXT2_MAGIC.len()
            && body[EXT2_MAGIC_POSITION..EXT2_MAGIC_POSITION + EXT2_MAGIC.len()] == EXT2_MAGIC
        {
            SectionKind::Ext2
        } else if body.starts_with(&DTB_MAGIC) {
            SectionKind::Dtb
        } else {
            SectionKind::Unknown
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Rtos => "RTOS",
            SectionKind::RomFs => "ROMFS",
            SectionKind::Kernel => "KERNEL",
            SectionKind::Ext2 => "EXT2",
            SectionKind::Dtb => "DTB",
            SectionKind::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// One non-empty entry of the 16-slot table in the firmware header.
#[derive(Copy, Clone, Debug)]
pub struct HeaderSection {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub crc32: u32,
    pub crc32_inverse: u32,
}

/// The 256-byte header stored in front of each section body.
#[derive(Copy, Clone, Debug)]
pub struct Section {
    pub index: usize,
    pub header_start: usize,
    pub body_start: usize,
    pub end: usize,
    pub crc32: u32,
    pub version: u32,
    pub date: u32,
    pub length: u32,
    pub loading_address: u32,
    pub flags: u32,
    pub magic: [u8; 4],
}

/// One 84-byte footer record describing a contained firmware.
#[derive(Clone, Debug)]
pub struct FirmwareSlot {
    pub length: u32,
    pub filename: String,
    pub version: String,
    pub md5: [u8; MD5_SIZE],
}

impl FirmwareSlot {
    fn parse(view: &ByteView, base: usize) -> Result<FirmwareSlot> {
        Ok(FirmwareSlot {
            length: view.read_u32_le(base + SLOT_LENGTH_POSITION)?,
            filename: trim_nul(view.read(base + SLOT_FILENAME_POSITION, SLOT_FILENAME_SIZE)?),
            version: trim_nul(view.read(base + SLOT_VERSION_POSITION, SLOT_VERSION_SIZE)?),
            md5: view.read_fixed(base + SLOT_MD5_POSITION)?,
        })
    }
}

/// Parsed firmware container. Holds ranges into the backing view; nothing is
/// copied until unpack.
#[derive(Debug)]
pub struct Firmware {
    pub(crate) view: ByteView,
    pub file_size: usize,
    pub variant: Variant,
    header_name: [u8; HEADER_NAME_SIZE],
    header_magic: [u8; 4],
    header_crc32: u32,
    header_zeros: [u8; 8],
    pub header_sections: Vec<HeaderSection>,
    pub sections: Vec<Section>,
    pub camera: FirmwareSlot,
    pub box_fw: FirmwareSlot,
    pub camera_bt: Option<FirmwareSlot>,
    pub box_bt: Option<FirmwareSlot>,
    camera_internal_md5: [u8; MD5_SIZE],
}

impl Firmware {
    pub fn open(path: impl AsRef<Path>) -> Result<Firmware> {
        Firmware::parse(ByteView::open(path.as_ref())?)
    }

    pub fn parse(view: ByteView) -> Result<Firmware> {
        let file_size = view.len();
        let variant = Variant::probe(view.as_slice()).ok_or(FirmwareError::UnsupportedVariant)?;
        let footer_size = variant.footer_size();
        if file_size < FIRMWARE_HEADER_SIZE + footer_size {
            return Err(FirmwareError::SizeMismatch {
                expected: (FIRMWARE_HEADER_SIZE + footer_size) as u64,
                actual: file_size as u64,
            });
        }

        let header_name = view.read_fixed(0)?;
        let header_magic = view.read_fixed(HEADER_MAGIC_POSITION)?;
        let header_crc32 = view.read_u32_le(HEADER_CRC32_POSITION)?;
        let header_zeros = view.read_fixed(HEADER_ZEROS_POSITION)?;

        let footer_start = file_size - footer_size;
        let camera = FirmwareSlot::parse(&view, footer_start)?;
        let box_fw = FirmwareSlot::parse(&view, footer_start + SLOT_SIZE)?;
        let (camera_bt, box_bt) = match variant {
            Variant::Go2 => (None, None),
            Variant::Go3 => (
                Some(FirmwareSlot::parse(&view, footer_start + 2 * SLOT_SIZE)?),
                Some(FirmwareSlot::parse(&view, footer_start + 3 * SLOT_SIZE)?),
            ),
        };

        // A stray signature match on an unrelated file must be rejected here,
        // before any of the lengths below are trusted.
        let expected = camera.length as u64
            + box_fw.length as u64
            + camera_bt.as_ref().map_or(0, |slot| slot.length as u64)
            + box_bt.as_ref().map_or(0, |slot| slot.length as u64)
            + footer_size as u64;
        if expected != file_size as u64 {
            return Err(FirmwareError::SizeMismatch {
                expected,
                actual: file_size as u64,
            });
        }

        let camera_size = camera.length as usize;
        if camera_size < FIRMWARE_HEADER_SIZE + MD5_SIZE {
            return Err(FirmwareError::SizeMismatch {
                expected: (FIRMWARE_HEADER_SIZE + MD5_SIZE) as u64,
                actual: camera.length as u64,
            });
        }

        let mut firmware = Firmware {
            view,
            file_size,
            variant,
            header_name,
            header_magic,
            header_crc32,
            header_zeros,
            header_sections: Vec::new(),
            sections: Vec::new(),
            camera,
            box_fw,
            camera_bt,
            box_bt,
            camera_internal_md5: [0; MD5_SIZE],
        };
        firmware.read_sections()?;
        firmware.camera_internal_md5 = firmware.view.read_fixed(camera_size - MD5_SIZE)?;

        firmware.print_summary();
        Ok(firmware)
    }

    fn read_sections(&mut self) -> Result<()> {
        let mut start = FIRMWARE_HEADER_SIZE;
        for index in 0..SECTION_TABLE_COUNT {
            let entry = SECTION_TABLE_POSITION + index * SECTION_TABLE_ENTRY_SIZE;
            let mut length = self.view.read_u32_le(entry)? as usize;
            let crc32 = self.view.read_u32_le(entry + CRC32_SIZE)?;

            // The DTB slot stores a CRC but no length; recover it from the
            // section's own header, located by its magic.
            if crc32 != 0 && length == 0 {
                length = self.recover_section_length(start)?;
            }
            if length == 0 {
                continue;
            }

            let end = start
                .checked_add(length)
                .filter(|&end| end <= self.file_size)
                .ok_or(FirmwareError::OutOfRange {
                    offset: start,
                    len: length,
                    size: self.file_size,
                })?;
            self.header_sections.push(HeaderSection {
                index,
                start,
                end,
                length,
                crc32,
                crc32_inverse: !crc32,
            });
            self.sections.push(Section {
                index,
                header_start: start,
                body_start: start + SECTION_HEADER_SIZE,
                end,
                crc32: self.view.read_u32_le(start)?,
                version: self.view.read_u32_le(start + SECTION_VERSION_POSITION)?,
                date: self.view.read_u32_le(start + SECTION_DATE_POSITION)?,
                length: self.view.read_u32_le(start + SECTION_LENGTH_POSITION)?,
                loading_address: self
                    .view
                    .read_u32_le(start + SECTION_LOADING_ADDRESS_POSITION)?,
                flags: self.view.read_u32_le(start + SECTION_FLAGS_POSITION)?,
                magic: self.view.read_fixed(start + SECTION_MAGIC_POSITION)?,
            });
            start = end;
        }
        Ok(())
    }

    fn recover_section_length(&self, start: usize) -> Result<usize> {
        let limit = self.file_size - self.footer_size();
        let magic_at = self
            .view
            .find(&SECTION_MAGIC, start, limit)
            .ok_or(FirmwareError::BadMagic("section header"))?;
        // The length field sits 12 bytes before the magic and counts the body
        // only, not the 256-byte header.
        let body_length = self
            .view
            .read_u32_le(magic_at - (SECTION_MAGIC_POSITION - SECTION_LENGTH_POSITION))?;
        Ok(body_length as usize + SECTION_HEADER_SIZE)
    }

    fn print_summary(&self) {
        println!("Camera firmware size: {}", self.camera.length);
        println!("Box firmware size: {}", self.box_fw.length);
        if let (Some(camera_bt), Some(box_bt)) = (&self.camera_bt, &self.box_bt) {
            println!("Camera Bluetooth firmware size: {}", camera_bt.length);
            println!("Box Bluetooth firmware size: {}", box_bt.length);
        }
        println!("Footer size: {}", self.footer_size());
        println!(
            "Detected Insta360 {} firmware: {} ({})",
            self.variant, self.camera.filename, self.camera.version
        );
    }

    pub fn footer_size(&self) -> usize {
        self.variant.footer_size()
    }

    pub fn camera_size(&self) -> usize {
        self.camera.length as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_name.iter().any(|&b| b != 0) {
            return Err(FirmwareError::ZeroFieldNonZero("name"));
        }
        if self.header_magic != HEADER_MAGIC {
            return Err(FirmwareError::BadMagic("firmware header"));
        }
        if self.header_zeros.iter().any(|&b| b != 0) {
            return Err(FirmwareError::ZeroFieldNonZero("zeros"));
        }
        if Variant::probe(self.view.as_slice()).is_none() {
            return Err(FirmwareError::UnsupportedVariant);
        }

        let expected = self.camera.length as u64
            + self.box_fw.length as u64
            + self.camera_bt.as_ref().map_or(0, |slot| slot.length as u64)
            + self.box_bt.as_ref().map_or(0, |slot| slot.length as u64)
            + self.footer_size() as u64;
        if expected != self.file_size as u64 {
            return Err(FirmwareError::SizeMismatch {
                expected,
                actual: self.file_size as u64,
            });
        }

        // The table chain is a running CRC across the concatenated section
        // blobs; each stored value is the inverse of the chain so far.
        let mut running = 0u32;
        for header_section in &self.header_sections {
            running = crc32_seeded(
                &self.view,
                header_section.start,
                header_section.length,
                running,
            )?;
            println!(
                "Section {} crc32 0x{:08x} running 0x{:08x} length {} bytes",
                header_section.index, header_section.crc32, running, header_section.length
            );
            if header_section.crc32 != 0 && running != header_section.crc32_inverse {
                return Err(FirmwareError::CrcMismatch(format!(
                    "firmware header section {}",
                    header_section.index
                )));
            }
        }

        for section in &self.sections {
            let computed = crc32_seeded(
                &self.view,
                section.body_start,
                section.end - section.body_start,
                0,
            )?;
            if computed != section.crc32 {
                return Err(FirmwareError::CrcMismatch(format!(
                    "content in section {}",
                    section.index
                )));
            }
        }

        let camera_size = self.camera_size();
        let computed = crc32_seeded(
            &self.view,
            FIRMWARE_HEADER_SIZE,
            camera_size - FIRMWARE_HEADER_SIZE - MD5_SIZE,
            0,
        )?;
        if computed != self.header_crc32 {
            return Err(FirmwareError::CrcMismatch("firmware header".to_string()));
        }

        if md5_range(&self.view, 0, camera_size - MD5_SIZE)? != self.camera_internal_md5 {
            return Err(FirmwareError::Md5Mismatch("camera firmware internal"));
        }
        if md5_range(&self.view, 0, camera_size)? != self.camera.md5 {
            return Err(FirmwareError::Md5Mismatch("camera firmware"));
        }

        let mut cursor = camera_size;
        if md5_range(&self.view, cursor, self.box_fw.length as usize)? != self.box_fw.md5 {
            return Err(FirmwareError::Md5Mismatch("box firmware"));
        }
        cursor += self.box_fw.length as usize;

        if let (Some(camera_bt), Some(box_bt)) = (&self.camera_bt, &self.box_bt) {
            if md5_range(&self.view, cursor, camera_bt.length as usize)? != camera_bt.md5 {
                return Err(FirmwareError::Md5Mismatch("camera bluetooth firmware"));
            }
            cursor += camera_bt.length as usize;
            if md5_range(&self.view, cursor, box_bt.length as usize)? != box_bt.md5 {
                return Err(FirmwareError::Md5Mismatch("box bluetooth firmware"));
            }
        }

        println!("Firmware OK!");
        Ok(())
    }
}

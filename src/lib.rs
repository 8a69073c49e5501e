mod container;
mod digest;
mod dtb;
mod error;
mod pack;
mod romfs;
mod unpack;
mod view;

pub use container::{Firmware, FirmwareSlot, HeaderSection, Section, SectionKind, Variant};
pub use digest::{crc32_of, crc32_seeded, md5_of, md5_range};
pub use error::{FirmwareError, Result};
pub use pack::pack_firmware;
pub use romfs::RomFs;
pub use unpack::unpack_firmware;
pub use view::{get_u32_le, put_u32_le, ByteView};

pub const MD5_SIZE: usize = 16;
pub const CRC32_SIZE: usize = 4;

pub const HEADER_MAGIC: [u8; 4] = [0xE6, 0xDF, 0x32, 0x87];
pub const SECTION_MAGIC: [u8; 4] = [0x90, 0xEB, 0x24, 0xA3];

pub const RTOS_MAGIC: [u8; 8] = [0x34, 0x00, 0x00, 0xEA, 0x05, 0x00, 0x00, 0xEA];
pub const ROMFS_MAGIC: [u8; 4] = [0x8A, 0x32, 0xFC, 0x66];
pub const KERNEL_MAGIC: [u8; 4] = *b"ARMd";
pub const KERNEL_MAGIC_POSITION: usize = 0x38;
pub const EXT2_MAGIC: [u8; 2] = [0x53, 0xEF];
pub const EXT2_MAGIC_POSITION: usize = 0x438;
pub const DTB_MAGIC: [u8; 4] = [0xD0, 0x0D, 0xFE, 0xED];

pub const GO2_SIGNATURE: [u8; 16] = [
    0x57, 0x46, 0x4E, 0x49, 0x54, 0x58, 0x4E, 0x4F, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
pub const GO3_SIGNATURE: [u8; 16] = [
    0x57, 0x46, 0x4E, 0x49, 0x55, 0x58, 0x4E, 0x4F, 0x04, 0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x00,
];
pub const SIGNATURE_SIZE: usize = 16;

pub const FIRMWARE_HEADER_SIZE: usize = 560;
pub const HEADER_NAME_SIZE: usize = 32;
pub const HEADER_MAGIC_POSITION: usize = 32;
pub const HEADER_CRC32_POSITION: usize = 36;
pub const HEADER_ZEROS_POSITION: usize = 40;
pub const HEADER_ZEROS_SIZE: usize = 8;
pub const SECTION_TABLE_POSITION: usize = 48;
pub const SECTION_TABLE_COUNT: usize = 16;
pub const SECTION_TABLE_ENTRY_SIZE: usize = 8;

pub const SECTION_HEADER_SIZE: usize = 256;
pub const SECTION_CRC32_POSITION: usize = 0;
pub const SECTION_VERSION_POSITION: usize = 4;
pub const SECTION_DATE_POSITION: usize = 8;
pub const SECTION_LENGTH_POSITION: usize = 12;
pub const SECTION_LOADING_ADDRESS_POSITION: usize = 16;
pub const SECTION_FLAGS_POSITION: usize = 20;
pub const SECTION_MAGIC_POSITION: usize = 24;

pub const FOOTER_GO2_SIZE: usize = 184;
pub const FOOTER_GO3_SIZE: usize = 352;
pub const SLOT_SIZE: usize = 84;
pub const SLOT_LENGTH_POSITION: usize = 0;
pub const SLOT_FILENAME_POSITION: usize = 4;
pub const SLOT_FILENAME_SIZE: usize = 32;
pub const SLOT_VERSION_POSITION: usize = 36;
pub const SLOT_VERSION_SIZE: usize = 32;
pub const SLOT_MD5_POSITION: usize = 68;

pub const ROMFS_HEADER_SIZE: usize = 40960;
pub const ROMFS_FILECOUNT_POSITION: usize = 4;
pub const ROMFS_ENTRY_TABLE_POSITION: usize = 8;
pub const ROMFS_FILE_NAME_SIZE: usize = 64;
pub const ROMFS_ENTRY_SIZE: usize = 76;
pub const ROMFS_BLOCK_SIZE: usize = 2048;
// 40960-byte header divided by the 76-byte entry, rounded down
pub const ROMFS_MAX_FILE_COUNT: usize = 538;

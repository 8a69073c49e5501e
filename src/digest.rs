use crate::error::Result;
use crate::view::ByteView;
use crate::MD5_SIZE;

pub fn md5_of(data: &[u8]) -> [u8; MD5_SIZE] {
    md5::compute(data).0
}

pub fn md5_range(view: &ByteView, start: usize, len: usize) -> Result<[u8; MD5_SIZE]> {
    Ok(md5_of(view.read(start, len)?))
}

/// CRC32 with an explicit seed. Seeding with a previous result continues the
/// checksum as if the inputs had been concatenated; the first call uses seed 0.
pub fn crc32_of(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

pub fn crc32_seeded(view: &ByteView, start: usize, len: usize, seed: u32) -> Result<u32> {
    Ok(crc32_of(view.read(start, len)?, seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        // zlib crc32 of "123456789"
        assert_eq!(crc32_of(b"123456789", 0), 0xCBF43926);
    }

    #[test]
    fn crc32_chain_matches_one_shot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let whole = crc32_of(data, 0);
        let mut running = 0;
        for chunk in data.chunks(7) {
            running = crc32_of(chunk, running);
        }
        assert_eq!(running, whole);
    }

    #[test]
    fn crc32_of_empty_keeps_seed() {
        assert_eq!(crc32_of(&[], 0xDEADBEEF), 0xDEADBEEF);
    }

    #[test]
    fn md5_known_value() {
        assert_eq!(
            md5_of(b"abc"),
            [
                0x90, 0x01, 0x50, 0x98, 0x3C, 0xD2, 0x4F, 0xB0, 0xD6, 0x96, 0x3F, 0x7D, 0x28,
                0xE1, 0x7F, 0x72
            ]
        );
    }
}

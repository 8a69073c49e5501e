#![allow(dead_code)]

use gofwtool_rs::*;

pub fn rtos_body() -> Vec<u8> {
    let mut body = RTOS_MAGIC.to_vec();
    body.extend((0..500).map(|i| (i * 7 % 256) as u8));
    body
}

pub fn romfs_body() -> Vec<u8> {
    let mut romfs = RomFs::new();
    romfs.add_file("boot.cfg".to_string(), b"boot=normal\n".to_vec());
    romfs.add_file("logo.bmp".to_string(), vec![0x42; 3000]);
    romfs.encode().unwrap()
}

pub fn kernel_body() -> Vec<u8> {
    let mut body: Vec<u8> = (0..0x400).map(|i| (i * 3 % 256) as u8).collect();
    body[KERNEL_MAGIC_POSITION..KERNEL_MAGIC_POSITION + KERNEL_MAGIC.len()]
        .copy_from_slice(&KERNEL_MAGIC);
    body
}

pub fn dtb_body() -> Vec<u8> {
    let mut body = DTB_MAGIC.to_vec();
    body.extend(vec![0x5A; 300]);
    body
}

pub fn box_body() -> Vec<u8> {
    vec![0x5F; 700]
}

pub fn camera_bt_body() -> Vec<u8> {
    vec![0x61; 128]
}

pub fn box_bt_body() -> Vec<u8> {
    vec![0x62; 256]
}

/// A 256-byte section header followed by the body, with the CRC32 and length
/// fields filled in the way the camera firmware stores them.
pub fn section_blob(body: &[u8]) -> Vec<u8> {
    let mut blob = vec![0u8; SECTION_HEADER_SIZE];
    put_u32_le(&mut blob[SECTION_CRC32_POSITION..], crc32_of(body, 0));
    put_u32_le(&mut blob[SECTION_VERSION_POSITION..], 0x0102_0304);
    put_u32_le(&mut blob[SECTION_DATE_POSITION..], 0x2023_1107);
    put_u32_le(&mut blob[SECTION_LENGTH_POSITION..], body.len() as u32);
    put_u32_le(&mut blob[SECTION_LOADING_ADDRESS_POSITION..], 0x8000_0000);
    put_u32_le(&mut blob[SECTION_FLAGS_POSITION..], 0);
    blob[SECTION_MAGIC_POSITION..SECTION_MAGIC_POSITION + SECTION_MAGIC.len()]
        .copy_from_slice(&SECTION_MAGIC);
    blob.extend_from_slice(body);
    blob
}

/// Assembles a complete, internally consistent firmware container. DTB bodies
/// get a zero length in the section table, as shipped firmwares do.
pub fn build_container(
    variant: Variant,
    bodies: &[Vec<u8>],
    box_fw: &[u8],
    bluetooth: Option<(Vec<u8>, Vec<u8>)>,
) -> Vec<u8> {
    let mut out = vec![0u8; FIRMWARE_HEADER_SIZE];
    out[HEADER_MAGIC_POSITION..HEADER_MAGIC_POSITION + HEADER_MAGIC.len()]
        .copy_from_slice(&HEADER_MAGIC);
    let table_end = SECTION_TABLE_POSITION + SECTION_TABLE_COUNT * SECTION_TABLE_ENTRY_SIZE;
    for (i, byte) in out[table_end..FIRMWARE_HEADER_SIZE].iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }

    let mut running = 0u32;
    for (i, body) in bodies.iter().enumerate() {
        let blob = section_blob(body);
        running = crc32_of(&blob, running);
        let entry = SECTION_TABLE_POSITION + i * SECTION_TABLE_ENTRY_SIZE;
        let table_length = if body.starts_with(&DTB_MAGIC) {
            0
        } else {
            blob.len() as u32
        };
        put_u32_le(&mut out[entry..], table_length);
        put_u32_le(&mut out[entry + 4..], !running);
        out.extend_from_slice(&blob);
    }

    let header_crc32 = crc32_of(&out[FIRMWARE_HEADER_SIZE..], 0);
    put_u32_le(&mut out[HEADER_CRC32_POSITION..], header_crc32);

    let internal_md5 = md5_of(&out);
    out.extend_from_slice(&internal_md5);

    let camera_size = out.len();
    let camera_md5 = md5_of(&out);
    out.extend_from_slice(box_fw);

    let footer_size = variant.footer_size();
    let mut footer = vec![0u8; footer_size];
    let (camera_name, camera_version) = match variant {
        Variant::Go2 => ("InstaGo2FW.pkg", "v1.0.85_build1"),
        Variant::Go3 => ("InstaGo3FW.pkg", "v1.2.18_build2"),
    };
    fill_slot(&mut footer, 0, camera_size as u32, camera_name, camera_version, &camera_md5);
    fill_slot(&mut footer, 1, box_fw.len() as u32, "box.bin", "v2.4.7", &md5_of(box_fw));

    match (variant, bluetooth) {
        (Variant::Go2, None) => {}
        (Variant::Go3, Some((camera_bt, box_bt))) => {
            fill_slot(&mut footer, 2, camera_bt.len() as u32, "camera_bt.bin", "v3.0.1", &md5_of(&camera_bt));
            out.extend_from_slice(&camera_bt);
            fill_slot(&mut footer, 3, box_bt.len() as u32, "box_bt.bin", "v3.0.2", &md5_of(&box_bt));
            out.extend_from_slice(&box_bt);
        }
        _ => panic!("Bluetooth images belong to GO 3 containers only"),
    }

    let signature = match variant {
        Variant::Go2 => GO2_SIGNATURE,
        Variant::Go3 => GO3_SIGNATURE,
    };
    footer[footer_size - SIGNATURE_SIZE..].copy_from_slice(&signature);
    out.extend_from_slice(&footer);
    out
}

fn fill_slot(
    footer: &mut [u8],
    slot: usize,
    length: u32,
    filename: &str,
    version: &str,
    md5: &[u8; MD5_SIZE],
) {
    let base = slot * SLOT_SIZE;
    put_u32_le(&mut footer[base + SLOT_LENGTH_POSITION..], length);
    footer[base + SLOT_FILENAME_POSITION..base + SLOT_FILENAME_POSITION + filename.len()]
        .copy_from_slice(filename.as_bytes());
    footer[base + SLOT_VERSION_POSITION..base + SLOT_VERSION_POSITION + version.len()]
        .copy_from_slice(version.as_bytes());
    footer[base + SLOT_MD5_POSITION..base + SLOT_MD5_POSITION + MD5_SIZE].copy_from_slice(md5);
}

pub fn go2_container() -> Vec<u8> {
    build_container(
        Variant::Go2,
        &[rtos_body(), romfs_body()],
        &box_body(),
        None,
    )
}

pub fn go3_container() -> Vec<u8> {
    build_container(
        Variant::Go3,
        &[rtos_body(), romfs_body(), kernel_body(), dtb_body()],
        &box_body(),
        Some((camera_bt_body(), box_bt_body())),
    )
}

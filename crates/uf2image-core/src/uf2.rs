//! Wire layout of a UF2 block and the decoder turning one 512 byte record
//! into a structured [`Uf2Block`].

use std::borrow::Cow;
use std::mem;

use assert_into::AssertInto;
use static_assertions::const_assert;
use thiserror::Error;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, KnownLayout};

pub const UF2_MAGIC_START0: u32 = 0x0A324655;
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x00002000;
pub const UF2_FLAG_MD5_PRESENT: u32 = 0x00004000;
pub const UF2_FLAG_EXTENSION_TAGS: u32 = 0x00008000;

/// One physical UF2 record on the wire.
pub const BLOCK_SIZE: usize = 512;
/// The data region between the 32 byte header and the trailing magic.
pub const DATA_SIZE: usize = 476;

// Extension tag ids from the UF2 specification. Recognized and surfaced,
// their payloads are not decoded further.
pub const ETAG_DESCRIPTION: u32 = 0x650d9d;
pub const ETAG_FW_VERSION: u32 = 0x9fc7bc;
pub const ETAG_PAGE_SIZE: u32 = 0x0be9f7;
pub const ETAG_FW_CHECKSUM: u32 = 0xb46db0;
pub const ETAG_DEVICE_ID: u32 = 0xc8a729;

/// Name of a known extension tag id.
pub fn tag_name(tag: u32) -> Option<&'static str> {
    match tag {
        ETAG_DESCRIPTION => Some("device description"),
        ETAG_FW_VERSION => Some("firmware version"),
        ETAG_PAGE_SIZE => Some("page size"),
        ETAG_FW_CHECKSUM => Some("firmware checksum"),
        ETAG_DEVICE_ID => Some("device id"),
        _ => None,
    }
}

#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawBlock {
    // 32 byte header
    magic_start0: U32,
    magic_start1: U32,
    flags: U32,
    target_addr: U32,
    payload_size: U32,
    block_no: U32,
    num_blocks: U32,
    file_size: U32, // or familyID
    data: [u8; DATA_SIZE],
    magic_end: U32,
}

const_assert!(mem::size_of::<RawBlock>() == BLOCK_SIZE);

// Trailing 24 bytes of the data region when the md5 flag is set.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawChecksum {
    region_addr: U32,
    region_len: U32,
    md5: [u8; 16],
}

const_assert!(mem::size_of::<RawChecksum>() == 24);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("invalid first start magic {0:#010x}")]
    BadMagicStart0(u32),
    #[error("invalid second start magic {0:#010x}")]
    BadMagicStart1(u32),
    #[error("invalid end magic {0:#010x}")]
    BadMagicEnd(u32),
    #[error("payload size {0} exceeds the 476 byte data region")]
    PayloadTooLarge(u32),
}

/// The trailing header field is a file size unless the family id flag is
/// set, in which case it identifies the board family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Info {
    FileSize(u32),
    BoardFamily(u32),
}

/// A decoded UF2 block.
#[derive(Debug, Clone)]
pub struct Uf2Block {
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    pub info: Info,
    pub data: [u8; DATA_SIZE],
}

/// Checksum metadata carried by a block with the md5 flag. The checksum is
/// surfaced as-is and never verified against the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumInfo {
    pub region_addr: u32,
    pub region_len: u32,
    pub md5: [u8; 16],
}

/// Decode one 512 byte record.
///
/// Pure byte-to-struct transform: validates the three magic sentinels and
/// the payload size, then copies the header fields and data region out.
/// A magic mismatch means the cursor has lost block synchronization, so the
/// caller must treat it as fatal for the whole container.
pub fn decode(bytes: &[u8; BLOCK_SIZE]) -> Result<Uf2Block, FramingError> {
    let raw: &RawBlock = zerocopy::transmute_ref!(bytes);

    if raw.magic_start0.get() != UF2_MAGIC_START0 {
        return Err(FramingError::BadMagicStart0(raw.magic_start0.get()));
    }

    if raw.magic_start1.get() != UF2_MAGIC_START1 {
        return Err(FramingError::BadMagicStart1(raw.magic_start1.get()));
    }

    if raw.magic_end.get() != UF2_MAGIC_END {
        return Err(FramingError::BadMagicEnd(raw.magic_end.get()));
    }

    let payload_size = raw.payload_size.get();
    if payload_size as usize > DATA_SIZE {
        return Err(FramingError::PayloadTooLarge(payload_size));
    }

    let flags = raw.flags.get();
    let info = if flags & UF2_FLAG_FAMILY_ID_PRESENT != 0 {
        Info::BoardFamily(raw.file_size.get())
    } else {
        Info::FileSize(raw.file_size.get())
    };

    Ok(Uf2Block {
        flags,
        target_addr: raw.target_addr.get(),
        payload_size,
        block_no: raw.block_no.get(),
        num_blocks: raw.num_blocks.get(),
        info,
        data: raw.data,
    })
}

impl Uf2Block {
    pub fn is_not_main_flash(&self) -> bool {
        self.flags & UF2_FLAG_NOT_MAIN_FLASH != 0
    }

    pub fn has_file_container(&self) -> bool {
        self.flags & UF2_FLAG_FILE_CONTAINER != 0
    }

    pub fn has_family_id(&self) -> bool {
        self.flags & UF2_FLAG_FAMILY_ID_PRESENT != 0
    }

    pub fn has_md5(&self) -> bool {
        self.flags & UF2_FLAG_MD5_PRESENT != 0
    }

    pub fn has_extension_tags(&self) -> bool {
        self.flags & UF2_FLAG_EXTENSION_TAGS != 0
    }

    /// The valid payload bytes, `data[..payload_size]`.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.payload_size.assert_into()]
    }

    pub fn family_id(&self) -> Option<u32> {
        match self.info {
            Info::BoardFamily(id) => Some(id),
            Info::FileSize(_) => None,
        }
    }

    /// File name of a file container block, stored NUL-terminated right
    /// after the payload.
    pub fn file_name(&self) -> Option<Cow<'_, str>> {
        if !self.has_file_container() {
            return None;
        }
        let tail = &self.data[self.payload_size.assert_into()..];
        let name = match tail.iter().position(|&b| b == 0) {
            Some(nul) => &tail[..nul],
            None => tail,
        };
        Some(String::from_utf8_lossy(name))
    }

    /// Checksum metadata from the last 24 bytes of the data region, when
    /// the md5 flag is set.
    pub fn checksum_info(&self) -> Option<ChecksumInfo> {
        if !self.has_md5() {
            return None;
        }
        let raw = RawChecksum::read_from_bytes(&self.data[DATA_SIZE - 24..]).ok()?;
        Some(ChecksumInfo {
            region_addr: raw.region_addr.get(),
            region_len: raw.region_len.get(),
            md5: raw.md5,
        })
    }

    /// Walk the extension tag sub-records between `payload_size` and the
    /// end of the data region. Empty unless the extension tags flag is set.
    pub fn extension_tags(&self) -> ExtensionTags<'_> {
        let offset = if self.has_extension_tags() {
            self.payload_size.assert_into()
        } else {
            DATA_SIZE
        };
        ExtensionTags {
            data: &self.data,
            offset,
        }
    }
}

/// One extension tag: a 24 bit id and its raw payload bytes. `size` is the
/// declared total entry size, including the 4 header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionTag<'a> {
    pub tag: u32,
    pub size: u8,
    pub data: &'a [u8],
}

pub struct ExtensionTags<'a> {
    data: &'a [u8; DATA_SIZE],
    offset: usize,
}

impl<'a> Iterator for ExtensionTags<'a> {
    type Item = ExtensionTag<'a>;

    fn next(&mut self) -> Option<ExtensionTag<'a>> {
        if self.offset + 4 > DATA_SIZE {
            return None;
        }
        let o = self.offset;
        let word = u32::from_le_bytes([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]);
        let tag = word >> 8;
        let size = (word & 0xff) as u8;
        // a declared size below the 4 header bytes (the zero padding word
        // included) ends the list
        if size < 4 {
            return None;
        }
        let end = DATA_SIZE.min(o + size as usize);
        let item = ExtensionTag {
            tag,
            size,
            data: &self.data[o + 4..end],
        };
        // every tag starts on a 4 byte boundary
        self.offset = o + (size as usize).next_multiple_of(4);
        Some(item)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Assemble a raw 512 byte record for tests.
    pub fn raw_block(
        flags: u32,
        target_addr: u32,
        payload: &[u8],
        block_no: u32,
        num_blocks: u32,
        file_size: u32,
    ) -> [u8; BLOCK_SIZE] {
        assert!(payload.len() <= DATA_SIZE);
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[0x00..0x04].copy_from_slice(&UF2_MAGIC_START0.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&UF2_MAGIC_START1.to_le_bytes());
        bytes[0x08..0x0c].copy_from_slice(&flags.to_le_bytes());
        bytes[0x0c..0x10].copy_from_slice(&target_addr.to_le_bytes());
        bytes[0x10..0x14].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes[0x14..0x18].copy_from_slice(&block_no.to_le_bytes());
        bytes[0x18..0x1c].copy_from_slice(&num_blocks.to_le_bytes());
        bytes[0x1c..0x20].copy_from_slice(&file_size.to_le_bytes());
        bytes[0x20..0x20 + payload.len()].copy_from_slice(payload);
        bytes[0x1fc..].copy_from_slice(&UF2_MAGIC_END.to_le_bytes());
        bytes
    }
}

//! Decode UF2 firmware-update containers into sparse memory images.
//!
//! A UF2 container is a sequence of self-describing 512 byte blocks, each
//! carrying a payload destined for an address in the target device's
//! memory. [`read_image`] walks the blocks, validates their framing,
//! interprets their flags and writes the payloads into a [`SparseImage`]
//! that can then be read back linearly or at random addresses. Metadata the
//! blocks declare along the way (board family, container files, checksums,
//! extension tags) is surfaced through a caller-provided [`EventSink`].

use log::{debug, info, warn};
use thiserror::Error;

pub mod families;
pub mod sparse;
pub mod uf2;

pub use families::{FamilyDescriptor, FamilyTable, BUILTIN_FAMILIES};
pub use sparse::{ImageError, SparseImage};
pub use uf2::{decode, ChecksumInfo, FramingError, Info, Uf2Block, BLOCK_SIZE, DATA_SIZE};

use uf2::tag_name;

/// Read-back value for bytes no block wrote, matching erased flash.
pub const DEFAULT_FILL: u8 = 0xff;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("container holds no blocks")]
    Empty,
    #[error("container ends {remaining} bytes into record {index}, not a full 512 byte block")]
    TruncatedBlock { index: u32, remaining: usize },
    #[error("container ended after {records} records without reaching the final block")]
    MissingFinalBlock { records: u32 },
    #[error("record {index} declares zero total blocks")]
    ZeroBlockCount { index: u32 },
    #[error("invalid block framing in record {index}")]
    Framing {
        index: u32,
        #[source]
        cause: FramingError,
    },
    #[error("image write failed")]
    Image(#[from] ImageError),
}

/// Everything a container declares besides payload bytes, in decode order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uf2Event {
    /// A not-main-flash block was passed over without touching the image.
    Skip { block_no: u32 },
    /// A file container entry: name, declared size and in-file offset.
    /// Multi-block files are not reassembled.
    FileContainerEntry {
        block_no: u32,
        name: String,
        size: u32,
        offset: u32,
    },
    /// First sighting of a family id, with its catalog entry if known.
    FamilyResolved {
        id: u32,
        family: Option<FamilyDescriptor>,
    },
    /// The family id differs from the one seen earlier in this container.
    FamilyChanged { id: u32 },
    /// An md5 checksum trailer is present. It is not verified.
    ChecksumPresent {
        block_no: u32,
        checksum: ChecksumInfo,
    },
    /// An extension tag with a recognized id. Payload is not decoded.
    ExtensionTag {
        block_no: u32,
        tag: u32,
        name: &'static str,
        size: u8,
    },
    UnknownExtensionTag { block_no: u32, tag: u32, size: u8 },
    /// A payload landed in the image.
    BlockWritten { block_no: u32, size: u32, addr: u32 },
    /// Human-readable note for the host to attach at `addr`.
    Annotation { addr: u32, text: String },
}

pub trait EventSink {
    fn event(&mut self, event: Uf2Event);
}

impl EventSink for Vec<Uf2Event> {
    fn event(&mut self, event: Uf2Event) {
        self.push(event);
    }
}

/// Sink that forwards events to the `log` crate.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn event(&mut self, event: Uf2Event) {
        match event {
            Uf2Event::Skip { block_no } => {
                warn!("not-main-flash block #{block_no}, skipping");
            }
            Uf2Event::FileContainerEntry {
                block_no,
                name,
                size,
                offset,
            } => {
                info!(
                    "file container entry \"{name}\" ({size} bytes @ file offset {offset}) in block #{block_no}"
                );
            }
            Uf2Event::FamilyResolved {
                id,
                family: Some(family),
            } => {
                debug!(
                    "family {id:#010x} => {} ({})",
                    family.name, family.description
                );
            }
            Uf2Event::FamilyResolved { id, family: None } => {
                warn!("family {id:#010x} => unknown");
            }
            Uf2Event::FamilyChanged { id } => {
                warn!("family id changed to {id:#010x}");
            }
            Uf2Event::ChecksumPresent { block_no, checksum } => {
                debug!(
                    "md5 checksum in block #{block_no} covers {} bytes @ {:#010x} (not verified)",
                    checksum.region_len, checksum.region_addr
                );
            }
            Uf2Event::ExtensionTag {
                block_no,
                tag,
                name,
                size,
            } => {
                debug!("extension tag {tag:#08x} ({name}, {size} bytes) in block #{block_no}");
            }
            Uf2Event::UnknownExtensionTag {
                block_no,
                tag,
                size,
            } => {
                warn!("unknown extension tag {tag:#08x} ({size} bytes) in block #{block_no}");
            }
            Uf2Event::BlockWritten {
                block_no,
                size,
                addr,
            } => {
                debug!("block #{block_no:02} ({size} bytes @ {addr:#010x})");
            }
            Uf2Event::Annotation { .. } => {}
        }
    }
}

/// Decode a whole container into `image`.
///
/// The loop is bounded by the block sequence itself: it ends once the just
/// processed block reports `block_no == num_blocks - 1`. On a fatal error
/// whatever was already written stays in `image` for diagnostics; the image
/// must not be treated as a valid decode result in that case.
pub fn read_image_into(
    image: &mut SparseImage,
    bytes: &[u8],
    families: &FamilyTable<'_>,
    sink: &mut dyn EventSink,
) -> Result<(), ContainerError> {
    if bytes.is_empty() {
        return Err(ContainerError::Empty);
    }

    let mut family_id: Option<u32> = None;
    let mut index: u32 = 0;
    let mut offset = 0;

    loop {
        let Some(record) = bytes[offset..].first_chunk::<BLOCK_SIZE>() else {
            let remaining = bytes.len() - offset;
            return Err(if remaining == 0 {
                ContainerError::MissingFinalBlock { records: index }
            } else {
                ContainerError::TruncatedBlock { index, remaining }
            });
        };

        let block = uf2::decode(record).map_err(|cause| ContainerError::Framing { index, cause })?;

        // guard before the `num_blocks - 1` termination test below
        if block.num_blocks == 0 {
            return Err(ContainerError::ZeroBlockCount { index });
        }

        if block.is_not_main_flash() {
            // comment-only block: no image write, but it still counts
            // towards termination
            sink.event(Uf2Event::Skip {
                block_no: block.block_no,
            });
        } else {
            if let Some(name) = block.file_name() {
                let size = match block.info {
                    Info::FileSize(size) => size,
                    Info::BoardFamily(_) => 0,
                };
                sink.event(Uf2Event::FileContainerEntry {
                    block_no: block.block_no,
                    name: name.into_owned(),
                    size,
                    offset: block.target_addr,
                });
            }

            if let Info::BoardFamily(id) = block.info {
                if family_id != Some(id) {
                    if family_id.is_some() {
                        sink.event(Uf2Event::FamilyChanged { id });
                    }
                    family_id = Some(id);
                    sink.event(Uf2Event::FamilyResolved {
                        id,
                        family: families.lookup(id).copied(),
                    });
                }
            }

            if let Some(checksum) = block.checksum_info() {
                sink.event(Uf2Event::ChecksumPresent {
                    block_no: block.block_no,
                    checksum,
                });
            }

            for tag in block.extension_tags() {
                sink.event(match tag_name(tag.tag) {
                    Some(name) => Uf2Event::ExtensionTag {
                        block_no: block.block_no,
                        tag: tag.tag,
                        name,
                        size: tag.size,
                    },
                    None => Uf2Event::UnknownExtensionTag {
                        block_no: block.block_no,
                        tag: tag.tag,
                        size: tag.size,
                    },
                });
            }

            image.write(block.target_addr.into(), block.payload())?;

            sink.event(Uf2Event::BlockWritten {
                block_no: block.block_no,
                size: block.payload_size,
                addr: block.target_addr,
            });
            sink.event(Uf2Event::Annotation {
                addr: block.target_addr,
                text: format!(
                    "uf2 block #{:02} ({} bytes @ 0x{:08x})",
                    block.block_no, block.payload_size, block.target_addr
                ),
            });
        }

        offset += BLOCK_SIZE;
        index += 1;

        if block.block_no == block.num_blocks - 1 {
            return Ok(());
        }
    }
}

/// Decode a whole container into a fresh image using the builtin family
/// catalog.
pub fn read_image(
    bytes: &[u8],
    fill: u8,
    sink: &mut dyn EventSink,
) -> Result<SparseImage, ContainerError> {
    let mut image = SparseImage::new(fill);
    read_image_into(&mut image, bytes, &FamilyTable::default(), sink)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::uf2::testing::raw_block;
    use super::uf2::{
        UF2_FLAG_FAMILY_ID_PRESENT, UF2_FLAG_FILE_CONTAINER, UF2_FLAG_NOT_MAIN_FLASH,
    };
    use super::*;

    fn container(blocks: &[[u8; BLOCK_SIZE]]) -> Vec<u8> {
        blocks.concat()
    }

    #[test]
    fn single_block_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let bytes = container(&[raw_block(0, 0x2000_0000, &payload, 0, 1, 0)]);

        let mut events: Vec<Uf2Event> = Vec::new();
        let image = read_image(&bytes, DEFAULT_FILL, &mut events).unwrap();

        assert_eq!(image.read(0x2000_0000, payload.len()), payload);
        assert!(events.contains(&Uf2Event::BlockWritten {
            block_no: 0,
            size: 256,
            addr: 0x2000_0000,
        }));
    }

    #[test]
    fn end_to_end_two_blocks_with_family() {
        let block0 = raw_block(0, 0x0800_0000, &[0x01, 0x02, 0x03, 0x04], 0, 2, 0);
        let block1 = raw_block(
            UF2_FLAG_FAMILY_ID_PRESENT,
            0x0800_0010,
            &[0xaa, 0xbb],
            1,
            2,
            0xe48bff56,
        );
        let bytes = container(&[block0, block1]);

        let mut events: Vec<Uf2Event> = Vec::new();
        let image = read_image(&bytes, 0xff, &mut events).unwrap();

        assert_eq!(image.read(0x0800_0000, 4), vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(image.read(0x0800_0010, 2), vec![0xaa, 0xbb]);
        // the gap in between reads as fill
        assert_eq!(image.read(0x0800_0004, 12), vec![0xff; 12]);

        let resolved: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Uf2Event::FamilyResolved { id, family } => Some((*id, *family)),
                _ => None,
            })
            .collect();
        assert_eq!(resolved.len(), 1);
        let (id, family) = resolved[0];
        let family = family.unwrap();
        assert_eq!(id, 0xe48bff56);
        assert_eq!(family.arch, Some("arm"));
        assert_eq!(family.cpu, Some("cortex"));
        assert_eq!(family.bits, Some(16));
    }

    #[test]
    fn framing_error_is_fatal_and_indexed() {
        let block0 = raw_block(0, 0x1000, &[0x11; 8], 0, 3, 0);
        let mut block1 = raw_block(0, 0x2000, &[0x22; 8], 1, 3, 0);
        let block2 = raw_block(0, 0x3000, &[0x33; 8], 2, 3, 0);
        block1[0x04] ^= 0x80;
        let bytes = container(&[block0, block1, block2]);

        let mut image = SparseImage::new(0xff);
        let mut events: Vec<Uf2Event> = Vec::new();
        let err = read_image_into(&mut image, &bytes, &FamilyTable::default(), &mut events)
            .unwrap_err();

        assert!(matches!(
            err,
            ContainerError::Framing {
                index: 1,
                cause: FramingError::BadMagicStart1(_),
            }
        ));
        // the partial image stays inspectable: block 0 landed, nothing after
        assert_eq!(image.read(0x1000, 8), vec![0x11; 8]);
        assert_eq!(image.read(0x2000, 8), vec![0xff; 8]);
        assert_eq!(image.read(0x3000, 8), vec![0xff; 8]);
    }

    #[test]
    fn not_main_flash_blocks_never_reach_the_image() {
        let block0 = raw_block(UF2_FLAG_NOT_MAIN_FLASH, 0x1000, &[0x55; 16], 0, 2, 0);
        let block1 = raw_block(0, 0x2000, &[0x66; 16], 1, 2, 0);
        let bytes = container(&[block0, block1]);

        let mut events: Vec<Uf2Event> = Vec::new();
        let image = read_image(&bytes, 0xff, &mut events).unwrap();

        assert_eq!(image.read(0x1000, 16), vec![0xff; 16]);
        assert_eq!(image.read(0x2000, 16), vec![0x66; 16]);
        assert!(events.contains(&Uf2Event::Skip { block_no: 0 }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, Uf2Event::BlockWritten { block_no: 0, .. })));
    }

    #[test]
    fn family_resolution_is_idempotent_per_value() {
        let rp2040 = 0xe48bff56;
        let nrf = 0xada52840;
        let blocks = [
            raw_block(UF2_FLAG_FAMILY_ID_PRESENT, 0x000, &[1; 4], 0, 4, rp2040),
            raw_block(UF2_FLAG_FAMILY_ID_PRESENT, 0x100, &[2; 4], 1, 4, rp2040),
            raw_block(UF2_FLAG_FAMILY_ID_PRESENT, 0x200, &[3; 4], 2, 4, rp2040),
            raw_block(UF2_FLAG_FAMILY_ID_PRESENT, 0x300, &[4; 4], 3, 4, nrf),
        ];
        let bytes = container(&blocks);

        let mut events: Vec<Uf2Event> = Vec::new();
        read_image(&bytes, 0xff, &mut events).unwrap();

        let resolved = events
            .iter()
            .filter(|e| matches!(e, Uf2Event::FamilyResolved { .. }))
            .count();
        let changed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Uf2Event::FamilyChanged { id } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(resolved, 2);
        assert_eq!(changed, vec![nrf]);

        // the change warning precedes the new resolution
        let change_at = events
            .iter()
            .position(|e| matches!(e, Uf2Event::FamilyChanged { .. }))
            .unwrap();
        let second_resolve_at = events
            .iter()
            .rposition(|e| matches!(e, Uf2Event::FamilyResolved { .. }))
            .unwrap();
        assert!(change_at < second_resolve_at);
    }

    #[test]
    fn unknown_family_is_not_fatal() {
        let bytes = container(&[raw_block(
            UF2_FLAG_FAMILY_ID_PRESENT,
            0,
            &[9; 4],
            0,
            1,
            0xdeadbeef,
        )]);

        let mut events: Vec<Uf2Event> = Vec::new();
        let image = read_image(&bytes, 0xff, &mut events).unwrap();

        assert_eq!(image.read(0, 4), vec![9; 4]);
        assert!(events.contains(&Uf2Event::FamilyResolved {
            id: 0xdeadbeef,
            family: None,
        }));
    }

    #[test]
    fn file_container_entry_is_surfaced() {
        let mut block = raw_block(UF2_FLAG_FILE_CONTAINER, 128, &[0x42; 32], 0, 1, 4096);
        let name = b"boot.py\0";
        block[0x20 + 32..0x20 + 32 + name.len()].copy_from_slice(name);
        let bytes = container(&[block]);

        let mut events: Vec<Uf2Event> = Vec::new();
        read_image(&bytes, 0xff, &mut events).unwrap();

        assert!(events.contains(&Uf2Event::FileContainerEntry {
            block_no: 0,
            name: "boot.py".to_string(),
            size: 4096,
            offset: 128,
        }));
    }

    #[test]
    fn zero_block_count_is_rejected_before_underflow() {
        let bytes = container(&[raw_block(0, 0, &[0; 4], 0, 0, 0)]);
        let err = read_image(&bytes, 0xff, &mut Vec::<Uf2Event>::new()).unwrap_err();
        assert!(matches!(err, ContainerError::ZeroBlockCount { index: 0 }));
    }

    #[test]
    fn empty_container_is_rejected() {
        let err = read_image(&[], 0xff, &mut Vec::<Uf2Event>::new()).unwrap_err();
        assert!(matches!(err, ContainerError::Empty));
    }

    #[test]
    fn trailing_partial_record_is_rejected() {
        let mut bytes = container(&[raw_block(0, 0, &[1; 4], 0, 2, 0)]);
        bytes.extend_from_slice(&[0u8; 100]);
        let err = read_image(&bytes, 0xff, &mut Vec::<Uf2Event>::new()).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedBlock {
                index: 1,
                remaining: 100,
            }
        ));
    }

    #[test]
    fn container_ending_before_final_block_is_rejected() {
        let bytes = container(&[raw_block(0, 0, &[1; 4], 0, 2, 0)]);
        let err = read_image(&bytes, 0xff, &mut Vec::<Uf2Event>::new()).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::MissingFinalBlock { records: 1 }
        ));
    }

    #[test]
    fn annotation_format_matches_host_convention() {
        let bytes = container(&[raw_block(0, 0x0800_0000, &[1, 2, 3, 4], 0, 1, 0)]);
        let mut events: Vec<Uf2Event> = Vec::new();
        read_image(&bytes, 0xff, &mut events).unwrap();

        assert!(events.contains(&Uf2Event::Annotation {
            addr: 0x0800_0000,
            text: "uf2 block #00 (4 bytes @ 0x08000000)".to_string(),
        }));
    }

    #[test]
    fn out_of_order_blocks_are_tolerated() {
        // writes are address-indexed, so order does not matter; the loop
        // ends on the record carrying the final block number
        let block1 = raw_block(0, 0x100, &[0xbb; 4], 1, 2, 0);
        let block0 = raw_block(0, 0x000, &[0xaa; 4], 0, 2, 0);
        let bytes = container(&[block1, block0]);

        // block1 comes first but is the terminator, so only it is seen
        let image = read_image(&bytes, 0xff, &mut Vec::<Uf2Event>::new()).unwrap();
        assert_eq!(image.read(0x100, 4), vec![0xbb; 4]);
        assert_eq!(image.read(0x000, 4), vec![0xff; 4]);
    }
}

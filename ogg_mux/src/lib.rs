//! An OGG bitstream multiplexer and demultiplexer
//!
//! This crate frames logical streams of packets into the physical OGG page
//! stream described by RFC 3533, and turns such a stream back into
//! packets. It knows nothing about the codecs carried inside; Vorbis, Opus,
//! Speex, FLAC and friends all consume and produce [`Packet`]s through the
//! same narrow surface.
//!
//! # Examples
//!
//! ```rust
//! use std::io::Cursor;
//! use ogg_mux::{OggContainer, Packet};
//!
//! # fn main() -> ogg_mux::Result<()> {
//! let mut container = OggContainer::write_mode(Cursor::new(Vec::new()));
//!
//! let mut writer = container.packet_writer(Some(0x5EA7))?;
//! writer.buffer_packet(Packet::new(b"hello ogg".to_vec()), Some(0))?;
//! writer.close()?;
//! drop(writer);
//!
//! let bytes = container.into_inner()?.into_inner();
//!
//! let mut container = OggContainer::read_mode(Cursor::new(bytes));
//! let mut reader = container.packet_reader()?;
//!
//! let packet = reader.next_packet()?.expect("the stream has one packet");
//! assert_eq!(packet.data(), b"hello ogg");
//! assert_eq!(packet.stream_serial(), 0x5EA7);
//! assert!(packet.is_first_packet());
//! assert!(packet.is_last_packet());
//! # Ok(()) }
//! ```

mod container;
mod crc;
mod error;
mod header;
mod packet;
mod page;
mod reader;
mod writer;

pub use container::OggContainer;
pub use crc::{crc32, crc32_update};
pub use error::{OggError, Result};
pub use header::{PAGE_HEADER_SIZE, PageHeader};
pub use packet::Packet;
pub use page::{PacketItem, Page, PagePackets, segment_table};
pub use reader::PacketReader;
pub use writer::PacketWriter;

/// The page's first segment continues a packet from the previous page
pub const CONTINUED_PACKET: u8 = 0x01;
/// The page is the first page of its logical bitstream
pub const CONTAINS_FIRST_PAGE_OF_BITSTREAM: u8 = 0x02;
/// The page is the last page of its logical bitstream
pub const CONTAINS_LAST_PAGE_OF_BITSTREAM: u8 = 0x04;

/// The maximum number of segment table entries in a page
pub const MAX_SEGMENT_COUNT: usize = 255;
/// The maximum page content size
///
/// A full segment table of 255 entries, each describing 255 bytes. A page
/// holding this much content necessarily ends with an unterminated packet.
pub const MAX_CONTENT_SIZE: usize = MAX_SEGMENT_COUNT * 255;

/// How far [`PacketReader`](crate::PacketReader) will scan for a magic
/// signature before giving up on the stream
pub const SYNC_SCAN_LIMIT: u64 = 65536;

use crate::crc;
use crate::error::{OggError, Result};
use crate::header::{PAGE_HEADER_SIZE, PageHeader, eof_to_truncation};
use crate::{CONTINUED_PACKET, MAX_SEGMENT_COUNT};

use std::io::{Read, Seek};

/// An OGG page
#[derive(Clone, PartialEq, Debug)]
pub struct Page {
	pub(crate) header: PageHeader,
	segment_table: Vec<u8>,
	content: Vec<u8>,
	checksum_valid: bool,
}

impl Page {
	/// Create a new empty `Page`
	///
	/// The page is grown by repeated [`Page::append_packet`] calls until it
	/// runs out of segment table entries or the stream is finalized.
	pub fn new(header_type_flag: u8, abgp: i64, stream_serial: u32, sequence_number: u32) -> Self {
		Self {
			header: PageHeader::new(header_type_flag, abgp, stream_serial, sequence_number),
			segment_table: Vec::new(),
			content: Vec::new(),
			checksum_valid: true,
		}
	}

	/// Attempts to get a Page from a reader
	///
	/// The reader must be positioned at a magic signature. The page's
	/// checksum is recomputed during the read; a mismatch is logged as a
	/// warning and recorded, but is not an error. Pages with a stored
	/// checksum of 0 are treated as not validated.
	///
	/// # Errors
	///
	/// * [`OggError::MissingMagic`]
	/// * [`OggError::InvalidVersion`]
	/// * [`OggError::NotEnoughData`] if the page is cut short
	/// * Any [`std::io::Error`]
	pub fn read<R>(data: &mut R) -> Result<Self>
	where
		R: Read + Seek,
	{
		let (header, segment_table) = PageHeader::read(data)?;

		let content_len = segment_table
			.iter()
			.map(|&b| usize::from(b))
			.sum::<usize>();

		let mut content = vec![0; content_len];
		data.read_exact(&mut content).map_err(eof_to_truncation)?;

		let mut page = Page {
			header,
			segment_table,
			content,
			checksum_valid: true,
		};

		let computed = crc::crc32(&page.bytes_with_checksum(0));
		if page.header.checksum == 0 {
			// Some muxers leave the checksum zeroed out
			page.checksum_valid = false;
		} else if computed != page.header.checksum {
			log::warn!(
				"Page {} of stream {:#x} has a bad checksum (stored {:#x}, computed {:#x})",
				page.header.sequence_number,
				page.header.stream_serial,
				page.header.checksum,
				computed
			);
			page.checksum_valid = false;
		}

		Ok(page)
	}

	/// Append as much of `packet` as the segment table allows, starting at `offset`
	///
	/// Content is consumed in 255 byte chunks, one segment table entry per
	/// chunk, until the packet is terminated by an entry < 255 or the table
	/// reaches its 255 entry limit. A packet whose length is an exact
	/// multiple of 255 is always terminated by a zero length entry, which
	/// may land on a later page. An empty packet appends a single zero
	/// length entry.
	///
	/// If the append begins mid-packet on a fresh page, the page is flagged
	/// as a continuation.
	///
	/// Returns the number of bytes consumed and whether the packet was
	/// terminated on this page.
	pub fn append_packet(&mut self, packet: &[u8], offset: usize) -> (usize, bool) {
		debug_assert!(offset <= packet.len());

		if offset > 0 && self.segment_table.is_empty() {
			self.header.header_type_flag |= CONTINUED_PACKET;
		}

		let mut consumed = 0;
		let mut remaining = packet.len() - offset;

		while self.segment_table.len() < MAX_SEGMENT_COUNT {
			let lacing = remaining.min(255) as u8;

			self.segment_table.push(lacing);

			let start = offset + consumed;
			self.content
				.extend_from_slice(&packet[start..start + usize::from(lacing)]);

			consumed += usize::from(lacing);
			remaining -= usize::from(lacing);

			if lacing < 255 {
				return (consumed, true);
			}
		}

		(consumed, false)
	}

	/// Generates the CRC checksum of the page
	pub fn gen_crc(&mut self) {
		self.header.checksum = crc::crc32(&self.bytes_with_checksum(0));
	}

	/// Convert the Page to Vec<u8> for writing
	///
	/// NOTE: This will write the checksum as is. It is likely [`Page::gen_crc`] will have
	/// to be used prior.
	pub fn as_bytes(&self) -> Vec<u8> {
		self.bytes_with_checksum(self.header.checksum)
	}

	fn bytes_with_checksum(&self, checksum: u32) -> Vec<u8> {
		let mut bytes =
			Vec::with_capacity(PAGE_HEADER_SIZE + self.segment_table.len() + self.content.len());

		bytes.extend(b"OggS");
		bytes.push(0);
		bytes.push(self.header.header_type_flag);
		bytes.extend(self.header.abgp.to_le_bytes());
		bytes.extend(self.header.stream_serial.to_le_bytes());
		bytes.extend(self.header.sequence_number.to_le_bytes());
		bytes.extend(checksum.to_le_bytes());
		bytes.push(self.segment_table.len() as u8);
		bytes.extend_from_slice(&self.segment_table);
		bytes.extend_from_slice(&self.content);

		bytes
	}

	/// Returns an iterator over the packet fragments described by the segment table
	pub fn packets(&self) -> PagePackets<'_> {
		PagePackets {
			segment_table: &self.segment_table,
			content: &self.content,
			seg_idx: 0,
			offset: 0,
			finished: false,
		}
	}

	/// Whether the page's last packet continues onto the next page
	pub fn ends_with_continued(&self) -> bool {
		self.segment_table.last() == Some(&255)
	}

	/// Returns the page's header
	pub fn header(&self) -> &PageHeader {
		&self.header
	}

	/// Returns a mutable reference to the page's header
	///
	/// NOTE: [`Page::gen_crc`] must be called after any change for the page
	/// to serialize with a valid checksum.
	pub fn header_mut(&mut self) -> &mut PageHeader {
		&mut self.header
	}

	/// Returns the page's content
	pub fn content(&self) -> &[u8] {
		self.content.as_slice()
	}

	/// Consumes the page and returns its content
	pub fn take_content(self) -> Vec<u8> {
		self.content
	}

	/// Returns the page's segment table
	pub fn segment_table(&self) -> &[u8] {
		self.segment_table.as_slice()
	}

	/// The size of the page once serialized, in bytes
	pub fn len(&self) -> usize {
		PAGE_HEADER_SIZE + self.segment_table.len() + self.content.len()
	}

	/// Whether the page holds no content at all
	///
	/// A page without segments is still a valid, writable page. It is the
	/// degenerate form used to close a logical stream that never received
	/// any packets.
	pub fn is_empty(&self) -> bool {
		self.segment_table.is_empty()
	}

	/// Whether the page's stored checksum matched the computed one when it was read
	///
	/// Always true for locally constructed pages.
	pub fn checksum_valid(&self) -> bool {
		self.checksum_valid
	}
}

/// A packet fragment yielded by [`PagePackets`]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PacketItem<'a> {
	/// A packet that terminates on this page
	///
	/// If the page is flagged as a continuation and this is the first item,
	/// the bytes are only the packet's tail and belong after the fragments
	/// carried over from earlier pages.
	Complete(&'a [u8]),
	/// The unterminated tail of the page
	///
	/// The packet continues on the stream's next page. Always the final
	/// item of a page when present.
	Partial(&'a [u8]),
}

/// An iterator over the packet fragments of a [`Page`]
///
/// Consecutive segment table entries of 255 belong to one packet; the
/// first entry < 255 terminates it. A run of 255s reaching the end of the
/// table is an unterminated packet, yielded as [`PacketItem::Partial`].
///
/// A page with no segments at all yields exactly one empty
/// [`PacketItem::Complete`]. This is what lets a logical stream begin or
/// end with an explicit empty packet.
#[derive(Clone, Debug)]
pub struct PagePackets<'a> {
	segment_table: &'a [u8],
	content: &'a [u8],
	seg_idx: usize,
	offset: usize,
	finished: bool,
}

impl<'a> Iterator for PagePackets<'a> {
	type Item = PacketItem<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}

		if self.segment_table.is_empty() {
			self.finished = true;
			return Some(PacketItem::Complete(&[]));
		}

		if self.seg_idx == self.segment_table.len() {
			self.finished = true;
			return None;
		}

		let start = self.offset;
		while self.seg_idx < self.segment_table.len() {
			let lacing = self.segment_table[self.seg_idx];
			self.seg_idx += 1;
			self.offset += usize::from(lacing);

			if lacing < 255 {
				return Some(PacketItem::Complete(&self.content[start..self.offset]));
			}
		}

		self.finished = true;
		Some(PacketItem::Partial(&self.content[start..self.offset]))
	}
}

/// Creates a segment table for a packet of `length` bytes
///
/// # Errors
///
/// `length` cannot be terminated within a single page (more than 255
/// entries would be required)
pub fn segment_table(length: usize) -> Result<Vec<u8>> {
	// One entry per full 255 byte chunk, plus a terminating entry < 255.
	// An exact multiple of 255 needs a trailing zero entry, and an empty
	// packet is a single zero entry.
	let needed = length / 255 + 1;

	if needed > MAX_SEGMENT_COUNT {
		return Err(OggError::TooMuchData);
	}

	let mut segments = vec![255u8; needed - 1];
	segments.push((length % 255) as u8);

	Ok(segments)
}

#[cfg(test)]
mod tests {
	use super::{PacketItem, Page, segment_table};
	use crate::error::OggError;
	use crate::{CONTAINS_FIRST_PAGE_OF_BITSTREAM, CONTINUED_PACKET};

	use std::io::Cursor;

	#[test]
	fn append_and_roundtrip() {
		let mut page = Page::new(CONTAINS_FIRST_PAGE_OF_BITSTREAM, 1024, 0xDEAD_BEEF, 0);

		let (consumed, finished) = page.append_packet(b"hello ogg", 0);
		assert_eq!(consumed, 9);
		assert!(finished);
		assert_eq!(page.segment_table(), &[9]);

		page.gen_crc();
		let bytes = page.as_bytes();
		assert_eq!(bytes.len(), 27 + 1 + 9);

		let reread = Page::read(&mut Cursor::new(bytes)).unwrap();
		assert_eq!(reread.content(), b"hello ogg");
		assert_eq!(reread.header().abgp, 1024);
		assert_eq!(reread.header().stream_serial, 0xDEAD_BEEF);
		assert!(reread.header().is_first_page());
		assert!(reread.checksum_valid());
	}

	#[test]
	fn exact_multiple_of_255_gets_zero_entry() {
		let mut page = Page::new(0, 0, 1, 0);

		let (consumed, finished) = page.append_packet(&[0x55; 255], 0);
		assert_eq!(consumed, 255);
		assert!(finished);
		assert_eq!(page.segment_table(), &[255, 0]);
		assert!(!page.ends_with_continued());

		let (consumed, finished) = page.append_packet(&[0x66; 510], 0);
		assert_eq!(consumed, 510);
		assert!(finished);
		assert_eq!(page.segment_table(), &[255, 0, 255, 255, 0]);
	}

	#[test]
	fn empty_packet_is_one_zero_entry() {
		let mut page = Page::new(0, 0, 1, 0);

		let (consumed, finished) = page.append_packet(&[], 0);
		assert_eq!(consumed, 0);
		assert!(finished);
		assert_eq!(page.segment_table(), &[0]);
		assert!(page.content().is_empty());
	}

	#[test]
	fn append_stops_at_segment_table_capacity() {
		let mut page = Page::new(0, 0, 1, 0);
		let packet = vec![0xAA; 70000];

		let (consumed, finished) = page.append_packet(&packet, 0);
		assert_eq!(consumed, 255 * 255);
		assert!(!finished);
		assert_eq!(page.segment_table().len(), 255);
		assert!(page.ends_with_continued());

		// The rest lands on a continuation page
		let mut next = Page::new(0, 0, 1, 1);
		let (more, finished) = next.append_packet(&packet, consumed);
		assert_eq!(consumed + more, 70000);
		assert!(finished);
		assert_ne!(next.header().header_type_flag() & CONTINUED_PACKET, 0);
	}

	#[test]
	fn continuation_flag_only_when_page_starts_mid_packet() {
		let mut page = Page::new(0, 0, 1, 0);
		page.append_packet(b"first", 0);

		// Mid-packet append to a page that already has content does not flag it
		page.append_packet(b"second-packet", 7);
		assert_eq!(page.header().header_type_flag() & CONTINUED_PACKET, 0);
	}

	#[test]
	fn packet_iterator_classifies_fragments() {
		let mut page = Page::new(0, 0, 1, 0);
		page.append_packet(b"one", 0);
		page.append_packet(&[0x11; 255], 0);
		// Unterminated: first 300 bytes of a larger packet, capped by hand
		// via a 255 run reaching the table end
		let big = vec![0x22; 600];
		while page.segment_table().len() < 254 {
			page.append_packet(b"x", 0);
		}
		page.append_packet(&big, 0);

		let items = page.packets().collect::<Vec<_>>();
		assert_eq!(items[0], PacketItem::Complete(b"one".as_slice()));
		assert_eq!(items[1], PacketItem::Complete(&[0x11; 255][..]));
		match items.last() {
			Some(PacketItem::Partial(tail)) => assert_eq!(*tail, &[0x22; 255][..]),
			other => panic!("expected a partial tail, got {other:?}"),
		}
	}

	#[test]
	fn zero_segment_page_yields_one_empty_packet() {
		let mut page = Page::new(0, 0, 1, 0);
		page.gen_crc();

		let bytes = page.as_bytes();
		assert_eq!(bytes.len(), 27);

		let reread = Page::read(&mut Cursor::new(bytes)).unwrap();
		let items = reread.packets().collect::<Vec<_>>();
		assert_eq!(items, vec![PacketItem::Complete(&[][..])]);
	}

	#[test]
	fn checksum_mismatch_is_recorded_not_fatal() {
		let mut page = Page::new(0, 0, 1, 0);
		page.append_packet(b"payload", 0);
		page.gen_crc();

		let mut bytes = page.as_bytes();
		let last = bytes.len() - 1;
		bytes[last] ^= 0xFF;

		let reread = Page::read(&mut Cursor::new(bytes)).unwrap();
		assert!(!reread.checksum_valid());
		assert_eq!(reread.packets().count(), 1);
	}

	#[test]
	fn segment_table_shapes() {
		assert_eq!(segment_table(0).unwrap(), vec![0]);
		assert_eq!(segment_table(6).unwrap(), vec![6]);
		assert_eq!(segment_table(255).unwrap(), vec![255, 0]);
		assert_eq!(segment_table(256).unwrap(), vec![255, 1]);
		assert_eq!(segment_table(510).unwrap(), vec![255, 255, 0]);
		assert_eq!(segment_table(65024).unwrap().len(), 255);

		match segment_table(65025) {
			Err(OggError::TooMuchData) => {},
			other => panic!("expected TooMuchData, got {other:?}"),
		}
	}
}

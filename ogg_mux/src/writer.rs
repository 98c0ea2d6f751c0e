use crate::container::SharedSink;
use crate::error::{OggError, Result};
use crate::packet::Packet;
use crate::page::Page;
use crate::{CONTAINS_FIRST_PAGE_OF_BITSTREAM, CONTAINS_LAST_PAGE_OF_BITSTREAM};

use std::fmt::{Debug, Formatter};
use std::io::Write;

/// A writer laying out one logical stream's packets into pages
///
/// Packets are buffered into pages in memory and only hit the sink on an
/// explicit [`PacketWriter::flush`]. Buffering is what allows several
/// writers over the same container to interleave their pages, and what
/// allows granule positions to be corrected right up until a page is
/// flushed.
///
/// RFC 3533 recommends flushing every 4-8 KiB for streaming friendly
/// output; [`PacketWriter::size_pending_flush`] and
/// [`PacketWriter::current_page_size`] exist so callers can implement
/// whatever cadence suits them. A page is never larger than
/// [`MAX_CONTENT_SIZE`](crate::MAX_CONTENT_SIZE) content bytes; past that
/// the segment table is exhausted and a continuation page is started
/// automatically.
///
/// A stream must be finished with [`PacketWriter::close`]. Dropping an
/// unclosed writer discards whatever was still buffered.
pub struct PacketWriter<W: Write> {
	sink: SharedSink<W>,
	stream_serial: u32,
	sequence_number: u32,
	buffered: Vec<Page>,
	current: Option<Page>,
	abgp: i64,
	closed: bool,
}

impl<W: Write> PacketWriter<W> {
	pub(crate) fn new(sink: SharedSink<W>, stream_serial: u32) -> Self {
		Self {
			sink,
			stream_serial,
			sequence_number: 0,
			buffered: Vec::new(),
			current: None,
			abgp: 0,
			closed: false,
		}
	}

	/// Buffer a packet into the stream's pages
	///
	/// The packet's bytes are laced into the current page, with new pages
	/// started as segment tables fill up. Nothing is written to the sink
	/// until [`PacketWriter::flush`].
	///
	/// If `abgp` is given it becomes the stream's granule position, applied
	/// to every page still buffered; the last value set before a page is
	/// flushed is the one that sticks. Pages on which no packet finishes
	/// are marked with a granule position of `-1`.
	///
	/// # Errors
	///
	/// * [`OggError::WriterClosed`] if the writer was closed
	pub fn buffer_packet(&mut self, packet: Packet, abgp: Option<i64>) -> Result<()> {
		if self.closed {
			return Err(OggError::WriterClosed);
		}

		let last_packet = packet.is_last_packet();
		let data = packet.into_data();

		let mut offset = 0;
		loop {
			let granule = self.abgp;
			let page = self.current_page();

			let (consumed, finished) = page.append_packet(&data, offset);
			offset += consumed;

			if finished {
				page.header.abgp = granule;
				if last_packet {
					page.header.header_type_flag |= CONTAINS_LAST_PAGE_OF_BITSTREAM;
				}
				break;
			}

			// Segment table exhausted, the packet continues on a fresh page
			if let Some(full) = self.current.take() {
				self.buffered.push(full);
			}
		}

		if let Some(abgp) = abgp {
			self.set_abgp(abgp);
		}

		Ok(())
	}

	/// Set the stream's absolute granule position
	///
	/// Applies retroactively to every page still buffered, including the
	/// page currently being filled. Pages already flushed are untouched.
	pub fn set_abgp(&mut self, abgp: i64) {
		self.abgp = abgp;

		for page in &mut self.buffered {
			page.header.abgp = abgp;
		}

		if let Some(page) = self.current.as_mut() {
			page.header.abgp = abgp;
		}
	}

	/// Write all buffered pages to the sink and clear the buffer
	///
	/// The in-progress page is finalized and written too; a packet
	/// buffered afterwards starts a fresh page. All pages of a flush are
	/// written back to back as one critical section on the sink, so pages
	/// of other writers cannot end up interleaved into the middle of this
	/// stream's burst.
	///
	/// # Errors
	///
	/// Any [`std::io::Error`] from the sink. A flush that fails partway
	/// through is not recoverable.
	pub fn flush(&mut self) -> Result<()> {
		if let Some(page) = self.current.take() {
			self.buffered.push(page);
		}

		if self.buffered.is_empty() {
			return Ok(());
		}

		self.sink.write_pages(&mut self.buffered)?;
		self.buffered.clear();

		Ok(())
	}

	/// Finish the logical stream
	///
	/// The final page is flagged as the end of the stream and everything
	/// buffered is flushed. A stream that never received a packet is
	/// closed with a degenerate header-only page so that it still appears
	/// on the wire. Closing an already closed writer does nothing.
	///
	/// # Errors
	///
	/// See [`PacketWriter::flush`]
	pub fn close(&mut self) -> Result<()> {
		if self.closed {
			return Ok(());
		}
		self.closed = true;

		if self.current.is_none() && self.buffered.is_empty() {
			self.current_page();
		}

		if let Some(page) = self.current.as_mut() {
			page.header.header_type_flag |= CONTAINS_LAST_PAGE_OF_BITSTREAM;
		} else if let Some(page) = self.buffered.last_mut() {
			page.header.header_type_flag |= CONTAINS_LAST_PAGE_OF_BITSTREAM;
		}

		self.flush()
	}

	/// The number of bytes a [`PacketWriter::flush`] would write right now
	pub fn size_pending_flush(&self) -> usize {
		self.buffered.iter().map(Page::len).sum::<usize>()
			+ self.current.as_ref().map_or(0, Page::len)
	}

	/// The serialized size of the page currently being filled
	///
	/// 0 if the next packet will start a fresh page.
	pub fn current_page_size(&self) -> usize {
		self.current.as_ref().map_or(0, Page::len)
	}

	/// The serial number of the logical stream this writer feeds
	pub fn stream_serial(&self) -> u32 {
		self.stream_serial
	}

	/// Whether [`PacketWriter::close`] has been called
	pub fn is_closed(&self) -> bool {
		self.closed
	}

	// The page currently being filled, starting one if necessary. The
	// stream's first page carries the beginning of stream flag.
	fn current_page(&mut self) -> &mut Page {
		let header_type_flag = if self.sequence_number == 0 {
			CONTAINS_FIRST_PAGE_OF_BITSTREAM
		} else {
			0
		};
		let stream_serial = self.stream_serial;
		let sequence_number = self.sequence_number;

		let started = self.current.is_none();
		let page = self
			.current
			.get_or_insert_with(|| Page::new(header_type_flag, -1, stream_serial, sequence_number));

		if started {
			self.sequence_number += 1;
		}

		page
	}
}

impl<W: Write> Debug for PacketWriter<W> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PacketWriter")
			.field("stream_serial", &self.stream_serial)
			.field("sequence_number", &self.sequence_number)
			.field("pending_bytes", &self.size_pending_flush())
			.field("closed", &self.closed)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use crate::error::OggError;
	use crate::{OggContainer, Packet};

	use std::io::Cursor;

	fn write_container() -> OggContainer<Cursor<Vec<u8>>> {
		OggContainer::write_mode(Cursor::new(Vec::new()))
	}

	#[test]
	fn single_small_packet_size_on_wire() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(0x1234)).unwrap();

		writer.buffer_packet(Packet::new(b"abcdef".to_vec()), None).unwrap();
		assert_eq!(writer.size_pending_flush(), 34);
		writer.flush().unwrap();
		assert_eq!(writer.size_pending_flush(), 0);
		drop(writer);

		// 27 byte header + 1 segment entry + 6 content bytes
		let bytes = container.into_inner().unwrap().into_inner();
		assert_eq!(bytes.len(), 34);
	}

	#[test]
	fn single_empty_packet_size_on_wire() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(0x1234)).unwrap();

		writer.buffer_packet(Packet::new(Vec::new()), None).unwrap();
		writer.flush().unwrap();
		drop(writer);

		// 27 byte header + 1 zero segment entry + no content
		let bytes = container.into_inner().unwrap().into_inner();
		assert_eq!(bytes.len(), 28);
	}

	#[test]
	fn empty_stream_closes_with_header_only_page() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(0x1234)).unwrap();

		writer.close().unwrap();
		drop(writer);

		let bytes = container.into_inner().unwrap().into_inner();
		assert_eq!(bytes.len(), 27);
		// Both the first and last page of its bitstream
		assert_eq!(bytes[5], 0x02 | 0x04);
		// No segments
		assert_eq!(bytes[26], 0);
	}

	#[test]
	fn buffering_after_close_is_an_error() {
		let mut container = write_container();
		let mut writer = container.packet_writer(None).unwrap();

		writer.close().unwrap();
		writer.close().unwrap();

		match writer.buffer_packet(Packet::new(b"late".to_vec()), None) {
			Err(OggError::WriterClosed) => {},
			other => panic!("expected WriterClosed, got {other:?}"),
		}
	}

	#[test]
	fn granule_applies_retroactively_to_buffered_pages() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(7)).unwrap();

		// Spans three pages; the first two finalize with no finished packet
		writer
			.buffer_packet(Packet::new(vec![0x77; 131_072]), None)
			.unwrap();
		writer.set_abgp(4800);
		writer.close().unwrap();
		drop(writer);

		let bytes = container.into_inner().unwrap().into_inner();
		let mut reader = crate::PacketReader::new(Cursor::new(bytes));
		let packet = reader.next_packet().unwrap().unwrap();
		assert_eq!(packet.len(), 131_072);
		assert_eq!(packet.abgp(), 4800);
		assert_eq!(packet.sequence_number(), 2);
	}

	#[test]
	fn explicit_granule_covers_every_buffered_page() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(7)).unwrap();

		writer
			.buffer_packet(Packet::new(vec![0x77; 131_072]), Some(960))
			.unwrap();
		writer.close().unwrap();
		drop(writer);

		// The explicit granule was set after the spanning packet was
		// buffered, so every page of it carries the value
		let bytes = container.into_inner().unwrap().into_inner();
		let mut cursor = Cursor::new(bytes);
		let mut granules = Vec::new();
		while let Ok(page) = crate::Page::read(&mut cursor) {
			granules.push(page.header().abgp);
		}
		assert_eq!(granules, vec![960, 960, 960]);
	}

	#[test]
	fn pages_without_a_finished_packet_carry_minus_one() {
		let mut container = write_container();
		let mut writer = container.packet_writer(Some(7)).unwrap();

		writer
			.buffer_packet(Packet::new(vec![0x77; 131_072]), None)
			.unwrap();
		writer.close().unwrap();
		drop(writer);

		let bytes = container.into_inner().unwrap().into_inner();
		let mut cursor = Cursor::new(bytes);
		let mut granules = Vec::new();
		while let Ok(page) = crate::Page::read(&mut cursor) {
			granules.push(page.header().abgp);
		}
		assert_eq!(granules, vec![-1, -1, 0]);
	}
}

use crate::error::{OggError, Result};
use crate::packet::Packet;
use crate::page::{PacketItem, Page};
use crate::SYNC_SCAN_LIMIT;

use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::io::{Read, Seek, SeekFrom};

use byteorder::ReadBytesExt;

const MAGIC: [u8; 4] = *b"OggS";

/// A reader turning a physical OGG byte stream back into packets
///
/// The reader scans the source for page boundaries, reassembles packets
/// that span pages, and hands them out in the order their pages appear on
/// the wire. Multiplexed logical streams come out interleaved; use
/// [`PacketReader::next_packet_for_stream`] to follow a single one.
///
/// The source cursor only moves forward. Seeking back means reopening the
/// source with a fresh reader.
pub struct PacketReader<R> {
	data: R,
	queued: VecDeque<Packet>,
	pending: Option<Packet>,
	partials: HashMap<u32, Vec<Vec<u8>>>,
	exhausted: bool,
}

impl<R> PacketReader<R>
where
	R: Read + Seek,
{
	/// Create a new `PacketReader` over a byte source
	///
	/// The source should be positioned at (or before) the first page.
	/// Wrapping a bare `File` in a `BufReader` is strongly recommended, as
	/// page scanning reads a byte at a time.
	pub fn new(data: R) -> Self {
		Self {
			data,
			queued: VecDeque::new(),
			pending: None,
			partials: HashMap::new(),
			exhausted: false,
		}
	}

	/// Returns the next packet in the physical stream, or `None` at the end of input
	///
	/// Pages with checksum mismatches still yield their packets; the
	/// mismatch is logged as a warning. Junk between pages is skipped with
	/// a warning as long as a magic signature is found within
	/// [`SYNC_SCAN_LIMIT`] bytes.
	///
	/// # Errors
	///
	/// * [`OggError::SyncLimitExceeded`] if the sync window is exhausted
	/// * [`OggError::NotEnoughData`] if a page is cut short mid-parse
	/// * Any [`std::io::Error`]
	pub fn next_packet(&mut self) -> Result<Option<Packet>> {
		if let Some(packet) = self.pending.take() {
			return Ok(Some(packet));
		}

		loop {
			if let Some(packet) = self.queued.pop_front() {
				return Ok(Some(packet));
			}

			if self.exhausted {
				return Ok(None);
			}

			match self.next_page()? {
				Some(page) => self.ingest_page(&page),
				None => {
					self.exhausted = true;

					for (stream_serial, fragments) in self.partials.drain() {
						let dropped = fragments.iter().map(Vec::len).sum::<usize>();
						log::warn!(
							"Stream {stream_serial:#x} ended with an unfinished packet ({dropped} \
							 bytes dropped)"
						);
					}

					return Ok(None);
				},
			}
		}
	}

	/// Returns the next packet belonging to `stream_serial`
	///
	/// Packets of other logical streams are silently discarded. Returns
	/// `None` once the input ends.
	///
	/// # Errors
	///
	/// See [`PacketReader::next_packet`]
	pub fn next_packet_for_stream(&mut self, stream_serial: u32) -> Result<Option<Packet>> {
		while let Some(packet) = self.next_packet()? {
			if packet.stream_serial() == stream_serial {
				return Ok(Some(packet));
			}
		}

		Ok(None)
	}

	/// Skip forward until a packet of `stream_serial` terminates on a page
	/// numbered `sequence_number` or higher
	///
	/// The matching packet is held back and returned by the next
	/// [`PacketReader::next_packet`] call. If no such packet exists the
	/// input is exhausted and subsequent reads return `None`.
	///
	/// # Errors
	///
	/// See [`PacketReader::next_packet`]
	pub fn skip_to_sequence_number(
		&mut self,
		stream_serial: u32,
		sequence_number: u32,
	) -> Result<()> {
		while let Some(packet) = self.next_packet()? {
			if packet.stream_serial() == stream_serial
				&& packet.sequence_number() >= sequence_number
			{
				self.pending = Some(packet);
				break;
			}
		}

		Ok(())
	}

	/// Skip forward until a packet of `stream_serial` terminates on a page
	/// with an absolute granule position of `abgp` or higher
	///
	/// Pages carrying no granule position (`-1`) never match. The matching
	/// packet is held back and returned by the next
	/// [`PacketReader::next_packet`] call. If no such packet exists the
	/// input is exhausted and subsequent reads return `None`.
	///
	/// # Errors
	///
	/// See [`PacketReader::next_packet`]
	pub fn skip_to_abgp(&mut self, stream_serial: u32, abgp: i64) -> Result<()> {
		while let Some(packet) = self.next_packet()? {
			if packet.stream_serial() == stream_serial && packet.abgp() >= abgp {
				self.pending = Some(packet);
				break;
			}
		}

		Ok(())
	}

	/// Consumes the reader and returns the underlying byte source
	pub fn into_inner(self) -> R {
		self.data
	}

	// Scans for the next magic signature and parses the page it opens.
	// Returns `None` at the end of input.
	fn next_page(&mut self) -> Result<Option<Page>> {
		let mut skipped: u64 = 0;
		let mut matched = 0;

		loop {
			let byte = match self.data.read_u8() {
				Ok(byte) => byte,
				Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
					if skipped + matched as u64 > 0 {
						log::warn!(
							"Discarded {} trailing bytes with no page boundary",
							skipped + matched as u64
						);
					}
					return Ok(None);
				},
				Err(e) => return Err(e.into()),
			};

			if byte == MAGIC[matched] {
				matched += 1;
				if matched == MAGIC.len() {
					break;
				}
			} else if byte == MAGIC[0] {
				skipped += matched as u64;
				matched = 1;
			} else {
				skipped += matched as u64 + 1;
				matched = 0;
			}

			if skipped > SYNC_SCAN_LIMIT {
				return Err(OggError::SyncLimitExceeded);
			}
		}

		if skipped > 0 {
			log::warn!("Skipped {skipped} bytes of junk before a page boundary");
		}

		self.data.seek(SeekFrom::Current(-(MAGIC.len() as i64)))?;
		Page::read(&mut self.data).map(Some)
	}

	// Splits a page into packets, gluing carried over fragments onto the
	// first one and stashing an unterminated tail for the stream's next
	// page.
	fn ingest_page(&mut self, page: &Page) {
		let header = page.header();
		let stream_serial = header.stream_serial;
		let continued = header.is_continuation();

		let mut carry = self.partials.remove(&stream_serial);

		if continued && carry.is_none() {
			log::warn!(
				"Page {} of stream {stream_serial:#x} continues a packet with no known beginning, \
				 dropping the fragment",
				header.sequence_number
			);
		} else if !continued && carry.is_some() {
			log::warn!(
				"Stream {stream_serial:#x} abandoned an unfinished packet before page {}",
				header.sequence_number
			);
			carry = None;
		}

		// A continuation with nothing to continue: the head of the first
		// fragment was never seen, so whatever it belongs to is undecodable
		let drop_first = continued && carry.is_none();

		let mut items = page.packets().peekable();
		let mut first_item = true;

		while let Some(item) = items.next() {
			let last_item = items.peek().is_none();

			match item {
				PacketItem::Complete(tail) => {
					if first_item && drop_first {
						first_item = false;
						continue;
					}

					let data = match carry.take() {
						Some(fragments) => {
							let glued_len =
								fragments.iter().map(Vec::len).sum::<usize>() + tail.len();
							let mut glued = Vec::with_capacity(glued_len);
							for fragment in &fragments {
								glued.extend_from_slice(fragment);
							}
							glued.extend_from_slice(tail);
							glued
						},
						None => tail.to_vec(),
					};

					let first_packet = header.is_first_page() && first_item && !continued;
					let last_packet = header.is_last_page() && last_item;

					self.queued.push_back(Packet::from_parts(
						data,
						stream_serial,
						header.abgp,
						header.sequence_number,
						first_packet,
						last_packet,
					));
				},
				PacketItem::Partial(tail) => {
					if first_item && drop_first {
						first_item = false;
						continue;
					}

					let mut fragments = carry.take().unwrap_or_default();
					fragments.push(tail.to_vec());
					self.partials.insert(stream_serial, fragments);
				},
			}

			first_item = false;
		}
	}
}

impl<R> Debug for PacketReader<R> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PacketReader")
			.field("queued", &self.queued.len())
			.field("unfinished_streams", &self.partials.len())
			.field("exhausted", &self.exhausted)
			.finish()
	}
}

use crate::error::{OggError, Result};
use crate::{CONTAINS_FIRST_PAGE_OF_BITSTREAM, CONTAINS_LAST_PAGE_OF_BITSTREAM, CONTINUED_PACKET};

use std::io::{Read, Seek};

use byteorder::{LittleEndian, ReadBytesExt};

/// The size of an OGG page header, up to (and including) the segment count
pub const PAGE_HEADER_SIZE: usize = 27;

/// An OGG page header
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PageHeader {
	/// The position in the stream the page started at
	pub start: u64,
	pub(crate) header_type_flag: u8,
	/// The page's absolute granule position
	///
	/// A value of `-1` indicates that no packet finishes on the page.
	pub abgp: i64,
	/// The page's stream serial number
	pub stream_serial: u32,
	/// The page's sequence number
	pub sequence_number: u32,
	pub(crate) checksum: u32,
}

impl PageHeader {
	/// Create a new `PageHeader`
	///
	/// `start` and `checksum` are initialized to 0.
	pub fn new(header_type_flag: u8, abgp: i64, stream_serial: u32, sequence_number: u32) -> Self {
		Self {
			start: 0,
			header_type_flag,
			abgp,
			stream_serial,
			sequence_number,
			checksum: 0,
		}
	}

	/// Read a `PageHeader` and segment table from a reader
	///
	/// The reader must be positioned at a magic signature. A segment count
	/// of zero is allowed, producing an empty segment table.
	///
	/// # Errors
	///
	/// * [`OggError::MissingMagic`]
	/// * [`OggError::InvalidVersion`]
	/// * [`OggError::NotEnoughData`] if the header or segment table is cut short
	/// * Any [`std::io::Error`]
	pub fn read<R>(data: &mut R) -> Result<(Self, Vec<u8>)>
	where
		R: Read + Seek,
	{
		let start = data.stream_position()?;

		let mut sig = [0; 4];
		data.read_exact(&mut sig).map_err(eof_to_truncation)?;

		if &sig != b"OggS" {
			return Err(OggError::MissingMagic);
		}

		// Version, always 0
		let version = data.read_u8().map_err(eof_to_truncation)?;

		if version != 0 {
			return Err(OggError::InvalidVersion);
		}

		let header_type_flag = data.read_u8().map_err(eof_to_truncation)?;

		let abgp = data.read_i64::<LittleEndian>().map_err(eof_to_truncation)?;
		let stream_serial = data.read_u32::<LittleEndian>().map_err(eof_to_truncation)?;
		let sequence_number = data.read_u32::<LittleEndian>().map_err(eof_to_truncation)?;
		let checksum = data.read_u32::<LittleEndian>().map_err(eof_to_truncation)?;

		let segments = data.read_u8().map_err(eof_to_truncation)?;

		let mut segment_table = vec![0; segments as usize];
		data.read_exact(&mut segment_table)
			.map_err(eof_to_truncation)?;

		let header = Self {
			start,
			header_type_flag,
			abgp,
			stream_serial,
			sequence_number,
			checksum,
		};

		Ok((header, segment_table))
	}

	/// Returns the page's header type flag
	pub fn header_type_flag(&self) -> u8 {
		self.header_type_flag
	}

	/// Returns the page's checksum
	pub fn checksum(&self) -> u32 {
		self.checksum
	}

	/// Whether the page's first segment continues a packet from a previous page
	pub fn is_continuation(&self) -> bool {
		self.header_type_flag & CONTINUED_PACKET != 0
	}

	/// Whether the page is the first one in its logical bitstream
	pub fn is_first_page(&self) -> bool {
		self.header_type_flag & CONTAINS_FIRST_PAGE_OF_BITSTREAM != 0
	}

	/// Whether the page is the last one in its logical bitstream
	pub fn is_last_page(&self) -> bool {
		self.header_type_flag & CONTAINS_LAST_PAGE_OF_BITSTREAM != 0
	}
}

// A short read in the middle of a page means the stream was cut off, which
// is worth distinguishing from other I/O failures.
pub(crate) fn eof_to_truncation(err: std::io::Error) -> OggError {
	if err.kind() == std::io::ErrorKind::UnexpectedEof {
		return OggError::NotEnoughData;
	}

	OggError::Io(err)
}

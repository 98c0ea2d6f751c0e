/// A logical unit of codec data
///
/// Packets are what codec parsers consume and produce. On the read side a
/// packet owns its reassembled bytes, independent of the page(s) it was
/// carried in, along with a copy of the interesting attributes of the page
/// it terminated on. On the write side a packet is handed to
/// [`PacketWriter::buffer_packet`](crate::PacketWriter::buffer_packet),
/// which takes ownership and lays it out into pages.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Packet {
	data: Vec<u8>,
	stream_serial: u32,
	abgp: i64,
	sequence_number: u32,
	first_packet: bool,
	last_packet: bool,
}

impl Packet {
	/// Create a new `Packet` for writing
	///
	/// The stream serial, granule position, and sequence number are
	/// assigned by the writer; the first packet flag is set automatically
	/// when this is the first packet buffered into its stream.
	pub fn new(data: Vec<u8>) -> Self {
		Self {
			data,
			stream_serial: 0,
			abgp: -1,
			sequence_number: 0,
			first_packet: false,
			last_packet: false,
		}
	}

	pub(crate) fn from_parts(
		data: Vec<u8>,
		stream_serial: u32,
		abgp: i64,
		sequence_number: u32,
		first_packet: bool,
		last_packet: bool,
	) -> Self {
		Self {
			data,
			stream_serial,
			abgp,
			sequence_number,
			first_packet,
			last_packet,
		}
	}

	/// Mark the packet as the last one of its logical stream
	///
	/// The page the packet terminates on will be flagged as the end of the
	/// stream. [`PacketWriter::close`](crate::PacketWriter::close) does
	/// this implicitly for whatever was buffered last.
	pub fn set_last_packet(&mut self, last_packet: bool) {
		self.last_packet = last_packet;
	}

	/// Returns the packet's content
	pub fn data(&self) -> &[u8] {
		self.data.as_slice()
	}

	/// Consumes the packet and returns its content
	pub fn into_data(self) -> Vec<u8> {
		self.data
	}

	/// The serial number of the logical stream the packet belongs to
	pub fn stream_serial(&self) -> u32 {
		self.stream_serial
	}

	/// The absolute granule position of the page the packet terminated on
	///
	/// `-1` if the page carried no granule position.
	pub fn abgp(&self) -> i64 {
		self.abgp
	}

	/// The sequence number of the page the packet terminated on
	///
	/// For a packet spanning multiple pages this is the *final* page's
	/// number.
	pub fn sequence_number(&self) -> u32 {
		self.sequence_number
	}

	/// Whether this is the first packet of its logical stream
	pub fn is_first_packet(&self) -> bool {
		self.first_packet
	}

	/// Whether this is the last packet of its logical stream
	pub fn is_last_packet(&self) -> bool {
		self.last_packet
	}

	/// The packet's content length in bytes
	pub fn len(&self) -> usize {
		self.data.len()
	}

	/// Whether the packet carries no bytes
	///
	/// Empty packets are valid and round-trip through a stream; they are
	/// encoded as a single zero length segment table entry.
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

impl From<Vec<u8>> for Packet {
	fn from(data: Vec<u8>) -> Self {
		Packet::new(data)
	}
}

impl From<&[u8]> for Packet {
	fn from(data: &[u8]) -> Self {
		Packet::new(data.to_vec())
	}
}

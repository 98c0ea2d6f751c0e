use crate::error::{OggError, Result};
use crate::page::Page;
use crate::reader::PacketReader;
use crate::writer::PacketWriter;

use std::collections::HashSet;
use std::io::{Read, Seek, Write};
use std::sync::{Arc, Mutex};

// The single serialization point to the sink. Writers clone this handle;
// whatever a flush writes stays contiguous on the wire because the lock is
// held for the whole page burst.
pub(crate) struct SharedSink<W> {
	inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedSink<W> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<W> SharedSink<W> {
	fn new(sink: W) -> Self {
		Self {
			inner: Arc::new(Mutex::new(sink)),
		}
	}

	fn try_unwrap(self) -> Result<W> {
		match Arc::try_unwrap(self.inner) {
			Ok(mutex) => mutex
				.into_inner()
				.map_err(|_| OggError::Io(std::io::Error::other("sink poisoned by a panicked writer"))),
			Err(_) => Err(OggError::WritersActive),
		}
	}
}

impl<W: Write> SharedSink<W> {
	pub(crate) fn write_pages(&self, pages: &mut [Page]) -> Result<()> {
		let mut sink = self
			.inner
			.lock()
			.map_err(|_| OggError::Io(std::io::Error::other("sink poisoned by a panicked writer")))?;

		for page in pages.iter_mut() {
			page.gen_crc();
			sink.write_all(&page.as_bytes())?;
		}
		sink.flush()?;

		Ok(())
	}
}

// Serial numbers are allocated randomly with rejection against everything
// already vended, so freshly multiplexed streams can never collide.
struct SerialAllocator {
	used: HashSet<u32>,
}

impl SerialAllocator {
	fn new() -> Self {
		Self {
			used: HashSet::new(),
		}
	}

	fn allocate(&mut self) -> u32 {
		loop {
			let stream_serial = rand::random::<u32>();
			if self.used.insert(stream_serial) {
				return stream_serial;
			}
		}
	}

	fn claim(&mut self, stream_serial: u32) -> bool {
		self.used.insert(stream_serial)
	}
}

enum ContainerMode<T> {
	Read(Option<T>),
	Write(SharedSink<T>),
}

/// A physical OGG stream and the logical streams multiplexed into it
///
/// A container either wraps a byte source for reading or a byte sink for
/// writing; the two roles are exclusive. A read mode container vends
/// exactly one [`PacketReader`]. A write mode container vends one
/// [`PacketWriter`] per logical stream and guarantees their serial numbers
/// never collide.
///
/// Writers can be driven from separate threads; page bursts are serialized
/// on the shared sink. There is no such allowance for reading, which is
/// strictly single-consumer.
pub struct OggContainer<T> {
	mode: ContainerMode<T>,
	serials: SerialAllocator,
}

impl<T> OggContainer<T> {
	/// Create a container for demultiplexing `source`
	pub fn read_mode(source: T) -> Self
	where
		T: Read + Seek,
	{
		Self {
			mode: ContainerMode::Read(Some(source)),
			serials: SerialAllocator::new(),
		}
	}

	/// Create a container for multiplexing into `sink`
	pub fn write_mode(sink: T) -> Self
	where
		T: Write,
	{
		Self {
			mode: ContainerMode::Write(SharedSink::new(sink)),
			serials: SerialAllocator::new(),
		}
	}

	/// Take the container's packet reader
	///
	/// # Errors
	///
	/// * [`OggError::WrongMode`] on a write mode container
	/// * [`OggError::ReaderTaken`] if the reader was already taken
	pub fn packet_reader(&mut self) -> Result<PacketReader<T>>
	where
		T: Read + Seek,
	{
		match &mut self.mode {
			ContainerMode::Read(source) => match source.take() {
				Some(source) => Ok(PacketReader::new(source)),
				None => Err(OggError::ReaderTaken),
			},
			ContainerMode::Write(_) => Err(OggError::WrongMode),
		}
	}

	/// Create a packet writer for a new logical stream
	///
	/// With `stream_serial` of `None` a free serial number is generated.
	/// Passing an explicit serial claims it, so that later generated ones
	/// cannot collide with it either.
	///
	/// # Errors
	///
	/// * [`OggError::WrongMode`] on a read mode container
	/// * [`OggError::SerialTaken`] if an explicit serial was already claimed
	pub fn packet_writer(&mut self, stream_serial: Option<u32>) -> Result<PacketWriter<T>>
	where
		T: Write,
	{
		let ContainerMode::Write(sink) = &self.mode else {
			return Err(OggError::WrongMode);
		};

		let stream_serial = match stream_serial {
			Some(serial) => {
				if !self.serials.claim(serial) {
					return Err(OggError::SerialTaken(serial));
				}
				serial
			},
			None => self.serials.allocate(),
		};

		Ok(PacketWriter::new(sink.clone(), stream_serial))
	}

	/// Consumes the container and returns the underlying source or sink
	///
	/// For a write mode container every [`PacketWriter`] must have been
	/// dropped first, since they share the sink.
	///
	/// # Errors
	///
	/// * [`OggError::ReaderTaken`] if the packet reader owns the source
	/// * [`OggError::WritersActive`] if packet writers still hold the sink
	pub fn into_inner(self) -> Result<T> {
		match self.mode {
			ContainerMode::Read(Some(source)) => Ok(source),
			ContainerMode::Read(None) => Err(OggError::ReaderTaken),
			ContainerMode::Write(sink) => sink.try_unwrap(),
		}
	}
}

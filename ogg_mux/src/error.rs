use std::error::Error;
use std::fmt;

/// Alias for `Result<T, OggError>`
pub type Result<T> = std::result::Result<T, OggError>;

/// Errors that can occur while muxing or demuxing an OGG stream
#[derive(Debug)]
pub enum OggError {
	/// The reader contains a page with a nonzero version
	InvalidVersion,
	/// The reader is not positioned at a magic signature (OggS)
	MissingMagic,
	/// No magic signature was found within the sync window
	SyncLimitExceeded,
	/// The writer was given more data than a single page can hold
	TooMuchData,
	/// The reader contains too little data to extract the expected information
	NotEnoughData,
	/// The packet writer was used after being closed
	WriterClosed,
	/// A read operation was attempted on a write mode container, or vice versa
	WrongMode,
	/// The container's packet reader was already taken
	ReaderTaken,
	/// The stream serial is already in use by another writer
	SerialTaken(u32),
	/// The container's sink is still shared with active packet writers
	WritersActive,
	/// Any std::io::Error
	Io(std::io::Error),
}

impl fmt::Display for OggError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OggError::InvalidVersion => {
				write!(f, "Invalid stream structure version (Should always be 0)")
			},
			OggError::MissingMagic => write!(f, "Page is missing a magic signature"),
			OggError::SyncLimitExceeded => {
				write!(f, "No magic signature was found within the sync window")
			},
			OggError::TooMuchData => write!(f, "Too much data was provided for a single page"),
			OggError::NotEnoughData => {
				write!(f, "Too little data is available for the expected read")
			},
			OggError::WriterClosed => write!(f, "The packet writer has already been closed"),
			OggError::WrongMode => {
				write!(f, "The operation does not match the container's read/write mode")
			},
			OggError::ReaderTaken => {
				write!(f, "The container's packet reader has already been taken")
			},
			OggError::SerialTaken(serial) => {
				write!(f, "Stream serial {serial:#x} is already in use")
			},
			OggError::WritersActive => {
				write!(f, "One or more packet writers still hold the container's sink")
			},
			OggError::Io(err) => write!(f, "{}", err),
		}
	}
}

impl Error for OggError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match *self {
			OggError::Io(ref e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for OggError {
	fn from(err: std::io::Error) -> OggError {
		OggError::Io(err)
	}
}

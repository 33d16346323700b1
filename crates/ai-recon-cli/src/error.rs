use derive_more::From;
use std::io;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
	// -- App Libs
	#[from]
	AIRecon(ai_recon::Error),

	// -- Externals
	#[from]
	IO(io::Error),
	#[from]
	Dialoguer(dialoguer::Error),
	#[from]
	Join(tokio::task::JoinError),
}

impl Error {
	/// Process exit code for this error: 2 for configuration and validation errors, 1 otherwise.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::AIRecon(err) if err.is_usage() => 2,
			_ => 1,
		}
	}

	/// True when a read was cut by Ctrl-C.
	pub fn is_interrupted(&self) -> bool {
		match self {
			Error::Dialoguer(dialoguer::Error::IO(err)) | Error::IO(err) => {
				err.kind() == io::ErrorKind::Interrupted
			}
			_ => false,
		}
	}
}

// region:    --- Error Boilerplate
impl core::fmt::Display for Error {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}
// endregion: --- Error Boilerplate

// region:    --- Tests


// endregion: --- Tests

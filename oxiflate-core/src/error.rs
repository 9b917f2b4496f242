//! Error codes for OxiFlate streams.
//!
//! Every condition a deflate or inflate stream can report is one variant of
//! [`Error`]. The set is closed and the variants carry no payload, so
//! an error can be latched inside a decoder and compared in tests.
//!
//! Variants fall into three categories (see [`ErrorCategory`]):
//!
//! - **Status**: `NeedBuffers`, `EndOfStream`, `NeedDict`. These are not
//!   failures. The caller supplies more space, stops, or installs a dictionary.
//! - **Stream**: `StreamError`. The caller violated the calling protocol.
//! - **Data**: everything else. The input is not a valid stream.

use thiserror::Error;

/// Error codes returned by the streaming codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// No progress is possible with the buffers supplied.
    #[error("need buffers")]
    NeedBuffers,

    /// The end of the stream was reached.
    #[error("end of stream")]
    EndOfStream,

    /// A preset dictionary is required to continue.
    #[error("need dictionary")]
    NeedDict,

    /// The stream was driven incorrectly or configured with invalid values.
    #[error("stream error")]
    StreamError,

    /// Block type 3 was encountered.
    #[error("invalid block type")]
    InvalidBlockType,

    /// A stored block length did not match its one's complement.
    #[error("invalid stored block lengths")]
    InvalidStoredLength,

    /// HLIT or HDIST described more symbols than the alphabet holds.
    #[error("too many length or distance symbols")]
    TooManySymbols,

    /// The code lengths of a dynamic block are unusable.
    #[error("invalid code lengths set")]
    InvalidCodeLengths,

    /// A repeat code ran past the end of the lengths or had nothing to repeat.
    #[error("invalid bit length repeat")]
    InvalidBitLengthRepeat,

    /// The literal/length code has no code for end-of-block.
    #[error("invalid code -- missing end-of-block")]
    MissingEob,

    /// A literal/length symbol that has no meaning was decoded.
    #[error("invalid literal/length code")]
    InvalidLiteralLength,

    /// A distance symbol that has no meaning was decoded.
    #[error("invalid distance code")]
    InvalidDistanceCode,

    /// A back-reference reached before the start of the available history.
    #[error("invalid distance too far back")]
    InvalidDistance,

    /// The zlib header check bits were wrong.
    #[error("incorrect header check")]
    IncorrectHeaderCheck,

    /// The trailer checksum did not match the decoded data.
    #[error("incorrect data check")]
    IncorrectDataCheck,

    /// The gzip trailer length did not match the decoded size.
    #[error("incorrect length check")]
    IncorrectLengthCheck,

    /// The header names a compression method other than deflate.
    #[error("unknown compression method")]
    UnknownCompressionMethod,

    /// The zlib header asks for a window larger than allowed.
    #[error("invalid window size")]
    InvalidWindowSize,

    /// The gzip header CRC did not match.
    #[error("header crc mismatch")]
    HeaderCrcMismatch,

    /// Reserved gzip header flag bits were set.
    #[error("unknown header flags set")]
    UnknownHeaderFlags,

    /// A code length set uses more codes than its bit lengths allow.
    #[error("over-subscribed length set")]
    OverSubscribedLength,

    /// A code length set leaves codes unused where that is not allowed.
    #[error("incomplete length set")]
    IncompleteLengthSet,

    /// An error that fits no other variant.
    #[error("general error")]
    General,
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Flow control: more buffers, end of stream, dictionary needed.
    Status,
    /// The caller broke the calling protocol.
    Stream,
    /// The compressed input is malformed.
    Data,
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Every error code, in declaration order.
    pub const ALL: [Error; 23] = [
        Error::NeedBuffers,
        Error::EndOfStream,
        Error::NeedDict,
        Error::StreamError,
        Error::InvalidBlockType,
        Error::InvalidStoredLength,
        Error::TooManySymbols,
        Error::InvalidCodeLengths,
        Error::InvalidBitLengthRepeat,
        Error::MissingEob,
        Error::InvalidLiteralLength,
        Error::InvalidDistanceCode,
        Error::InvalidDistance,
        Error::IncorrectHeaderCheck,
        Error::IncorrectDataCheck,
        Error::IncorrectLengthCheck,
        Error::UnknownCompressionMethod,
        Error::InvalidWindowSize,
        Error::HeaderCrcMismatch,
        Error::UnknownHeaderFlags,
        Error::OverSubscribedLength,
        Error::IncompleteLengthSet,
        Error::General,
    ];

    /// Classify this error.
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::NeedBuffers | Self::EndOfStream | Self::NeedDict => ErrorCategory::Status,
            Self::StreamError => ErrorCategory::Stream,
            _ => ErrorCategory::Data,
        }
    }

    /// True if the compressed input itself is at fault.
    pub fn is_data_error(self) -> bool {
        self.category() == ErrorCategory::Data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::InvalidBlockType.to_string(), "invalid block type");
        assert_eq!(
            Error::InvalidStoredLength.to_string(),
            "invalid stored block lengths"
        );
        assert_eq!(
            Error::IncorrectHeaderCheck.to_string(),
            "incorrect header check"
        );
        assert!(Error::MissingEob.to_string().contains("end-of-block"));
    }

    #[test]
    fn test_messages_are_distinct() {
        let messages: HashSet<String> = Error::ALL.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), Error::ALL.len());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::NeedBuffers.category(), ErrorCategory::Status);
        assert_eq!(Error::EndOfStream.category(), ErrorCategory::Status);
        assert_eq!(Error::NeedDict.category(), ErrorCategory::Status);
        assert_eq!(Error::StreamError.category(), ErrorCategory::Stream);
        assert!(Error::InvalidDistance.is_data_error());
        assert!(!Error::EndOfStream.is_data_error());

        let data = Error::ALL.iter().filter(|e| e.is_data_error()).count();
        assert_eq!(data, 19);
    }
}

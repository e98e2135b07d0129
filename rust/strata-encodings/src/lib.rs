//! Page level encodings of the Strata format.
//!
//! - [`compression`]: block codecs applied to whole pages.
//! - [`page_encoder`]: plain encoding of a slice of rows of one column into page bytes,
//!   together with the per-node statistics recorded in the page header.
//! - [`page_decoder`]: the [`PageDecoder`](page_decoder::PageDecoder) kernel interface
//!   and its plain implementation, producing Arrow arrays.
//!
//! Plain page layout, per schema node in pre-order:
//!
//! ```text
//! [validity bitmap, nullable nodes only]
//! leaf fixed-width: [values LE]
//! leaf boolean:     [value bitmap]
//! leaf string/bin:  [lengths: u32 LE x n] [payload]
//! list:             [lengths: u32 LE x n] [item node]
//! struct:           [child nodes...]
//! ```

pub mod compression;
pub mod page_decoder;
pub mod page_encoder;

pub use compression::{compress, decompress};
pub use page_decoder::{PageDecoder, PlainPageDecoder};
pub use page_encoder::{EncodedPage, encode_page};

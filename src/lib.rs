//! rsblock - erasure-coded block storage core
//!
//! The lowest tier of a distributed file system: Reed-Solomon(k, m)
//! erasure coding over GF(2^8), striped block placement, checksum
//! protected 4 KiB block I/O, and non-blocking direct I/O via a
//! submit/poll interface.
//!
//! # Architecture
//!
//! ```text
//! GaloisField (arithmetic) → Matrix (generator construction) → RsCodec (encode/decode)
//!                                                                     ↓
//!                              VolumeHeader / Block (on-disk format) ← spread/unspread
//!                                                                     ↓
//!                                                      BlockIo (submit_read/submit_write/poll)
//! ```
//!
//! Cross-node replication, the object/filesystem layers above this core,
//! free-space/index management, disk health monitoring, and configuration
//! loading are all out of scope here; they belong to collaborating
//! components built on top of this crate.
//!
//! # Modules
//!
//! - [`gf`] - GF(2^8) arithmetic kernel (tables, SIMD dispatch)
//! - [`matrix`] - Matrices over GF(2^8) (Vandermonde/Cauchy, invert)
//! - [`rs`] - Systematic Reed-Solomon(k, m) codec
//! - [`block`] - On-disk block/volume header format, stripe geometry
//! - [`io`] - Async direct block I/O (submit/poll, not async/await)
//! - [`error`] - Crate-wide error type

pub mod block;
pub mod error;
pub mod gf;
pub mod io;
pub mod matrix;
pub mod rs;

pub use block::{Block, VolumeHeader};
pub use error::{Error, Result};
pub use gf::{gf, GaloisField};
pub use io::{AlignedBuf, BlockIo, BlockIoConfig};
pub use matrix::Matrix;
pub use rs::{RsCodec, RsConfig};

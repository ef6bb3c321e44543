/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! lapis-jpegxl
//!
//! A small VarDCT JPEG XL encoder in pure Rust
//!
//! The encoder consumes 256x256 tiles of XYB samples and emits a
//! conformant codestream, one frame per tile: an 8x8 integer DCT,
//! fixed quantization tables and an ANS/prefix entropy coding engine
//! with LZ77 run folding. Colour conversion into XYB happens before
//! samples reach this crate.
//!
//! It supports the following features
//!
//! - VarDCT frames with fixed quantization
//! - crop-placed tiles for images of any size up to 2^30
//! - optional level-10 ISO-BMFF container output
//! - caller-owned output buffers with resumable emission
//!
//! - Non supported features
//!  -> modular mode, animation, progressive passes
//!  -> adaptive LF smoothing, the edge-preserving filter
//!  -> rate control
//!
//! The library is also fully safe
//!
//! # Features
//!
//! - `std`: Enables linking against the standard library
//!
//! # Example
//! - Encode a black 256x256 image
//! ```
//! use lapis_jpegxl::{EncoderOptions, JxlEncodeError, JxlTileEncoder};
//!
//! fn main() -> Result<(), JxlEncodeError> {
//!     let mut encoder = JxlTileEncoder::new(EncoderOptions::new(256, 256))?;
//!     encoder.provide_output_buffer(vec![0u8; 1 << 20]);
//!     let plane = vec![0i16; 256 * 256];
//!     encoder.send_tile([&plane[..], &plane[..], &plane[..]], 0, 0, 256, 1)?;
//!     let (codestream, written) = encoder.release_output_buffer();
//!     assert_eq!(&codestream[..2], &[0xFF, 0x0A]);
//!     assert!(written > 0);
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use encoder::{JxlTileEncoder, TILE_DIM};
pub use errors::JxlEncodeError;
pub use options::EncoderOptions;

mod ans;
mod bit_writer;
mod consts;
mod dct;
mod encoder;
mod entropy;
mod errors;
mod huffman;
mod math;
mod options;

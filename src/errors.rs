/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use core::fmt::{Debug, Formatter};

/// Largest width or height the encoder will accept
pub const MAX_DIMENSIONS: usize = 1 << 30;

/// Errors that may arise during encoding
pub enum JxlEncodeError {
    /// The current output buffer is full.
    ///
    /// This is the only recoverable error, provide a fresh
    /// output buffer and call `flush` to continue emission
    NeedMoreOutput,
    /// One of the dimensions is zero
    ZeroDimension(&'static str),
    /// A given width or height is too big to be encoded
    TooLargeDimensions(usize),
    /// Mismatch in length expected vs what was found
    LengthMismatch(usize, usize),
    /// The caller broke an API contract, e.g. a tile
    /// coordinate outside the image grid
    ApiMisuse(&'static str),
    /// A broken internal invariant, always a bug in the library
    Internal(&'static str),
}

impl Debug for JxlEncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            JxlEncodeError::NeedMoreOutput => {
                writeln!(f, "The output buffer is full, provide a new one and flush")
            }
            JxlEncodeError::ZeroDimension(param) => writeln!(f, "The {param} is zero"),
            JxlEncodeError::TooLargeDimensions(value) => {
                writeln!(
                    f,
                    "Too large dimensions {value} greater than supported dimensions {MAX_DIMENSIONS}"
                )
            }
            JxlEncodeError::LengthMismatch(expected, found) => {
                writeln!(f, "Expected array of length {expected} but found {found}")
            }
            JxlEncodeError::ApiMisuse(msg) => writeln!(f, "API misuse: {msg}"),
            JxlEncodeError::Internal(msg) => {
                writeln!(f, "Internal error, this is a bug in the library: {msg}")
            }
        }
    }
}

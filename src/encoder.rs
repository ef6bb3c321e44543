/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The tile encoder
//!
//! Tiles of XYB samples come in, frames come out. Each 256x256 tile is
//! emitted as its own frame: image header (first tile only), frame
//! header with crop placement, then LF global, LF group, HF global and
//! the HF coefficient stream encoded into an internal working buffer so
//! the TOC can be written once the payload length is known.

use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use crate::bit_writer::BitWriter;
use crate::consts::{
    COEFF_FREQ_CONTEXT, COEFF_NUM_NONZERO_CONTEXT, HF_BLOCK_CLUSTER_MAP, HF_MULT,
    HF_QUANT_WEIGHTS, LEVEL10_HEADER, NATURAL_ORDER,
};
use crate::dct::forward_dct;
use crate::entropy::EntropyStream;
use crate::errors::{JxlEncodeError, MAX_DIMENSIONS};
use crate::math::{cllog2, pack_signed, signed_rshift};
use crate::options::EncoderOptions;

/// Tiles are squares of this many pixels
pub const TILE_DIM: usize = 256;

/// Frame payloads are assembled here before the TOC is known
const WORKING_BUFFER_SIZE: usize = 1 << 18;

/// Per-plane DC scale applied before prediction, in X, Y, B order:
/// identity for X, a left shift for Y, a right shift for B
const DC_SHIFT: [i32; 3] = [0, 3, -1];

/// A VarDCT JPEG XL encoder fed one 256x256 tile at a time
///
/// The caller owns the output buffer: install one with
/// [`provide_output_buffer`](Self::provide_output_buffer), retrieve it
/// with [`release_output_buffer`](Self::release_output_buffer). When a
/// tile overflows the buffer, [`send_tile`](Self::send_tile) returns
/// [`JxlEncodeError::NeedMoreOutput`]; install a fresh buffer and call
/// [`flush`](Self::flush) to resume emission where it stopped.
///
/// # Example
/// ```
/// use lapis_jpegxl::{EncoderOptions, JxlTileEncoder};
///
/// let mut encoder = JxlTileEncoder::new(EncoderOptions::new(256, 256)).unwrap();
/// encoder.provide_output_buffer(vec![0u8; 1 << 20]);
/// let plane = vec![0i16; 256 * 256];
/// encoder
///     .send_tile([&plane[..], &plane[..], &plane[..]], 0, 0, 256, 1)
///     .unwrap();
/// let (output, written) = encoder.release_output_buffer();
/// assert_eq!(&output[..2], &[0xFF, 0x0A]);
/// assert!(written > 0);
/// ```
pub struct JxlTileEncoder {
    options:            EncoderOptions,
    planes:             [Vec<i32>; 3],
    writer:             BitWriter,
    working:            BitWriter,
    copy_pos:           usize,
    group_x:            usize,
    group_y:            usize,
    group_width:        usize,
    group_height:       usize,
    varblock_width:     usize,
    varblock_height:    usize,
    wrote_header:       bool,
    wrote_frame_header: bool,
}

impl JxlTileEncoder {
    /// Create an encoder for an image described by `options`
    pub fn new(options: EncoderOptions) -> Result<JxlTileEncoder, JxlEncodeError> {
        if options.width() == 0 {
            return Err(JxlEncodeError::ZeroDimension("width"));
        }
        if options.height() == 0 {
            return Err(JxlEncodeError::ZeroDimension("height"));
        }
        for dim in [options.width(), options.height()] {
            if dim > MAX_DIMENSIONS {
                return Err(JxlEncodeError::TooLargeDimensions(dim));
            }
        }
        trace!(
            "JXL tile encoder: {}x{}, linear {}, container {}",
            options.width(),
            options.height(),
            options.linear_light(),
            options.container()
        );

        let plane = vec![0i32; TILE_DIM * TILE_DIM];
        Ok(JxlTileEncoder {
            options,
            planes: [plane.clone(), plane.clone(), plane],
            writer: BitWriter::new(),
            working: BitWriter::with_buffer(vec![0u8; WORKING_BUFFER_SIZE]),
            copy_pos: 0,
            group_x: 0,
            group_y: 0,
            group_width: 0,
            group_height: 0,
            varblock_width: 0,
            varblock_height: 0,
            wrote_header: false,
            wrote_frame_header: false,
        })
    }

    /// Install an output buffer; its length is the capacity contract
    ///
    /// Replacing the buffer clears a pending
    /// [`NeedMoreOutput`](JxlEncodeError::NeedMoreOutput) condition.
    pub fn provide_output_buffer(&mut self, buffer: Vec<u8>) {
        self.writer.rebase(buffer);
    }

    /// Take back the output buffer along with how many bytes were
    /// written into it
    pub fn release_output_buffer(&mut self) -> (Vec<u8>, usize) {
        self.writer.flush();
        self.writer.take_buffer()
    }

    /// Copy pending frame payload bytes into the output buffer
    ///
    /// Returns `NeedMoreOutput` when the buffer fills before the
    /// payload is fully copied; emission resumes on the next call
    /// after a fresh buffer is installed.
    pub fn flush(&mut self) -> Result<(), JxlEncodeError> {
        if self.copy_pos < self.working.position {
            let n = self.writer.put_bytes(&self.working.written()[self.copy_pos..]);
            self.copy_pos += n;
            if self.copy_pos < self.working.position {
                return Err(JxlEncodeError::NeedMoreOutput);
            }
        }
        self.wrote_frame_header = false;
        Ok(())
    }

    /// Encode one tile of XYB samples as a frame
    ///
    /// `planes` are the X, Y and B samples of the tile, each indexed by
    /// `y * row_stride + x * pixel_stride`. Edge tiles may be smaller
    /// than 256 in either direction, only the covered samples are read.
    pub fn send_tile(
        &mut self, planes: [&[i16]; 3], tile_x: u32, tile_y: u32, row_stride: usize,
        pixel_stride: usize,
    ) -> Result<(), JxlEncodeError> {
        self.send_tile_pre(tile_x, tile_y)?;
        self.populate_planes(planes, row_stride, pixel_stride)?;
        self.encode_tile()
    }

    fn send_tile_pre(&mut self, tile_x: u32, tile_y: u32) -> Result<(), JxlEncodeError> {
        let tiles_x = (self.options.width() + TILE_DIM - 1) / TILE_DIM;
        let tiles_y = (self.options.height() + TILE_DIM - 1) / TILE_DIM;
        if (tile_x as usize) >= tiles_x || (tile_y as usize) >= tiles_y {
            return Err(JxlEncodeError::ApiMisuse("tile coordinate outside the image grid"));
        }
        self.writer.status()?;

        self.group_x = tile_x as usize;
        self.group_y = tile_y as usize;

        if !self.wrote_header {
            self.write_header()?;
        }
        if !self.wrote_frame_header {
            self.write_frame_header()?;
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), JxlEncodeError> {
        let bw = &mut self.writer;
        if self.options.container() {
            // always the head of the file, before any bits
            bw.put_bytes(&LEVEL10_HEADER);
        }

        // signature 0xFF0A and div8 = 0
        bw.put_bits(17, 0x0AFF);
        let size_dist = [1, 1, 1, 1];
        let size_bits = [9, 13, 18, 30];
        bw.put_u32(&size_dist, &size_bits, self.options.height() as u32);
        bw.put_bits(3, 0);
        bw.put_u32(&size_dist, &size_bits, self.options.width() as u32);

        // image metadata all_default, default_m
        bw.put_bits(2, 0x3);

        self.wrote_header = true;
        bw.status()
    }

    fn write_frame_header(&mut self) -> Result<(), JxlEncodeError> {
        let width = self.options.width();
        let height = self.options.height();

        self.group_width = if (self.group_x + 1) * TILE_DIM > width {
            width - self.group_x * TILE_DIM
        } else {
            TILE_DIM
        };
        self.group_height = if (self.group_y + 1) * TILE_DIM > height {
            height - self.group_y * TILE_DIM
        } else {
            TILE_DIM
        };
        self.varblock_width = (self.group_width + 7) >> 3;
        self.varblock_height = (self.group_height + 7) >> 3;

        let bw = &mut self.writer;
        bw.zero_pad();

        // all_default = 0, frame_type = 0, encoding = 0 (VarDCT)
        bw.put_bits(4, 0);
        // flags = kSkipAdaptiveLFSmoothing
        bw.put_u64(0x80);
        // upsampling = 0, x_qm_scale = 3, b_qm_scale = 2, num_passes = 0
        bw.put_bits(10, 0x4C);

        let is_last = (self.group_x + 1) * TILE_DIM >= width
            && (self.group_y + 1) * TILE_DIM >= height;
        let have_crop = !is_last || self.group_x != 0 || self.group_y != 0;

        bw.put_bool(have_crop);
        if have_crop {
            let cpos = [0, 256, 2304, 18688];
            let upos = [8, 11, 14, 30];
            // extra factor of 2 on the origin because of UnpackSigned
            bw.put_u32(&cpos, &upos, (self.group_x << 9) as u32);
            bw.put_u32(&cpos, &upos, (self.group_y << 9) as u32);
            bw.put_u32(&cpos, &upos, self.group_width as u32);
            bw.put_u32(&cpos, &upos, self.group_height as u32);
        }

        // blending_info.mode = kReplace
        bw.put_bits(2, 0);
        // blending_info.source = 0
        if have_crop {
            bw.put_bits(2, 0);
        }

        bw.put_bool(is_last);
        // save_as_reference = 0
        if !is_last {
            bw.put_bits(2, 0);
        }

        // name_len = 0
        bw.put_bits(2, 0);

        // loop filter: all_default = 0, gab = 0, epf_iters = 0,
        // extensions = 0
        bw.put_bool(false);
        bw.put_bool(false);
        bw.put_bits(2, 0);
        bw.put_bits(2, 0);

        // frame header extensions = 0, permuted_toc = 0
        bw.put_bits(3, 0);

        bw.zero_pad();
        self.wrote_frame_header = true;
        bw.status()
    }

    fn populate_planes(
        &mut self, input: [&[i16]; 3], row_stride: usize, pixel_stride: usize,
    ) -> Result<(), JxlEncodeError> {
        let gw = self.group_width;
        let gh = self.group_height;
        let px_w = self.varblock_width * 8;
        let px_h = self.varblock_height * 8;
        let needed = (gh - 1) * row_stride + (gw - 1) * pixel_stride + 1;

        for (plane, source) in self.planes.iter_mut().zip(input.iter()) {
            if source.len() < needed {
                return Err(JxlEncodeError::LengthMismatch(needed, source.len()));
            }
            for y in 0..gh {
                let row = &mut plane[y * TILE_DIM..y * TILE_DIM + px_w];
                for (x, slot) in row[..gw].iter_mut().enumerate() {
                    *slot = i32::from(source[y * row_stride + x * pixel_stride]);
                }
                // pad partial varblocks by replicating the last column
                let last = row[gw - 1];
                for slot in row[gw..].iter_mut() {
                    *slot = last;
                }
            }
            // and the last row
            for y in gh..px_h {
                plane.copy_within((gh - 1) * TILE_DIM..(gh - 1) * TILE_DIM + px_w, y * TILE_DIM);
            }
        }
        Ok(())
    }

    fn encode_tile(&mut self) -> Result<(), JxlEncodeError> {
        trace!(
            "encoding tile ({}, {}) as {}x{} frame",
            self.group_x,
            self.group_y,
            self.group_width,
            self.group_height
        );
        self.working.reset();
        self.copy_pos = 0;

        let (vw, vh) = (self.varblock_width, self.varblock_height);
        for plane in self.planes.iter_mut() {
            forward_dct(plane, TILE_DIM, vw, vh);
        }

        self.write_lf_global()?;
        self.write_lf_group()?;

        // HFGlobal: default parameters, HF pass order 2
        self.working.put_bool(true);
        self.working.put_bits(2, 2);

        self.write_hf_coeffs()?;

        self.working.zero_pad();
        self.working.status()?;

        // the payload length is now known, TOC goes to the main buffer
        let bw = &mut self.writer;
        bw.zero_pad();
        bw.put_u32(&[0, 1024, 17408, 4211712], &[10, 14, 22, 30], self.working.position as u32);
        bw.zero_pad();
        bw.status()?;

        self.flush()
    }

    fn write_lf_global(&mut self) -> Result<(), JxlEncodeError> {
        let bw = &mut self.working;

        // LF channel quantization all_default
        bw.put_bool(true);
        // quantizer globalScale = 32768
        bw.put_u32(&[1, 2049, 4097, 8193], &[11, 11, 12, 16], 32768);
        // quantizer quantLF = 64
        bw.put_u32(&[16, 1, 1, 1], &[0, 5, 8, 16], 64);
        // HF block context all_default
        bw.put_bool(true);
        // LF channel correlation all_default
        bw.put_bool(true);
        // GlobalModular have_global_tree
        bw.put_bool(false);
        bw.status()
    }

    /// The five-symbol stream describing a trivial modular tree:
    /// property -1, predictor 5, offset 0, mul_log 0, mul_bits 0
    fn write_trivial_tree(&mut self) -> Result<(), JxlEncodeError> {
        let mut stream = EntropyStream::new(5, &[0, 0, 0, 0, 0, 0], 0)?;
        stream.send_symbol(1, 0);
        stream.send_symbol(2, 5);
        stream.send_symbol(3, 0);
        stream.send_symbol(4, 0);
        stream.send_symbol(5, 0);
        stream.finalize_ans(&mut self.working)
    }

    fn write_lf_group(&mut self) -> Result<(), JxlEncodeError> {
        let bw = &mut self.working;
        // extra precision = 0
        bw.put_bits(2, 0);
        // use global tree = 0
        bw.put_bool(false);
        // wp_params all_default
        bw.put_bool(true);
        // nb_transforms = 0
        bw.put_bits(2, 0);
        self.write_trivial_tree()?;

        let vw = self.varblock_width;
        let vh = self.varblock_height;
        let nb_blocks = vw * vh;

        // DC deltas under the clamped-gradient predictor, in Y, X, B
        // channel order
        let mut stream = EntropyStream::new(3 * nb_blocks, &[0], 0)?;
        for i in 0..3 {
            let c = if i < 2 { 1 - i } else { i };
            let plane = &mut self.planes[c];
            let shift = DC_SHIFT[c];
            for y in 0..vh {
                for x in 0..vw {
                    let (xv, yv) = (x << 3, y << 3);
                    let index = yv * TILE_DIM + xv;
                    plane[index] = if shift >= 0 {
                        plane[index] << shift
                    } else {
                        signed_rshift(plane[index], (-shift) as u32)
                    };
                    let predicted = dc_prediction(plane, xv, yv);
                    stream.send_symbol(0, pack_signed(plane[index] - predicted));
                }
            }
        }
        stream.finalize_ans(&mut self.working)?;

        let bw = &mut self.working;
        bw.put_bits(cllog2(nb_blocks as u32), nb_blocks as u64 - 1);
        bw.put_bool(false);
        bw.put_bool(true);
        bw.put_bits(2, 0);
        self.write_trivial_tree()?;

        // the HF multiplier hides in a zeros-dominated stream covering
        // the CfL factors and the block info
        let cfl_width = (vw + 7) >> 3;
        let cfl_height = (vh + 7) >> 3;
        let num_z_pre = 2 * cfl_width * cfl_height + nb_blocks;
        let mut stream = EntropyStream::new(num_z_pre + 2 * nb_blocks, &[0], 0)?;
        for _ in 0..num_z_pre {
            stream.send_symbol(0, 0);
        }
        stream.send_symbol(0, ((HF_MULT - 1) << 1) as u32);
        for _ in 1..(nb_blocks << 1) {
            stream.send_symbol(0, 0);
        }
        stream.finalize_ans(&mut self.working)?;

        self.working.status()
    }

    fn write_hf_coeffs(&mut self) -> Result<(), JxlEncodeError> {
        let vw = self.varblock_width;
        let vh = self.varblock_height;
        let num_symbols = 3 * vw * vh * 64;

        // quantize the AC coefficients and gather non-zero counts per
        // varblock
        let mut non_zeroes = [[[0u8; 32]; 32]; 3];
        for (plane, (weights, nz_plane)) in self
            .planes
            .iter_mut()
            .zip(HF_QUANT_WEIGHTS.iter().zip(non_zeroes.iter_mut()))
        {
            for by in 0..vh {
                for bx in 0..vw {
                    for j in 1..64 {
                        let (px, py) = NATURAL_ORDER[j];
                        let index =
                            (by * 8 + usize::from(py)) * TILE_DIM + bx * 8 + usize::from(px);
                        let quantized = hf_quant(plane[index], weights[j]);
                        plane[index] = quantized;
                        if quantized != 0 {
                            nz_plane[by][bx] += 1;
                        }
                    }
                }
            }
        }

        let cluster_map = vec![0u8; 7425];
        let mut stream = EntropyStream::new(num_symbols, &cluster_map, 0)?;

        for by in 0..vh {
            for bx in 0..vw {
                for i in 0..3 {
                    let c = if i < 2 { 1 - i } else { i };
                    let plane = &self.planes[c];
                    let predicted = predicted_non_zeroes(&non_zeroes[c], by, bx);
                    let block_context = HF_BLOCK_CLUSTER_MAP[13 * i];
                    let context = non_zero_context(usize::from(predicted), block_context);
                    let mut non_zero_count = i32::from(non_zeroes[c][by][bx]);
                    stream.send_symbol(context, non_zero_count as u32);
                    if non_zero_count == 0 {
                        continue;
                    }
                    let hist_context = 458 * block_context + 37 * 15;
                    for k in 0..63 {
                        let (px, py) = NATURAL_ORDER[k + 1];
                        let (ppx, ppy) = NATURAL_ORDER[k];
                        let prev = if k > 0 {
                            let prev_index = (by * 8 + usize::from(ppy)) * TILE_DIM
                                + bx * 8
                                + usize::from(ppx);
                            usize::from(plane[prev_index] != 0)
                        } else {
                            usize::from(non_zeroes[c][by][bx] <= 4)
                        };
                        let context = hist_context
                            + prev
                            + ((COEFF_NUM_NONZERO_CONTEXT[non_zero_count as usize]
                                + COEFF_FREQ_CONTEXT[k])
                                << 1);
                        let index = (by * 8 + usize::from(py)) * TILE_DIM + bx * 8 + usize::from(px);
                        let value = plane[index];
                        stream.send_symbol(context, pack_signed(value));
                        if value != 0 {
                            non_zero_count -= 1;
                            if non_zero_count == 0 {
                                break;
                            }
                        }
                    }
                }
            }
        }
        stream.finalize_ans(&mut self.working)?;
        self.working.status()
    }
}

/// Clamped-gradient DC prediction at 8-pixel stride with edge
/// replication: 0 at the origin, the single neighbour on the first
/// row/column, otherwise `w + n - nw` clamped into `[min(w,n), max(w,n)]`
fn dc_prediction(plane: &[i32], xv: usize, yv: usize) -> i32 {
    let w = if xv > 0 {
        plane[yv * TILE_DIM + xv - 8]
    } else if yv > 0 {
        plane[(yv - 8) * TILE_DIM + xv]
    } else {
        0
    };
    let n = if yv > 0 { plane[(yv - 8) * TILE_DIM + xv] } else { w };
    let nw = if xv > 0 && yv > 0 { plane[(yv - 8) * TILE_DIM + xv - 8] } else { w };
    (w + n - nw).clamp(w.min(n), w.max(n))
}

/// Quantize one AC coefficient, rounding towards zero
fn hf_quant(value: i32, weight: i32) -> i32 {
    let magnitude =
        (i64::from(value.unsigned_abs()) * i64::from(weight) * i64::from(HF_MULT)) >> 14;
    if value < 0 {
        -(magnitude as i32)
    } else {
        magnitude as i32
    }
}

/// Predicted non-zero count: ceil mean of the top and left blocks,
/// the single neighbour on an edge, 32 at the origin
fn predicted_non_zeroes(nz: &[[u8; 32]; 32], y: usize, x: usize) -> u8 {
    if x == 0 && y == 0 {
        return 32;
    }
    if x == 0 {
        return nz[y - 1][x];
    }
    if y == 0 {
        return nz[y][x - 1];
    }
    ((u16::from(nz[y - 1][x]) + u16::from(nz[y][x - 1]) + 1) >> 1) as u8
}

/// Context of the non-zero-count symbol given the prediction
fn non_zero_context(predicted: usize, block_context: usize) -> usize {
    if predicted < 8 {
        return block_context + 15 * predicted;
    }
    let predicted = predicted.min(64);
    block_context + 15 * (4 + (predicted >> 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_prediction_boundaries() {
        let mut plane = vec![0i32; TILE_DIM * TILE_DIM];
        plane[0] = 11; // (0, 0)
        plane[8] = 30; // (8, 0)
        plane[8 * TILE_DIM] = 20; // (0, 8)
        plane[8 * TILE_DIM + 8] = 25; // (8, 8)

        // origin predicts zero
        assert_eq!(dc_prediction(&plane, 0, 0), 0);
        // top row predicts the left neighbour
        assert_eq!(dc_prediction(&plane, 8, 0), 11);
        assert_eq!(dc_prediction(&plane, 16, 0), 30);
        // left column predicts the top neighbour
        assert_eq!(dc_prediction(&plane, 0, 8), 11);
        assert_eq!(dc_prediction(&plane, 0, 16), 20);
        // interior clamps w + n - nw into [min(w, n), max(w, n)]
        // w = 20, n = 30, nw = 11 -> 39 clamped to 30
        assert_eq!(dc_prediction(&plane, 8, 8), 30);
    }

    #[test]
    fn dc_prediction_gradient_within_bounds() {
        let mut plane = vec![0i32; TILE_DIM * TILE_DIM];
        plane[0] = 10; // nw
        plane[8] = 14; // n
        plane[8 * TILE_DIM] = 13; // w
        // 13 + 14 - 10 = 17 clamps to max(13, 14)
        assert_eq!(dc_prediction(&plane, 8, 8), 14);
        plane[0] = 16;
        // 13 + 14 - 16 = 11 clamps to min(13, 14)
        assert_eq!(dc_prediction(&plane, 8, 8), 13);
        plane[0] = 14;
        // in range stays put
        assert_eq!(dc_prediction(&plane, 8, 8), 13);
    }

    #[test]
    fn hf_quant_rounds_towards_zero() {
        // value * weight * 8 >> 14, sign-symmetric
        assert_eq!(hf_quant(100, 279), (100 * 279 * 8) >> 14);
        assert_eq!(hf_quant(-100, 279), -((100 * 279 * 8) >> 14));
        assert_eq!(hf_quant(1, 1968), 0);
        assert_eq!(hf_quant(-1, 1968), 0);
        assert_eq!(hf_quant(0, 1968), 0);
    }

    #[test]
    fn predicted_non_zeroes_edges() {
        let mut nz = [[0u8; 32]; 32];
        nz[0][0] = 10;
        nz[0][1] = 5;
        nz[1][0] = 7;
        assert_eq!(predicted_non_zeroes(&nz, 0, 0), 32);
        assert_eq!(predicted_non_zeroes(&nz, 0, 1), 10);
        assert_eq!(predicted_non_zeroes(&nz, 1, 0), 10);
        // ceil mean of top (5) and left (7)
        assert_eq!(predicted_non_zeroes(&nz, 1, 1), 6);
    }

    #[test]
    fn non_zero_context_formula() {
        assert_eq!(non_zero_context(0, 0), 0);
        assert_eq!(non_zero_context(3, 7), 7 + 45);
        assert_eq!(non_zero_context(8, 0), 15 * 8);
        assert_eq!(non_zero_context(64, 0), 15 * 36);
        // clamped above 64
        assert_eq!(non_zero_context(100, 0), 15 * 36);
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! JPEG reconstruction: parsing of the reconstruction metadata and
//! bit-faithful replay of the original JPEG byte stream.

mod decode;
mod write;

pub use decode::*;
pub use write::*;

use crate::error::{Error, Result};

pub const JPEG_HUFFMAN_MAX_BIT_LENGTH: usize = 16;
pub const JPEG_HUFFMAN_ALPHABET_SIZE: usize = 256;

pub const ICC_PROFILE_TAG: &[u8] = b"ICC_PROFILE\0";
pub const EXIF_TAG: &[u8] = b"Exif\0\0";
pub const XMP_TAG: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Maximum number of markers accepted in the marker order list.
pub const MAX_NUM_MARKERS: usize = 16384;

/// Type of an APP marker payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AppMarkerType {
    /// Raw payload, stored in the compressed side stream.
    #[default]
    Unknown = 0,
    /// ICC color profile chunk (APP2).
    Icc = 1,
    /// Exif metadata (APP1).
    Exif = 2,
    /// XMP metadata (APP1).
    Xmp = 3,
}

impl TryFrom<u32> for AppMarkerType {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(AppMarkerType::Unknown),
            1 => Ok(AppMarkerType::Icc),
            2 => Ok(AppMarkerType::Exif),
            3 => Ok(AppMarkerType::Xmp),
            _ => Err(Error::InvalidJpegData("unknown APP marker type")),
        }
    }
}

/// JPEG quantization table. The values are in zigzag order; the
/// reconstruction header carries only the metadata, values are filled from
/// the frame's dequantization matrices.
#[derive(Debug, Clone)]
pub struct JpegQuantTable {
    /// 0 for 8-bit values, 1 for 16-bit.
    pub precision: u8,
    /// Table slot (0-3).
    pub index: u8,
    /// Whether this table closes its DQT segment.
    pub is_last: bool,
    pub values: [u16; 64],
}

impl Default for JpegQuantTable {
    fn default() -> Self {
        JpegQuantTable {
            precision: 0,
            index: 0,
            is_last: true,
            values: [0; 64],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JpegComponent {
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub quant_idx: u8,
}

/// JPEG Huffman code. `counts` and `values` include the synthetic sentinel
/// symbol appended by the encoder; the writer drops it again.
#[derive(Debug, Clone)]
pub struct JpegHuffmanCode {
    pub is_ac: bool,
    /// Table slot (0-3).
    pub slot_id: u8,
    /// Whether this code closes its DHT segment.
    pub is_last: bool,
    /// Number of codes per length; index 0 is unused.
    pub counts: [u32; JPEG_HUFFMAN_MAX_BIT_LENGTH + 1],
    pub values: Vec<u8>,
}

impl Default for JpegHuffmanCode {
    fn default() -> Self {
        JpegHuffmanCode {
            is_ac: false,
            slot_id: 0,
            is_last: true,
            counts: [0; JPEG_HUFFMAN_MAX_BIT_LENGTH + 1],
            values: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JpegScanComponent {
    pub comp_idx: u8,
    pub dc_tbl_idx: u8,
    pub ac_tbl_idx: u8,
}

#[derive(Debug, Clone, Default)]
pub struct JpegScanInfo {
    /// Spectral selection range and successive approximation bits.
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
    pub components: Vec<JpegScanComponent>,
    pub last_needed_pass: u8,
    /// Block indices where the entropy coder state is reset.
    pub reset_points: Vec<u32>,
    /// `(block index, number of extra zero runs)` pairs.
    pub extra_zero_runs: Vec<(u32, u32)>,
}

/// Everything needed to replay the original JPEG byte stream: marker order,
/// tables, scan metadata and the raw side data.
#[derive(Debug, Clone, Default)]
pub struct JpegData {
    pub width: u32,
    pub height: u32,
    pub is_gray: bool,
    /// Marker tags in file order, ending with EOI (0xD9).
    pub marker_order: Vec<u8>,
    pub app_marker_types: Vec<AppMarkerType>,
    /// One entry per APP marker: marker byte, two size bytes, payload.
    pub app_data: Vec<Vec<u8>>,
    /// One entry per COM marker: two size bytes, payload.
    pub com_data: Vec<Vec<u8>>,
    pub quant_tables: Vec<JpegQuantTable>,
    pub huffman_codes: Vec<JpegHuffmanCode>,
    pub components: Vec<JpegComponent>,
    pub scan_info: Vec<JpegScanInfo>,
    pub restart_interval: u32,
    pub inter_marker_data: Vec<Vec<u8>>,
    pub tail_data: Vec<u8>,
    /// Entropy-coded bytes of each scan, produced by the VarDCT collaborator.
    pub scan_data: Vec<Vec<u8>>,
    pub has_zero_padding_bit: bool,
    pub padding_bits: Vec<u8>,
}

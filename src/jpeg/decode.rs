// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use tracing::debug;

use super::{
    AppMarkerType, JpegComponent, JpegData, JpegHuffmanCode, JpegQuantTable, JpegScanComponent,
    JpegScanInfo, EXIF_TAG, ICC_PROFILE_TAG, JPEG_HUFFMAN_ALPHABET_SIZE, MAX_NUM_MARKERS, XMP_TAG,
};
use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::{read_bool, read_u32, U32};

/// The Brotli decompressor contract: the core consumes one, it does not
/// implement one.
pub trait BrotliDecompressor {
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>>;
}

impl<F> BrotliDecompressor for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>>,
{
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        self(compressed)
    }
}

/// Metadata blobs referenced by typed APP markers; they live in container
/// boxes, not in the reconstruction stream itself.
#[derive(Debug, Default)]
pub struct JpegReconMetadata {
    pub icc: Vec<u8>,
    pub exif: Vec<u8>,
    pub xmp: Vec<u8>,
}

struct AppMarkerInfo {
    ty: AppMarkerType,
    length: usize,
}

/// Consumes bytes from the front of a decompressed side stream.
struct SideStream<'a> {
    data: &'a [u8],
}

impl<'a> SideStream<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let data = self.data;
        if len > data.len() {
            return Err(Error::BrotliStreamTooShort(len));
        }
        let (head, rest) = data.split_at(len);
        self.data = rest;
        Ok(head)
    }
}

fn validate_marker(marker: &[u8]) -> Result<()> {
    if marker.len() < 3 || marker[1] as usize * 256 + marker[2] as usize + 1 != marker.len() {
        return Err(Error::InvalidJpegData("marker size mismatch"));
    }
    Ok(())
}

/// Decodes the field-encoded reconstruction header, then replays the
/// Brotli-compressed marker payloads.
///
/// `width` and `height` come from the frame header; quantization values and
/// scan data are filled in later by the VarDCT side.
pub fn decode_jpeg_data(
    data: &[u8],
    width: u32,
    height: u32,
    metadata: &JpegReconMetadata,
    brotli: &dyn BrotliDecompressor,
) -> Result<JpegData> {
    let mut br = BitReader::new(data);
    let mut out = JpegData {
        width,
        height,
        ..Default::default()
    };

    out.is_gray = read_bool(&mut br)?;

    // Marker order: 6-bit tags offset by 0xC0, terminated by EOI.
    let mut num_app_markers = 0usize;
    let mut num_com_markers = 0usize;
    let mut num_scans = 0usize;
    let mut num_intermarkers = 0usize;
    let mut has_dri = false;
    while out.marker_order.last() != Some(&0xd9) {
        if out.marker_order.len() >= MAX_NUM_MARKERS {
            return Err(Error::InvalidJpegData("too many markers"));
        }
        let marker = br.read(6)? as u8 + 0xc0;
        match marker {
            0xe0..=0xef => num_app_markers += 1,
            0xfe => num_com_markers += 1,
            0xda => num_scans += 1,
            0xff => num_intermarkers += 1,
            0xdd => has_dri = true,
            _ => {}
        }
        out.marker_order.push(marker);
    }

    let app_markers: Vec<AppMarkerInfo> = (0..num_app_markers)
        .map(|_| -> Result<AppMarkerInfo> {
            let ty = AppMarkerType::try_from(read_u32(
                &mut br,
                [
                    U32::Val(0),
                    U32::Val(1),
                    U32::BitsOffset { n: 1, off: 2 },
                    U32::BitsOffset { n: 2, off: 4 },
                ],
            )?)?;
            let length = br.read(16)? as usize + 1;
            Ok(AppMarkerInfo { ty, length })
        })
        .collect::<Result<_>>()?;
    out.app_marker_types = app_markers.iter().map(|m| m.ty).collect();

    let com_lengths: Vec<usize> = (0..num_com_markers)
        .map(|_| Ok(br.read(16)? as usize + 1))
        .collect::<Result<_>>()?;

    let num_quant_tables = br.read(2)? as usize + 1;
    for _ in 0..num_quant_tables {
        out.quant_tables.push(JpegQuantTable {
            precision: br.read(1)? as u8,
            index: br.read(2)? as u8,
            is_last: read_bool(&mut br)?,
            values: [0; 64],
        });
    }

    let component_ids: Vec<u8> = match br.read(2)? {
        0 => vec![1],
        1 => vec![1, 2, 3],
        2 => vec![b'R', b'G', b'B'],
        _ => {
            let num_comp = br.read(2)? as usize + 1;
            (0..num_comp)
                .map(|_| Ok(br.read(8)? as u8))
                .collect::<Result<_>>()?
        }
    };
    for id in component_ids {
        out.components.push(JpegComponent {
            id,
            h_samp_factor: 1,
            v_samp_factor: 1,
            quant_idx: br.read(2)? as u8,
        });
    }

    let num_huffman_codes = read_u32(
        &mut br,
        [
            U32::Val(4),
            U32::BitsOffset { n: 3, off: 2 },
            U32::BitsOffset { n: 4, off: 10 },
            U32::BitsOffset { n: 6, off: 26 },
        ],
    )? as usize;
    for _ in 0..num_huffman_codes {
        let mut code = JpegHuffmanCode {
            is_ac: read_bool(&mut br)?,
            slot_id: br.read(2)? as u8,
            is_last: read_bool(&mut br)?,
            ..Default::default()
        };
        let mut total_count = 0usize;
        for count in code.counts.iter_mut() {
            *count = read_u32(
                &mut br,
                [
                    U32::Val(0),
                    U32::Val(1),
                    U32::BitsOffset { n: 3, off: 2 },
                    U32::Bits(8),
                ],
            )?;
            total_count += *count as usize;
        }
        if total_count == 0 || total_count > JPEG_HUFFMAN_ALPHABET_SIZE + 1 {
            return Err(Error::InvalidJpegData("bad Huffman symbol count"));
        }
        code.values = (0..total_count)
            .map(|_| Ok(br.read(8)? as u8))
            .collect::<Result<_>>()?;
        out.huffman_codes.push(code);
    }

    for _ in 0..num_scans {
        let num_comps = br.read(2)? as usize + 1;
        let mut scan = JpegScanInfo {
            ss: br.read(6)? as u8,
            se: br.read(6)? as u8,
            al: br.read(4)? as u8,
            ah: br.read(4)? as u8,
            ..Default::default()
        };
        for _ in 0..num_comps {
            scan.components.push(JpegScanComponent {
                comp_idx: br.read(2)? as u8,
                ac_tbl_idx: br.read(2)? as u8,
                dc_tbl_idx: br.read(2)? as u8,
            });
        }
        scan.last_needed_pass = read_u32(
            &mut br,
            [
                U32::Val(0),
                U32::Val(1),
                U32::Val(2),
                U32::BitsOffset { n: 3, off: 3 },
            ],
        )? as u8;
        out.scan_info.push(scan);
    }

    if has_dri {
        out.restart_interval = br.read(16)? as u32;
    }

    let small_count = [
        U32::Val(0),
        U32::BitsOffset { n: 2, off: 1 },
        U32::BitsOffset { n: 4, off: 4 },
        U32::BitsOffset { n: 16, off: 20 },
    ];
    let block_index = [
        U32::Val(0),
        U32::BitsOffset { n: 3, off: 1 },
        U32::BitsOffset { n: 5, off: 9 },
        U32::BitsOffset { n: 28, off: 41 },
    ];
    for scan in out.scan_info.iter_mut() {
        let num_reset_points = read_u32(&mut br, small_count)? as usize;
        scan.reset_points = (0..num_reset_points)
            .map(|_| read_u32(&mut br, block_index))
            .collect::<Result<_>>()?;
        let num_extra_zero_runs = read_u32(&mut br, small_count)? as usize;
        scan.extra_zero_runs = (0..num_extra_zero_runs)
            .map(|_| -> Result<(u32, u32)> {
                let num_runs = read_u32(
                    &mut br,
                    [
                        U32::Val(1),
                        U32::BitsOffset { n: 2, off: 2 },
                        U32::BitsOffset { n: 4, off: 5 },
                        U32::BitsOffset { n: 8, off: 20 },
                    ],
                )?;
                let block_idx = read_u32(&mut br, block_index)?;
                Ok((block_idx, num_runs))
            })
            .collect::<Result<_>>()?;
    }

    let intermarker_lengths: Vec<usize> = (0..num_intermarkers)
        .map(|_| Ok(br.read(16)? as usize))
        .collect::<Result<_>>()?;

    let tail_length = read_u32(
        &mut br,
        [
            U32::Val(0),
            U32::BitsOffset { n: 8, off: 1 },
            U32::BitsOffset { n: 16, off: 257 },
            U32::BitsOffset { n: 22, off: 65793 },
        ],
    )? as usize;

    out.has_zero_padding_bit = read_bool(&mut br)?;
    if out.has_zero_padding_bit {
        let num_bits = br.read(24)? as usize;
        let mut bits = Vec::with_capacity(num_bits.div_ceil(8));
        for _ in 0..num_bits / 8 {
            bits.push(br.read(8)? as u8);
        }
        if num_bits % 8 != 0 {
            bits.push(br.read(num_bits % 8)? as u8);
        }
        out.padding_bits = bits;
    }

    br.jump_to_byte_boundary()?;
    if !br.all_reads_within_bounds() {
        return Err(Error::BitstreamOverread(br.overread_bytes()));
    }
    let header_bytes = br.total_bits_read() / 8;
    debug!(header_bytes, "decoded JPEG reconstruction header");

    // Everything after the header is one Brotli stream holding, in order:
    // unknown APP payloads, COM payloads, inter-marker data, tail.
    let decompressed = brotli.decompress(&data[header_bytes..])?;
    let mut stream = SideStream {
        data: &decompressed,
    };

    let mut num_icc = 0u8;
    let mut icc_offset = 0usize;
    for info in app_markers.iter() {
        let marker = match info.ty {
            AppMarkerType::Unknown => stream.take(info.length)?.to_vec(),
            AppMarkerType::Icc => {
                num_icc += 1;
                let chunk_len = info
                    .length
                    .checked_sub(3 + ICC_PROFILE_TAG.len() + 2)
                    .ok_or(Error::InvalidJpegData("ICC marker too short"))?;
                let mut marker = Vec::with_capacity(info.length);
                marker.push(0xe2);
                marker.extend_from_slice(&((info.length - 1) as u16).to_be_bytes());
                marker.extend_from_slice(ICC_PROFILE_TAG);
                marker.push(num_icc);
                marker.push(0); // total count, fixed up below
                let start = icc_offset.min(metadata.icc.len());
                let end = (icc_offset + chunk_len).min(metadata.icc.len());
                marker.extend_from_slice(&metadata.icc[start..end]);
                icc_offset += chunk_len;
                marker.resize(info.length, 0);
                marker
            }
            AppMarkerType::Exif => {
                let payload_len = info
                    .length
                    .checked_sub(3 + EXIF_TAG.len())
                    .ok_or(Error::InvalidJpegData("Exif marker too short"))?;
                let mut marker = Vec::with_capacity(info.length);
                marker.push(0xe1);
                marker.extend_from_slice(&((info.length - 1) as u16).to_be_bytes());
                marker.extend_from_slice(EXIF_TAG);
                let end = payload_len.min(metadata.exif.len());
                marker.extend_from_slice(&metadata.exif[..end]);
                marker.resize(info.length, 0);
                marker
            }
            AppMarkerType::Xmp => {
                let payload_len = info
                    .length
                    .checked_sub(3 + XMP_TAG.len())
                    .ok_or(Error::InvalidJpegData("XMP marker too short"))?;
                let mut marker = Vec::with_capacity(info.length);
                marker.push(0xe1);
                marker.extend_from_slice(&((info.length - 1) as u16).to_be_bytes());
                marker.extend_from_slice(XMP_TAG);
                let end = payload_len.min(metadata.xmp.len());
                marker.extend_from_slice(&metadata.xmp[..end]);
                marker.resize(info.length, 0);
                marker
            }
        };
        validate_marker(&marker)?;
        out.app_data.push(marker);
    }
    // Second pass over the ICC sequence: write the total chunk count.
    for (marker, info) in out.app_data.iter_mut().zip(app_markers.iter()) {
        if info.ty == AppMarkerType::Icc {
            marker[3 + ICC_PROFILE_TAG.len() + 1] = num_icc;
        }
    }

    for length in com_lengths {
        let chunk = stream.take(length)?.to_vec();
        if chunk.len() < 2 || chunk[0] as usize * 256 + chunk[1] as usize != length {
            return Err(Error::InvalidJpegData("COM size mismatch"));
        }
        out.com_data.push(chunk);
    }
    for length in intermarker_lengths {
        out.inter_marker_data.push(stream.take(length)?.to_vec());
    }
    out.tail_data = stream.take(tail_length)?.to_vec();

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bit_writer::BitWriter;

    struct NoopBrotli;
    impl BrotliDecompressor for NoopBrotli {
        fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
            Ok(compressed.to_vec())
        }
    }

    fn write_minimal_header(bw: &mut BitWriter) {
        bw.write(1, 0); // not gray
        // Marker order: SOF0, EOI.
        bw.write(6, 0x00); // 0xc0
        bw.write(6, 0x19); // 0xd9
        bw.write(2, 0); // one quant table
        bw.write(1, 0); // precision
        bw.write(2, 0); // index
        bw.write(1, 1); // is_last
        bw.write(2, 1); // components 1, 2, 3
        for _ in 0..3 {
            bw.write(2, 0); // quant_idx
        }
        bw.write(2, 0); // num_huffman_codes selector: 4
        for _ in 0..4 {
            bw.write(1, 0); // is_ac
            bw.write(2, 0); // slot
            bw.write(1, 1); // is_last
            // counts: one code of length 1 (plus nothing else).
            bw.write(2, 0); // counts[0] = 0
            bw.write(2, 1); // counts[1] = 1
            for _ in 2..=16 {
                bw.write(2, 0);
            }
            bw.write(8, 0); // the single value
        }
        bw.write(2, 0); // tail length 0
        bw.write(1, 0); // no padding bits
    }

    #[test]
    fn minimal_header_roundtrip() -> Result<()> {
        let mut bw = BitWriter::new();
        write_minimal_header(&mut bw);
        bw.zero_pad_to_byte();
        let bytes = bw.into_bytes();
        let data = decode_jpeg_data(&bytes, 64, 32, &JpegReconMetadata::default(), &NoopBrotli)?;
        assert_eq!(data.marker_order, vec![0xc0, 0xd9]);
        assert_eq!(data.components.len(), 3);
        assert_eq!(data.quant_tables.len(), 1);
        assert_eq!(data.huffman_codes.len(), 4);
        assert_eq!(data.width, 64);
        assert!(data.tail_data.is_empty());
        Ok(())
    }

    #[test]
    fn marker_cap_enforced() {
        // A stream of endless non-EOI markers must be rejected, not looped.
        let bytes = vec![0u8; MAX_NUM_MARKERS];
        let result = decode_jpeg_data(&bytes, 1, 1, &JpegReconMetadata::default(), &NoopBrotli);
        assert!(result.is_err());
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use byteorder::{BigEndian, ByteOrder};

use super::{JpegData, JPEG_HUFFMAN_MAX_BIT_LENGTH};
use crate::error::{Error, Result};

fn push_segment_header(out: &mut Vec<u8>, marker: u8, encoded_len: usize) {
    out.push(0xff);
    out.push(marker);
    let mut len = [0u8; 2];
    BigEndian::write_u16(&mut len, encoded_len as u16);
    out.extend_from_slice(&len);
}

/// Replays the marker order into a JPEG byte stream. A missing marker order
/// yields no output.
pub fn write_jpeg(data: &JpegData) -> Result<Vec<u8>> {
    if data.marker_order.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = vec![0xff, 0xd8];
    let mut app_data = data.app_data.iter();
    let mut com_data = data.com_data.iter();
    let mut inter_marker = data.inter_marker_data.iter();
    let mut scan_index = 0usize;
    let mut quant_tables = data.quant_tables.as_slice();
    let mut huffman_codes = data.huffman_codes.as_slice();

    for &marker in data.marker_order.iter() {
        match marker {
            // SOF: frame header from the components and image size.
            0xc0 | 0xc1 | 0xc2 | 0xc9 | 0xca => {
                let num_comps = data.components.len();
                push_segment_header(&mut out, marker, 8 + 3 * num_comps);
                out.push(8); // sample precision
                let mut size = [0u8; 4];
                BigEndian::write_u16(&mut size[..2], data.height as u16);
                BigEndian::write_u16(&mut size[2..], data.width as u16);
                out.extend_from_slice(&size);
                out.push(num_comps as u8);
                for comp in data.components.iter() {
                    out.push(comp.id);
                    out.push((comp.h_samp_factor << 4) | comp.v_samp_factor);
                    out.push(comp.quant_idx);
                }
            }

            // DHT: all codes up to and including the next is_last.
            0xc4 => {
                let num = huffman_codes
                    .iter()
                    .position(|c| c.is_last)
                    .ok_or(Error::InvalidJpegData("DHT without closing table"))?
                    + 1;
                let (codes, rest) = huffman_codes.split_at(num);
                huffman_codes = rest;
                let encoded_len = 2 + codes
                    .iter()
                    .map(|c| 17 + c.values.len() - 1)
                    .sum::<usize>();
                push_segment_header(&mut out, 0xc4, encoded_len);
                for code in codes {
                    out.push(code.slot_id | if code.is_ac { 0x10 } else { 0 });
                    // Drop the synthetic sentinel symbol again.
                    let mut counts = [0u8; JPEG_HUFFMAN_MAX_BIT_LENGTH];
                    for (i, count) in counts.iter_mut().enumerate() {
                        *count = code.counts[i + 1] as u8;
                    }
                    if let Some(last) = counts.iter_mut().rev().find(|c| **c != 0) {
                        *last -= 1;
                    }
                    out.extend_from_slice(&counts);
                    out.extend_from_slice(&code.values[..code.values.len() - 1]);
                }
            }

            // RSTn: bare marker.
            0xd0..=0xd7 => {
                out.push(0xff);
                out.push(marker);
            }

            // EOI, followed by any trailing bytes.
            0xd9 => {
                out.push(0xff);
                out.push(0xd9);
                out.extend_from_slice(&data.tail_data);
            }

            // SOS: scan header, then the raw entropy-coded bytes.
            0xda => {
                let scan = data
                    .scan_info
                    .get(scan_index)
                    .ok_or(Error::InvalidJpegData("missing scan info"))?;
                let num_comps = scan.components.len();
                push_segment_header(&mut out, 0xda, 6 + 2 * num_comps);
                out.push(num_comps as u8);
                for comp in scan.components.iter() {
                    let component = data
                        .components
                        .get(comp.comp_idx as usize)
                        .ok_or(Error::InvalidJpegData("scan component out of range"))?;
                    out.push(component.id);
                    out.push((comp.dc_tbl_idx << 4) | comp.ac_tbl_idx);
                }
                out.push(scan.ss);
                out.push(scan.se);
                out.push((scan.ah << 4) | scan.al);
                if let Some(body) = data.scan_data.get(scan_index) {
                    out.extend_from_slice(body);
                }
                scan_index += 1;
            }

            // DQT: all tables up to and including the next is_last.
            0xdb => {
                let num = quant_tables
                    .iter()
                    .position(|t| t.is_last)
                    .ok_or(Error::InvalidJpegData("DQT without closing table"))?
                    + 1;
                let (tables, rest) = quant_tables.split_at(num);
                quant_tables = rest;
                let encoded_len = 2 + tables
                    .iter()
                    .map(|t| 1 + if t.precision == 0 { 64 } else { 128 })
                    .sum::<usize>();
                push_segment_header(&mut out, 0xdb, encoded_len);
                for table in tables {
                    out.push((table.precision << 4) | table.index);
                    for &value in table.values.iter() {
                        if table.precision == 0 {
                            out.push(value as u8);
                        } else {
                            let mut be = [0u8; 2];
                            BigEndian::write_u16(&mut be, value);
                            out.extend_from_slice(&be);
                        }
                    }
                }
            }

            // DRI: restart interval, big endian.
            0xdd => {
                push_segment_header(&mut out, 0xdd, 4);
                let mut be = [0u8; 2];
                BigEndian::write_u16(&mut be, data.restart_interval as u16);
                out.extend_from_slice(&be);
            }

            // APPn: stored with marker byte and size included.
            0xe0..=0xef => {
                let body = app_data
                    .next()
                    .ok_or(Error::InvalidJpegData("missing APP data"))?;
                out.push(0xff);
                out.extend_from_slice(body);
            }

            // COM: stored with size included.
            0xfe => {
                let body = com_data
                    .next()
                    .ok_or(Error::InvalidJpegData("missing COM data"))?;
                out.push(0xff);
                out.push(0xfe);
                out.extend_from_slice(body);
            }

            // Unrecognized inter-marker data, copied verbatim.
            0xff => {
                let body = inter_marker
                    .next()
                    .ok_or(Error::InvalidJpegData("missing inter-marker data"))?;
                out.extend_from_slice(body);
            }

            _ => return Err(Error::InvalidJpegData("unexpected marker in order")),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jpeg::JpegComponent;

    #[test]
    fn minimal_stream_framing() -> Result<()> {
        let data = JpegData {
            width: 8,
            height: 8,
            marker_order: vec![0xc0, 0xd9],
            components: vec![JpegComponent {
                id: 1,
                h_samp_factor: 1,
                v_samp_factor: 1,
                quant_idx: 0,
            }],
            ..Default::default()
        };
        let bytes = write_jpeg(&data)?;
        assert!(bytes.starts_with(&[0xff, 0xd8]));
        assert!(bytes.ends_with(&[0xff, 0xd9]));
        // SOF segment: marker, length 11, precision 8, 8x8, one component.
        assert_eq!(&bytes[2..4], &[0xff, 0xc0]);
        assert_eq!(&bytes[4..6], &[0x00, 0x0b]);
        Ok(())
    }

    #[test]
    fn empty_marker_order_yields_no_output() -> Result<()> {
        let data = JpegData::default();
        assert!(write_jpeg(&data)?.is_empty());
        Ok(())
    }

    #[test]
    fn dri_is_big_endian() -> Result<()> {
        let data = JpegData {
            width: 8,
            height: 8,
            marker_order: vec![0xdd, 0xd9],
            restart_interval: 0x1234,
            ..Default::default()
        };
        let bytes = write_jpeg(&data)?;
        let pos = bytes.windows(2).position(|w| w == [0xff, 0xdd]).unwrap();
        assert_eq!(&bytes[pos + 2..pos + 6], &[0x00, 0x04, 0x12, 0x34]);
        Ok(())
    }
}

// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Reads bits from a sequence of bytes, LSB first.
///
/// Reads past the end of the stream synthesize zero bits instead of failing;
/// whether that happened is checked at audit points
/// ([`BitReader::all_reads_within_bounds`], [`BitReader::close`]) so that hot
/// loops do not pay for per-read bounds checks.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_buf: u64,
    bits_in_buf: usize,
    total_bits_read: usize,
    total_bits_available: usize,
    acknowledged_overread: bool,
}

pub const MAX_BITS_PER_CALL: usize = 56;

impl Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ data: [{} bytes], bit_buf: {:0width$b}, total_bits_read: {} }}",
            self.data.len(),
            self.bit_buf,
            self.total_bits_read,
            width = self.bits_in_buf
        )
    }
}

impl<'a> BitReader<'a> {
    /// Constructs a BitReader over the given data.
    pub fn new(data: &[u8]) -> BitReader {
        BitReader {
            data,
            bit_buf: 0,
            bits_in_buf: 0,
            total_bits_read: 0,
            total_bits_available: data.len() * 8,
            acknowledged_overread: false,
        }
    }

    /// Returns the low `num` bits at the current position without consuming
    /// them. Bits past the end of the stream read as zero.
    pub fn peek(&mut self, num: usize) -> u64 {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        self.refill();
        self.bit_buf & ((1u64 << num) - 1)
    }

    /// Advances by `num` bits. The bits must be in the buffer, i.e. a `peek`
    /// of at least `num` bits must precede this call.
    pub fn consume(&mut self, num: usize) -> Result<()> {
        if self.bits_in_buf < num {
            return Err(Error::OutOfBounds);
        }
        self.bit_buf >>= num;
        self.bits_in_buf -= num;
        self.total_bits_read += num;
        Ok(())
    }

    /// Reads `num <= 56` bits.
    /// ```
    /// # use jxl_core::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0, 1]);
    /// assert_eq!(br.read(8)?, 0);
    /// assert_eq!(br.read(4)?, 1);
    /// assert_eq!(br.read(4)?, 0);
    /// assert_eq!(br.total_bits_read(), 16);
    /// // Past the end, zero bits are synthesized; the overread is only
    /// // reported when the reader is audited.
    /// assert_eq!(br.read(8)?, 0);
    /// assert!(!br.all_reads_within_bounds());
    /// assert!(br.close().is_err());
    /// # Ok::<(), jxl_core::error::Error>(())
    /// ```
    pub fn read(&mut self, num: usize) -> Result<u64> {
        if num > MAX_BITS_PER_CALL {
            return Err(Error::TooManyBitsPerCall(num));
        }
        let ret = self.peek(num);
        self.consume(num)?;
        Ok(ret)
    }

    /// Returns the total number of bits that have been read or skipped,
    /// including synthesized past-the-end bits.
    pub fn total_bits_read(&self) -> usize {
        self.total_bits_read
    }

    /// Returns true if no read so far consumed bits past the end.
    pub fn all_reads_within_bounds(&self) -> bool {
        self.total_bits_read <= self.total_bits_available
    }

    /// Number of whole bytes synthesized past the end of the stream.
    pub fn overread_bytes(&self) -> usize {
        self.total_bits_read
            .saturating_sub(self.total_bits_available)
            .div_ceil(8)
    }

    /// Marks the overread seen so far as expected, e.g. when a section is
    /// known to be truncated and the zero fill is intentional.
    pub fn acknowledge_overread(&mut self) {
        self.acknowledged_overread = true;
    }

    /// Final audit: fails if any consumed bit was synthesized past the end of
    /// the stream and that was not acknowledged.
    pub fn close(self) -> Result<()> {
        if self.all_reads_within_bounds() || self.acknowledged_overread {
            Ok(())
        } else {
            Err(Error::BitstreamOverread(self.overread_bytes()))
        }
    }

    /// Skips `num` bits, potentially past the end of the stream.
    /// ```
    /// # use jxl_core::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0, 1]);
    /// assert_eq!(br.read(8)?, 0);
    /// br.skip_bits(4);
    /// assert_eq!(br.total_bits_read(), 12);
    /// # Ok::<(), jxl_core::error::Error>(())
    /// ```
    pub fn skip_bits(&mut self, mut num: usize) {
        // First consume whatever is already buffered.
        let take = num.min(self.bits_in_buf);
        self.bit_buf >>= take;
        self.bits_in_buf -= take;
        self.total_bits_read += take;
        num -= take;
        if num == 0 {
            return;
        }

        // Drop whole bytes directly from `data`.
        let whole_bytes = (num / 8).min(self.data.len());
        self.data = &self.data[whole_bytes..];
        self.total_bits_read += whole_bytes * 8;
        num -= whole_bytes * 8;

        // Leftover bits, and bits past the end of the stream.
        while num > 0 {
            self.refill();
            let take = num.min(self.bits_in_buf);
            self.bit_buf >>= take;
            self.bits_in_buf -= take;
            self.total_bits_read += take;
            num -= take;
        }
    }

    /// Jumps to the next byte boundary. The skipped bits have to be 0.
    /// ```
    /// # use jxl_core::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0, 1]);
    /// assert_eq!(br.read(8)?, 0);
    /// br.skip_bits(4);
    /// br.jump_to_byte_boundary()?;
    /// assert_eq!(br.total_bits_read(), 16);
    /// # Ok::<(), jxl_core::error::Error>(())
    /// ```
    pub fn jump_to_byte_boundary(&mut self) -> Result<()> {
        let byte_boundary = self.total_bits_read.div_ceil(8) * 8;
        if self.read(byte_boundary - self.total_bits_read)? != 0 {
            return Err(Error::NonZeroPadding);
        }
        Ok(())
    }

    fn refill(&mut self) {
        if self.data.len() >= 8 {
            let bits = LittleEndian::read_u64(self.data);
            self.bit_buf |= bits << self.bits_in_buf;
            let read_bytes = (63 - self.bits_in_buf) >> 3;
            self.bits_in_buf |= 56;
            self.data = &self.data[read_bytes..];
            debug_assert!(56 <= self.bits_in_buf && self.bits_in_buf < 64);
        } else {
            self.refill_slow()
        }
    }

    #[inline(never)]
    fn refill_slow(&mut self) {
        while self.bits_in_buf < 56 {
            if self.data.is_empty() {
                // Synthesize zero bits past the end; the high bits of
                // `bit_buf` are already zero.
                self.bits_in_buf = 56;
                return;
            }
            self.bit_buf |= (self.data[0] as u64) << self.bits_in_buf;
            self.bits_in_buf += 8;
            self.data = &self.data[1..];
        }
    }

    /// Splits off a separate BitReader to handle the next `num` *full* bytes.
    /// If `self` is not aligned to a byte boundary, it skips to the next byte
    /// boundary. `self` is automatically advanced by `num` bytes.
    pub fn split_at(&mut self, num: usize) -> Result<BitReader<'a>> {
        self.jump_to_byte_boundary()?;
        let mut ret = Self { ..*self };
        ret.total_bits_available = ret.total_bits_read + num * 8;
        self.skip_bits(num * 8);
        let bytes_in_buf = ret.bits_in_buf / 8;
        if num > bytes_in_buf {
            // Prevent the returned bitreader from reading into the section
            // that follows it.
            let data_bytes = (num - bytes_in_buf).min(ret.data.len());
            ret.data = &ret.data[..data_bytes];
        } else {
            ret.bits_in_buf = num * 8;
            ret.bit_buf &= (1u64 << (num * 8)) - 1;
            ret.data = &[];
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_lsb_first() -> Result<()> {
        let mut br = BitReader::new(&[0x17]);
        assert_eq!(br.read(2)?, 0b11);
        assert_eq!(br.read(4)?, 0b0101);
        assert_eq!(br.read(2)?, 0);
        br.close()
    }

    #[test]
    fn bits_consumed_matches_requests() -> Result<()> {
        let mut br = BitReader::new(&[0xaa; 16]);
        let mut total = 0;
        for num in [1, 7, 13, 25, 56, 3] {
            br.read(num)?;
            total += num;
            assert_eq!(br.total_bits_read(), total);
        }
        Ok(())
    }

    #[test]
    fn overread_synthesizes_zeros() -> Result<()> {
        let mut br = BitReader::new(&[0xff]);
        assert_eq!(br.read(8)?, 0xff);
        assert_eq!(br.read(16)?, 0);
        assert!(!br.all_reads_within_bounds());
        assert_eq!(br.overread_bytes(), 2);
        assert!(br.close().is_err());
        Ok(())
    }

    #[test]
    fn nonzero_padding_rejected() -> Result<()> {
        let mut br = BitReader::new(&[0b1000_0001]);
        assert_eq!(br.read(1)?, 1);
        assert!(br.jump_to_byte_boundary().is_err());
        Ok(())
    }

    #[test]
    fn byte_boundary_is_multiple_of_8() -> Result<()> {
        let mut br = BitReader::new(&[0b0000_0001, 0xff]);
        assert_eq!(br.read(1)?, 1);
        br.jump_to_byte_boundary()?;
        assert_eq!(br.total_bits_read() % 8, 0);
        Ok(())
    }

    #[test]
    fn split_at_limits_section() -> Result<()> {
        let mut br = BitReader::new(&[1, 2, 3, 4]);
        let mut section = br.split_at(2)?;
        assert_eq!(section.read(16)?, 0x0201);
        assert_eq!(section.read(8)?, 0);
        assert!(section.close().is_err());
        assert_eq!(br.read(8)?, 3);
        Ok(())
    }

    #[test]
    fn acknowledged_overread_passes_audit() -> Result<()> {
        let mut br = BitReader::new(&[0xff]);
        assert_eq!(br.read(16)?, 0xff);
        br.acknowledge_overread();
        br.close()
    }

    #[test]
    fn skip_bits_past_end() {
        let mut br = BitReader::new(&[0; 4]);
        br.skip_bits(1000);
        assert_eq!(br.total_bits_read(), 1000);
        assert!(!br.all_reads_within_bounds());
    }
}

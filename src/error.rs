// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::entropy_coding::huffman::HUFFMAN_MAX_BITS;

/// Coarse failure classes exposed to the embedding API.
///
/// Every `Error` variant maps onto one of these; the fine-grained variant is
/// what gets logged, the kind is what a C-style caller would branch on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    NotEnoughBytes,
    Unsupported,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Read out of bounds")]
    OutOfBounds,
    #[error("Bit reader consumed {0} bytes past the end of the stream")]
    BitstreamOverread(usize),
    #[error("Requested {0} bits in a single call, max is 56")]
    TooManyBitsPerCall(usize),
    #[error("Non-zero padding bits")]
    NonZeroPadding,
    #[error("Float is NaN or Inf")]
    FloatNaNOrInf,
    #[error("Reserved codepoint: {0}")]
    Unsupported(&'static str),
    #[error("Invalid enum value {0} for {1}")]
    InvalidEnum(u32, &'static str),
    #[error("Overflow when computing a bitstream size")]
    SizeOverflow,
    #[error("Invalid HybridUintConfig: {0} {1} {2:?}")]
    InvalidUintConfig(u32, u32, Option<u32>),
    #[error("LZ77 enabled when explicitly disallowed")]
    LZ77Disallowed,
    #[error("LZ77 repeat with no decoded symbols")]
    UnexpectedLz77Repeat,
    #[error("Huffman alphabet too large: {0}, max is {max}", max = 1 << HUFFMAN_MAX_BITS)]
    AlphabetTooLargeHuff(usize),
    #[error("Invalid Huffman code")]
    InvalidHuffman,
    #[error("Invalid ANS histogram")]
    InvalidAnsHistogram,
    #[error("Invalid ANS stream: final state {0:#x}")]
    InvalidAnsState(u32),
    #[error("Integer too large: nbits {0} > 29")]
    IntegerTooLarge(u32),
    #[error("Invalid context map: context id {0} > 255")]
    InvalidContextMap(u32),
    #[error("Invalid context map: {0} histograms, {1} distinct histograms")]
    InvalidContextMapHole(u32, u32),
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Image size too large: {0}x{1}")]
    ImageSizeTooLarge(usize, usize),
    #[error("Rect out of bounds: {0}x{1}+{2}+{3} rect in {4}x{5} image")]
    RectOutOfBounds(usize, usize, usize, usize, usize, usize),
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
    #[error("Invalid predictor: {0}")]
    InvalidPredictor(u32),
    #[error("Invalid property: {0}")]
    InvalidProperty(u32),
    #[error("Tree too large: {0}, limit is {1}")]
    TreeTooLarge(usize, usize),
    #[error("Tree multiplier too large: log is {0}, limit is {1}")]
    TreeMultiplierTooLarge(u32, u32),
    #[error("Tree multiplier bits {0} with log {1} overflow u32")]
    TreeMultiplierBitsTooLarge(u32, u32),
    #[error("Invalid transform: {0}")]
    InvalidTransform(&'static str),
    #[error("Stream requests the global MA tree, but none was decoded")]
    NoGlobalTree,
    #[error("Invalid channel range: [{0}, {1}) with {2} channels")]
    InvalidChannelRange(usize, usize, usize),
    #[error("Transform mixes channels of different size or kind")]
    MixingDifferentChannels,
    #[error("Squeezing meta channels requires in-place squeeze")]
    MetaSqueezeRequiresInPlace,
    #[error("Too many squeezes")]
    TooManySqueezes,
    #[error("Invalid intensity_target: {0}")]
    InvalidIntensityTarget(f32),
    #[error("Invalid bits_per_sample: {0}")]
    InvalidBitsPerSample(u32),
    #[error("Invalid JPEG reconstruction data: {0}")]
    InvalidJpegData(&'static str),
    #[error("Brotli stream ended before {0} expected bytes")]
    BrotliStreamTooShort(usize),
    #[error("Render pipeline channel {0} used by no stage")]
    PipelineChannelUnused(usize),
    #[error("Render pipeline stage {0} received {1} channels, expected {2}")]
    PipelineChannelCount(String, usize, usize),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OutOfBounds | Error::BitstreamOverread(_) => ErrorKind::NotEnoughBytes,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            _ => ErrorKind::Generic,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

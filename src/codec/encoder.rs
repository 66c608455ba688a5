//! Frame encoder

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{ENCODED_HEADER_SIZE, FRAME_MAGIC, MAX_PIXELS};
use crate::error::CodecError;
use crate::media::frame::{Frame, BYTES_PER_PIXEL};

/// Longest run a single record can describe
const MAX_RUN: u8 = u8::MAX;

/// Channel quantization step for a quality level.
///
/// Quality 100 is lossless (step 1); quality 1 keeps 4 levels per channel.
pub fn quantization_step(quality: u8) -> u8 {
    let q = quality.clamp(1, 100) as u32;
    (1 + (100 - q) * 63 / 99) as u8
}

fn quantize(value: u8, step: u8) -> u8 {
    if step <= 1 {
        return value;
    }
    let step = step as u16;
    let centred = (value as u16 / step) * step + step / 2;
    centred.min(u8::MAX as u16) as u8
}

/// Encode a frame as `[header][count r g b]*`
pub fn encode(frame: &Frame, quality: u8) -> Result<Bytes, CodecError> {
    if !(1..=100).contains(&quality) {
        return Err(CodecError::InvalidQuality(quality));
    }
    let pixels = frame.width() as usize * frame.height() as usize;
    if pixels > MAX_PIXELS {
        return Err(CodecError::EncodingFailed(format!(
            "{}x{} exceeds the decoder limit",
            frame.width(),
            frame.height()
        )));
    }
    let step = quantization_step(quality);

    let mut out = BytesMut::with_capacity(ENCODED_HEADER_SIZE + frame.data().len() / 8);
    out.put_slice(FRAME_MAGIC);
    out.put_u32(frame.width());
    out.put_u32(frame.height());
    out.put_u8(quality);

    let mut run: Option<([u8; 3], u8)> = None;
    for px in frame.data().chunks_exact(BYTES_PER_PIXEL) {
        let pixel = [quantize(px[0], step), quantize(px[1], step), quantize(px[2], step)];
        run = match run {
            Some((current, count)) if current == pixel && count < MAX_RUN => Some((current, count + 1)),
            Some((current, count)) => {
                put_run(&mut out, current, count);
                Some((pixel, 1))
            }
            None => Some((pixel, 1)),
        };
    }
    if let Some((current, count)) = run {
        put_run(&mut out, current, count);
    }

    Ok(out.freeze())
}

fn put_run(out: &mut BytesMut, pixel: [u8; 3], count: u8) {
    out.put_u8(count);
    out.put_slice(&pixel);
}

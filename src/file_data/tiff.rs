//! Minimal single-image grayscale TIFF support.
//!
//! Writes uncompressed little-endian 32-bit float images in one strip,
//! which every scientific image viewer opens. Reads uncompressed
//! little-endian grayscale images of unsigned 8/16/32-bit or float
//! 32/64-bit samples, in any number of strips.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};
use ndarray::prelude::*;

use crate::utils::QuantError;

/// `II*\0` followed by the offset of the first IFD.
#[binrw]
#[brw(little, magic = b"II*\0")]
#[derive(Debug, PartialEq)]
struct TiffHeader {
    first_ifd : u32,
}

/// One 12-byte IFD entry. Values of up to four bytes are stored in
/// `value` itself, left-justified.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq)]
struct IfdEntry {
    tag : u16,
    field_type : u16,
    count : u32,
    value : u32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, PartialEq)]
struct Ifd {
    #[br(temp)]
    #[bw(calc = entries.len() as u16)]
    num_tags : u16,

    #[br(count = num_tags)]
    entries : Vec<IfdEntry>,

    next_ifd : u32,
}

/// Tag IDs used here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum TiffTagID {
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    StripOffsets = 273,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    SampleFormat = 339,
}

const SHORT : u16 = 3;
const LONG : u16 = 4;

const SAMPLE_FORMAT_UINT : u32 = 1;
const SAMPLE_FORMAT_FLOAT : u32 = 3;

/// Header, IFD with ten entries and the next-IFD pointer.
const FLOAT_DATA_OFFSET : u32 = 8 + 2 + 10 * 12 + 4;

impl IfdEntry {
    fn new(tag : TiffTagID, field_type : u16, value : u32) -> Self {
        IfdEntry { tag : tag as u16, field_type, count : 1, value }
    }

    /// The inline value of a single SHORT or LONG entry.
    fn scalar(&self) -> u32 {
        match self.field_type {
            SHORT => self.value & 0xFFFF,
            _ => self.value,
        }
    }
}

impl Ifd {
    fn get_tag(&self, tag_id : TiffTagID) -> Option<&IfdEntry> {
        self.entries.iter().find(|entry| entry.tag == tag_id as u16)
    }

    fn required(&self, tag_id : TiffTagID) -> Result<u32, QuantError> {
        self.get_tag(tag_id)
            .map(IfdEntry::scalar)
            .ok_or_else(|| QuantError::FormatError(format!("TIFF is missing tag {:?}", tag_id)))
    }

    fn optional(&self, tag_id : TiffTagID, default : u32) -> u32 {
        self.get_tag(tag_id).map(IfdEntry::scalar).unwrap_or(default)
    }
}

/// Writes `array` as a 32-bit float grayscale TIFF. Values are narrowed
/// to `f32`.
///
/// ## Arguments
///
/// * `path` - Destination file, overwritten if present
///
/// * `array` - Image indexed `[row, column]`
///
/// ## Example
///
/// ```rust, ignore
/// write_float_tiff("straight.tif", &quant.record().straight.view())?;
/// ```
pub fn write_float_tiff<P : AsRef<Path>>(path : P, array : &ArrayView2<f64>) -> Result<(), QuantError> {
    let (nrows, ncols) = array.dim();
    let byte_count = nrows * ncols * std::mem::size_of::<f32>();
    let byte_count = u32::try_from(byte_count)
        .map_err(|_| QuantError::FormatError("Image too large for a TIFF".to_string()))?;

    let ifd = Ifd {
        entries : vec![
            IfdEntry::new(TiffTagID::ImageWidth, LONG, ncols as u32),
            IfdEntry::new(TiffTagID::ImageLength, LONG, nrows as u32),
            IfdEntry::new(TiffTagID::BitsPerSample, SHORT, 32),
            IfdEntry::new(TiffTagID::Compression, SHORT, 1),
            IfdEntry::new(TiffTagID::PhotometricInterpretation, SHORT, 1),
            IfdEntry::new(TiffTagID::StripOffsets, LONG, FLOAT_DATA_OFFSET),
            IfdEntry::new(TiffTagID::SamplesPerPixel, SHORT, 1),
            IfdEntry::new(TiffTagID::RowsPerStrip, LONG, nrows as u32),
            IfdEntry::new(TiffTagID::StripByteCounts, LONG, byte_count),
            IfdEntry::new(TiffTagID::SampleFormat, SHORT, SAMPLE_FORMAT_FLOAT),
        ],
        next_ifd : 0,
    };

    // Stored little-endian whatever the host
    let pixels : Vec<u32> = array.iter().map(|&v| (v as f32).to_bits().to_le()).collect();

    let mut writer = BufWriter::new(File::create(path)?);
    TiffHeader { first_ifd : 8 }.write(&mut writer)?;
    ifd.write(&mut writer)?;
    writer.write_all(bytemuck::cast_slice::<u32, u8>(&pixels))?;
    writer.flush()?;
    Ok(())
}

/// Offsets or byte counts of the strips: inline for a single strip,
/// otherwise an array of SHORTs or LONGs at `value`.
fn strip_table(entry : &IfdEntry, bytes : &[u8]) -> Result<Vec<usize>, QuantError> {
    if entry.count == 1 {
        return Ok(vec![entry.scalar() as usize]);
    }
    let width = if entry.field_type == SHORT { 2 } else { 4 };
    let start = entry.value as usize;
    let end = start + entry.count as usize * width;
    let table = bytes.get(start..end)
        .ok_or_else(|| QuantError::FormatError("TIFF strip table out of bounds".to_string()))?;
    Ok(table.chunks_exact(width).map(|chunk| match width {
        2 => u16::from_le_bytes([chunk[0], chunk[1]]) as usize,
        _ => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize,
    }).collect())
}

/// Reads the first image of a TIFF into an `f64` array.
pub fn read_tiff<P : AsRef<Path>>(path : P) -> Result<Array2<f64>, QuantError> {
    let bytes = std::fs::read(path)?;
    let mut reader = Cursor::new(&bytes);

    let header = TiffHeader::read(&mut reader).map_err(|_| QuantError::FormatError(
        "Not a little-endian TIFF".to_string()
    ))?;
    reader.seek(SeekFrom::Start(header.first_ifd as u64))?;
    let ifd = Ifd::read(&mut reader)?;

    let width = ifd.required(TiffTagID::ImageWidth)? as usize;
    let height = ifd.required(TiffTagID::ImageLength)? as usize;
    let bits = ifd.optional(TiffTagID::BitsPerSample, 1);
    let format = ifd.optional(TiffTagID::SampleFormat, SAMPLE_FORMAT_UINT);

    if ifd.optional(TiffTagID::Compression, 1) != 1 {
        return Err(QuantError::FormatError("Compressed TIFFs are not supported".to_string()));
    }
    if ifd.optional(TiffTagID::SamplesPerPixel, 1) != 1 {
        return Err(QuantError::FormatError("Only single-channel TIFFs are supported".to_string()));
    }

    let offsets_entry = ifd.get_tag(TiffTagID::StripOffsets)
        .ok_or_else(|| QuantError::FormatError("TIFF has no strip offsets".to_string()))?;
    let counts_entry = ifd.get_tag(TiffTagID::StripByteCounts)
        .ok_or_else(|| QuantError::FormatError("TIFF has no strip byte counts".to_string()))?;
    let offsets = strip_table(offsets_entry, &bytes)?;
    let counts = strip_table(counts_entry, &bytes)?;

    let mut data = Vec::with_capacity(counts.iter().sum());
    for (&offset, &count) in offsets.iter().zip(counts.iter()) {
        let strip = bytes.get(offset..offset + count)
            .ok_or_else(|| QuantError::FormatError("TIFF strip out of bounds".to_string()))?;
        data.extend_from_slice(strip);
    }

    let pixels : Vec<f64> = match (bits, format) {
        (8, SAMPLE_FORMAT_UINT) => data.iter().map(|&v| v as f64).collect(),
        (16, SAMPLE_FORMAT_UINT) => data.chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]) as f64)
            .collect(),
        (32, SAMPLE_FORMAT_UINT) => data.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        (32, SAMPLE_FORMAT_FLOAT) => data.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        (64, SAMPLE_FORMAT_FLOAT) => data.chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
        _ => {
            return Err(QuantError::FormatError(
                format!("Unsupported TIFF sample type: {} bits, format {}", bits, format)
            ));
        }
    };

    if pixels.len() < width * height {
        return Err(QuantError::FormatError(format!(
            "TIFF holds {} samples, expected {}", pixels.len(), width * height
        )));
    }
    Array2::from_shape_vec((height, width), pixels[..width * height].to_vec())
        .map_err(|err| QuantError::FormatError(err.to_string()))
}

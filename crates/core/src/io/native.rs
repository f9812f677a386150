//! Native GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Only the north-up subset of GeoTIFF georeferencing is understood:
//! ModelPixelScaleTag + ModelTiepointTag. That is all the upsampler needs to
//! carry a window transform through to its output.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, RGB8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Write the raster's no-data value as a GDAL_NODATA tag
    pub write_nodata: bool,
}

/// Read band 1 of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // Multi-band files decode interleaved; keep band 1
    let samples = rows * cols;
    let data = if data.len() > samples && samples > 0 && data.len() % samples == 0 {
        let bands = data.len() / samples;
        data.into_iter().step_by(bands).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// Write a Raster to a single-band 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file, options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn write_geo_tags<W, K>(dir: &mut DirectoryEncoder<'_, W, K>, gt: &GeoTransform) -> Result<()>
where
    W: Write + Seek,
    K: TiffKind,
{
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // Version 1.1.0 with two keys: GTModelType = geographic, GTRasterType = PixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 2, 1025, 0, 1, 1];
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    Ok(())
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    write_geo_tags(image.encoder(), raster.transform())?;

    if options.write_nodata {
        if let Some(nd) = raster.nodata().and_then(|v| v.to_f64()) {
            let text = if nd.is_nan() { "nan".to_string() } else { nd.to_string() };
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())
                .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
        }
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Write interleaved RGB pixels (`rows * cols * 3` bytes) as an 8-bit RGB TIFF
/// georeferenced with `transform`.
pub fn write_rgb_tiff<P: AsRef<Path>>(
    pixels: &[u8],
    rows: usize,
    cols: usize,
    transform: &GeoTransform,
    path: P,
) -> Result<()> {
    if pixels.len() != rows * cols * 3 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let file = File::create(path.as_ref())?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;
    let mut image = encoder
        .new_image::<RGB8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    write_geo_tags(image.encoder(), transform)?;

    image
        .write_data(pixels)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_dem() -> Raster<f64> {
        let mut dem = Raster::new(6, 9);
        dem.set_transform(GeoTransform::new(-3.95, 56.13, 0.0002, -0.0002));
        for row in 0..6 {
            for col in 0..9 {
                dem.set(row, col, (row * 10 + col) as f64 * 0.5).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_buffer_roundtrip_values_and_transform() {
        let dem = sample_dem();
        let buf = write_geotiff_to_buffer(&dem, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), dem.shape());
        assert_relative_eq!(back.get(5, 8).unwrap(), 29.0, epsilon = 1e-6);
        assert_relative_eq!(back.transform().origin_x, -3.95, epsilon = 1e-12);
        assert_relative_eq!(back.transform().pixel_height, -0.0002, epsilon = 1e-12);
    }

    #[test]
    fn test_file_roundtrip() {
        let dem = sample_dem();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_geotiff(&dem, tmp.path(), Some(GeoTiffOptions { write_nodata: true })).unwrap();

        let back: Raster<f64> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(back.shape(), (6, 9));
        assert_relative_eq!(back.get(2, 3).unwrap(), 11.5, epsilon = 1e-6);
    }

    #[test]
    fn test_rgb_rejects_wrong_length() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let result = write_rgb_tiff(&[0u8; 10], 2, 2, &GeoTransform::default(), tmp.path());
        assert!(result.is_err());
    }
}

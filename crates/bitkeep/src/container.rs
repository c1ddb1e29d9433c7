//! Gridded Array Container (GAC) format.
//!
//! A self-describing file holding a whole [`Dataset`]: a fixed preamble, a
//! checksummed JSON header describing every variable, then the filtered
//! variable payloads back to back.
//!
//! ## Format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "GACN"
//! 4       4     version (u32 LE)
//! 8       8     header length L (u64 LE)
//! 16      8     XXH3-64 of the header bytes (u64 LE)
//! 24      L     JSON header { attributes, dimensions, variables[] }
//! 24+L    ...   payloads in header order
//! ```
//!
//! Output is deterministic: no timestamps are recorded and every map keeps
//! insertion order, so writing the same dataset twice gives identical bytes.

use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::dataset::{ArrayData, Attributes, DType, Dataset, Variable};
use crate::encoding::EncodingSpec;
use crate::writer::{write_dataset, WriteReport};
use crate::{Error, Result};

/// GAC magic bytes.
pub const GAC_MAGIC: [u8; 4] = *b"GACN";

/// Current format version.
pub const GAC_VERSION: u32 = 1;

/// Size of the fixed preamble before the JSON header.
pub const PREAMBLE_SIZE: usize = 24;

/// Conventional file extension.
pub const DEFAULT_EXTENSION: &str = "gac";

/// Header entry for one stored variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableEntry {
    name: String,
    dtype: DType,
    dims: Vec<String>,
    #[serde(default)]
    attributes: Attributes,
    encoding: EncodingSpec,
    /// Offset from the start of the payload section.
    offset: u64,
    stored_size: u64,
    raw_size: u64,
    /// XXH3-64 of the stored bytes.
    checksum: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerHeader {
    #[serde(default)]
    attributes: Attributes,
    dimensions: IndexMap<String, usize>,
    variables: Vec<VariableEntry>,
}

/// Encoding used for `name`, falling back to the lossless default.
fn encoding_for(encodings: &IndexMap<String, EncodingSpec>, name: &str) -> EncodingSpec {
    encodings.get(name).copied().unwrap_or_default()
}

fn encode_variable(variable: &Variable, spec: &EncodingSpec) -> Result<Vec<u8>> {
    let raw = variable.data().to_le_bytes();
    spec.filter_chain(variable.dtype()).encode(&raw)
}

/// Encode every payload, preserving dataset order.
fn encode_payloads(
    dataset: &Dataset,
    encodings: &IndexMap<String, EncodingSpec>,
) -> Result<Vec<Vec<u8>>> {
    let variables: Vec<&Variable> = dataset.variables().collect();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        variables
            .par_iter()
            .map(|v| encode_variable(v, &encoding_for(encodings, v.name())))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        variables
            .iter()
            .map(|v| encode_variable(v, &encoding_for(encodings, v.name())))
            .collect()
    }
}

/// Serialize `dataset` as a GAC stream into `writer`.
///
/// Variables without an entry in `encodings` use [`EncodingSpec::default`].
/// Returns the number of bytes written.
pub fn write_container<W: Write + ?Sized>(
    writer: &mut W,
    dataset: &Dataset,
    encodings: &IndexMap<String, EncodingSpec>,
) -> Result<u64> {
    let payloads = encode_payloads(dataset, encodings)?;

    let mut entries = Vec::with_capacity(payloads.len());
    let mut offset = 0u64;
    for (variable, stored) in dataset.variables().zip(&payloads) {
        entries.push(VariableEntry {
            name: variable.name().to_string(),
            dtype: variable.dtype(),
            dims: variable.dims().to_vec(),
            attributes: variable.attributes().clone(),
            encoding: encoding_for(encodings, variable.name()),
            offset,
            stored_size: stored.len() as u64,
            raw_size: variable.data().byte_len() as u64,
            checksum: xxh3_64(stored),
        });
        offset += stored.len() as u64;
    }

    let header = ContainerHeader {
        attributes: dataset.attributes().clone(),
        dimensions: dataset.dimensions().clone(),
        variables: entries,
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|e| Error::corrupted(format!("failed to serialize header: {}", e)))?;

    let mut preamble = [0u8; PREAMBLE_SIZE];
    preamble[0..4].copy_from_slice(&GAC_MAGIC);
    preamble[4..8].copy_from_slice(&GAC_VERSION.to_le_bytes());
    preamble[8..16].copy_from_slice(&(header_bytes.len() as u64).to_le_bytes());
    preamble[16..24].copy_from_slice(&xxh3_64(&header_bytes).to_le_bytes());

    writer.write_all(&preamble)?;
    writer.write_all(&header_bytes)?;
    for stored in &payloads {
        writer.write_all(stored)?;
    }

    debug!(
        "encoded {} variables, {} payload bytes",
        payloads.len(),
        offset
    );

    Ok(PREAMBLE_SIZE as u64 + header_bytes.len() as u64 + offset)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Verify the preamble and header checksum and parse the header. Returns
/// the header and the offset where payloads start.
fn parse_header(bytes: &[u8]) -> Result<(ContainerHeader, usize)> {
    if bytes.len() < PREAMBLE_SIZE {
        return Err(Error::corrupted(format!(
            "file is {} bytes, shorter than the {} byte preamble",
            bytes.len(),
            PREAMBLE_SIZE
        )));
    }
    if bytes[0..4] != GAC_MAGIC {
        return Err(Error::corrupted("invalid GAC magic"));
    }

    let version = read_u32(bytes, 4);
    if version != GAC_VERSION {
        return Err(Error::corrupted(format!(
            "unsupported GAC version: {} (expected {})",
            version, GAC_VERSION
        )));
    }

    let header_len = read_u64(bytes, 8);
    let header_end = (PREAMBLE_SIZE as u64)
        .checked_add(header_len)
        .filter(|&end| end <= bytes.len() as u64)
        .ok_or_else(|| Error::corrupted_at("header extends past end of file", 8))?
        as usize;

    let header_bytes = &bytes[PREAMBLE_SIZE..header_end];
    let expected = read_u64(bytes, 16);
    let actual = xxh3_64(header_bytes);
    if expected != actual {
        return Err(Error::corrupted(format!(
            "header checksum mismatch: expected {:016x}, got {:016x}",
            expected, actual
        )));
    }

    let header = serde_json::from_slice(header_bytes)
        .map_err(|e| Error::corrupted(format!("invalid header: {}", e)))?;
    Ok((header, header_end))
}

/// Decode a GAC byte buffer.
///
/// Verifies magic, version, header checksum, every payload checksum and
/// every decoded size.
pub fn read_container(bytes: &[u8]) -> Result<Dataset> {
    let (header, header_end) = parse_header(bytes)?;

    let payload = &bytes[header_end..];
    let mut dataset = Dataset::new();
    dataset.set_attributes(header.attributes);
    for (name, &extent) in &header.dimensions {
        dataset.add_dimension(name.clone(), extent)?;
    }

    for entry in header.variables {
        let start = entry.offset as usize;
        let end = entry
            .offset
            .checked_add(entry.stored_size)
            .filter(|&end| end <= payload.len() as u64)
            .ok_or_else(|| {
                Error::corrupted(format!("payload of '{}' extends past end of file", entry.name))
            })? as usize;
        let stored = &payload[start..end];

        let checksum = xxh3_64(stored);
        if checksum != entry.checksum {
            return Err(Error::corrupted(format!(
                "checksum mismatch for '{}': expected {:016x}, got {:016x}",
                entry.name, entry.checksum, checksum
            )));
        }

        let shape = entry
            .dims
            .iter()
            .map(|d| {
                dataset.dimension(d).ok_or_else(|| {
                    Error::corrupted(format!("variable '{}' uses undeclared dimension '{}'", entry.name, d))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let expected_raw = shape.iter().product::<usize>() as u64 * entry.dtype.size() as u64;
        if expected_raw != entry.raw_size {
            return Err(Error::corrupted(format!(
                "variable '{}' declares {} raw bytes, shape needs {}",
                entry.name, entry.raw_size, expected_raw
            )));
        }

        let raw = entry
            .encoding
            .filter_chain(entry.dtype)
            .decode(stored, entry.raw_size as usize)?;
        let data = ArrayData::from_le_bytes(entry.dtype, &raw)?;

        let mut variable = Variable::new(entry.name, entry.dims, shape, data)?;
        variable.set_attributes(entry.attributes);
        dataset.add_variable(variable)?;
    }

    Ok(dataset)
}

/// Open a GAC file.
///
/// Every failure, including I/O, is reported as a dataset open error
/// naming `path`.
pub fn open_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::dataset_open(path, e.to_string()))?;
    let mut dataset = read_container(&bytes).map_err(|e| Error::dataset_open(path, e.to_string()))?;
    dataset.set_source(path);
    Ok(dataset)
}

/// Write `dataset` losslessly (shuffle + zlib) to `path`, atomically.
pub fn save_dataset(dataset: &Dataset, path: impl AsRef<Path>) -> Result<WriteReport> {
    write_dataset(dataset, &IndexMap::new(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitkeep_core::CompressionLevel;
    use bitkeep_filters::CompressionFilter;

    fn sample() -> Dataset {
        let mut ds = Dataset::new();
        ds.set_attribute("title", "unit test");
        ds.set_attribute("version", 3);

        let t: Vec<f64> = (0..6 * 8).map(|i| 280.0 + (i as f64 * 0.3).sin()).collect();
        ds.add_variable(
            Variable::new("T", vec!["lat", "lon"], vec![6, 8], ArrayData::F64(t))
                .unwrap()
                .with_attribute("units", "K"),
        )
        .unwrap();

        let u: Vec<f32> = (0..6 * 8).map(|i| i as f32 * 0.25 - 3.0).collect();
        ds.add_variable(Variable::new("U", vec!["lat", "lon"], vec![6, 8], ArrayData::F32(u)).unwrap())
            .unwrap();

        ds.add_variable(Variable::new("count", vec!["lat"], vec![6], ArrayData::I32(vec![1, -2, 3, 4, 5, 6])).unwrap())
            .unwrap();
        ds.add_variable(Variable::new("TAITIME", vec!["time"], vec![2], ArrayData::I64(vec![i64::MIN, 42])).unwrap())
            .unwrap();
        ds
    }

    fn encode(ds: &Dataset, encodings: &IndexMap<String, EncodingSpec>) -> Vec<u8> {
        let mut buf = Vec::new();
        let n = write_container(&mut buf, ds, encodings).unwrap();
        assert_eq!(n as usize, buf.len());
        buf
    }

    #[test]
    fn test_roundtrip_all_dtypes() {
        let ds = sample();
        let bytes = encode(&ds, &IndexMap::new());
        assert_eq!(&bytes[0..4], &GAC_MAGIC);

        let back = read_container(&bytes).unwrap();
        assert_eq!(back, ds);
        assert_eq!(back.attributes()["title"], "unit test");
        assert_eq!(back.variable("T").unwrap().attributes()["units"], "K");
        let names: Vec<_> = back.variable_names().collect();
        assert_eq!(names, vec!["T", "U", "count", "TAITIME"]);
    }

    #[test]
    fn test_mixed_encodings_roundtrip() {
        let ds = sample();
        let mut encodings = IndexMap::new();
        encodings.insert("T".to_string(), EncodingSpec::zlib(CompressionLevel::Best).with_quantization(12));
        encodings.insert(
            "U".to_string(),
            EncodingSpec {
                compression: CompressionFilter::None,
                shuffle: false,
                quantization: None,
            },
        );
        encodings.insert("count".to_string(), EncodingSpec::lossless(CompressionFilter::Deflate(CompressionLevel::Fast)));

        let bytes = encode(&ds, &encodings);
        assert_eq!(read_container(&bytes).unwrap(), ds);

        let (header, _) = parse_header(&bytes).unwrap();
        let recorded: IndexMap<_, _> = header.variables.into_iter().map(|e| (e.name, e.encoding)).collect();
        assert_eq!(recorded["T"].quantization.map(|q| q.bits), Some(12));
        assert_eq!(recorded["U"].compression, CompressionFilter::None);
        assert_eq!(recorded["TAITIME"], EncodingSpec::default());
    }

    #[test]
    fn test_output_is_deterministic() {
        let ds = sample();
        assert_eq!(encode(&ds, &IndexMap::new()), encode(&ds, &IndexMap::new()));
    }

    #[test]
    fn test_unused_dimension_survives() {
        let mut ds = sample();
        ds.add_dimension("nf", 6).unwrap();
        let back = read_container(&encode(&ds, &IndexMap::new())).unwrap();
        assert_eq!(back.dimension("nf"), Some(6));
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let mut bytes = encode(&sample(), &IndexMap::new());
        bytes[0] = b'X';
        assert!(read_container(&bytes).is_err());

        let mut bytes = encode(&sample(), &IndexMap::new());
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = read_container(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_detects_header_corruption() {
        let mut bytes = encode(&sample(), &IndexMap::new());
        bytes[PREAMBLE_SIZE + 5] ^= 0x01;
        let err = read_container(&bytes).unwrap_err();
        assert!(err.to_string().contains("header checksum"));
    }

    #[test]
    fn test_detects_payload_corruption() {
        let mut bytes = encode(&sample(), &IndexMap::new());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x40;
        let err = read_container(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch for 'TAITIME'"));
    }

    #[test]
    fn test_detects_truncation() {
        let bytes = encode(&sample(), &IndexMap::new());
        assert!(read_container(&bytes[..bytes.len() - 3]).is_err());
        assert!(read_container(&bytes[..PREAMBLE_SIZE + 2]).is_err());
        assert!(read_container(&bytes[..10]).is_err());
    }

    #[test]
    fn test_open_dataset_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.gac");
        let err = open_dataset(&missing).unwrap_err();
        assert_eq!(err.category(), "dataset_open");
        assert!(err.to_string().contains("missing.gac"));

        let garbage = dir.path().join("garbage.gac");
        std::fs::write(&garbage, b"not a container at all, just text").unwrap();
        assert_eq!(open_dataset(&garbage).unwrap_err().category(), "dataset_open");
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.gac");
        let ds = sample();

        let report = save_dataset(&ds, &path).unwrap();
        assert_eq!(report.variables, 4);
        assert_eq!(report.bytes_written, std::fs::metadata(&path).unwrap().len());

        let back = open_dataset(&path).unwrap();
        assert_eq!(back.source(), Some(path.as_path()));
        assert_eq!(back.variable("T"), ds.variable("T"));
    }
}

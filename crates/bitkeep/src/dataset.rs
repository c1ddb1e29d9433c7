//! In-memory array model: named N-dimensional variables sharing a
//! dimension table.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Free-form attribute table attached to datasets and variables.
pub type Attributes = IndexMap<String, Value>;

/// Element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// IEEE 754 binary32.
    F32,
    /// IEEE 754 binary64.
    F64,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
}

impl DType {
    /// Returns the size in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Returns true for floating-point types.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Explicit mantissa width, `None` for integers.
    pub fn mantissa_bits(self) -> Option<u32> {
        match self {
            DType::F32 => Some(23),
            DType::F64 => Some(52),
            DType::I32 | DType::I64 => None,
        }
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        }
    }
}

/// Typed element storage, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl ArrayData {
    /// Element type of the storage.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
        }
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the raw little-endian representation.
    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype().size()
    }

    /// Serialize to little-endian bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        match self {
            ArrayData::F32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            ArrayData::F64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            ArrayData::I32(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            ArrayData::I64(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
        out
    }

    /// Deserialize little-endian bytes of the given type.
    pub fn from_le_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % dtype.size() != 0 {
            return Err(Error::corrupted(format!(
                "{} payload of {} bytes is not a whole number of elements",
                dtype.name(),
                bytes.len()
            )));
        }

        let data = match dtype {
            DType::F32 => ArrayData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::I32 => ArrayData::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::F64 => ArrayData::F64(bytes.chunks_exact(8).map(|c| f64::from_le_bytes(le8(c))).collect()),
            DType::I64 => ArrayData::I64(bytes.chunks_exact(8).map(|c| i64::from_le_bytes(le8(c))).collect()),
        };
        Ok(data)
    }
}

fn le8(c: &[u8]) -> [u8; 8] {
    [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]
}

/// A named N-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    data: ArrayData,
    attributes: Attributes,
}

impl Variable {
    /// Create a variable, checking that the extents match the data length.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        dims: Vec<S>,
        shape: Vec<usize>,
        data: ArrayData,
    ) -> Result<Self> {
        let name = name.into();
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();

        if dims.len() != shape.len() {
            return Err(Error::invalid_dataset(format!(
                "variable '{}' has {} dimension names but {} extents",
                name,
                dims.len(),
                shape.len()
            )));
        }
        for (i, d) in dims.iter().enumerate() {
            if dims[..i].contains(d) {
                return Err(Error::invalid_dataset(format!(
                    "variable '{}' repeats dimension '{}'",
                    name, d
                )));
            }
        }

        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::invalid_dataset(format!(
                "variable '{}' has shape {:?} ({} elements) but {} values",
                name,
                shape,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            name,
            dims,
            shape,
            data,
            attributes: Attributes::new(),
        })
    }

    /// Attach an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ArrayData {
        &mut self.data
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the element storage, keeping the shape.
    pub(crate) fn with_data(&self, data: ArrayData) -> Self {
        Self {
            name: self.name.clone(),
            dims: self.dims.clone(),
            shape: self.shape.clone(),
            data,
            attributes: self.attributes.clone(),
        }
    }

    pub(crate) fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }
}

/// Ordered collection of variables with a shared dimension table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    dimensions: IndexMap<String, usize>,
    variables: IndexMap<String, Variable>,
    attributes: Attributes,
    source: Option<PathBuf>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    ///
    /// Fails on a duplicate name or when a dimension already known to the
    /// dataset is used with a different extent.
    pub fn add_variable(&mut self, variable: Variable) -> Result<()> {
        if self.variables.contains_key(variable.name()) {
            return Err(Error::invalid_dataset(format!(
                "duplicate variable '{}'",
                variable.name()
            )));
        }

        for (dim, &extent) in variable.dims().iter().zip(variable.shape()) {
            if let Some(&known) = self.dimensions.get(dim) {
                if known != extent {
                    return Err(Error::invalid_dataset(format!(
                        "dimension '{}' has extent {} but variable '{}' uses {}",
                        dim,
                        known,
                        variable.name(),
                        extent
                    )));
                }
            }
        }
        for (dim, &extent) in variable.dims().iter().zip(variable.shape()) {
            self.dimensions.entry(dim.clone()).or_insert(extent);
        }

        self.variables.insert(variable.name().to_string(), variable);
        Ok(())
    }

    /// Builder form of [`Dataset::add_variable`].
    pub fn with_variable(mut self, variable: Variable) -> Result<Self> {
        self.add_variable(variable)?;
        Ok(self)
    }

    /// Declare a dimension without a variable using it.
    pub fn add_dimension(&mut self, name: impl Into<String>, extent: usize) -> Result<()> {
        let name = name.into();
        match self.dimensions.get(&name) {
            Some(&known) if known != extent => Err(Error::invalid_dataset(format!(
                "dimension '{}' has extent {}, cannot redeclare as {}",
                name, known, extent
            ))),
            _ => {
                self.dimensions.insert(name, extent);
                Ok(())
            }
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub(crate) fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }

    pub fn dimensions(&self) -> &IndexMap<String, usize> {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    /// Variables in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn variables_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.variables.values_mut()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Total raw size of all variables in bytes.
    pub fn raw_size(&self) -> u64 {
        self.variables.values().map(|v| v.data().byte_len() as u64).sum()
    }

    /// File the dataset was opened from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn set_source(&mut self, path: impl Into<PathBuf>) {
        self.source = Some(path.into());
    }
}

//! Polymorphic batch values and the operations shared by every shape.
//!
//! A batch bundles N samples in one physical layout. The layout is fixed when
//! the value is constructed, so [`Batch::len`], [`Batch::slice`], and
//! [`merge`] dispatch on the variant directly; no shape is ever inferred from
//! the content of a value. Slicing uses half-open `[start, end)` ranges with
//! bounds clamped to the sample count, and an omitted bound means "from the
//! beginning" or "to the end".

use std::collections::BTreeMap;

use candle_core::Tensor;

use crate::errors::{CollateError, Result};


/// A batch of N samples, classified once at construction.
///
/// Sample count is read differently per layout: a tensor and a scalar vector
/// carry it on their leading axis, a structured sequence reads it from its
/// first component, and a mapping reads it from its first field. Fields of a
/// mapping and components of a sequence are expected to cover the same
/// samples; the operations here preserve that alignment but only verify it
/// where `merge` documents so.
#[derive(Debug, Clone)]
pub enum Batch {
    /// Dense tensor whose leading axis indexes samples.
    Block(Tensor),
    /// Text scalars; each string is one atomic sample.
    Text(Vec<String>),
    /// Plain per-sample scalars such as labels, ids, or lengths.
    Values(Vec<i64>),
    /// Ordered components, each itself batched along its own leading axis.
    Fields(Vec<Batch>),
    /// Field name to per-field batch, all fields covering the same samples.
    /// The map's sorted key order is the canonical field order.
    Mapping(BTreeMap<String, Batch>),
}

impl Batch {
    /// Number of samples in the batch.
    ///
    /// Probing an empty sequence or mapping has no first element to read the
    /// count from and fails with [`CollateError::Empty`]. Empty tensors and
    /// empty scalar/text vectors report zero.
    pub fn len(&self) -> Result<usize> {
        match self {
            Batch::Block(block) => Ok(block.dim(0)?),
            Batch::Text(items) => Ok(items.len()),
            Batch::Values(items) => Ok(items.len()),
            Batch::Fields(components) => match components.first() {
                Some(first) => first.len(),
                None => Err(CollateError::Empty("sequence batch has no components")),
            },
            Batch::Mapping(fields) => match fields.values().next() {
                Some(first) => first.len(),
                None => Err(CollateError::Empty("mapping batch has no fields")),
            },
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sub-range `[start, end)` of the batch, in the same shape.
    ///
    /// Structured sequences keep their component count and mappings keep
    /// their fields; only the sample axis shrinks. Out-of-range bounds clamp
    /// to the sample count, so `slice(None, None)` reproduces the batch.
    pub fn slice(&self, start: Option<usize>, end: Option<usize>) -> Result<Self> {
        match self {
            Batch::Block(block) => {
                let (start, end) = clamp(start, end, block.dim(0)?);
                Ok(Batch::Block(block.narrow(0, start, end - start)?))
            }
            Batch::Text(items) => {
                let (start, end) = clamp(start, end, items.len());
                Ok(Batch::Text(items[start..end].to_vec()))
            }
            Batch::Values(items) => {
                let (start, end) = clamp(start, end, items.len());
                Ok(Batch::Values(items[start..end].to_vec()))
            }
            Batch::Fields(components) => {
                let sliced = components
                    .iter()
                    .map(|component| component.slice(start, end))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Batch::Fields(sliced))
            }
            Batch::Mapping(fields) => {
                let sliced = fields
                    .iter()
                    .map(|(name, field)| Ok((name.clone(), field.slice(start, end)?)))
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Ok(Batch::Mapping(sliced))
            }
        }
    }

    /// Shape label used by error messages.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Batch::Block(_) => "tensor",
            Batch::Text(_) => "text",
            Batch::Values(_) => "values",
            Batch::Fields(_) => "sequence",
            Batch::Mapping(_) => "mapping",
        }
    }
}

impl From<Tensor> for Batch {
    fn from(block: Tensor) -> Self {
        Batch::Block(block)
    }
}

impl From<Vec<String>> for Batch {
    fn from(items: Vec<String>) -> Self {
        Batch::Text(items)
    }
}

impl From<Vec<i64>> for Batch {
    fn from(items: Vec<i64>) -> Self {
        Batch::Values(items)
    }
}

impl From<Vec<Batch>> for Batch {
    fn from(components: Vec<Batch>) -> Self {
        Batch::Fields(components)
    }
}

impl From<BTreeMap<String, Batch>> for Batch {
    fn from(fields: BTreeMap<String, Batch>) -> Self {
        Batch::Mapping(fields)
    }
}

fn clamp(start: Option<usize>, end: Option<usize>, len: usize) -> (usize, usize) {
    let start = start.unwrap_or(0).min(len);
    let end = end.unwrap_or(len).min(len).max(start);
    (start, end)
}

/// Merge same-shape batches into one batch of total length sum of Ni.
///
/// Mapping fields are combined by merging recursively; use [`merge_with`] to
/// substitute a different per-field combine.
pub fn merge(batches: &[Batch]) -> Result<Batch> {
    merge_with(batches, &merge)
}

/// Merge same-shape batches, combining mapping fields with `combine`.
///
/// The first batch fixes the expected shape and, for mappings, the canonical
/// field set; every other batch must match both. Tensor batches concatenate
/// along axis 0, text and scalar batches concatenate their vectors, and
/// structured sequences concatenate their outer component lists. For every
/// field of a mapping, the per-batch values for that field are gathered in
/// order and handed to `combine`.
pub fn merge_with(batches: &[Batch], combine: &dyn Fn(&[Batch]) -> Result<Batch>) -> Result<Batch> {
    let first = batches
        .first()
        .ok_or(CollateError::Empty("no batches to merge"))?;

    match first {
        Batch::Block(_) => {
            let mut blocks = Vec::with_capacity(batches.len());
            for batch in batches {
                match batch {
                    Batch::Block(block) => blocks.push(block),
                    other => return Err(mixed(first, other)),
                }
            }
            Ok(Batch::Block(Tensor::cat(&blocks, 0)?))
        }
        Batch::Text(_) => {
            let mut merged = Vec::new();
            for batch in batches {
                match batch {
                    Batch::Text(items) => merged.extend(items.iter().cloned()),
                    other => return Err(mixed(first, other)),
                }
            }
            Ok(Batch::Text(merged))
        }
        Batch::Values(_) => {
            let mut merged = Vec::new();
            for batch in batches {
                match batch {
                    Batch::Values(items) => merged.extend(items.iter().copied()),
                    other => return Err(mixed(first, other)),
                }
            }
            Ok(Batch::Values(merged))
        }
        Batch::Fields(_) => {
            let mut merged = Vec::new();
            for batch in batches {
                match batch {
                    Batch::Fields(components) => merged.extend(components.iter().cloned()),
                    other => return Err(mixed(first, other)),
                }
            }
            Ok(Batch::Fields(merged))
        }
        Batch::Mapping(canonical) => {
            let mut maps = Vec::with_capacity(batches.len());
            for batch in batches {
                match batch {
                    Batch::Mapping(fields) => maps.push(fields),
                    other => return Err(mixed(first, other)),
                }
            }
            for (index, fields) in maps.iter().enumerate().skip(1) {
                if !fields.keys().eq(canonical.keys()) {
                    return Err(CollateError::FieldMismatch(format!(
                        "batch {} does not share the field set of batch 0",
                        index
                    )));
                }
            }

            let mut merged = BTreeMap::new();
            for name in canonical.keys() {
                let mut gathered = Vec::with_capacity(maps.len());
                for fields in &maps {
                    match fields.get(name) {
                        Some(field) => gathered.push(field.clone()),
                        None => {
                            return Err(CollateError::FieldMismatch(format!(
                                "field '{}' missing from a merged batch",
                                name
                            )))
                        }
                    }
                }
                merged.insert(name.clone(), combine(&gathered)?);
            }
            log::debug!(
                "merged {} mapping batches across {} fields",
                maps.len(),
                merged.len()
            );
            Ok(Batch::Mapping(merged))
        }
    }
}

fn mixed(expected: &Batch, found: &Batch) -> CollateError {
    CollateError::MixedShapes {
        expected: expected.shape_name(),
        found: found.shape_name(),
    }
}

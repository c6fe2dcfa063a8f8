//! Decoding accessors into typed 2-D arrays.

use std::path::Path;

use gltf::json;

use crate::buffer::BufferResolver;
use crate::mapping::{ComponentCount, ComponentType};
use crate::{Container, Error, Result};

/// A scalar type an accessor can store.
pub trait Component: bytemuck::Pod + PartialOrd + std::fmt::Debug {
    const TYPE: ComponentType;

    fn to_f64(self) -> f64;

    fn to_f32(self) -> f32 {
        self.to_f64() as f32
    }
}

macro_rules! impl_component {
    ($($ty:ty => $ct:ident),* $(,)?) => {
        $(
            impl Component for $ty {
                const TYPE: ComponentType = ComponentType::$ct;

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_component!(i8 => I8, u8 => U8, i16 => I16, u16 => U16, u32 => U32, f32 => F32);

/// Row-major array of `rows x columns` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Array2<T> {
    data: Vec<T>,
    columns: usize,
}

impl<T: Copy> Array2<T> {
    /// Returns `None` unless `data` holds whole rows of `columns` values.
    pub fn from_vec(data: Vec<T>, columns: usize) -> Option<Self> {
        (columns > 0 && data.len() % columns == 0).then_some(Self { data, columns })
    }

    pub fn from_rows<const N: usize>(rows: &[[T; N]]) -> Self {
        Self {
            data: rows.iter().flatten().copied().collect(),
            columns: N,
        }
    }

    pub fn filled(value: T, rows: usize, columns: usize) -> Self {
        Self {
            data: vec![value; rows * columns],
            columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.len() / self.columns
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.columns..(i + 1) * self.columns]
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.columns)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn map<U>(&self, f: impl FnMut(T) -> U) -> Array2<U> {
        Array2 {
            data: self.data.iter().copied().map(f).collect(),
            columns: self.columns,
        }
    }

    /// Keeps the rows whose mask entry is set, in order.
    pub fn select(&self, mask: &[bool]) -> Self {
        let data = self
            .iter_rows()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .flat_map(|(row, _)| row.iter().copied())
            .collect();
        Self {
            data,
            columns: self.columns,
        }
    }
}

/// A decoded accessor in its native component type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Array2<i8>),
    U8(Array2<u8>),
    I16(Array2<i16>),
    U16(Array2<u16>),
    U32(Array2<u32>),
    F32(Array2<f32>),
}

macro_rules! each {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            TypedArray::I8($a) => $body,
            TypedArray::U8($a) => $body,
            TypedArray::I16($a) => $body,
            TypedArray::U16($a) => $body,
            TypedArray::U32($a) => $body,
            TypedArray::F32($a) => $body,
        }
    };
}

macro_rules! each_map {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            TypedArray::I8($a) => TypedArray::I8($body),
            TypedArray::U8($a) => TypedArray::U8($body),
            TypedArray::I16($a) => TypedArray::I16($body),
            TypedArray::U16($a) => TypedArray::U16($body),
            TypedArray::U32($a) => TypedArray::U32($body),
            TypedArray::F32($a) => TypedArray::F32($body),
        }
    };
}

impl TypedArray {
    pub fn zeroed(ty: ComponentType, rows: usize, columns: usize) -> Self {
        match ty {
            ComponentType::I8 => Self::I8(Array2::filled(0, rows, columns)),
            ComponentType::U8 => Self::U8(Array2::filled(0, rows, columns)),
            ComponentType::I16 => Self::I16(Array2::filled(0, rows, columns)),
            ComponentType::U16 => Self::U16(Array2::filled(0, rows, columns)),
            ComponentType::U32 => Self::U32(Array2::filled(0, rows, columns)),
            ComponentType::F32 => Self::F32(Array2::filled(0.0, rows, columns)),
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::I8(_) => ComponentType::I8,
            Self::U8(_) => ComponentType::U8,
            Self::I16(_) => ComponentType::I16,
            Self::U16(_) => ComponentType::U16,
            Self::U32(_) => ComponentType::U32,
            Self::F32(_) => ComponentType::F32,
        }
    }

    pub fn rows(&self) -> usize {
        each!(self, a => a.rows())
    }

    pub fn columns(&self) -> usize {
        each!(self, a => a.columns())
    }

    pub fn to_f32(&self) -> Array2<f32> {
        each!(self, a => a.map(Component::to_f32))
    }

    pub fn select(&self, mask: &[bool]) -> Self {
        each_map!(self, a => a.select(mask))
    }
}

/// Decodes accessors of one container, resolving each buffer at most once.
pub struct AccessorReader<'a> {
    root: &'a json::Root,
    buffers: BufferResolver<'a>,
}

impl<'a> AccessorReader<'a> {
    pub fn new(container: &'a Container, source_dir: Option<&'a Path>) -> Self {
        Self {
            root: &container.root,
            buffers: BufferResolver::new(container, source_dir),
        }
    }

    /// Reads accessor `index` as a `(count, arity)` array.
    ///
    /// Normalized integer accessors come back as `F32` rescaled to `[0, 1]`
    /// (unsigned) or `[-1, 1]` (signed).
    pub fn read(&mut self, index: usize) -> Result<TypedArray> {
        let accessor = self
            .root
            .accessors
            .get(index)
            .ok_or(Error::BadAccessor(index))?;
        let ty = ComponentType::from_json(index, &accessor.component_type)?;
        let arity = ComponentCount::from_json(index, &accessor.type_)?.arity();
        if accessor.sparse.is_some() {
            return Err(Error::SparseAccessor(index));
        }
        let count = accessor.count.0;
        let element_size = arity * ty.byte_width();

        let Some(view_index) = accessor.buffer_view else {
            return match count.checked_mul(element_size as u64) {
                Some(bytes) if bytes <= MAX_ZEROED_BYTES => {
                    Ok(TypedArray::zeroed(ty, count as usize, arity))
                }
                _ => Err(Error::AccessorTooLarge {
                    accessor: index,
                    count,
                }),
            };
        };
        let view = self
            .root
            .buffer_views
            .get(view_index.value())
            .ok_or(Error::BadBufferView(view_index.value()))?;
        let raw = self.buffers.resolve(view.buffer.value())?;

        // descriptor values are untrusted u64s; all window math is checked
        let view_start = view.byte_offset.map_or(0, |o| o.0);
        let view_end = match view_start.checked_add(view.byte_length.0) {
            Some(end) if end <= raw.len() as u64 => end as usize,
            end => {
                return Err(Error::BufferRange {
                    accessor: index,
                    start: saturate(Some(view_start)),
                    end: saturate(end),
                    limit: raw.len(),
                });
            }
        };

        let stride = view.byte_stride.map_or(element_size, |s| s.0);
        if stride < element_size {
            return Err(Error::UnsupportedLayout {
                accessor: index,
                stride,
                element_size,
            });
        }

        let base = view_start.checked_add(accessor.byte_offset.map_or(0, |o| o.0));
        let end = match count {
            0 => base,
            n => (n - 1)
                .checked_mul(stride as u64)
                .and_then(|span| span.checked_add(element_size as u64))
                .and_then(|span| base?.checked_add(span)),
        };
        let (base, end) = match (base, end) {
            (Some(base), Some(end)) if end <= view_end as u64 => (base as usize, end as usize),
            (base, end) => {
                return Err(Error::BufferRange {
                    accessor: index,
                    start: saturate(base),
                    end: saturate(end),
                    limit: view_end,
                });
            }
        };
        let count = count as usize;

        let window = &raw[base..end];
        let layout = Layout {
            count,
            arity,
            stride,
        };
        let array = match ty {
            ComponentType::I8 => TypedArray::I8(layout.decode(window)),
            ComponentType::U8 => TypedArray::U8(layout.decode(window)),
            ComponentType::I16 => TypedArray::I16(layout.decode(window)),
            ComponentType::U16 => TypedArray::U16(layout.decode(window)),
            ComponentType::U32 => TypedArray::U32(layout.decode(window)),
            ComponentType::F32 => TypedArray::F32(layout.decode(window)),
        };
        tracing::debug!(
            accessor = index,
            ?ty,
            count,
            arity,
            stride,
            normalized = accessor.normalized,
            "decoded accessor"
        );

        Ok(if accessor.normalized && ty.is_integer() {
            TypedArray::F32(each!(&array, a => normalize(a)))
        } else {
            array
        })
    }
}

/// Largest accessor without a buffer view that is materialized as zeros.
const MAX_ZEROED_BYTES: u64 = 1 << 28;

/// An offset for error reporting; overflow shows as `usize::MAX`.
fn saturate(value: Option<u64>) -> usize {
    value
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(usize::MAX)
}

struct Layout {
    count: usize,
    arity: usize,
    stride: usize,
}

impl Layout {
    /// `window` starts at the first element and ends after the last one.
    fn decode<T: Component>(&self, window: &[u8]) -> Array2<T> {
        let width = std::mem::size_of::<T>();
        let element_size = self.arity * width;
        let data = if self.stride == element_size {
            bytemuck::pod_collect_to_vec(window)
        } else {
            let mut data = Vec::with_capacity(self.count * self.arity);
            for i in 0..self.count {
                let start = i * self.stride;
                data.extend(
                    window[start..start + element_size]
                        .chunks_exact(width)
                        .map(bytemuck::pod_read_unaligned::<T>),
                );
            }
            data
        };
        Array2 {
            data,
            columns: self.arity,
        }
    }
}

fn normalize<T: Component>(array: &Array2<T>) -> Array2<f32> {
    let max = T::TYPE.max_magnitude().unwrap_or(1.0);
    array.map(|v| (v.to_f64() / max).max(-1.0) as f32)
}

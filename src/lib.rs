//! Decode and re-encode the binary accessor layer of glTF/GLB containers.
//!
//! The crate reads typed, strided attribute arrays out of a container's
//! buffers, packs arrays back into a fresh single-buffer GLB, and wires the
//! two together into a point-cloud subsampling pipeline:
//!
//! ```no_run
//! use glb_subsample::{RateSelector, subsample_file};
//!
//! let mut selector = RateSelector::new(0.06, Some(42));
//! let kept = subsample_file("scan.glb".as_ref(), "scan_small.glb".as_ref(), &mut selector)?;
//! println!("kept {kept} points");
//! # Ok::<(), glb_subsample::Error>(())
//! ```

use std::path::{Path, PathBuf};

pub mod attributes;
pub mod buffer;
pub mod config;
pub mod container;
pub mod mapping;
pub mod reader;
pub mod select;
pub mod writer;

pub use attributes::{AttributeSet, PointAttributes};
pub use buffer::BufferResolver;
pub use config::SubsampleConfig;
pub use container::{Container, PrimitiveLocation};
pub use mapping::{ComponentCount, ComponentType};
pub use reader::{AccessorReader, Array2, TypedArray};
pub use select::{RateSelector, Selector};
pub use writer::PackedBuffer;

pub const POSITION: &str = "POSITION";
pub const COLOR_0: &str = "COLOR_0";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("accessor {accessor}: component type is not one of i8/u8/i16/u16/u32/f32")]
    UnknownComponentType { accessor: usize },
    #[error("accessor {accessor}: element type is not SCALAR/VEC2/VEC3/VEC4")]
    UnknownComponentCount { accessor: usize },
    #[error("accessor {0} not found")]
    BadAccessor(usize),
    #[error("bufferView {0} not found")]
    BadBufferView(usize),
    #[error("buffer index {0} not found")]
    BadBuffer(usize),
    #[error("scene {0} not found")]
    BadScene(usize),
    #[error("node {0} not found")]
    BadNode(usize),
    #[error("mesh {0} not found")]
    BadMesh(usize),
    #[error("buffer {0}: no attached bytes, embedded binary chunk or usable uri")]
    UnresolvableBuffer(usize),
    #[error("buffer {buffer}: external uri {uri:?} needs a source directory")]
    MissingSourceDirectory { buffer: usize, uri: String },
    #[error("buffer {buffer}: data uri has no ',' separator")]
    InvalidDataUri { buffer: usize },
    #[error("buffer {buffer}: invalid base64 payload")]
    Base64 {
        buffer: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("buffer {buffer}: resolved {actual} bytes, byteLength declares {declared}")]
    BufferLength {
        buffer: usize,
        declared: usize,
        actual: usize,
    },
    #[error("accessor {accessor}: bytes {start}..{end} exceed the {limit}-byte limit")]
    BufferRange {
        accessor: usize,
        start: usize,
        end: usize,
        limit: usize,
    },
    #[error("accessor {accessor}: stride {stride} is smaller than the {element_size}-byte element")]
    UnsupportedLayout {
        accessor: usize,
        stride: usize,
        element_size: usize,
    },
    #[error("accessor {accessor}: {count} elements without a buffer view is too large")]
    AccessorTooLarge { accessor: usize, count: u64 },
    #[error("accessor {0} is sparse; sparse storage is not supported")]
    SparseAccessor(usize),
    #[error("attribute {0} has no rows")]
    EmptyArray(String),
    #[error("attribute {name} has {columns} columns, accessors hold 1 to 4")]
    UnsupportedArity { name: String, columns: usize },
    #[error("attribute {0} was given twice")]
    DuplicateAttribute(String),
    #[error("attribute container has no slot for {name}")]
    UnsupportedAttributeContainer { name: String },
    #[error("no mesh primitive with a POSITION attribute")]
    NoPositionAttribute,
    #[error("{name} has {actual} rows, POSITION has {expected}")]
    AttributeLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("selection mask has {actual} entries for {expected} elements")]
    SelectionLength { expected: usize, actual: usize },
    #[error("source has no elements to retain")]
    EmptyResultSet,
    #[error("sampling rate {0} is outside [0, 1]")]
    InvalidRate(f32),
    #[error("container of {0} bytes exceeds the 4 GiB GLB limit")]
    ContainerTooLarge(usize),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Gltf(#[from] gltf::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Output of one subsampling run.
#[derive(Debug)]
pub struct Subsampled {
    pub container: Container,
    pub retained: usize,
}

/// Subsample the first POSITION-bearing primitive of `source` into a new
/// single-buffer point cloud.
///
/// COLOR_0 is carried over when present, otherwise every point is white.
pub fn subsample<S: Selector + ?Sized>(
    source: &Container,
    source_dir: Option<&Path>,
    selector: &mut S,
) -> Result<Subsampled> {
    let location = container::first_primitive_with_position(&source.root)?;
    let attrs = PointAttributes::copy_from(location.primitive_in(&source.root)?);
    let position_index = attrs.position.ok_or(Error::NoPositionAttribute)?;
    tracing::debug!(
        node = location.node,
        mesh = location.mesh,
        primitive = location.primitive,
        "found POSITION primitive"
    );

    let mut reader = AccessorReader::new(source, source_dir);
    let positions = reader.read(position_index)?.to_f32();
    if positions.columns() != 3 {
        return Err(Error::UnsupportedArity {
            name: POSITION.to_string(),
            columns: positions.columns(),
        });
    }
    let count = positions.rows();

    let colors = match attrs.color_0 {
        Some(index) => writer::coerce_color_channels(reader.read(index)?.to_f32()),
        None => Array2::filled(1.0, count, 3),
    };
    if colors.rows() != count {
        return Err(Error::AttributeLengthMismatch {
            name: COLOR_0.to_string(),
            expected: count,
            actual: colors.rows(),
        });
    }

    let mask = select::retained_mask(selector, count)?;
    let positions = TypedArray::F32(positions.select(&mask));
    let colors = TypedArray::F32(colors.select(&mask));
    let retained = positions.rows();
    tracing::info!(source = count, retained, "subsampled point cloud");

    let packed = writer::write(&[(POSITION, &positions), (COLOR_0, &colors)])?;
    let container = container::assemble_point_cloud(packed)?;
    Ok(Subsampled {
        container,
        retained,
    })
}

/// Load `src`, subsample it and write the result to `dst` as GLB.
///
/// External buffers resolve relative to the directory holding `src`. The
/// output file is only touched once the whole container is in memory.
pub fn subsample_file<S: Selector + ?Sized>(
    src: &Path,
    dst: &Path,
    selector: &mut S,
) -> Result<usize> {
    let source = Container::open(src)?;
    let source_dir = source_directory(src);
    let out = subsample(&source, Some(&source_dir), selector)?;
    out.container.save(dst)?;
    tracing::info!(path = %dst.display(), retained = out.retained, "wrote subsampled GLB");
    Ok(out.retained)
}

fn source_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

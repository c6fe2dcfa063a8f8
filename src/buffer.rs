//! Resolution of glTF buffers to their raw bytes.
//!
//! Sources are tried in a fixed order, each gated by its own precondition:
//! 1. bytes attached to the container whose length matches `byteLength`
//! 2. the GLB binary chunk, for a buffer that declares no uri
//! 3. the buffer's uri, either a `data:` uri or a path below the source directory
//!
//! The resolver always hands out the whole buffer; sub-ranging belongs to the
//! accessor reader.

use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use base64::Engine;

use crate::{Container, Error, Result};

/// Resolves and caches buffers for one load session.
pub struct BufferResolver<'a> {
    container: &'a Container,
    source_dir: Option<&'a Path>,
    cache: HashMap<usize, Cow<'a, [u8]>>,
}

impl<'a> BufferResolver<'a> {
    pub fn new(container: &'a Container, source_dir: Option<&'a Path>) -> Self {
        Self {
            container,
            source_dir,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, index: usize) -> Result<&[u8]> {
        let bytes = match self.cache.entry(index) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(resolve(self.container, index, self.source_dir)?),
        };
        Ok(&**bytes)
    }
}

/// Returns the complete content of buffer `index`.
pub fn resolve<'a>(
    container: &'a Container,
    index: usize,
    source_dir: Option<&Path>,
) -> Result<Cow<'a, [u8]>> {
    let buffer = container
        .root
        .buffers
        .get(index)
        .ok_or(Error::BadBuffer(index))?;
    let declared = buffer.byte_length.0 as usize;

    let bytes = if let Some(bytes) = container.attached(index).filter(|b| b.len() == declared) {
        tracing::trace!(buffer = index, "using attached bytes");
        Cow::Borrowed(bytes)
    } else if let (Some(blob), None) = (container.blob.as_deref(), buffer.uri.as_deref()) {
        tracing::trace!(buffer = index, "using GLB binary chunk");
        Cow::Borrowed(blob)
    } else if let Some(uri) = buffer.uri.as_deref() {
        if let Some(rest) = uri.strip_prefix("data:") {
            Cow::Owned(decode_data_uri(index, rest)?)
        } else {
            let dir = source_dir.ok_or_else(|| Error::MissingSourceDirectory {
                buffer: index,
                uri: uri.to_string(),
            })?;
            let path = dir.join(uri);
            tracing::debug!(buffer = index, path = %path.display(), "reading external buffer");
            Cow::Owned(std::fs::read(&path).map_err(|source| Error::Io { path, source })?)
        }
    } else {
        return Err(Error::UnresolvableBuffer(index));
    };

    // The GLB chunk may carry up to 3 bytes of trailing padding, never less.
    if bytes.len() < declared {
        return Err(Error::BufferLength {
            buffer: index,
            declared,
            actual: bytes.len(),
        });
    }
    tracing::debug!(buffer = index, len = bytes.len(), "resolved buffer");
    Ok(bytes)
}

/// Decodes the part of a data uri after `data:`.
fn decode_data_uri(buffer: usize, rest: &str) -> Result<Vec<u8>> {
    // data:[<mediatype>][;base64],<data>
    let (meta, payload) = rest
        .split_once(',')
        .ok_or(Error::InvalidDataUri { buffer })?;
    if meta.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|source| Error::Base64 { buffer, source })
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

//! Loading, assembling and serializing glTF containers.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use gltf::json;
use json::validation::Checked::Valid;

use crate::attributes::AttributeSet;
use crate::writer::PackedBuffer;
use crate::{Error, POSITION, Result};

const GLB_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F534A;
const CHUNK_BIN: u32 = 0x004E4942;

pub const POINT_CLOUD_NODE: &str = "subsampled_pointcloud";

/// A glTF document together with the binary data it owns.
#[derive(Debug, Clone)]
pub struct Container {
    pub root: json::Root,
    /// Binary chunk of a GLB file.
    pub blob: Option<Vec<u8>>,
    attached: BTreeMap<usize, Vec<u8>>,
}

impl Container {
    pub fn new(root: json::Root) -> Self {
        Self {
            root,
            blob: None,
            attached: BTreeMap::new(),
        }
    }

    /// Parses GLB or JSON glTF.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)?;
        let mut container = Self::new(document.into_json());
        container.blob = blob;
        Ok(container)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let container = Self::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            buffers = container.root.buffers.len(),
            accessors = container.root.accessors.len(),
            "loaded container"
        );
        Ok(container)
    }

    /// Attaches already materialized bytes for buffer `index`.
    pub fn attach(&mut self, index: usize, bytes: Vec<u8>) {
        self.attached.insert(index, bytes);
    }

    pub fn attached(&self, index: usize) -> Option<&[u8]> {
        self.attached.get(&index).map(Vec::as_slice)
    }

    /// Serializes to GLB, with `blob` as the binary chunk.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let json_bytes = json::serialize::to_string(&self.root)?.into_bytes();
        let json_padding = (4 - json_bytes.len() % 4) % 4;
        let json_chunk_len = json_bytes.len() + json_padding;

        let bin = self.blob.as_deref();
        let bin_padding = bin.map_or(0, |b| (4 - b.len() % 4) % 4);
        let bin_chunk_len = bin.map_or(0, |b| b.len() + bin_padding);

        let total = GLB_HEADER_LEN
            + CHUNK_HEADER_LEN
            + json_chunk_len
            + bin.map_or(0, |_| CHUNK_HEADER_LEN + bin_chunk_len);
        let total_u32 = u32::try_from(total).map_err(|_| Error::ContainerTooLarge(total))?;

        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&total_u32.to_le_bytes());

        glb.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json_bytes);
        glb.extend(std::iter::repeat_n(b' ', json_padding));

        if let Some(bin) = bin {
            glb.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
            glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            glb.extend_from_slice(bin);
            glb.extend(std::iter::repeat_n(0u8, bin_padding));
        }

        Ok(glb)
    }

    /// Writes the GLB to `path` in one go, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let glb = self.to_glb()?;
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        std::fs::write(path, glb).map_err(io_err)
    }
}

/// Where a primitive sits in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveLocation {
    pub node: usize,
    pub mesh: usize,
    pub primitive: usize,
}

impl PrimitiveLocation {
    pub fn primitive_in<'a>(&self, root: &'a json::Root) -> Result<&'a json::mesh::Primitive> {
        root.meshes
            .get(self.mesh)
            .and_then(|m| m.primitives.get(self.primitive))
            .ok_or(Error::BadMesh(self.mesh))
    }
}

/// Breadth-first search of the default scene for a primitive with POSITION.
///
/// Documents without scenes are searched node by node.
pub fn first_primitive_with_position(root: &json::Root) -> Result<PrimitiveLocation> {
    let scene = root
        .scene
        .map(|s| s.value())
        .or_else(|| (!root.scenes.is_empty()).then_some(0));
    let mut queue: VecDeque<usize> = match scene {
        Some(s) => root
            .scenes
            .get(s)
            .ok_or(Error::BadScene(s))?
            .nodes
            .iter()
            .map(|n| n.value())
            .collect(),
        None => (0..root.nodes.len()).collect(),
    };

    let mut visited = HashSet::new();
    while let Some(ni) = queue.pop_front() {
        if !visited.insert(ni) {
            continue;
        }
        let node = root.nodes.get(ni).ok_or(Error::BadNode(ni))?;
        if let Some(mi) = node.mesh.map(|m| m.value()) {
            let mesh = root.meshes.get(mi).ok_or(Error::BadMesh(mi))?;
            if let Some(pi) = mesh.primitives.iter().position(|p| p.get(POSITION).is_some()) {
                return Ok(PrimitiveLocation {
                    node: ni,
                    mesh: mi,
                    primitive: pi,
                });
            }
        }
        if let Some(children) = &node.children {
            queue.extend(children.iter().map(|c| c.value()));
        }
    }
    Err(Error::NoPositionAttribute)
}

/// Wraps `packed` into one scene -> one node -> one mesh -> one point primitive.
pub fn assemble_point_cloud(packed: PackedBuffer) -> Result<Container> {
    let mut primitive = json::mesh::Primitive {
        attributes: BTreeMap::new(),
        extensions: Default::default(),
        extras: Default::default(),
        indices: None,
        material: None,
        mode: Valid(json::mesh::Mode::Points),
        targets: None,
    };
    for (i, name) in packed.names.iter().enumerate() {
        primitive.set(name, i)?;
    }

    let mesh = json::Mesh {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        primitives: vec![primitive],
        weights: None,
    };
    let node = json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: Some(json::Index::new(0)),
        name: Some(POINT_CLOUD_NODE.to_string()),
        rotation: None,
        scale: None,
        skin: None,
        translation: None,
        weights: None,
    };
    let scene = json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes: vec![json::Index::new(0)],
    };

    let root = json::Root {
        accessors: packed.accessors,
        animations: Vec::new(),
        asset: json::Asset {
            copyright: None,
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string()),
            min_version: None,
            version: "2.0".to_string(),
        },
        buffers: vec![packed.buffer],
        buffer_views: packed.views,
        cameras: Vec::new(),
        extensions: Default::default(),
        extensions_required: Vec::new(),
        extensions_used: Vec::new(),
        extras: Default::default(),
        images: Vec::new(),
        materials: Vec::new(),
        meshes: vec![mesh],
        nodes: vec![node],
        samplers: Vec::new(),
        scene: Some(json::Index::new(0)),
        scenes: vec![scene],
        skins: Vec::new(),
        textures: Vec::new(),
    };

    let mut container = Container::new(root);
    container.blob = Some(packed.data);
    Ok(container)
}

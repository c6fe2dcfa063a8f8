//! Uniform access to a primitive's attribute -> accessor mapping.

use std::collections::BTreeMap;

use gltf::json;
use json::validation::Checked;

use crate::mapping::key_to_semantic;
use crate::{COLOR_0, Error, POSITION, Result};

/// Something that maps attribute names such as `POSITION` to accessor indices.
pub trait AttributeSet {
    fn get(&self, name: &str) -> Option<usize>;

    /// Fails rather than dropping a name the container cannot hold.
    fn set(&mut self, name: &str, accessor: usize) -> Result<()>;
}

/// The glTF JSON shape: an open map keyed by semantic.
pub type AttributeMap = BTreeMap<Checked<json::mesh::Semantic>, json::Index<json::Accessor>>;

impl AttributeSet for AttributeMap {
    fn get(&self, name: &str) -> Option<usize> {
        let semantic = key_to_semantic(name)?;
        BTreeMap::get(self, &Checked::Valid(semantic)).map(|i| i.value())
    }

    fn set(&mut self, name: &str, accessor: usize) -> Result<()> {
        let semantic = key_to_semantic(name).ok_or_else(|| Error::UnsupportedAttributeContainer {
            name: name.to_string(),
        })?;
        self.insert(Checked::Valid(semantic), json::Index::new(accessor as u32));
        Ok(())
    }
}

impl AttributeSet for json::mesh::Primitive {
    fn get(&self, name: &str) -> Option<usize> {
        AttributeSet::get(&self.attributes, name)
    }

    fn set(&mut self, name: &str, accessor: usize) -> Result<()> {
        AttributeSet::set(&mut self.attributes, name, accessor)
    }
}

/// Fixed slots for the attributes a point cloud carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointAttributes {
    pub position: Option<usize>,
    pub color_0: Option<usize>,
}

impl PointAttributes {
    pub fn copy_from<A: AttributeSet + ?Sized>(attrs: &A) -> Self {
        Self {
            position: attrs.get(POSITION),
            color_0: attrs.get(COLOR_0),
        }
    }
}

impl AttributeSet for PointAttributes {
    fn get(&self, name: &str) -> Option<usize> {
        match name {
            POSITION => self.position,
            COLOR_0 => self.color_0,
            _ => None,
        }
    }

    fn set(&mut self, name: &str, accessor: usize) -> Result<()> {
        let slot = match name {
            POSITION => &mut self.position,
            COLOR_0 => &mut self.color_0,
            _ => {
                return Err(Error::UnsupportedAttributeContainer {
                    name: name.to_string(),
                });
            }
        };
        *slot = Some(accessor);
        Ok(())
    }
}

use gltf::json;
use json::validation::Checked;

use crate::{Error, Result};

/// Scalar component layout of an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            5120 => Some(Self::I8),
            5121 => Some(Self::U8),
            5122 => Some(Self::I16),
            5123 => Some(Self::U16),
            5125 => Some(Self::U32),
            5126 => Some(Self::F32),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::I8 => 5120,
            Self::U8 => 5121,
            Self::I16 => 5122,
            Self::U16 => 5123,
            Self::U32 => 5125,
            Self::F32 => 5126,
        }
    }

    /// Looks up the component type of accessor `accessor`.
    pub fn from_json(
        accessor: usize,
        ct: &Checked<json::accessor::GenericComponentType>,
    ) -> Result<Self> {
        use json::accessor::ComponentType::*;
        match ct {
            Checked::Valid(json::accessor::GenericComponentType(ct)) => Ok(match ct {
                I8 => Self::I8,
                U8 => Self::U8,
                I16 => Self::I16,
                U16 => Self::U16,
                U32 => Self::U32,
                F32 => Self::F32,
            }),
            Checked::Invalid => Err(Error::UnknownComponentType { accessor }),
        }
    }

    pub fn to_json(self) -> json::accessor::GenericComponentType {
        use json::accessor::ComponentType::*;
        json::accessor::GenericComponentType(match self {
            Self::I8 => I8,
            Self::U8 => U8,
            Self::I16 => I16,
            Self::U16 => U16,
            Self::U32 => U32,
            Self::F32 => F32,
        })
    }

    pub fn byte_width(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::F32)
    }

    /// Divisor used to turn a normalized integer back into a fraction.
    pub fn max_magnitude(self) -> Option<f64> {
        match self {
            Self::I8 => Some(i8::MAX as f64),
            Self::U8 => Some(u8::MAX as f64),
            Self::I16 => Some(i16::MAX as f64),
            Self::U16 => Some(u16::MAX as f64),
            Self::U32 => Some(u32::MAX as f64),
            Self::F32 => None,
        }
    }
}

/// Number of components per accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentCount {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl ComponentCount {
    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            1 => Some(Self::Scalar),
            2 => Some(Self::Vec2),
            3 => Some(Self::Vec3),
            4 => Some(Self::Vec4),
            _ => None,
        }
    }

    pub fn from_json(accessor: usize, ty: &Checked<json::accessor::Type>) -> Result<Self> {
        use json::accessor::Type;
        match ty {
            Checked::Valid(Type::Scalar) => Ok(Self::Scalar),
            Checked::Valid(Type::Vec2) => Ok(Self::Vec2),
            Checked::Valid(Type::Vec3) => Ok(Self::Vec3),
            Checked::Valid(Type::Vec4) => Ok(Self::Vec4),
            // matrices are not vertex streams
            _ => Err(Error::UnknownComponentCount { accessor }),
        }
    }

    pub fn to_json(self) -> json::accessor::Type {
        match self {
            Self::Scalar => json::accessor::Type::Scalar,
            Self::Vec2 => json::accessor::Type::Vec2,
            Self::Vec3 => json::accessor::Type::Vec3,
            Self::Vec4 => json::accessor::Type::Vec4,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
        }
    }
}

pub fn key_to_semantic(key: &str) -> Option<json::mesh::Semantic> {
    use json::mesh::Semantic;
    match key {
        "POSITION" => return Some(Semantic::Positions),
        "NORMAL" => return Some(Semantic::Normals),
        "TANGENT" => return Some(Semantic::Tangents),
        _ => {}
    }

    let (kind, idx_s) = key.split_once('_')?;
    let idx: u32 = idx_s.parse().ok()?;
    match kind {
        "TEXCOORD" => Some(Semantic::TexCoords(idx)),
        "COLOR" => Some(Semantic::Colors(idx)),
        "JOINTS" => Some(Semantic::Joints(idx)),
        "WEIGHTS" => Some(Semantic::Weights(idx)),
        _ => None,
    }
}

pub fn is_color_key(key: &str) -> bool {
    matches!(key_to_semantic(key), Some(json::mesh::Semantic::Colors(_)))
}

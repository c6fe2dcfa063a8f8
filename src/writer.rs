//! Packing arrays into a single tightly packed glTF buffer.

use gltf::json;
use json::validation::Checked::Valid;

use crate::mapping::{self, ComponentCount, ComponentType};
use crate::reader::{Array2, TypedArray};
use crate::{Error, POSITION, Result};

/// One freshly packed buffer with its views and accessors.
///
/// View and accessor `i` describe the `i`-th input array.
#[derive(Debug, Clone)]
pub struct PackedBuffer {
    pub data: Vec<u8>,
    pub buffer: json::Buffer,
    pub views: Vec<json::buffer::View>,
    pub accessors: Vec<json::Accessor>,
    pub names: Vec<String>,
}

/// Packs `arrays` back to back into buffer 0 as f32 accessors.
///
/// Color attributes are coerced to RGB/RGBA first; `POSITION` gets min/max.
pub fn write(arrays: &[(&str, &TypedArray)]) -> Result<PackedBuffer> {
    let mut data = Vec::new();
    let mut views = Vec::with_capacity(arrays.len());
    let mut accessors = Vec::with_capacity(arrays.len());
    let mut names: Vec<String> = Vec::with_capacity(arrays.len());

    for &(name, array) in arrays {
        if array.rows() == 0 {
            return Err(Error::EmptyArray(name.to_string()));
        }
        if names.iter().any(|n| n == name) {
            return Err(Error::DuplicateAttribute(name.to_string()));
        }

        let values = array.to_f32();
        let values = if mapping::is_color_key(name) {
            coerce_color_channels(values)
        } else {
            values
        };
        let count = ComponentCount::from_arity(values.columns()).ok_or_else(|| {
            Error::UnsupportedArity {
                name: name.to_string(),
                columns: values.columns(),
            }
        })?;

        let offset = data.len();
        data.extend_from_slice(bytemuck::cast_slice(values.as_slice()));

        views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: (data.len() - offset).into(),
            byte_offset: Some((offset as u64).into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(json::buffer::Target::ArrayBuffer)),
        });

        let (min, max) = if name == POSITION {
            let (min, max) = compute_bounds(&values);
            (Some(to_json_array(min)), Some(to_json_array(max)))
        } else {
            (None, None)
        };

        accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(views.len() as u32 - 1)),
            byte_offset: Some(0u64.into()),
            count: values.rows().into(),
            component_type: Valid(ComponentType::F32.to_json()),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(count.to_json()),
            min,
            max,
            name: None,
            normalized: false,
            sparse: None,
        });
        names.push(name.to_string());
        tracing::debug!(name, rows = values.rows(), offset, "packed attribute");
    }

    let buffer = json::Buffer {
        byte_length: data.len().into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    };
    Ok(PackedBuffer {
        data,
        buffer,
        views,
        accessors,
        names,
    })
}

/// Brings a color array to 3 or 4 channels.
///
/// Fewer than 3 channels are padded with 1.0; more than 4 keep the first 3
/// and get an alpha of 1.0.
pub fn coerce_color_channels(colors: Array2<f32>) -> Array2<f32> {
    let columns = colors.columns();
    let target = match columns {
        3 | 4 => return colors,
        0..3 => 3,
        _ => 4,
    };
    let mut data = Vec::with_capacity(colors.rows() * target);
    for row in colors.iter_rows() {
        let rgb = &row[..columns.min(3)];
        data.extend_from_slice(rgb);
        data.extend(std::iter::repeat_n(1.0, target - rgb.len()));
    }
    Array2::from_vec(data, target).unwrap_or(colors)
}

/// Per-column minimum and maximum.
pub fn compute_bounds(values: &Array2<f32>) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![f32::MAX; values.columns()];
    let mut max = vec![f32::MIN; values.columns()];

    for row in values.iter_rows() {
        for (i, &v) in row.iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }

    (min, max)
}

fn to_json_array(values: Vec<f32>) -> json::Value {
    json::Value::Array(values.into_iter().map(json::Value::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_per_axis() {
        let positions = Array2::from_rows(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, 0.0, 5.0]]);
        let (min, max) = compute_bounds(&positions);
        assert_eq!(min, vec![-1.0, 0.0, 0.0]);
        assert_eq!(max, vec![1.0, 2.0, 5.0]);
    }

    #[test]
    fn two_channel_colors_are_padded() {
        let colors = coerce_color_channels(Array2::from_rows(&[[0.2, 0.4], [0.6, 0.8]]));
        assert_eq!(colors, Array2::from_rows(&[[0.2, 0.4, 1.0], [0.6, 0.8, 1.0]]));
    }

    #[test]
    fn five_channel_colors_collapse_to_rgba() {
        let colors = coerce_color_channels(Array2::from_rows(&[[0.1, 0.2, 0.3, 0.4, 0.5]]));
        assert_eq!(colors, Array2::from_rows(&[[0.1, 0.2, 0.3, 1.0]]));
    }

    #[test]
    fn rgb_and_rgba_untouched() {
        let rgb = Array2::from_rows(&[[0.1, 0.2, 0.3]]);
        assert_eq!(coerce_color_channels(rgb.clone()), rgb);
        let rgba = Array2::from_rows(&[[0.1, 0.2, 0.3, 0.4]]);
        assert_eq!(coerce_color_channels(rgba.clone()), rgba);
    }

    #[test]
    fn arrays_are_packed_back_to_back() -> Result<()> {
        let positions = TypedArray::F32(Array2::from_rows(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, 0.0, 5.0]]));
        let colors = TypedArray::U8(Array2::from_rows(&[[255, 0], [0, 255], [0, 0]]));
        let packed = write(&[(POSITION, &positions), ("COLOR_0", &colors)])?;

        // 3 x vec3 positions + 3 x vec3 padded colors
        assert_eq!(packed.data.len(), 36 + 36);
        assert_eq!(packed.buffer.byte_length.0, 72);
        assert_eq!(packed.views[0].byte_offset.map(|o| o.0), Some(0));
        assert_eq!(packed.views[1].byte_offset.map(|o| o.0), Some(36));
        assert_eq!(packed.views[1].byte_length.0, 36);
        assert!(packed.views.iter().all(|v| v.byte_stride.is_none()));

        let pos = &packed.accessors[0];
        assert_eq!(pos.type_, Valid(json::accessor::Type::Vec3));
        assert_eq!(pos.min, Some(serde_json::json!([-1.0, 0.0, 0.0])));
        assert_eq!(pos.max, Some(serde_json::json!([1.0, 2.0, 5.0])));

        let col = &packed.accessors[1];
        assert_eq!(col.type_, Valid(json::accessor::Type::Vec3));
        assert_eq!(col.count.0, 3);
        assert!(col.min.is_none() && col.max.is_none());
        assert_eq!(packed.names, vec![POSITION, "COLOR_0"]);
        Ok(())
    }

    #[test]
    fn empty_array_is_rejected() {
        let empty = TypedArray::F32(Array2::filled(0.0, 0, 3));
        let err = write(&[(POSITION, &empty)]).unwrap_err();
        assert!(matches!(err, Error::EmptyArray(name) if name == POSITION));
    }

    #[test]
    fn wide_non_color_is_rejected() {
        let wide = TypedArray::F32(Array2::filled(0.0, 1, 5));
        let err = write(&[("WEIGHTS_0", &wide)]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedArity { columns: 5, .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let a = TypedArray::F32(Array2::filled(0.0, 1, 3));
        let err = write(&[(POSITION, &a), (POSITION, &a)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateAttribute(_)));
    }
}

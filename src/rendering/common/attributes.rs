//! The one table that assigns vertex attributes to shader locations. Mesh layouts and generated
//! shaders both read it, so a mesh's buffers and a material's vertex input agree by construction.

use num_enum::TryFromPrimitive;

/// Unity's vertex channels, in the order of the mesh channel table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[repr(u8)]
pub enum VertexSemantic {
    Position = 0,
    Normal = 1,
    Tangent = 2,
    Color = 3,
    TexCoord0 = 4,
    TexCoord1 = 5,
    TexCoord2 = 6,
    TexCoord3 = 7,
    TexCoord4 = 8,
    TexCoord5 = 9,
    TexCoord6 = 10,
    TexCoord7 = 11,
    BlendWeight = 12,
    BlendIndices = 13,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    pub semantic: VertexSemantic,
    pub location: u32,
    /// Field name in the generated vertex input struct.
    pub name: &'static str,
    /// The type the shader reads the attribute as.
    pub shader_type: &'static str,
}

const fn slot(semantic: VertexSemantic, name: &'static str, shader_type: &'static str) -> AttributeSlot {
    AttributeSlot {
        semantic,
        location: semantic as u32,
        name,
        shader_type,
    }
}

pub const ATTRIBUTE_TABLE: [AttributeSlot; 14] = [
    slot(VertexSemantic::Position, "position", "vec3<f32>"),
    slot(VertexSemantic::Normal, "normal", "vec3<f32>"),
    slot(VertexSemantic::Tangent, "tangent", "vec4<f32>"),
    slot(VertexSemantic::Color, "color", "vec4<f32>"),
    slot(VertexSemantic::TexCoord0, "uv0", "vec2<f32>"),
    slot(VertexSemantic::TexCoord1, "uv1", "vec2<f32>"),
    slot(VertexSemantic::TexCoord2, "uv2", "vec2<f32>"),
    slot(VertexSemantic::TexCoord3, "uv3", "vec2<f32>"),
    slot(VertexSemantic::TexCoord4, "uv4", "vec2<f32>"),
    slot(VertexSemantic::TexCoord5, "uv5", "vec2<f32>"),
    slot(VertexSemantic::TexCoord6, "uv6", "vec2<f32>"),
    slot(VertexSemantic::TexCoord7, "uv7", "vec2<f32>"),
    slot(VertexSemantic::BlendWeight, "blend_weight", "vec4<f32>"),
    slot(VertexSemantic::BlendIndices, "blend_indices", "vec4<u32>"),
];

pub fn attribute_slot(semantic: VertexSemantic) -> &'static AttributeSlot {
    &ATTRIBUTE_TABLE[semantic as usize]
}

/// Emits a WGSL vertex input struct declaring `semantics` at their table locations.
pub fn vertex_input_struct(name: &str, semantics: &[VertexSemantic]) -> String {
    let mut source = format!("struct {} {{\n", name);
    for semantic in semantics {
        let slot = attribute_slot(*semantic);
        source.push_str(&format!(
            "    @location({}) {}: {},\n",
            slot.location, slot.name, slot.shader_type
        ));
    }
    source.push_str("}\n");
    source
}

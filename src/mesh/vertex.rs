//! Vertex layout metadata carried by every mesh chunk.

use bitflags::bitflags;

bitflags! {
    /// Vertex components a chunk provides, in the host renderer's bit layout.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VertexComponents: u32 {
        const POSITION_MATRIX_INDEX = 1 << 1;
        const NORMAL = 1 << 10;
        const COLOR0 = 1 << 13;
        const COLOR1 = 1 << 14;
        const TEXCOORD0 = 1 << 15;
        const TEXCOORD1 = 1 << 16;
        const TEXCOORD2 = 1 << 17;
        const TEXCOORD3 = 1 << 18;
        const TEXCOORD4 = 1 << 19;
        const TEXCOORD5 = 1 << 20;
        const TEXCOORD6 = 1 << 21;
        const TEXCOORD7 = 1 << 22;
    }
}

impl VertexComponents {
    pub fn color(channel: usize) -> Self {
        Self::from_bits_retain(Self::COLOR0.bits() << channel)
    }

    pub fn texcoord(channel: usize) -> Self {
        Self::from_bits_retain(Self::TEXCOORD0.bits() << channel)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentFormat {
    Byte = 0,
    UByte = 1,
    Short = 2,
    UShort = 3,
    #[default]
    Float = 4,
}

impl ComponentFormat {
    pub fn size_bytes(self) -> u32 {
        match self {
            ComponentFormat::Byte | ComponentFormat::UByte => 1,
            ComponentFormat::Short | ComponentFormat::UShort => 2,
            ComponentFormat::Float => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ComponentFormat::Byte,
            1 => ComponentFormat::UByte,
            2 => ComponentFormat::Short,
            3 => ComponentFormat::UShort,
            4 => ComponentFormat::Float,
            _ => return None,
        })
    }
}

/// Where one attribute lives inside a vertex and how to read it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AttributeFormat {
    pub enable: bool,
    pub components: u8,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
    pub format: ComponentFormat,
    /// Read as integers rather than normalized values.
    pub integer: bool,
}

impl AttributeFormat {
    pub fn byte_size(&self) -> u32 {
        u32::from(self.components) * self.format.size_bytes()
    }
}

pub const MAX_COLORS: usize = 2;
pub const MAX_TEXCOORDS: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PortableVertexDeclaration {
    pub stride: u32,
    pub position: AttributeFormat,
    pub colors: [AttributeFormat; MAX_COLORS],
    pub normal: AttributeFormat,
    pub texcoords: [AttributeFormat; MAX_TEXCOORDS],
    pub posmtx: AttributeFormat,
}

impl PortableVertexDeclaration {
    /// Attribute slots in serialization order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeFormat> {
        std::iter::once(&self.position)
            .chain(&self.colors)
            .chain(std::iter::once(&self.normal))
            .chain(&self.texcoords)
            .chain(std::iter::once(&self.posmtx))
    }

    pub fn attributes_mut(&mut self) -> impl Iterator<Item = &mut AttributeFormat> {
        std::iter::once(&mut self.position)
            .chain(&mut self.colors)
            .chain(std::iter::once(&mut self.normal))
            .chain(&mut self.texcoords)
            .chain(std::iter::once(&mut self.posmtx))
    }

    /// Enabled attributes fit inside the stride and do not overlap.
    pub fn is_consistent(&self) -> bool {
        let spans: Option<Vec<(u32, u32)>> = self
            .attributes()
            .filter(|a| a.enable)
            .map(|a| Some((a.offset, a.offset.checked_add(a.byte_size())?)))
            .collect();
        let Some(mut spans) = spans else {
            return false;
        };
        spans.sort_unstable();
        spans.iter().all(|&(start, end)| start < self.stride.max(1) && end <= self.stride)
            && spans.windows(2).all(|w| w[0].1 <= w[1].0)
    }
}

//! Material and shader assets plus the loading machinery shared by all asset
//! kinds.

pub mod custom_asset;
pub mod library;
pub mod material;
pub mod property;
pub mod shader;

pub use custom_asset::CustomAsset;
pub use library::{AssetLibrary, AssetLoader, DirectoryAssetLibrary, LoadInfo, LoadableAsset, Loaded};
pub use material::{MaterialData, check_material_matches_shader};
pub use property::{MaterialProperty, PROPERTY_MEMORY_STRIDE, PropertyType, PropertyValue};
pub use shader::{PixelShaderData, ShaderProperty, ShaderPropertyType};

//! Pass assembly.
//!
//! [`PassAssembler`] merges a template snapshot with caller field values,
//! validates the result, and decodes the template images into package files.

pub mod assembler;
pub mod assets;
pub mod validate;

pub use assembler::{AssembledPass, PassAssembler, PASS_JSON_FILE};
pub use assets::{asset_file_name, decode_assets, decode_image, ASSET_NAMES};
pub use validate::{ensure_pass_type_identifier, validate_pass, FIELD_GROUPS, STYLE_KEYS};

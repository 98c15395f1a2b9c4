//! Property key constants for Attrs access.
//!
//! Avoid string typos, enable IDE autocomplete.
//! Usage: `object.attrs.get_bool(A_EYEBALL)`

// === Identity ===
/// Human-readable name
pub const A_NAME: &str = "name";

// === Visibility ===
/// Eyeball flag - explicit per-slide visibility override
pub const A_EYEBALL: &str = "eyeball";
/// Start of the visibility window on the owning slide timeline (ms)
pub const A_START_TIME: &str = "starttime";
/// End of the visibility window on the owning slide timeline (ms, exclusive)
pub const A_END_TIME: &str = "endtime";

// === Transform ===
/// Position (Vec3)
pub const A_POSITION: &str = "position";
/// Rotation in degrees (Vec3)
pub const A_ROTATION: &str = "rotation";
/// Scale (Vec3)
pub const A_SCALE: &str = "scale";
/// Pivot point (Vec3)
pub const A_PIVOT: &str = "pivot";
/// Opacity in percent (0-100)
pub const A_OPACITY: &str = "opacity";

// === Content ===
/// Text string for Text nodes
pub const A_TEXT: &str = "textstring";
/// Source path for Model meshes and Image textures
pub const A_SOURCE_PATH: &str = "sourcepath";
/// Diffuse color (Vec3)
pub const A_DIFFUSE: &str = "diffuse";
/// Light brightness
pub const A_BRIGHTNESS: &str = "brightness";
/// Camera field of view in degrees
pub const A_FOV: &str = "fov";
/// Referenced material id for ReferencedMaterial nodes
pub const A_REFERENCED_MATERIAL: &str = "referencedmaterial";

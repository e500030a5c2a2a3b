//! Demo Scene Host
//!
//! A small in-memory 3-D scene that plays the role of the host application:
//! it is the state the execution scheduler owns, and its command set is what
//! clients drive over the bridge.
//!
//! ## Commands
//!
//! | Command                | Parameters                                              |
//! |------------------------|---------------------------------------------------------|
//! | `get_scene_info`       | none                                                    |
//! | `create_object`        | `type`, `name`, `location`, `rotation`, `scale`         |
//! | `modify_object`        | `name`, `location`, `rotation`, `scale`, `visible`      |
//! | `delete_object`        | `name`                                                  |
//! | `get_object_info`      | `name`                                                  |
//! | `set_material`         | `object_name`, `material_name`, `create_if_missing`, `color` |
//! | `get_polyhaven_status` | none                                                    |
//! | `get_hyper3d_status`   | none                                                    |
//!
//! The asset library (`--polyhaven`) and generative model (`--hyper3d`)
//! groups register their command names behind feature flags. While a group
//! is disabled its names are unknown; once enabled they resolve but report
//! that the backend is not available in this host.

pub mod handlers;
pub mod model;

pub use model::{
    ApiKey, Hyper3dMode, Integrations, Material, MeshStats, ObjectKind, Primitive, Scene,
    SceneObject, Transform, DEFAULT_SCENE_NAME, HYPER3D_FLAG, POLYHAVEN_FLAG,
};

use crate::commands::CommandRegistry;

/// Builds a registry holding the scene's core commands.
pub fn command_registry() -> CommandRegistry<Scene> {
    let mut registry = CommandRegistry::new();
    handlers::register(&mut registry);
    registry
}

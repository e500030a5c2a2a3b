//! Scene Command Handlers
//!
//! The always-available command set of the demo host. Every handler
//! projects its parameters into a typed argument struct, so unknown fields
//! are ignored and missing required fields produce an `Invalid parameters`
//! error.

use crate::commands::{params, CommandRegistry, HandlerError};
use crate::protocol::Params;
use crate::scene::model::{
    MeshStats, ObjectKind, Scene, SceneObject, Transform, Vec3, HYPER3D_FLAG, POLYHAVEN_FLAG,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// How many objects `get_scene_info` lists
const SCENE_INFO_OBJECT_LIMIT: usize = 10;

/// Commands of the asset library group
pub const POLYHAVEN_COMMANDS: &[&str] = &[
    "get_polyhaven_categories",
    "search_polyhaven_assets",
    "download_polyhaven_asset",
    "set_texture",
];

/// Commands of the generative model group
pub const HYPER3D_COMMANDS: &[&str] = &[
    "create_rodin_job",
    "poll_rodin_job_status",
    "import_generated_asset",
];

/// Registers the core scene commands and the feature-gated groups.
pub fn register(registry: &mut CommandRegistry<Scene>) {
    registry
        .register("get_scene_info", get_scene_info)
        .register("create_object", create_object)
        .register("modify_object", modify_object)
        .register("delete_object", delete_object)
        .register("get_object_info", get_object_info)
        .register("set_material", set_material)
        .register("get_polyhaven_status", get_polyhaven_status)
        .register("get_hyper3d_status", get_hyper3d_status);

    for &name in POLYHAVEN_COMMANDS {
        registry.register_in(POLYHAVEN_FLAG, name, unavailable(name));
    }
    for &name in HYPER3D_COMMANDS {
        registry.register_in(HYPER3D_FLAG, name, unavailable(name));
    }
}

/// Handler for a gated command whose backend this host does not ship.
///
/// The name only resolves while its group is enabled; it then fails with a
/// message naming the command.
fn unavailable(
    name: &'static str,
) -> impl Fn(&mut Scene, Params) -> Result<Value, HandlerError> + Send + Sync + 'static {
    move |_: &mut Scene, _: Params| {
        Err(HandlerError::failed(format!(
            "Command {} is not available in this host",
            name
        )))
    }
}

/// Transform and geometry of an object as returned to clients.
#[derive(Debug, Serialize)]
struct ObjectInfo {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    location: Vec3,
    rotation: Vec3,
    scale: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    materials: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    world_bounding_box: Option<[Vec3; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<MeshStats>,
}

impl ObjectInfo {
    fn new(object: &SceneObject) -> Self {
        Self {
            name: object.name.clone(),
            kind: object.kind.type_name(),
            location: object.transform.location,
            rotation: object.transform.rotation,
            scale: object.transform.scale,
            visible: None,
            materials: None,
            world_bounding_box: object.world_bounding_box(),
            mesh: None,
        }
    }

    fn with_visibility(mut self, object: &SceneObject) -> Self {
        self.visible = Some(object.visible);
        self
    }
}

fn find<'a>(scene: &'a Scene, name: &str) -> Result<&'a SceneObject, HandlerError> {
    scene
        .object(name)
        .ok_or_else(|| HandlerError::not_found("Object", name))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn get_scene_info(scene: &mut Scene, _: Params) -> Result<Value, HandlerError> {
    let objects: Vec<Value> = scene
        .objects()
        .iter()
        .take(SCENE_INFO_OBJECT_LIMIT)
        .map(|obj| {
            let [x, y, z] = obj.transform.location;
            json!({
                "name": obj.name,
                "type": obj.kind.type_name(),
                "location": [round2(x), round2(y), round2(z)],
            })
        })
        .collect();

    Ok(json!({
        "name": scene.name,
        "object_count": scene.objects().len(),
        "objects": objects,
        "materials_count": scene.materials_count(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CreateArgs {
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    location: Vec3,
    rotation: Vec3,
    scale: Vec3,
}

impl Default for CreateArgs {
    fn default() -> Self {
        let transform = Transform::default();
        Self {
            kind: "CUBE".to_string(),
            name: None,
            location: transform.location,
            rotation: transform.rotation,
            scale: transform.scale,
        }
    }
}

fn create_object(scene: &mut Scene, params: Params) -> Result<ObjectInfo, HandlerError> {
    let args: CreateArgs = params::parse(params)?;
    let kind = ObjectKind::from_type_name(&args.kind)
        .ok_or_else(|| HandlerError::failed(format!("Unsupported object type: {}", args.kind)))?;

    let name = match args.name {
        Some(name) if !name.is_empty() => name,
        _ => kind.base_name().to_string(),
    };
    let transform = Transform {
        location: args.location,
        rotation: args.rotation,
        scale: args.scale,
    };

    let object = scene.add_object(SceneObject::new(name, kind, transform));
    debug!(object = %object.name, kind = object.kind.type_name(), "Created object");
    Ok(ObjectInfo::new(object))
}

#[derive(Debug, Deserialize)]
struct ModifyArgs {
    name: String,
    location: Option<Vec3>,
    rotation: Option<Vec3>,
    scale: Option<Vec3>,
    visible: Option<bool>,
}

fn modify_object(scene: &mut Scene, params: Params) -> Result<ObjectInfo, HandlerError> {
    let args: ModifyArgs = params::parse(params)?;
    let object = scene
        .object_mut(&args.name)
        .ok_or_else(|| HandlerError::not_found("Object", &args.name))?;

    if let Some(location) = args.location {
        object.transform.location = location;
    }
    if let Some(rotation) = args.rotation {
        object.transform.rotation = rotation;
    }
    if let Some(scale) = args.scale {
        object.transform.scale = scale;
    }
    if let Some(visible) = args.visible {
        object.visible = visible;
    }

    Ok(ObjectInfo::new(object).with_visibility(object))
}

#[derive(Debug, Deserialize)]
struct NameArgs {
    name: String,
}

fn delete_object(scene: &mut Scene, params: Params) -> Result<Value, HandlerError> {
    let args: NameArgs = params::parse(params)?;
    let removed = scene
        .remove_object(&args.name)
        .ok_or_else(|| HandlerError::not_found("Object", &args.name))?;
    Ok(json!({ "deleted": removed.name }))
}

fn get_object_info(scene: &mut Scene, params: Params) -> Result<ObjectInfo, HandlerError> {
    let args: NameArgs = params::parse(params)?;
    let object = find(scene, &args.name)?;

    let mut info = ObjectInfo::new(object).with_visibility(object);
    info.materials = Some(object.materials.clone());
    info.mesh = object.mesh_stats();
    Ok(info)
}

#[derive(Debug, Deserialize)]
struct MaterialArgs {
    object_name: String,
    material_name: Option<String>,
    #[serde(default = "default_true")]
    create_if_missing: bool,
    color: Option<Vec<f64>>,
}

fn default_true() -> bool {
    true
}

fn set_material(scene: &mut Scene, params: Params) -> Result<Value, HandlerError> {
    let args: MaterialArgs = params::parse(params)?;

    let object = find(scene, &args.object_name)?;
    if !object.accepts_materials() {
        return Err(HandlerError::failed(format!(
            "Object {} cannot accept materials",
            args.object_name
        )));
    }

    let material_name = match args.material_name {
        Some(name) => {
            if scene.material(&name).is_none() && !args.create_if_missing {
                return Err(HandlerError::failed(format!(
                    "Failed to create or find material: {}",
                    name
                )));
            }
            name
        }
        None => format!("{}_material", args.object_name),
    };

    let material = scene.material_or_create(&material_name);
    if let Some(color) = args.color.as_deref().filter(|c| c.len() >= 3) {
        material.base_color = [
            color[0],
            color[1],
            color[2],
            color.get(3).copied().unwrap_or(1.0),
        ];
    }

    if let Some(object) = scene.object_mut(&args.object_name) {
        // Only the first slot is replaced
        match object.materials.first_mut() {
            Some(slot) => *slot = material_name.clone(),
            None => object.materials.push(material_name.clone()),
        }
    }
    debug!(object = %args.object_name, material = %material_name, "Assigned material");

    Ok(json!({
        "object": args.object_name,
        "material": material_name,
        "color": args.color,
    }))
}

fn get_polyhaven_status(scene: &mut Scene, _: Params) -> Result<Value, HandlerError> {
    if scene.integrations().is_enabled(POLYHAVEN_FLAG) {
        return Ok(json!({
            "enabled": true,
            "message": "PolyHaven integration is enabled and ready to use.",
        }));
    }
    Ok(json!({
        "enabled": false,
        "message": "PolyHaven integration is currently disabled. \
                    Restart the bridge with --polyhaven to enable it.",
    }))
}

fn get_hyper3d_status(scene: &mut Scene, _: Params) -> Result<Value, HandlerError> {
    let integrations = scene.integrations();
    if !integrations.is_enabled(HYPER3D_FLAG) {
        return Ok(json!({
            "enabled": false,
            "message": "Hyper3D Rodin integration is currently disabled. \
                        Restart the bridge with --hyper3d to enable it.",
        }));
    }

    match &integrations.hyper3d_key {
        None => Ok(json!({
            "enabled": false,
            "message": "Hyper3D Rodin integration is currently enabled, but API key is not given. \
                        Restart the bridge with --hyper3d-api-key to provide one.",
        })),
        Some(key) => Ok(json!({
            "enabled": true,
            "message": format!(
                "Hyper3D Rodin integration is enabled and ready to use. Mode: {}. Key type: {}",
                integrations.hyper3d_mode,
                key.key_type()
            ),
        })),
    }
}

//! In-Memory Scene Model
//!
//! The host state behind the demo command set: an ordered list of objects,
//! a material library and the integration settings reported by the status
//! commands.
//!
//! The scene is plain data with no interior locking. It is only ever touched
//! by the execution scheduler's worker, which is the single writer.
//!
//! ## Geometry
//!
//! Mesh primitives carry their local bounds and topology counts. World-space
//! bounds are the axis-aligned box around the eight transformed corners of
//! the local box, with rotations applied as XYZ Euler angles (X first).

use crate::commands::FlagSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Feature flag enabling the asset library commands
pub const POLYHAVEN_FLAG: &str = "polyhaven";

/// Feature flag enabling the generative model commands
pub const HYPER3D_FLAG: &str = "hyper3d";

/// Default scene name
pub const DEFAULT_SCENE_NAME: &str = "Scene";

pub type Vec3 = [f64; 3];

/// Mesh primitives that can be added to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Cube,
    Sphere,
    Cylinder,
    Plane,
    Cone,
    Torus,
}

/// Vertex, edge and face counts of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeshStats {
    pub vertices: usize,
    pub edges: usize,
    pub polygons: usize,
}

impl Primitive {
    /// Base name given to new objects of this primitive.
    pub fn base_name(self) -> &'static str {
        match self {
            Primitive::Cube => "Cube",
            Primitive::Sphere => "Sphere",
            Primitive::Cylinder => "Cylinder",
            Primitive::Plane => "Plane",
            Primitive::Cone => "Cone",
            Primitive::Torus => "Torus",
        }
    }

    /// Local-space bounding box as `(min, max)`.
    pub fn local_bounds(self) -> (Vec3, Vec3) {
        match self {
            Primitive::Plane => ([-1.0, -1.0, 0.0], [1.0, 1.0, 0.0]),
            // Major radius 1, minor radius 0.25
            Primitive::Torus => ([-1.25, -1.25, -0.25], [1.25, 1.25, 0.25]),
            _ => ([-1.0; 3], [1.0; 3]),
        }
    }

    /// Topology of the primitive at its default resolution.
    pub fn mesh_stats(self) -> MeshStats {
        let (vertices, edges, polygons) = match self {
            Primitive::Cube => (8, 12, 6),
            Primitive::Plane => (4, 4, 1),
            // 32 segments, 16 rings
            Primitive::Sphere => (482, 992, 512),
            // 32 vertices per cap
            Primitive::Cylinder => (64, 96, 34),
            Primitive::Cone => (33, 64, 33),
            // 48 major by 12 minor segments
            Primitive::Torus => (576, 1152, 576),
        };
        MeshStats {
            vertices,
            edges,
            polygons,
        }
    }
}

/// What an object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Mesh(Primitive),
    Empty,
    Camera,
    Light,
}

impl ObjectKind {
    /// Parses the `type` argument of `create_object`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "CUBE" => ObjectKind::Mesh(Primitive::Cube),
            "SPHERE" => ObjectKind::Mesh(Primitive::Sphere),
            "CYLINDER" => ObjectKind::Mesh(Primitive::Cylinder),
            "PLANE" => ObjectKind::Mesh(Primitive::Plane),
            "CONE" => ObjectKind::Mesh(Primitive::Cone),
            "TORUS" => ObjectKind::Mesh(Primitive::Torus),
            "EMPTY" => ObjectKind::Empty,
            "CAMERA" => ObjectKind::Camera,
            "LIGHT" => ObjectKind::Light,
            _ => return None,
        };
        Some(kind)
    }

    /// The object type reported to clients.
    pub fn type_name(self) -> &'static str {
        match self {
            ObjectKind::Mesh(_) => "MESH",
            ObjectKind::Empty => "EMPTY",
            ObjectKind::Camera => "CAMERA",
            ObjectKind::Light => "LIGHT",
        }
    }

    pub fn base_name(self) -> &'static str {
        match self {
            ObjectKind::Mesh(primitive) => primitive.base_name(),
            ObjectKind::Empty => "Empty",
            ObjectKind::Camera => "Camera",
            ObjectKind::Light => "Point",
        }
    }

    pub fn primitive(self) -> Option<Primitive> {
        match self {
            ObjectKind::Mesh(primitive) => Some(primitive),
            _ => None,
        }
    }
}

/// Location, XYZ Euler rotation in radians, and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl Transform {
    /// Maps a local-space point to world space.
    pub fn apply(&self, point: Vec3) -> Vec3 {
        let scaled = [
            point[0] * self.scale[0],
            point[1] * self.scale[1],
            point[2] * self.scale[2],
        ];
        let rotated = rotate_xyz(scaled, self.rotation);
        [
            rotated[0] + self.location[0],
            rotated[1] + self.location[1],
            rotated[2] + self.location[2],
        ]
    }

    /// World-space axis-aligned box around a local box.
    pub fn world_bounds(&self, (min, max): (Vec3, Vec3)) -> [Vec3; 2] {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for corner in 0..8 {
            let local = [
                if corner & 1 == 0 { min[0] } else { max[0] },
                if corner & 2 == 0 { min[1] } else { max[1] },
                if corner & 4 == 0 { min[2] } else { max[2] },
            ];
            let world = self.apply(local);
            for axis in 0..3 {
                lo[axis] = lo[axis].min(world[axis]);
                hi[axis] = hi[axis].max(world[axis]);
            }
        }
        [lo, hi]
    }
}

/// Rotates about X, then Y, then Z.
fn rotate_xyz(p: Vec3, [rx, ry, rz]: Vec3) -> Vec3 {
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let (sz, cz) = rz.sin_cos();

    let p = [p[0], p[1] * cx - p[2] * sx, p[1] * sx + p[2] * cx];
    let p = [p[0] * cy + p[2] * sy, p[1], -p[0] * sy + p[2] * cy];
    [p[0] * cz - p[1] * sz, p[0] * sz + p[1] * cz, p[2]]
}

/// An object in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    pub visible: bool,
    /// Material slots, by material name
    pub materials: Vec<String>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind, transform: Transform) -> Self {
        Self {
            name: name.into(),
            kind,
            transform,
            visible: true,
            materials: Vec::new(),
        }
    }

    /// Only mesh objects have material slots.
    pub fn accepts_materials(&self) -> bool {
        self.kind.primitive().is_some()
    }

    /// World-space bounds, for meshes.
    pub fn world_bounding_box(&self) -> Option<[Vec3; 2]> {
        self.kind
            .primitive()
            .map(|primitive| self.transform.world_bounds(primitive.local_bounds()))
    }

    pub fn mesh_stats(&self) -> Option<MeshStats> {
        self.kind.primitive().map(Primitive::mesh_stats)
    }
}

/// A named surface material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA base color
    pub base_color: [f64; 4],
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [0.8, 0.8, 0.8, 1.0],
        }
    }
}

/// Which backend the generative model commands talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hyper3dMode {
    #[default]
    MainSite,
    FalAi,
}

impl fmt::Display for Hyper3dMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hyper3dMode::MainSite => write!(f, "MAIN_SITE"),
            Hyper3dMode::FalAi => write!(f, "FAL_AI"),
        }
    }
}

/// The kind of credential configured for the generative model backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKey {
    /// The shared, rate-limited trial key
    FreeTrial,
    Private(String),
}

impl ApiKey {
    /// Value that selects the trial key on the command line.
    pub const FREE_TRIAL: &'static str = "free-trial";

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            Self::FREE_TRIAL => Some(ApiKey::FreeTrial),
            key => Some(ApiKey::Private(key.to_string())),
        }
    }

    pub fn key_type(&self) -> &'static str {
        match self {
            ApiKey::FreeTrial => "free_trial",
            ApiKey::Private(_) => "private",
        }
    }
}

/// Integration settings read by the status commands.
#[derive(Clone)]
pub struct Integrations {
    pub flags: Arc<dyn FlagSource>,
    pub hyper3d_mode: Hyper3dMode,
    pub hyper3d_key: Option<ApiKey>,
}

impl Integrations {
    pub fn new(flags: Arc<dyn FlagSource>) -> Self {
        Self {
            flags,
            hyper3d_mode: Hyper3dMode::default(),
            hyper3d_key: None,
        }
    }

    pub fn is_enabled(&self, group: &str) -> bool {
        self.flags.snapshot().is_enabled(group)
    }
}

impl fmt::Debug for Integrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Integrations")
            .field("flags", &self.flags.snapshot())
            .field("hyper3d_mode", &self.hyper3d_mode)
            .field("hyper3d_key", &self.hyper3d_key.as_ref().map(ApiKey::key_type))
            .finish()
    }
}

/// The host application's document.
#[derive(Debug)]
pub struct Scene {
    pub name: String,
    objects: Vec<SceneObject>,
    materials: BTreeMap<String, Material>,
    integrations: Integrations,
}

impl Scene {
    pub fn new(name: impl Into<String>, integrations: Integrations) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            materials: BTreeMap::new(),
            integrations,
        }
    }

    /// Objects in creation order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|obj| obj.name == name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|obj| obj.name == name)
    }

    /// Adds an object, renaming it if its name is taken. Returns the
    /// object as stored.
    pub fn add_object(&mut self, mut object: SceneObject) -> &SceneObject {
        object.name = self.unique_name(&object.name);
        self.objects.push(object);
        let last = self.objects.len() - 1;
        &self.objects[last]
    }

    pub fn remove_object(&mut self, name: &str) -> Option<SceneObject> {
        let index = self.objects.iter().position(|obj| obj.name == name)?;
        Some(self.objects.remove(index))
    }

    /// Returns `base` if free, otherwise the first free `base.NNN`.
    pub fn unique_name(&self, base: &str) -> String {
        if self.object(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}.{:03}", base, n))
            .find(|candidate| self.object(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    pub fn materials_count(&self) -> usize {
        self.materials.len()
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.get_mut(name)
    }

    /// Returns the named material, creating it first if needed.
    pub fn material_or_create(&mut self, name: &str) -> &mut Material {
        self.materials
            .entry(name.to_string())
            .or_insert_with(|| Material::new(name))
    }

    pub fn integrations(&self) -> &Integrations {
        &self.integrations
    }
}

use std::collections::HashMap;

use glam::{Mat4, Vec3};
use log::warn;
use parking_lot::RwLock;

use crate::atlas::{CameraSpec, LightSpec};
use crate::bundle::AtlasBundle;
use crate::controls::LayerToggles;
use crate::mesh::{fallback_cube, load_obj_from_str, TriMesh};
use crate::model::{AtlasModel, StructureState};
use crate::picking::PickCandidate;
use crate::render::{CameraParams, DrawItem, LightParams};
use crate::selection::SelectionState;

/// Viewport dimensions shared between the event loop and the picking path.
#[derive(Debug)]
pub struct WindowViewport {
    size: RwLock<(u32, u32)>,
}

impl WindowViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: RwLock::new((width, height)),
        }
    }

    pub fn update(&self, width: u32, height: u32) {
        *self.size.write() = (width.max(1), height.max(1));
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.read()
    }
}

/// CPU-side triangle meshes kept for the picking loop. The renderer keeps
/// its own GPU copies; structures without a bundled mesh pick against the
/// fallback cube, mirroring what the renderer draws for them.
#[derive(Debug)]
pub struct MeshLibrary {
    meshes: HashMap<String, TriMesh>,
    fallback: TriMesh,
}

impl MeshLibrary {
    /// Loads every mesh entry in the bundle, skipping unparseable ones with
    /// a warning.
    pub fn from_bundle(bundle: &AtlasBundle) -> Self {
        let mut meshes = HashMap::new();
        for entry in bundle.mesh_entries() {
            let parsed = bundle
                .extract_entry(entry)
                .and_then(|bytes| {
                    String::from_utf8(bytes)
                        .map_err(|err| anyhow::anyhow!("{} is not UTF-8: {err}", entry.name))
                })
                .and_then(|text| load_obj_from_str(&text));
            match parsed {
                Ok(mesh) => {
                    meshes.insert(entry.name.clone(), mesh);
                }
                Err(err) => warn!("skipping mesh {}: {err:#}", entry.name),
            }
        }
        Self {
            meshes,
            fallback: fallback_cube(),
        }
    }

    pub fn get(&self, name: Option<&str>) -> &TriMesh {
        name.and_then(|name| self.meshes.get(name))
            .unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// Whether a structure passes the full visibility chain: its own flag plus
/// its layer's toggle. Decorative structures have no layer and follow only
/// their own flag.
pub fn is_shown(entry: &StructureState, layers: &LayerToggles) -> bool {
    entry.visible
        && entry
            .structure
            .region
            .map(|region| layers.is_visible(region))
            .unwrap_or(true)
}

/// Builds the frame's draw list: every shown structure with its transform
/// and the color of its current material variant.
pub fn build_draw_items(
    snapshot: &[StructureState],
    layers: &LayerToggles,
    selection: &SelectionState,
) -> Vec<DrawItem> {
    snapshot
        .iter()
        .filter(|entry| is_shown(entry, layers))
        .map(|entry| {
            let structure = &entry.structure;
            let variant = selection.material_for(&structure.name);
            DrawItem {
                name: structure.name.clone(),
                mesh: structure.mesh.clone(),
                transform: structure.model_matrix(),
                color: variant.tint(structure.color),
            }
        })
        .collect()
}

/// Builds the pick candidates from every shown structure. Decorative meshes
/// are included so they occlude structures behind them; the caller reads the
/// hit's `interactive` flag to decide whether the click does anything.
pub fn pick_candidates<'a>(
    snapshot: &'a [StructureState],
    layers: &LayerToggles,
    library: &'a MeshLibrary,
) -> Vec<PickCandidate<'a>> {
    snapshot
        .iter()
        .filter(|entry| is_shown(entry, layers))
        .map(|entry| PickCandidate {
            name: &entry.structure.name,
            transform: entry.structure.model_matrix(),
            mesh: library.get(entry.structure.mesh.as_deref()),
            interactive: entry.structure.is_interactive(),
        })
        .collect()
}

pub fn camera_params(camera: &CameraSpec, aspect: f32) -> CameraParams {
    let rotation_matrix = Mat4::from_rotation_z(camera.rotation.z.to_radians())
        * Mat4::from_rotation_y(camera.rotation.y.to_radians())
        * Mat4::from_rotation_x(camera.rotation.x.to_radians());
    let forward = (rotation_matrix * Vec3::new(0.0, 0.0, -1.0).extend(0.0)).truncate();
    let up = (rotation_matrix * Vec3::Y.extend(0.0)).truncate();
    let target = if forward.length_squared() > f32::EPSILON {
        camera.position + forward.normalize()
    } else {
        Vec3::ZERO
    };
    let view = Mat4::look_at_rh(camera.position, target, up);
    let projection =
        Mat4::perspective_rh_gl(camera.fov.to_radians(), aspect.max(0.01), 0.1, 100.0);
    CameraParams {
        view_proj: projection * view,
        position: camera.position,
    }
}

pub fn light_params(light: &LightSpec) -> LightParams {
    LightParams {
        position: light.position,
        color: light.color,
        intensity: light.intensity.max(0.1),
    }
}

/// Prints the structure census, used by summary mode and on shutdown.
pub fn print_census(model: &AtlasModel) {
    println!("Atlas structures:");
    for entry in model.snapshot() {
        let structure = &entry.structure;
        let region = structure
            .region
            .map(|region| region.label())
            .unwrap_or("decorative");
        println!(" - {} ({region})", structure.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{RegionKind, Structure};
    use crate::picking::{pick, Ray};
    use crate::selection::MaterialVariant;

    fn entry(name: &str, region: Option<RegionKind>, visible: bool) -> StructureState {
        StructureState {
            structure: Structure {
                name: name.to_string(),
                region,
                color: Vec3::new(0.3, 0.3, 0.3),
                ..Structure::default()
            },
            visible,
        }
    }

    #[test]
    fn hidden_layers_drop_out_of_the_draw_list() {
        let snapshot = vec![
            entry("Frontal Lobe", Some(RegionKind::Lobe), true),
            entry("Thalamus", Some(RegionKind::DeepStructure), true),
            entry("Head Shell", None, true),
        ];
        let mut layers = LayerToggles::default();
        layers.toggle(RegionKind::DeepStructure);

        let items = build_draw_items(&snapshot, &layers, &SelectionState::new());
        let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Frontal Lobe", "Head Shell"]);
    }

    #[test]
    fn selected_structures_draw_with_the_selected_tint() {
        let snapshot = vec![entry("Frontal Lobe", Some(RegionKind::Lobe), true)];
        let mut selection = SelectionState::new();
        selection.select(Some("Frontal Lobe"));

        let items = build_draw_items(&snapshot, &LayerToggles::default(), &selection);
        assert_eq!(
            items[0].color,
            MaterialVariant::Selected.tint(Vec3::new(0.3, 0.3, 0.3))
        );
    }

    #[test]
    fn hidden_structures_drop_out_while_decorative_ones_stay() {
        let snapshot = vec![
            entry("Frontal Lobe", Some(RegionKind::Lobe), true),
            entry("Head Shell", None, true),
            entry("Parietal Lobe", Some(RegionKind::Lobe), false),
        ];
        let library = MeshLibrary {
            meshes: HashMap::new(),
            fallback: fallback_cube(),
        };
        let candidates = pick_candidates(&snapshot, &LayerToggles::default(), &library);
        let names: Vec<_> = candidates
            .iter()
            .map(|candidate| (candidate.name, candidate.interactive))
            .collect();
        assert_eq!(names, vec![("Frontal Lobe", true), ("Head Shell", false)]);
    }

    #[test]
    fn decorative_meshes_occlude_structures_behind_them() {
        let mut shell = entry("Head Shell", None, true);
        shell.structure.position = Vec3::new(0.0, 0.0, 2.0);
        let snapshot = vec![shell, entry("Frontal Lobe", Some(RegionKind::Lobe), true)];
        let library = MeshLibrary {
            meshes: HashMap::new(),
            fallback: fallback_cube(),
        };

        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let hit = pick(&ray, pick_candidates(&snapshot, &LayerToggles::default(), &library))
            .unwrap();
        assert_eq!(hit.name, "Head Shell");
        assert!(!hit.interactive);
    }

    #[test]
    fn camera_params_look_down_the_rotated_forward_axis() {
        let camera = CameraSpec {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Vec3::ZERO,
            fov: 60.0,
        };
        let params = camera_params(&camera, 16.0 / 9.0);
        assert_eq!(params.position, camera.position);
        // A point in front of the camera lands in front of the near plane.
        let projected = params.view_proj.project_point3(Vec3::ZERO);
        assert!(projected.z > 0.0 && projected.z < 1.0);
    }

    #[test]
    fn light_intensity_is_floored() {
        let light = LightSpec {
            intensity: 0.0,
            ..LightSpec::default()
        };
        assert!((light_params(&light).intensity - 0.1).abs() < f32::EPSILON);
    }
}

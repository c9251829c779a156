//! Core modules for the neuro-atlas quiz runtime.
//!
//! The crate exposes high level building blocks that can be composed to
//! build bespoke anatomy viewers or tooling around the atlas content
//! format.  Rendering and platform integration live behind the `render`
//! module so that the interaction logic remains testable headlessly.

pub mod app;
pub mod atlas;
pub mod bundle;
pub mod controls;
pub mod hud;
pub mod input;
pub mod mesh;
pub mod model;
pub mod picking;
pub mod quiz;
pub mod render;
pub mod selection;

pub use atlas::{AtlasDocument, CameraSpec, LightSpec, RegionKind, Structure};
pub use bundle::{AtlasBundle, BundleBuilder, BundleFileEntry, EntryKind};
pub use controls::{ClipAxis, ClipConfig, ClipPlane, LayerToggles};
pub use hud::Hud;
pub use input::{InputState, KeyCode, MouseButton, NamedKey};
pub use mesh::{load_obj_from_str, TriMesh};
pub use model::{AtlasModel, StructureState};
pub use picking::{pick, PickCandidate, PickHit, Ray};
pub use quiz::{QuizController, QuizError, QuizMode, Verdict};
pub use render::{CameraParams, DrawItem, LightParams, Renderer};
pub use selection::{MaterialVariant, SelectionState};

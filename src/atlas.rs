use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

/// Anatomical layer a structure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Lobe,
    DeepStructure,
    CranialNerve,
}

impl RegionKind {
    pub const ALL: [RegionKind; 3] = [
        RegionKind::Lobe,
        RegionKind::DeepStructure,
        RegionKind::CranialNerve,
    ];

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "lobe" => Some(Self::Lobe),
            "deep" | "deep_structure" => Some(Self::DeepStructure),
            "nerve" | "cranial_nerve" => Some(Self::CranialNerve),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Lobe => "lobe",
            Self::DeepStructure => "deep structure",
            Self::CranialNerve => "cranial nerve",
        }
    }
}

/// Runtime representation of the anatomy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AtlasDocument {
    pub structures: Vec<Structure>,
    pub camera: Option<CameraSpec>,
    pub light: Option<LightSpec>,
}

impl AtlasDocument {
    /// Parses the atlas XML produced by the content tools.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid atlas XML")?;
        let mut structures = Vec::new();

        for node in document
            .descendants()
            .filter(|n| n.has_tag_name("structure"))
        {
            let mut structure = Structure::default();
            structure.name = required_text(&node, "name")?;
            structure.region = optional_text(&node, "region")
                .as_deref()
                .and_then(RegionKind::from_tag);
            structure.function = optional_text(&node, "function");
            structure.info = optional_text(&node, "info");
            structure.nerve_info = optional_text(&node, "nerve_info");
            structure.mesh = optional_text(&node, "mesh");
            structure.color = parse_color(optional_text(&node, "color"), structure.color)?;
            structure.position = parse_vec3(optional_text(&node, "position"), structure.position)?;
            structure.rotation = parse_vec3(optional_text(&node, "rotation"), structure.rotation)?;
            structure.scale = parse_vec3(optional_text(&node, "scale"), structure.scale)?;
            structures.push(structure);
        }

        let camera = document
            .descendants()
            .find(|n| n.has_tag_name("camera"))
            .map(|node| {
                Ok::<_, anyhow::Error>(CameraSpec {
                    position: parse_vec3(optional_text(&node, "position"), default_camera_pos())?,
                    rotation: parse_vec3(optional_text(&node, "rotation"), Vec3::ZERO)?,
                    fov: parse_f32(optional_text(&node, "fov"), default_fov())?,
                })
            })
            .transpose()?;

        let light = document
            .descendants()
            .find(|n| n.has_tag_name("light"))
            .map(|node| {
                Ok::<_, anyhow::Error>(LightSpec {
                    position: parse_vec3(optional_text(&node, "position"), default_light_pos())?,
                    color: parse_color(optional_text(&node, "color"), Vec3::ONE)?,
                    intensity: parse_f32(optional_text(&node, "intensity"), 1.0)?,
                })
            })
            .transpose()?;

        Ok(Self {
            structures,
            camera,
            light,
        })
    }

    /// Structures belonging to the given anatomical layer.
    pub fn structures_in(&self, region: RegionKind) -> impl Iterator<Item = &Structure> {
        self.structures
            .iter()
            .filter(move |s| s.region == Some(region))
    }

    /// Names of the structures in a layer, in document order.
    pub fn names_in(&self, region: RegionKind) -> Vec<String> {
        self.structures_in(region)
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }
}

/// Anatomical structure as described by the content tools.
///
/// A structure without a `region` is decorative (head shell, stand) and is
/// never a quiz target or pick candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nerve_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
}

impl Structure {
    pub fn is_interactive(&self) -> bool {
        self.region.is_some()
    }

    /// Detail line shown in the info panel: nerve metadata wins over the
    /// generic info text, which wins over the function description.
    pub fn detail(&self) -> Option<&str> {
        self.nerve_info
            .as_deref()
            .or(self.info.as_deref())
            .or(self.function.as_deref())
    }

    /// World transform, rotation applied Z then Y then X in degrees.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_scale(self.scale)
    }
}

impl Default for Structure {
    fn default() -> Self {
        Self {
            name: String::new(),
            region: None,
            function: None,
            info: None,
            nerve_info: None,
            mesh: None,
            color: default_color(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Camera placement stored in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: Vec3,
    pub rotation: Vec3,
    pub fov: f32,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            position: default_camera_pos(),
            rotation: Vec3::ZERO,
            fov: default_fov(),
        }
    }
}

/// Light placement stored in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for LightSpec {
    fn default() -> Self {
        Self {
            position: default_light_pos(),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn default_fov() -> f32 {
    45.0
}

fn default_camera_pos() -> Vec3 {
    Vec3::new(0.0, 0.5, 4.0)
}

fn default_light_pos() -> Vec3 {
    Vec3::new(3.0, 5.0, -3.0)
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let rgb = parse_vec3(value, default * 255.0).context("invalid color")?;
    Ok(rgb / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <atlas>
        <structure>
            <name>Frontal Lobe</name>
            <region>lobe</region>
            <function>Planning and voluntary movement</function>
            <color>255 128 0</color>
            <position>0 1 2</position>
        </structure>
        <structure>
            <name>Optic Nerve</name>
            <region>cranial_nerve</region>
            <nerve_info>CN II, carries visual information</nerve_info>
        </structure>
        <structure>
            <name>Head Shell</name>
        </structure>
        <camera>
            <position>0 0 5</position>
            <fov>60</fov>
        </camera>
        <light>
            <position>2 4 -1</position>
            <intensity>1.5</intensity>
        </light>
    </atlas>
    "#;

    #[test]
    fn parse_atlas_populates_structures() {
        let atlas = AtlasDocument::from_xml(SAMPLE).unwrap();
        assert_eq!(atlas.structures.len(), 3);

        let frontal = atlas.structure("Frontal Lobe").unwrap();
        assert_eq!(frontal.region, Some(RegionKind::Lobe));
        assert_eq!(frontal.position, Vec3::new(0.0, 1.0, 2.0));
        assert_eq!(frontal.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert!(frontal.is_interactive());

        let nerve = atlas.structure("Optic Nerve").unwrap();
        assert_eq!(nerve.region, Some(RegionKind::CranialNerve));
        assert_eq!(nerve.detail(), Some("CN II, carries visual information"));
    }

    #[test]
    fn structures_without_region_are_decorative() {
        let atlas = AtlasDocument::from_xml(SAMPLE).unwrap();
        let shell = atlas.structure("Head Shell").unwrap();
        assert!(!shell.is_interactive());
        assert!(atlas.names_in(RegionKind::DeepStructure).is_empty());
        assert_eq!(atlas.names_in(RegionKind::Lobe), vec!["Frontal Lobe"]);
    }

    #[test]
    fn parses_camera_and_light() {
        let atlas = AtlasDocument::from_xml(SAMPLE).unwrap();
        let camera = atlas.camera.unwrap();
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.fov, 60.0);
        let light = atlas.light.unwrap();
        assert!((light.intensity - 1.5).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<atlas><structure><region>lobe</region></structure></atlas>";
        assert!(AtlasDocument::from_xml(bad).is_err());
    }

    #[test]
    fn unknown_region_tag_is_decorative() {
        let xml = "<atlas><structure><name>X</name><region>vessel</region></structure></atlas>";
        let atlas = AtlasDocument::from_xml(xml).unwrap();
        assert!(!atlas.structures[0].is_interactive());
    }
}

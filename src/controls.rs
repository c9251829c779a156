use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::atlas::RegionKind;

/// Visibility flags for the three anatomical layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerToggles {
    pub lobes: bool,
    pub deep: bool,
    pub nerves: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            lobes: true,
            deep: true,
            nerves: true,
        }
    }
}

impl LayerToggles {
    pub fn is_visible(&self, region: RegionKind) -> bool {
        match region {
            RegionKind::Lobe => self.lobes,
            RegionKind::DeepStructure => self.deep,
            RegionKind::CranialNerve => self.nerves,
        }
    }

    pub fn toggle(&mut self, region: RegionKind) -> bool {
        let flag = match region {
            RegionKind::Lobe => &mut self.lobes,
            RegionKind::DeepStructure => &mut self.deep,
            RegionKind::CranialNerve => &mut self.nerves,
        };
        *flag = !*flag;
        *flag
    }
}

/// Axis the cross-section plane is perpendicular to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipAxis {
    #[default]
    X,
    Y,
    Z,
}

impl ClipAxis {
    pub fn unit(self) -> Vec3 {
        match self {
            Self::X => Vec3::X,
            Self::Y => Vec3::Y,
            Self::Z => Vec3::Z,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

/// Single cross-section plane configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipConfig {
    pub enabled: bool,
    pub axis: ClipAxis,
    pub offset: f32,
    pub negate: bool,
}

impl ClipConfig {
    /// The plane installed on the renderer, or `None` when clipping is off.
    pub fn plane(&self) -> Option<ClipPlane> {
        if !self.enabled {
            return None;
        }
        let sign = if self.negate { -1.0 } else { 1.0 };
        Some(ClipPlane {
            normal: self.axis.unit() * sign,
            constant: -self.offset * sign,
        })
    }

    pub fn nudge(&mut self, delta: f32) {
        self.offset += delta;
    }
}

/// Half-space keeping fragments where `dot(p, normal) + constant >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub constant: f32,
}

impl ClipPlane {
    pub fn keeps(&self, point: Vec3) -> bool {
        self.normal.dot(point) + self.constant >= 0.0
    }

    /// Packed `normal.xyz, constant` form for the shader uniform.
    pub fn as_vec4(&self) -> Vec4 {
        self.normal.extend(self.constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_start_visible_and_toggle() {
        let mut layers = LayerToggles::default();
        for region in RegionKind::ALL {
            assert!(layers.is_visible(region));
        }
        assert!(!layers.toggle(RegionKind::DeepStructure));
        assert!(!layers.is_visible(RegionKind::DeepStructure));
        assert!(layers.is_visible(RegionKind::Lobe));
        assert!(layers.toggle(RegionKind::DeepStructure));
    }

    #[test]
    fn disabled_clipping_installs_no_plane() {
        let config = ClipConfig::default();
        assert_eq!(config.plane(), None);
    }

    #[test]
    fn plane_keeps_the_positive_side() {
        let config = ClipConfig {
            enabled: true,
            axis: ClipAxis::X,
            offset: 0.5,
            negate: false,
        };
        let plane = config.plane().unwrap();
        assert!(plane.keeps(Vec3::new(1.0, 0.0, 0.0)));
        assert!(!plane.keeps(Vec3::new(0.0, 0.0, 0.0)));
        // The boundary itself is kept.
        assert!(plane.keeps(Vec3::new(0.5, 3.0, -2.0)));
    }

    #[test]
    fn negate_flips_the_kept_side() {
        let config = ClipConfig {
            enabled: true,
            axis: ClipAxis::Y,
            offset: -1.0,
            negate: true,
        };
        let plane = config.plane().unwrap();
        assert!(plane.keeps(Vec3::new(0.0, -2.0, 0.0)));
        assert!(!plane.keeps(Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn nudge_moves_the_offset() {
        let mut config = ClipConfig {
            enabled: true,
            axis: ClipAxis::Z,
            offset: 0.0,
            negate: false,
        };
        config.nudge(0.25);
        config.nudge(0.25);
        let plane = config.plane().unwrap();
        assert!((plane.constant + 0.5).abs() < f32::EPSILON);
        assert_eq!(plane.as_vec4().truncate(), Vec3::Z);
    }
}

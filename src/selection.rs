use glam::Vec3;

/// Material variant a structure renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterialVariant {
    #[default]
    Original,
    Highlight,
    Selected,
}

impl MaterialVariant {
    /// The color this variant renders with, derived from the structure's
    /// original material color.
    pub fn tint(self, base: Vec3) -> Vec3 {
        match self {
            Self::Original => base,
            Self::Highlight => base.lerp(Vec3::new(1.0, 0.85, 0.2), 0.55),
            Self::Selected => base.lerp(Vec3::new(1.0, 0.4, 0.1), 0.7),
        }
    }
}

/// Tracks the hovered and selected structures by name.
///
/// At most one structure is hovered and at most one is selected at any time;
/// everything else renders with its original material. Selection wins over
/// hover for the same structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    hovered: Option<String>,
    selected: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Moves the hover highlight. Passing `None` (pointer off every
    /// structure) clears it; the previous hover falls back to its original
    /// material unless it is the current selection.
    pub fn set_hover(&mut self, target: Option<&str>) {
        self.hovered = target.map(str::to_string);
    }

    /// Moves the selection, returning the previously selected name. Passing
    /// `None` (click that hit nothing) clears it.
    pub fn select(&mut self, target: Option<&str>) -> Option<String> {
        let previous = self.selected.take();
        self.selected = target.map(str::to_string);
        previous
    }

    /// Resolves the material variant the renderer should use for a structure.
    pub fn material_for(&self, name: &str) -> MaterialVariant {
        if self.selected.as_deref() == Some(name) {
            MaterialVariant::Selected
        } else if self.hovered.as_deref() == Some(name) {
            MaterialVariant::Highlight
        } else {
            MaterialVariant::Original
        }
    }
}

//! Material hatching patterns
//!
//! Materials are pure lookup keys: the renderer resolves a [`Material`] to a
//! [`HatchPattern`] and paints it, the scene only stores the key.

/// Construction materials that can be applied as a pattern fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Concrete,
    Brick,
    Insulation,
    Steel,
    Timber,
    Gravel,
    Earth,
}

/// Line-based hatch description consumed by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HatchPattern {
    /// Angle of the primary hatch lines in degrees
    pub angle: f64,
    /// Distance between hatch lines in pixels
    pub spacing: f64,
    /// Draw a second set of lines perpendicular to the first
    pub cross: bool,
    /// Scatter dots between the lines (aggregate materials)
    pub dotted: bool,
}

impl Material {
    pub const ALL: [Material; 7] = [
        Material::Concrete,
        Material::Brick,
        Material::Insulation,
        Material::Steel,
        Material::Timber,
        Material::Gravel,
        Material::Earth,
    ];

    /// Stable key used for pattern lookup and persistence
    pub fn key(&self) -> &'static str {
        match self {
            Material::Concrete => "concrete",
            Material::Brick => "brick",
            Material::Insulation => "insulation",
            Material::Steel => "steel",
            Material::Timber => "timber",
            Material::Gravel => "gravel",
            Material::Earth => "earth",
        }
    }

    /// Resolve a material from its key
    pub fn from_key(key: &str) -> Option<Material> {
        Material::ALL
            .iter()
            .copied()
            .find(|material| material.key().eq_ignore_ascii_case(key.trim()))
    }

    /// Hatch pattern the renderer paints for this material
    pub fn hatch(&self) -> HatchPattern {
        match self {
            Material::Concrete => HatchPattern {
                angle: 45.0,
                spacing: 12.0,
                cross: false,
                dotted: true,
            },
            Material::Brick => HatchPattern {
                angle: 45.0,
                spacing: 6.0,
                cross: false,
                dotted: false,
            },
            Material::Insulation => HatchPattern {
                angle: 60.0,
                spacing: 8.0,
                cross: true,
                dotted: false,
            },
            Material::Steel => HatchPattern {
                angle: 45.0,
                spacing: 4.0,
                cross: true,
                dotted: false,
            },
            Material::Timber => HatchPattern {
                angle: 0.0,
                spacing: 5.0,
                cross: false,
                dotted: false,
            },
            Material::Gravel => HatchPattern {
                angle: 0.0,
                spacing: 10.0,
                cross: false,
                dotted: true,
            },
            Material::Earth => HatchPattern {
                angle: 135.0,
                spacing: 10.0,
                cross: false,
                dotted: true,
            },
        }
    }
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

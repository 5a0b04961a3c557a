//! Static catalog of the backend's processing units.
//!
//! Built once at compile time and shared read-only for the process lifetime.

use serde::Serialize;

use crate::camera::Vec3;
use crate::constants::FALLBACK_COLOR;

/// One named, colored node representing a cognitive-processing module.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProcessingUnit {
    pub id: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub color: &'static str,
    pub position: Vec3,
}

const fn unit(
    id: &'static str,
    name: &'static str,
    region: &'static str,
    color: &'static str,
    position: [f64; 3],
) -> ProcessingUnit {
    ProcessingUnit {
        id,
        name,
        region,
        color,
        position: Vec3::new(position[0], position[1], position[2]),
    }
}

static UNITS: [ProcessingUnit; 9] = [
    unit(
        "LAB_001",
        "Emotional Salience",
        "Amygdala",
        "#FF3864",
        [-1.5, -0.5, 1.0],
    ),
    unit(
        "LAB_006",
        "Metacognition",
        "Lateral PFC",
        "#9B59B6",
        [1.0, 1.5, 0.5],
    ),
    unit(
        "LAB_007",
        "Predictive Preloading",
        "Dorsolateral PFC",
        "#3498DB",
        [1.5, 1.0, -0.5],
    ),
    unit(
        "LAB_008",
        "Emotional Contagion",
        "Limbic system",
        "#E67E22",
        [-1.0, -1.0, 0.0],
    ),
    unit(
        "LAB_009",
        "Memory Reconsolidation",
        "Hippocampus",
        "#2ECC71",
        [0.0, -1.5, 0.5],
    ),
    unit(
        "LAB_010",
        "Attention Mechanism",
        "Parietal cortex",
        "#F1C40F",
        [0.0, 1.5, -1.0],
    ),
    unit(
        "LAB_011",
        "Working Memory",
        "Temporal lobe",
        "#00D9FF",
        [-1.5, 0.0, -0.5],
    ),
    unit(
        "LAB_012",
        "Future Thinking",
        "Frontal lobe",
        "#FF6B9D",
        [1.5, 0.5, 1.0],
    ),
    unit(
        "LAB_028",
        "Emotional Intelligence",
        "Orbitofrontal cortex",
        "#C471ED",
        [0.5, -0.5, 1.5],
    ),
];

static CATALOG: Catalog = Catalog { units: &UNITS };

/// Read-only lookup over the processing units.
#[derive(Debug)]
pub struct Catalog {
    units: &'static [ProcessingUnit],
}

/// The process-wide unit catalog.
pub fn catalog() -> &'static Catalog {
    &CATALOG
}

impl Catalog {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static ProcessingUnit> + use<> {
        self.units.iter()
    }

    pub fn get(&self, id: &str) -> Option<&'static ProcessingUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Position of a unit in catalog order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    /// Color token for a unit; unknown ids get the neutral fallback.
    pub fn color_of(&self, id: &str) -> &'static str {
        self.get(id).map(|u| u.color).unwrap_or(FALLBACK_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_unique() {
        let ids: HashSet<_> = catalog().iter().map(|u| u.id).collect();
        assert_eq!(ids.len(), catalog().len());
    }

    #[test]
    fn test_lookup() {
        let cat = catalog();
        let hippo = cat.get("LAB_009").unwrap();
        assert_eq!(hippo.region, "Hippocampus");
        assert_eq!(hippo.position, Vec3::new(0.0, -1.5, 0.5));
        assert_eq!(cat.index_of("LAB_001"), Some(0));
        assert_eq!(cat.index_of("LAB_028"), Some(8));
        assert!(cat.get("LAB_999").is_none());
    }

    #[test]
    fn test_color_fallback() {
        assert_eq!(catalog().color_of("LAB_011"), "#00D9FF");
        assert_eq!(catalog().color_of("U7"), FALLBACK_COLOR);
    }
}

use serde::{Deserialize, Serialize};

/// The bit-exact detection class identifier map.
///
/// `id` is what the model and the wire protocol actually carry; the enum
/// exists so callers can match on a name instead of memorizing the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum DetectionClass {
    Hardhat = 0,
    Mask = 1,
    NoHardhat = 2,
    NoMask = 3,
    NoSafetyVest = 4,
    Person = 5,
    SafetyCone = 6,
    SafetyVest = 7,
    Machinery = 8,
    UtilityPole = 9,
    Vehicle = 10,
}

/// Reserved class id used by the deduplicator for zone-breach signatures,
/// which have no corresponding model output class (spec.md §4.3 step 2).
pub const ZONE_BREACH_CLASS_ID: i16 = -1;

impl DetectionClass {
    pub fn from_id(id: i16) -> Option<Self> {
        Some(match id {
            0 => Self::Hardhat,
            1 => Self::Mask,
            2 => Self::NoHardhat,
            3 => Self::NoMask,
            4 => Self::NoSafetyVest,
            5 => Self::Person,
            6 => Self::SafetyCone,
            7 => Self::SafetyVest,
            8 => Self::Machinery,
            9 => Self::UtilityPole,
            10 => Self::Vehicle,
            _ => return None,
        })
    }

    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hardhat => "Hardhat",
            Self::Mask => "Mask",
            Self::NoHardhat => "NO-Hardhat",
            Self::NoMask => "NO-Mask",
            Self::NoSafetyVest => "NO-Safety Vest",
            Self::Person => "Person",
            Self::SafetyCone => "Safety Cone",
            Self::SafetyVest => "Safety Vest",
            Self::Machinery => "Machinery",
            Self::UtilityPole => "Utility Pole",
            Self::Vehicle => "Vehicle",
        }
    }
}

/// Axis-aligned bounding box in the inference frame's pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn centroid(&self) -> (f32, f32) {
        (
            (self.x1 + self.x2) as f32 / 2.0,
            (self.y1 + self.y2) as f32 / 2.0,
        )
    }

    /// The top `frac` (e.g. 0.3 for the top 30%) of this box, used for the
    /// hardhat overlap test in §4.1.2.
    pub fn top_fraction(&self, frac: f32) -> BBox {
        let h = self.height() as f32;
        BBox {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y1 + (h * frac).round() as i32,
        }
    }

    /// Intersection-over-union. Returns 0.0 for non-overlapping boxes.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix2 <= ix1 || iy2 <= iy1 {
            return 0.0;
        }
        let inter = (ix2 - ix1) as i64 * (iy2 - iy1) as i64;
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// Transient per-frame detection produced by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class_id: i16,
    pub class_name: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox, class: DetectionClass, confidence: f32) -> Self {
        Self {
            bbox,
            class_id: class.id(),
            class_name: class.name().to_string(),
            confidence,
        }
    }

    pub fn class(&self) -> Option<DetectionClass> {
        DetectionClass::from_id(self.class_id)
    }
}

use ab_glyph::FontRef;
use image::RgbImage;
use pvs_types::{Detection, DetectionClass};

use crate::style::{self, GREEN, RED, YELLOW};

const HEAD_FRACTION: f32 = 0.30;
const OVERLAP_THRESHOLD: f32 = 0.1;

/// Draws PPE-compliance boxes over every detected person (spec.md §4.1.2,
/// grounded on `app/worker/vision.py::annotate_ppe`): a person's head region
/// is matched against hardhat/no-hardhat detections, and their full box
/// against vest/no-vest detections, by IoU > 0.1.
pub fn annotate_ppe(image: &mut RgbImage, detections: &[Detection], font: Option<&FontRef<'static>>) {
    let persons = by_class(detections, DetectionClass::Person);
    let hardhats = by_class(detections, DetectionClass::Hardhat);
    let no_hardhats = by_class(detections, DetectionClass::NoHardhat);
    let vests = by_class(detections, DetectionClass::SafetyVest);
    let no_vests = by_class(detections, DetectionClass::NoSafetyVest);

    for person in &persons {
        let head = person.bbox.top_fraction(HEAD_FRACTION);

        let has_no_hardhat = no_hardhats.iter().any(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD);
        let has_hardhat = hardhats.iter().any(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD);
        let has_no_vest = no_vests.iter().any(|d| person.bbox.iou(&d.bbox) > OVERLAP_THRESHOLD);
        let has_vest = vests.iter().any(|d| person.bbox.iou(&d.bbox) > OVERLAP_THRESHOLD);

        let mut violations = Vec::new();
        let mut compliant = Vec::new();

        if has_no_hardhat {
            violations.push("NO HAT");
        } else if has_hardhat {
            compliant.push("HAT");
        }

        if has_no_vest {
            violations.push("NO VEST");
        } else if has_vest {
            compliant.push("VEST");
        }

        let (color, label) = if !violations.is_empty() {
            (RED, violations.join(", "))
        } else if !compliant.is_empty() {
            (GREEN, compliant.join(", "))
        } else {
            (YELLOW, "?".to_string())
        };

        style::draw_box_with_label(image, &person.bbox, color, &label, font);
    }
}

fn by_class(detections: &[Detection], class: DetectionClass) -> Vec<&Detection> {
    detections.iter().filter(|d| d.class_id == class.id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvs_types::BBox;

    fn person(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(BBox { x1, y1, x2, y2 }, DetectionClass::Person, 0.9)
    }

    #[test]
    fn no_hardhat_overrides_hardhat_sighting() {
        let mut image = RgbImage::new(200, 200);
        let p = person(10, 10, 60, 110);
        let head = p.bbox.top_fraction(HEAD_FRACTION);
        let no_hat = Detection::new(head, DetectionClass::NoHardhat, 0.8);
        let dets = vec![p.clone(), no_hat];

        annotate_ppe(&mut image, &dets, None);

        let persons = by_class(&dets, DetectionClass::Person);
        let no_hardhats = by_class(&dets, DetectionClass::NoHardhat);
        let head = persons[0].bbox.top_fraction(HEAD_FRACTION);
        assert!(no_hardhats.iter().any(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD));
    }

    #[test]
    fn no_detections_nearby_is_unknown() {
        let p = person(10, 10, 60, 110);
        let dets = vec![p];
        let persons = by_class(&dets, DetectionClass::Person);
        let hardhats = by_class(&dets, DetectionClass::Hardhat);
        let no_hardhats = by_class(&dets, DetectionClass::NoHardhat);
        let head = persons[0].bbox.top_fraction(HEAD_FRACTION);
        assert!(!no_hardhats.iter().any(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD));
        assert!(!hardhats.iter().any(|d| head.iou(&d.bbox) > OVERLAP_THRESHOLD));
    }
}

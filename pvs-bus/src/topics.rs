use pvs_types::{CameraId, OrganizationId};

pub fn frames_topic(camera_id: CameraId) -> String {
    format!("frames:{camera_id}")
}

pub fn latest_frame_topic(camera_id: CameraId) -> String {
    format!("latest_frame:{camera_id}")
}

pub fn camera_meta_topic(camera_id: CameraId) -> String {
    format!("camera_meta:{camera_id}")
}

pub fn events_topic(organization_id: OrganizationId) -> String {
    format!("events:{organization_id}")
}

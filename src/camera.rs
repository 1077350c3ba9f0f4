use glam::{DMat3, DQuat, DVec3};

/// The eight scalar fields of a camera, in the order the manifest lists them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraField {
    PosX = 0,
    PosY,
    PosZ,
    RotX,
    RotY,
    RotZ,
    AspectRatio,
    FocalLength,
}

impl CameraField {
    pub const COUNT: usize = 8;

    pub const ALL: [CameraField; Self::COUNT] = [
        CameraField::PosX,
        CameraField::PosY,
        CameraField::PosZ,
        CameraField::RotX,
        CameraField::RotY,
        CameraField::RotZ,
        CameraField::AspectRatio,
        CameraField::FocalLength,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Pose and intrinsics of the camera that shot one image, within one coordinate system.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraParameters {
    pub camera_id: i32,
    pub coordinate_system: i32,
    pub image_id: i32,
    fields: [f64; CameraField::COUNT],
    pub distortion_radius: [f64; 2],
}

impl CameraParameters {
    pub fn new(camera_id: i32, coordinate_system: i32, image_id: i32) -> Self {
        Self {
            camera_id,
            coordinate_system,
            image_id,
            ..Default::default()
        }
    }

    #[inline]
    pub fn get(&self, field: CameraField) -> f64 {
        self.fields[field.index()]
    }

    #[inline]
    pub fn set(&mut self, field: CameraField, value: f64) {
        self.fields[field.index()] = value;
    }

    pub fn fields(&self) -> &[f64; CameraField::COUNT] {
        &self.fields
    }

    pub fn translation(&self) -> DVec3 {
        DVec3::new(
            self.get(CameraField::PosX),
            self.get(CameraField::PosY),
            self.get(CameraField::PosZ),
        )
    }

    /// The stored rotation is the vector part of a unit quaternion; the scalar part is
    /// recovered from the unit norm.
    pub fn rotation(&self) -> DQuat {
        let x = self.get(CameraField::RotX);
        let y = self.get(CameraField::RotY);
        let z = self.get(CameraField::RotZ);
        let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
        DQuat::from_xyzw(x, y, z, w).normalize()
    }

    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation())
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.get(CameraField::AspectRatio)
    }

    pub fn focal_length(&self) -> f64 {
        self.get(CameraField::FocalLength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_addressed_by_name() {
        let mut camera = CameraParameters::new(3, 0, 7);
        for (i, field) in CameraField::ALL.into_iter().enumerate() {
            camera.set(field, i as f64);
        }
        assert_eq!(camera.get(CameraField::PosY), 1.0);
        assert_eq!(camera.focal_length(), 7.0);
        assert_eq!(camera.translation(), DVec3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn zero_vector_part_is_identity() {
        let camera = CameraParameters::new(0, 0, 0);
        assert!(camera.rotation().abs_diff_eq(DQuat::IDENTITY, 1e-12));
        assert!(camera.rotation_matrix().abs_diff_eq(DMat3::IDENTITY, 1e-12));
    }

    #[test]
    fn rotation_recovers_scalar_part() {
        // 90 degrees around z
        let half = std::f64::consts::FRAC_PI_4;
        let mut camera = CameraParameters::new(0, 0, 0);
        camera.set(CameraField::RotZ, half.sin());

        let rotated = camera.rotation_matrix() * DVec3::X;
        assert!(rotated.abs_diff_eq(DVec3::Y, 1e-9));
    }
}

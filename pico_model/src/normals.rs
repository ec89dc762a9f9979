//! Compressed normal encodings shared by the id-tech formats.

use std::{
    f32::consts::{FRAC_PI_8, PI},
    sync::OnceLock,
};

use glam::Vec3;

const ANGLE_SCALE: f32 = PI / 128.0;
const POLAR_STEPS: usize = 16;
const AZIMUTH_STEPS: usize = 16;

/// Decodes a normal stored as two byte angles, `lat` being the polar angle and
/// `lng` the azimuth, both in units of `π/128`.
#[must_use]
pub fn decode_lat_lng(lat: u8, lng: u8) -> Vec3 {
    let lat = f32::from(lat) * ANGLE_SCALE;
    let lng = f32::from(lng) * ANGLE_SCALE;

    Vec3::new(lng.cos() * lat.sin(), lng.sin() * lat.sin(), lat.cos())
}

/// Inverse of [`decode_lat_lng`], for a unit length `normal`.
#[must_use]
pub fn encode_lat_lng(normal: Vec3) -> (u8, u8) {
    if normal.x == 0.0 && normal.y == 0.0 {
        return if normal.z > 0.0 { (0, 0) } else { (128, 0) };
    }

    let lat = normal.z.clamp(-1.0, 1.0).acos() / ANGLE_SCALE;
    let lng = normal.y.atan2(normal.x) / ANGLE_SCALE;

    (angle_byte(lat), angle_byte(lng))
}

#[allow(clippy::cast_sign_loss)]
fn angle_byte(angle: f32) -> u8 {
    (angle.round() as i32).rem_euclid(256) as u8
}

fn table() -> &'static [Vec3; 256] {
    static TABLE: OnceLock<[Vec3; 256]> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = [Vec3::ZERO; 256];

        for (i, normal) in table.iter_mut().enumerate() {
            let polar = (i / AZIMUTH_STEPS) as f32 * PI / (POLAR_STEPS - 1) as f32;
            let azimuth = (i % AZIMUTH_STEPS) as f32 * FRAC_PI_8;

            *normal = Vec3::new(
                polar.sin() * azimuth.cos(),
                polar.sin() * azimuth.sin(),
                polar.cos(),
            );
        }

        table
    })
}

/// Looks up an entry of the 256 direction unit sphere table.
///
/// Entry `p * 16 + a` points at polar angle `p * π / 15` and azimuth `a * π / 8`.
#[must_use]
pub fn anorm(index: u8) -> Vec3 {
    table()[usize::from(index)]
}

/// Finds the table entry closest to `normal`.
#[must_use]
pub fn nearest_anorm(normal: Vec3) -> u8 {
    let mut best = 0;
    let mut best_dot = f32::NEG_INFINITY;

    for (i, entry) in table().iter().enumerate() {
        let dot = entry.dot(normal);
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }

    best as u8
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn lat_lng_axes() {
        assert_relative_eq!(decode_lat_lng(0, 0), Vec3::Z);
        assert_relative_eq!(decode_lat_lng(64, 0), Vec3::X, epsilon = 1e-6);
        assert_relative_eq!(decode_lat_lng(64, 64), Vec3::Y, epsilon = 1e-6);
        assert_relative_eq!(decode_lat_lng(128, 0), -Vec3::Z, epsilon = 1e-6);
    }

    #[test]
    fn lat_lng_encoding_inverts_decoding() {
        for (lat, lng) in [(0, 0), (128, 0), (64, 64), (32, 200), (100, 17)] {
            let normal = decode_lat_lng(lat, lng);
            assert_relative_eq!(
                decode_lat_lng(encode_lat_lng(normal).0, encode_lat_lng(normal).1),
                normal,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn table_entries_are_unit_length() {
        for i in 0..=255 {
            assert_relative_eq!(anorm(i).length(), 1.0, epsilon = 1e-5);
        }
        assert_relative_eq!(anorm(0), Vec3::Z);
        assert_relative_eq!(anorm(240), -Vec3::Z, epsilon = 1e-6);
    }

    #[test]
    fn nearest_entry_round_trips() {
        for i in [1_u8, 17, 100, 200, 239] {
            assert_relative_eq!(anorm(nearest_anorm(anorm(i))), anorm(i));
        }
        assert_eq!(nearest_anorm(Vec3::Z), 0);
    }
}

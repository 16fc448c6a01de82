// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(unsafe_code)]
use mapbridge_ffi::*;
use proptest::prelude::*;

fn finite() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn target_size_round_trips(width in 1u32..=8192, height in 1u32..=8192) {
        prop_assert_eq!(mb_init(), mb_error_code::Ok);
        let requested = mb_size { width, height };
        let target = mb_render_target_create(requested, 1.0);
        prop_assert!(!target.is_null());
        let got = unsafe { mb_render_target_get_size(target) };
        unsafe { mb_render_target_destroy(target) };
        prop_assert_eq!(got, requested);
    }

    #[test]
    fn camera_round_trips_bit_for_bit(
        latitude in finite(),
        longitude in finite(),
        zoom in finite(),
        bearing in finite(),
        pitch in finite(),
    ) {
        prop_assert_eq!(mb_init(), mb_error_code::Ok);
        let target = mb_render_target_create(mb_size { width: 4, height: 4 }, 1.0);
        let map = unsafe { mb_map_create(target, 1.0, MB_MAP_MODE_TILE) };
        prop_assert!(!map.is_null());

        let camera = mb_camera_options { latitude, longitude, zoom, bearing, pitch };
        unsafe { mb_map_set_camera(map, &camera) };
        let got = unsafe { mb_map_get_camera(map) };
        unsafe {
            mb_map_destroy(map);
            mb_render_target_destroy(target);
        }

        prop_assert_eq!(got.latitude.to_bits(), latitude.to_bits());
        prop_assert_eq!(got.longitude.to_bits(), longitude.to_bits());
        prop_assert_eq!(got.zoom.to_bits(), zoom.to_bits());
        prop_assert_eq!(got.bearing.to_bits(), bearing.to_bits());
        prop_assert_eq!(got.pitch.to_bits(), pitch.to_bits());
    }
}

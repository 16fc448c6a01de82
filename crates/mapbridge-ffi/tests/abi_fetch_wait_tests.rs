// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(unsafe_code)]
use std::ffi::{c_void, CStr};
use std::time::Duration;

use mapbridge_ffi::bridge::set_fetch_timeout;
use mapbridge_ffi::*;

const STYLE: &[u8] = br#"{"version":8,"layers":[]}"#;

unsafe extern "C" fn sluggish(
    _request: *const mb_resource_request,
    response: *mut mb_resource_response,
    _user_data: *mut c_void,
) {
    std::thread::sleep(Duration::from_millis(400));
    let response = unsafe { &mut *response };
    response.data = STYLE.as_ptr();
    response.data_len = STYLE.len();
}

// Single test: the fetch wait is a process-wide setting.
#[test]
fn giving_up_on_a_slow_fetch_is_a_render_failure_not_a_timeout() {
    assert_eq!(mb_init(), mb_error_code::Ok);
    set_fetch_timeout(Duration::from_millis(30));

    let target = mb_render_target_create(mb_size { width: 4, height: 4 }, 1.0);
    let map = unsafe {
        mb_map_create_with_loader(
            target,
            1.0,
            MB_MAP_MODE_STATIC,
            Some(sluggish),
            std::ptr::null_mut(),
        )
    };
    assert!(!map.is_null());
    assert_eq!(
        unsafe { mb_map_load_style_url(map, c"https://maps.example/style.json".as_ptr()) },
        mb_error_code::Ok
    );

    let mut image = mb_image_data::empty();
    let code = unsafe { mb_map_render_still(map, std::ptr::null(), &mut image) };
    assert_eq!(code, mb_error_code::RenderFailed);
    assert!(image.data.is_null());
    let msg = unsafe { CStr::from_ptr(mb_get_last_error()) }.to_string_lossy().into_owned();
    assert!(msg.contains("still outstanding"), "{msg}");
    assert!(!unsafe { mb_map_is_fully_loaded(map) });

    // The fetch keeps running and a later render picks it up.
    std::thread::sleep(Duration::from_millis(600));
    let code = unsafe { mb_map_render_still(map, std::ptr::null(), &mut image) };
    assert_eq!(code, mb_error_code::Ok);
    assert_eq!((image.width, image.height), (4, 4));
    unsafe {
        mb_image_free(&mut image);
        mb_map_destroy(map);
        mb_render_target_destroy(target);
    }
}

//! FFI bindings for MirrorMind
//!
//! C-compatible functions so a host application (camera UI, dashboard) can feed
//! signals and read classifications. All strings are null-terminated UTF-8; strings
//! returned by this module must be freed with `mirrormind_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::time::Duration;

use crate::aggregator::ObservationAggregator;
use crate::classifier::LoopClassifier;
use crate::types::{SessionSnapshot, Signal};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Classify a session snapshot given as JSON.
///
/// Returns `{"loop_type": ..., "break_suggested": ..., "context": ...}`.
///
/// # Safety
/// - `snapshot_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mirrormind_free_string`.
/// - Returns NULL on error; call `mirrormind_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_classify_snapshot(snapshot_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json) = cstr_to_str(snapshot_json) else {
        set_last_error("Invalid snapshot string pointer");
        return ptr::null_mut();
    };

    let snapshot: SessionSnapshot = match serde_json::from_str(json) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            set_last_error(&format!("Invalid snapshot JSON: {}", e));
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&LoopClassifier::evaluate(&snapshot)) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Aggregator API
// ============================================================================

/// Opaque handle to an in-progress session
pub struct AggregatorHandle {
    aggregator: ObservationAggregator,
}

/// Start a new session.
///
/// # Safety
/// - Returns a pointer that must be released with `mirrormind_aggregator_finish`
///   or `mirrormind_aggregator_free`.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_aggregator_new() -> *mut AggregatorHandle {
    clear_last_error();
    Box::into_raw(Box::new(AggregatorHandle {
        aggregator: ObservationAggregator::new(),
    }))
}

/// Fold one frame's signal (JSON) into the session.
///
/// Returns 1 if the frame completed a blink, 0 if not, -1 on error.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `mirrormind_aggregator_new`.
/// - `signal_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_aggregator_observe(
    handle: *mut AggregatorHandle,
    signal_json: *const c_char,
) -> c_int {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null aggregator pointer");
        return -1;
    }
    let handle = &mut *handle;

    let Some(json) = cstr_to_str(signal_json) else {
        set_last_error("Invalid signal string pointer");
        return -1;
    };

    match serde_json::from_str::<Signal>(json) {
        Ok(signal) => c_int::from(handle.aggregator.observe(&signal)),
        Err(e) => {
            set_last_error(&format!("Invalid signal JSON: {}", e));
            -1
        }
    }
}

/// End the session and return its snapshot as JSON.
///
/// The handle is consumed by this call, even when it fails.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `mirrormind_aggregator_new`.
/// - After calling this function, the pointer is invalid.
/// - Returns a newly allocated string that must be freed with `mirrormind_free_string`.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_aggregator_finish(
    handle: *mut AggregatorHandle,
    elapsed_sec: f64,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null aggregator pointer");
        return ptr::null_mut();
    }
    let handle = Box::from_raw(handle);

    let elapsed = Duration::try_from_secs_f64(elapsed_sec).unwrap_or(Duration::ZERO);
    let snapshot = handle.aggregator.finish(elapsed);

    match serde_json::to_string(&snapshot) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Discard a session without finishing it.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `mirrormind_aggregator_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_aggregator_free(handle: *mut AggregatorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// Memory & Errors
// ============================================================================

/// Free a string returned by MirrorMind functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a MirrorMind function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - The returned pointer is valid until the next MirrorMind call on this thread.
/// - Do NOT free the returned pointer. Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn mirrormind_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        mirrormind_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_classify_snapshot() {
        let json = CString::new(
            r#"{"face_detected": true, "eyes_detected": true, "scroll_detected": true, "duration_sec": 12.0}"#,
        )
        .unwrap();

        unsafe {
            let result = take_string(mirrormind_classify_snapshot(json.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&result).unwrap();
            assert_eq!(value["loop_type"], "ConsumptionLoop");
            assert_eq!(value["break_suggested"], false);
        }
    }

    #[test]
    fn test_ffi_aggregator_lifecycle() {
        let closed = CString::new(r#"{"face_detected": true, "eyes_detected": true, "eye_closed": true}"#).unwrap();
        let open = CString::new(r#"{"face_detected": true, "eyes_detected": true, "eye_closed": false}"#).unwrap();

        unsafe {
            let handle = mirrormind_aggregator_new();
            assert_eq!(mirrormind_aggregator_observe(handle, closed.as_ptr()), 0);
            assert_eq!(mirrormind_aggregator_observe(handle, open.as_ptr()), 1);

            let snapshot = take_string(mirrormind_aggregator_finish(handle, 4.0));
            let value: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
            assert_eq!(value["blink_count"], 1);
            assert_eq!(value["frame_count"], 2);
            assert_eq!(value["duration_sec"], 4.0);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let bad = CString::new("not json").unwrap();

        unsafe {
            assert!(mirrormind_classify_snapshot(bad.as_ptr()).is_null());
            assert!(!mirrormind_last_error().is_null());

            let handle = mirrormind_aggregator_new();
            assert!(mirrormind_last_error().is_null());
            assert_eq!(mirrormind_aggregator_observe(handle, bad.as_ptr()), -1);
            assert_eq!(mirrormind_aggregator_observe(ptr::null_mut(), bad.as_ptr()), -1);
            mirrormind_aggregator_free(handle);

            assert!(mirrormind_classify_snapshot(ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = CStr::from_ptr(mirrormind_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}

//! FFI bindings for Synheart Calm
//!
//! C-compatible functions for driving a [`CalmEngine`] from a host app.
//! Strings are null-terminated; strings returned by these functions are
//! allocated here and must be freed with `calm_free_string`.
//!
//! Action functions return `0` when the action was applied, `1` when it does
//! not apply to the current phase (ignored, not an error), and `-1` on error.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::engine::{CalmEngine, MAX_ADVANCE};
use crate::signals::HandFrame;
use crate::store::SessionStore;
use crate::types::Emotion;

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

/// Convert a C string; `None` for NULL or invalid UTF-8
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert to an owned C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn action_result(applied: bool) -> i32 {
    if applied {
        0
    } else {
        1
    }
}

/// Opaque handle to a CalmEngine
pub struct CalmEngineHandle {
    engine: CalmEngine,
}

/// Borrow the engine behind a handle, recording an error for NULL
unsafe fn engine_mut<'a>(handle: *mut CalmEngineHandle) -> Option<&'a mut CalmEngine> {
    if handle.is_null() {
        set_last_error("Null engine pointer");
        return None;
    }
    Some(&mut (*handle).engine)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create an engine.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated JSON config.
/// - `store_path` may be NULL (in-memory store) or a valid null-terminated path.
/// - Returns NULL on error; call `calm_last_error` for the message.
/// - Must be freed with `calm_engine_free`.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_new(
    config_json: *const c_char,
    store_path: *const c_char,
) -> *mut CalmEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let store = if store_path.is_null() {
        SessionStore::in_memory()
    } else {
        match cstr_to_string(store_path) {
            Some(path) => SessionStore::open(path),
            None => {
                set_last_error("Invalid store path pointer");
                return ptr::null_mut();
            }
        }
    };

    match CalmEngine::with_store(config, store) {
        Ok(engine) => Box::into_raw(Box::new(CalmEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a pointer returned by `calm_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_free(engine: *mut CalmEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Select an emotion by name ("calm", "anxiety", ...).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - `emotion` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_select_emotion(
    engine: *mut CalmEngineHandle,
    emotion: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    let name = match cstr_to_string(emotion) {
        Some(s) => s,
        None => {
            set_last_error("Invalid emotion string pointer");
            return -1;
        }
    };

    match name.parse::<Emotion>() {
        Ok(emotion) => action_result(engine.select_emotion(emotion)),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Answer the log prompt (`log` non-zero means yes).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_answer_log(engine: *mut CalmEngineHandle, log: i32) -> i32 {
    clear_last_error();
    match engine_mut(engine) {
        Some(engine) => action_result(engine.answer_log(log != 0)),
        None => -1,
    }
}

/// Start stabilizing.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_restore_balance(engine: *mut CalmEngineHandle) -> i32 {
    clear_last_error();
    match engine_mut(engine) {
        Some(engine) => action_result(engine.restore_balance()),
        None => -1,
    }
}

/// Return to hidden from any phase.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_clear(engine: *mut CalmEngineHandle) -> i32 {
    clear_last_error();
    match engine_mut(engine) {
        Some(engine) => action_result(engine.clear()),
        None => -1,
    }
}

/// Advance the engine clock.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - Returns -1 for spans longer than one hour.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_advance_ms(engine: *mut CalmEngineHandle, ms: u64) -> i32 {
    clear_last_error();
    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    let dt = Duration::from_millis(ms);
    if dt > MAX_ADVANCE {
        set_last_error(&format!("Advance of {ms} ms exceeds the one hour limit"));
        return -1;
    }
    engine.advance(dt);
    0
}

// ============================================================================
// Signal input
// ============================================================================

/// Push one audio frame of `len` mono samples.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - `samples` must point to `len` readable `f32` values (may be NULL if `len` is 0).
/// - Returns 1 when the breathing input is not running.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_push_audio(
    engine: *mut CalmEngineHandle,
    samples: *const f32,
    len: usize,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };
    if samples.is_null() && len > 0 {
        set_last_error("Null samples pointer");
        return -1;
    }

    let frame: &[f32] = if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(samples, len)
    };
    action_result(engine.push_audio(frame))
}

/// Push one pose frame as JSON (`{"landmarks": {"wrist": {"x":..,"y":..,"confidence":..}}}`).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 1 when the hand input is not running.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_push_hand_json(
    engine: *mut CalmEngineHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match HandFrame::from_json(&json_str) {
        Ok(frame) => action_result(engine.push_hand(&frame)),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Current engine snapshot as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - Returns a newly allocated string that must be freed with `calm_free_string`.
/// - Returns NULL on error; call `calm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_snapshot_json(engine: *mut CalmEngineHandle) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };

    match serde_json::to_string(&engine.snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Recorded sessions as a JSON array.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `calm_engine_new`.
/// - Returns a newly allocated string that must be freed with `calm_free_string`.
/// - Returns NULL on error; call `calm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn calm_engine_sessions_json(engine: *mut CalmEngineHandle) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };

    match engine.store().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Calm functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Calm function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn calm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Calm function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn calm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn calm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CString {
        CString::new(r#"{"geometry": {"point_count": 200, "seed": 1}}"#).unwrap()
    }

    unsafe fn snapshot(engine: *mut CalmEngineHandle) -> serde_json::Value {
        let json = calm_engine_snapshot_json(engine);
        assert!(!json.is_null());
        let value = serde_json::from_str(CStr::from_ptr(json).to_str().unwrap()).unwrap();
        calm_free_string(json);
        value
    }

    #[test]
    fn test_ffi_engine_lifecycle() {
        unsafe {
            let config = small_config();
            let engine = calm_engine_new(config.as_ptr(), ptr::null());
            assert!(!engine.is_null());

            let anxiety = CString::new("anxiety").unwrap();
            assert_eq!(calm_engine_select_emotion(engine, anxiety.as_ptr()), 0);
            // Second selection does not apply outside hidden
            assert_eq!(calm_engine_select_emotion(engine, anxiety.as_ptr()), 1);

            let samples = [0.01f32, -0.01, 0.01, -0.01];
            assert_eq!(calm_engine_push_audio(engine, samples.as_ptr(), samples.len()), 0);

            let hand = CString::new(
                r#"{"landmarks": {"wrist": {"x": 0.5, "y": 0.5, "confidence": 0.9}}}"#,
            )
            .unwrap();
            assert_eq!(calm_engine_push_hand_json(engine, hand.as_ptr()), 0);

            assert_eq!(calm_engine_advance_ms(engine, 5000), 0);
            assert_eq!(snapshot(engine)["phase"], "logPrompt");

            assert_eq!(calm_engine_answer_log(engine, 1), 0);
            assert_eq!(calm_engine_restore_balance(engine), 0);
            assert_eq!(snapshot(engine)["phase"], "stabilizing");

            assert_eq!(calm_engine_clear(engine), 0);
            assert_eq!(snapshot(engine)["phase"], "hidden");

            let sessions = calm_engine_sessions_json(engine);
            assert_eq!(CStr::from_ptr(sessions).to_str().unwrap(), "[]");
            calm_free_string(sessions);

            calm_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad = CString::new("not json").unwrap();
            let engine = calm_engine_new(bad.as_ptr(), ptr::null());
            assert!(engine.is_null());
            let error = calm_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let engine = calm_engine_new(ptr::null(), ptr::null());
            let bored = CString::new("bored").unwrap();
            assert_eq!(calm_engine_select_emotion(engine, bored.as_ptr()), -1);
            assert!(!calm_last_error().is_null());

            assert_eq!(calm_engine_push_hand_json(engine, bad.as_ptr()), -1);
            assert_eq!(calm_engine_answer_log(ptr::null_mut(), 1), -1);
            calm_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_inputs_closed_while_hidden() {
        unsafe {
            let config = small_config();
            let engine = calm_engine_new(config.as_ptr(), ptr::null());
            let samples = [0.1f32; 8];
            assert_eq!(calm_engine_push_audio(engine, samples.as_ptr(), samples.len()), 1);
            calm_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_rejects_unsafe_config_and_spans() {
        unsafe {
            let zero_cap = CString::new(r#"{"animation": {"max_impulses": 0}}"#).unwrap();
            assert!(calm_engine_new(zero_cap.as_ptr(), ptr::null()).is_null());
            assert!(CStr::from_ptr(calm_last_error())
                .to_str()
                .unwrap()
                .contains("max_impulses"));

            let config = small_config();
            let engine = calm_engine_new(config.as_ptr(), ptr::null());
            assert_eq!(calm_engine_advance_ms(engine, u64::MAX), -1);
            assert!(!calm_last_error().is_null());
            assert_eq!(calm_engine_advance_ms(engine, 3_600_000), 0);
            assert_eq!(calm_engine_advance_ms(engine, 1), 0);
            let clock = snapshot(engine)["clock_sec"].as_f64().unwrap();
            assert!((clock - 3600.001).abs() < 1e-9);
            calm_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_malformed_hand_frame() {
        unsafe {
            let config = small_config();
            let engine = calm_engine_new(config.as_ptr(), ptr::null());
            let hand = CString::new(r#"{"landmarks": []}"#).unwrap();
            assert_eq!(calm_engine_push_hand_json(engine, hand.as_ptr()), -1);
            assert!(CStr::from_ptr(calm_last_error())
                .to_str()
                .unwrap()
                .starts_with("Invalid frame"));
            calm_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = calm_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}

//! FFI layer for non-Rust hosts.
//!
//! This module provides C-compatible functions for editors written in other
//! languages. All documents, values and update batches cross the boundary as
//! JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `pathwise_*` functions are allocated by Rust
//! - Caller must free them with `pathwise_string_free`
//! - Collector pointers must be freed with `pathwise_collector_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{apply_updates, is_empty_updates, merge_updates, Path, UpdateCollector, Updates};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

impl<T: serde::Serialize> From<crate::error::Result<T>> for FfiResult<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => FfiResult::ok(value),
            Err(e) => FfiResult::err(e.to_string()),
        }
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `pathwise_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .unwrap_or_default()
            .into_raw(),
    }
}

fn respond<T: serde::Serialize>(result: FfiResult<T>) -> *mut c_char {
    to_c_string(result.to_json())
}

fn fail(message: impl Into<String>) -> *mut c_char {
    respond(FfiResult::<()>::err(message))
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Decode a JSON argument, naming it in the error message.
unsafe fn parse_arg<T: DeserializeOwned>(ptr: *const c_char, what: &str) -> Result<T, String> {
    let text = from_c_string(ptr).ok_or_else(|| format!("invalid {}", what))?;
    serde_json::from_str(&text).map_err(|e| format!("parse error in {}: {}", what, e))
}

unsafe fn parse_path(ptr: *const c_char) -> Result<Path, String> {
    let text = from_c_string(ptr).ok_or_else(|| "invalid path".to_string())?;
    Path::compile(&text).map_err(|e| e.to_string())
}

// ============================================================================
// Documents
// ============================================================================

/// Read the value at a path.
///
/// # Returns
/// JSON string: `{"ok": value}`, `{"ok": null}` when nothing is there, or
/// `{"error": "message"}`
///
/// # Safety
/// - `doc_json` and `path` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_path_get(
    doc_json: *const c_char,
    path: *const c_char,
) -> *mut c_char {
    let doc: Value = match parse_arg(doc_json, "document") {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let path = match parse_path(path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    respond(FfiResult::ok(path.get(&doc)))
}

/// Write a value at a path, creating missing containers.
///
/// # Returns
/// JSON string: `{"ok": document}` or `{"error": "message"}`
///
/// # Safety
/// - `doc_json`, `path` and `value_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_path_set(
    doc_json: *const c_char,
    path: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let mut doc: Value = match parse_arg(doc_json, "document") {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let path = match parse_path(path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let value: Value = match parse_arg(value_json, "value") {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(path.set(&mut doc, value).map(|()| doc)))
}

/// Remove the value at a path.
///
/// # Returns
/// JSON string: `{"ok": document}` or `{"error": "message"}`
///
/// # Safety
/// - `doc_json` and `path` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_path_unset(
    doc_json: *const c_char,
    path: *const c_char,
) -> *mut c_char {
    let mut doc: Value = match parse_arg(doc_json, "document") {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let path = match parse_path(path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(path.unset(&mut doc).map(|()| doc)))
}

// ============================================================================
// Updates
// ============================================================================

/// Replay an update batch against a document.
///
/// # Returns
/// JSON string: `{"ok": document}` or `{"error": "message"}`
///
/// # Safety
/// - `doc_json` and `updates_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_apply_updates(
    doc_json: *const c_char,
    updates_json: *const c_char,
) -> *mut c_char {
    let mut doc: Value = match parse_arg(doc_json, "document") {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let updates: Updates = match parse_arg(updates_json, "updates") {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(apply_updates(&mut doc, &updates).map(|()| doc)))
}

/// Concatenate two update batches.
///
/// # Returns
/// JSON string: `{"ok": updates}` or `{"error": "message"}`
///
/// # Safety
/// - `a_json` and `b_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_merge_updates(
    a_json: *const c_char,
    b_json: *const c_char,
) -> *mut c_char {
    let a: Updates = match parse_arg(a_json, "updates") {
        Ok(u) => u,
        Err(e) => return fail(e),
    };
    let b: Updates = match parse_arg(b_json, "updates") {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    respond(FfiResult::ok(merge_updates(&a, &b)))
}

/// Check whether an update batch has neither `$set` nor `$unset`.
///
/// # Returns
/// 1 if empty, 0 if not, -1 if the argument is not a valid batch.
///
/// # Safety
/// - `updates_json` must be a valid null-terminated C string or null
#[no_mangle]
pub unsafe extern "C" fn pathwise_is_empty_updates(updates_json: *const c_char) -> i32 {
    match parse_arg::<Updates>(updates_json, "updates") {
        Ok(updates) => i32::from(is_empty_updates(&updates)),
        Err(_) => -1,
    }
}

// ============================================================================
// Collector Lifecycle
// ============================================================================

/// Create an empty update collector.
///
/// Caller must free the returned pointer with `pathwise_collector_free`.
#[no_mangle]
pub extern "C" fn pathwise_collector_new() -> *mut UpdateCollector {
    Box::into_raw(Box::new(UpdateCollector::new()))
}

/// Free a collector.
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_free(collector: *mut UpdateCollector) {
    if !collector.is_null() {
        drop(Box::from_raw(collector));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `pathwise_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn pathwise_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Collector Operations
// ============================================================================

/// Stage a write.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
/// - `path` and `value_json` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_set(
    collector: *mut UpdateCollector,
    path: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    let collector = match collector.as_mut() {
        Some(c) => c,
        None => return fail("null collector pointer"),
    };
    let path = match parse_path(path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let value: Value = match parse_arg(value_json, "value") {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(collector.set(path, value)))
}

/// Stage a deletion.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
/// - `path` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_unset(
    collector: *mut UpdateCollector,
    path: *const c_char,
) -> *mut c_char {
    let collector = match collector.as_mut() {
        Some(c) => c,
        None => return fail("null collector pointer"),
    };
    let path = match parse_path(path) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(collector.unset(path)))
}

/// Stage every entry of an update batch.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
/// - `updates_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_merge(
    collector: *mut UpdateCollector,
    updates_json: *const c_char,
) -> *mut c_char {
    let collector = match collector.as_mut() {
        Some(c) => c,
        None => return fail("null collector pointer"),
    };
    let updates: Updates = match parse_arg(updates_json, "updates") {
        Ok(u) => u,
        Err(e) => return fail(e),
    };

    respond(FfiResult::from(collector.merge(&updates)))
}

/// Snapshot the staged entries as an update batch.
///
/// # Returns
/// JSON string: `{"ok": updates}` or `{"error": "message"}`
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
/// - Caller must free the returned string with `pathwise_string_free`
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_create_updates(
    collector: *const UpdateCollector,
) -> *mut c_char {
    let collector = match collector.as_ref() {
        Some(c) => c,
        None => return fail("null collector pointer"),
    };

    respond(FfiResult::ok(collector.create_updates()))
}

/// Drop everything staged.
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_clear(collector: *mut UpdateCollector) {
    if let Some(collector) = collector.as_mut() {
        collector.clear();
    }
}

/// Whether anything is staged.
///
/// # Returns
/// 1 if modified, 0 if not, -1 for a null pointer.
///
/// # Safety
/// - `collector` must be a valid pointer from `pathwise_collector_new` or null
#[no_mangle]
pub unsafe extern "C" fn pathwise_collector_is_modified(collector: *const UpdateCollector) -> i32 {
    match collector.as_ref() {
        Some(c) => i32::from(c.is_modified()),
        None => -1,
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn pathwise_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::ptr;

    fn c(text: &str) -> CString {
        CString::new(text).unwrap()
    }

    /// Take ownership of a returned string and parse it.
    unsafe fn take(result: *mut c_char) -> Value {
        let parsed = serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
        pathwise_string_free(result);
        parsed
    }

    #[test]
    fn ffi_path_get() {
        unsafe {
            let doc = c(r#"{"a": {"b": [10, 20]}}"#);

            let found = take(pathwise_path_get(doc.as_ptr(), c("a.b.1").as_ptr()));
            assert_eq!(found, json!({"ok": 20}));

            let missing = take(pathwise_path_get(doc.as_ptr(), c("a.x").as_ptr()));
            assert_eq!(missing, json!({"ok": null}));

            let whole = take(pathwise_path_get(doc.as_ptr(), c(".").as_ptr()));
            assert_eq!(whole["ok"], json!({"a": {"b": [10, 20]}}));
        }
    }

    #[test]
    fn ffi_path_set_and_unset() {
        unsafe {
            let doc = c("{}");
            let result = take(pathwise_path_set(
                doc.as_ptr(),
                c("a.b.1.c").as_ptr(),
                c("true").as_ptr(),
            ));
            assert_eq!(result, json!({"ok": {"a": {"b": [null, {"c": true}]}}}));

            let doc = c(r#"{"list": [1, 2, 3]}"#);
            let result = take(pathwise_path_unset(doc.as_ptr(), c("list.0").as_ptr()));
            assert_eq!(result, json!({"ok": {"list": [2, 3]}}));
        }
    }

    #[test]
    fn ffi_apply_and_merge() {
        unsafe {
            let doc = c(r#"{"a": 1, "b": 2}"#);
            let updates = c(r#"{"$set": [{"c.d": 3}], "$unset": [{"a": ""}]}"#);
            let result = take(pathwise_apply_updates(doc.as_ptr(), updates.as_ptr()));
            assert_eq!(result, json!({"ok": {"b": 2, "c": {"d": 3}}}));

            let a = c(r#"{"$set": [{"x": 1}]}"#);
            let b = c(r#"{"$unset": [{"y": ""}]}"#);
            let merged = take(pathwise_merge_updates(a.as_ptr(), b.as_ptr()));
            assert_eq!(
                merged,
                json!({"ok": {"$set": [{"x": 1}], "$unset": [{"y": ""}]}})
            );
        }
    }

    #[test]
    fn ffi_is_empty_updates() {
        unsafe {
            assert_eq!(pathwise_is_empty_updates(c("{}").as_ptr()), 1);
            assert_eq!(pathwise_is_empty_updates(c(r#"{"$set": []}"#).as_ptr()), 0);
            assert_eq!(pathwise_is_empty_updates(c("[1]").as_ptr()), -1);
            assert_eq!(pathwise_is_empty_updates(ptr::null()), -1);
        }
    }

    #[test]
    fn ffi_collector_lifecycle() {
        unsafe {
            let collector = pathwise_collector_new();
            assert!(!collector.is_null());
            assert_eq!(pathwise_collector_is_modified(collector), 0);

            let result = take(pathwise_collector_set(
                collector,
                c("a.b").as_ptr(),
                c("1").as_ptr(),
            ));
            assert_eq!(result, json!({"ok": null}));
            take(pathwise_collector_set(collector, c("a").as_ptr(), c("{}").as_ptr()));
            take(pathwise_collector_unset(collector, c("z").as_ptr()));
            assert_eq!(pathwise_collector_is_modified(collector), 1);

            let updates = take(pathwise_collector_create_updates(collector));
            assert_eq!(
                updates,
                json!({"ok": {"$set": [{"a": {}}], "$unset": [{"z": ""}]}})
            );

            pathwise_collector_clear(collector);
            assert_eq!(pathwise_collector_is_modified(collector), 0);
            let updates = take(pathwise_collector_create_updates(collector));
            assert_eq!(updates, json!({"ok": {}}));

            pathwise_collector_free(collector);
        }
    }

    #[test]
    fn ffi_collector_merge() {
        unsafe {
            let collector = pathwise_collector_new();
            let batch = c(r#"{"$set": [{"a.b": 1}, {"a": 2}], "$unset": [{"c": ""}]}"#);
            let result = take(pathwise_collector_merge(collector, batch.as_ptr()));
            assert_eq!(result, json!({"ok": null}));

            let updates = take(pathwise_collector_create_updates(collector));
            assert_eq!(
                updates,
                json!({"ok": {"$set": [{"a": 2}], "$unset": [{"c": ""}]}})
            );
            pathwise_collector_free(collector);
        }
    }

    #[test]
    fn ffi_version() {
        unsafe {
            let version = pathwise_version();
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn ffi_error_handling() {
        unsafe {
            // Null collector pointer
            let result = take(pathwise_collector_set(
                ptr::null_mut(),
                c("a").as_ptr(),
                c("1").as_ptr(),
            ));
            assert_eq!(result["error"], "null collector pointer");
            assert_eq!(pathwise_collector_is_modified(ptr::null()), -1);

            // Invalid JSON
            let result = take(pathwise_path_get(c("not json").as_ptr(), c("a").as_ptr()));
            assert!(result["error"].as_str().unwrap().starts_with("parse error"));

            // Invalid path
            let result = take(pathwise_path_get(c("{}").as_ptr(), c("a..b").as_ptr()));
            assert_eq!(result["error"], "invalid object path: 'a..b'");

            // Identity writes
            let collector = pathwise_collector_new();
            let result = take(pathwise_collector_set(collector, c(".").as_ptr(), c("1").as_ptr()));
            assert_eq!(result["error"], "cannot set identity path");
            let result = take(pathwise_path_unset(c("{}").as_ptr(), c(".").as_ptr()));
            assert_eq!(result["error"], "cannot unset identity path");
            pathwise_collector_free(collector);
        }
    }
}

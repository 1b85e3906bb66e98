//! Developer logging ("level 6") for eviction and sweep benchmarks.
//!
//! Messages go to the `tiercache::dev6` target at TRACE and, when enabled for the
//! current thread, into a thread-local buffer so tests can assert on them without
//! racing the global logger.

use std::cell::RefCell;

thread_local! {
    static CAPTURE: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Disables capture for the thread when dropped.
pub struct CaptureGuard;

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE.with(|c| *c.borrow_mut() = None);
    }
}

/// Start capturing dev6 messages emitted on this thread.
pub fn capture() -> CaptureGuard {
    CAPTURE.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard
}

pub fn write_str(msg: &str) {
    CAPTURE.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Take everything captured so far on this thread.
pub fn take() -> Vec<String> {
    CAPTURE.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Emit a developer log line as a compact JSON object: `dev6!("evict", "cache" => name, "n" => 3)`.
#[macro_export]
macro_rules! dev6 {
    ($op:expr $(, $k:literal => $v:expr)* $(,)?) => {{
        let mut __m = serde_json::Map::new();
        __m.insert("op".to_string(), serde_json::json!($op));
        $( __m.insert($k.to_string(), serde_json::json!($v)); )*
        let __s = serde_json::Value::Object(__m).to_string();
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: "tiercache::dev6", log::Level::Trace, "{}", __s);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_structured_lines() {
        let _g = capture();
        crate::dev6!("lru_evict", "cache" => "api", "n" => 1);
        crate::dev6!("sweep");
        let lines = take();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["op"], "lru_evict");
        assert_eq!(first["cache"], "api");
        assert_eq!(first["n"], 1);
        assert!(take().is_empty());
    }

    #[test]
    fn capture_is_per_thread() {
        let _g = capture();
        crate::dev6!("main");
        let child = std::thread::spawn(|| {
            crate::dev6!("child");
            take()
        })
        .join()
        .unwrap();
        assert!(child.is_empty());
        assert_eq!(take().len(), 1);
    }

    #[test]
    fn nothing_captured_after_guard_drops() {
        {
            let _g = capture();
        }
        crate::dev6!("late");
        assert!(take().is_empty());
    }
}

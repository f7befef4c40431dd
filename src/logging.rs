//! Logging bridge
//!
//! In the browser every message goes to the devtools console with a
//! `[MentionLens]` prefix. Native builds (tests, tooling) emit `tracing`
//! events instead, so a subscriber can be attached by the embedder.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

#[doc(hidden)]
pub fn emit(level: Level, message: &str) {
    #[cfg(target_arch = "wasm32")]
    {
        let line = wasm_bindgen::JsValue::from_str(&format!("[MentionLens] {}", message));
        match level {
            Level::Debug => web_sys::console::debug_1(&line),
            Level::Info => web_sys::console::log_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    match level {
        Level::Debug => tracing::debug!(target: "mentionlens", "{}", message),
        Level::Info => tracing::info!(target: "mentionlens", "{}", message),
        Level::Warn => tracing::warn!(target: "mentionlens", "{}", message),
    }
}

macro_rules! lens_debug {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Debug, &format!($($arg)*))
    };
}

macro_rules! lens_info {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Info, &format!($($arg)*))
    };
}

macro_rules! lens_warn {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::Level::Warn, &format!($($arg)*))
    };
}

pub(crate) use lens_debug;
pub(crate) use lens_info;
pub(crate) use lens_warn;

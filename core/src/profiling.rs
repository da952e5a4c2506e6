//! Tracy instrumentation for graph compilation and execution.
//!
//! Every macro here has two definitions: a real one behind the `profiling`
//! Cargo feature, which pulls in [`tracy_client`], and a no-op otherwise.
//! Call sites never need their own `#[cfg]`.
//!
//! ```toml
//! [dependencies]
//! ufg-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! fn compile_graph(graph: &FrameGraph) {
//!     ufg_core::profile_function!();
//!
//!     {
//!         ufg_core::profile_scope!("topological_sort");
//!         // ...
//!     }
//!
//!     for pass in graph.pass_nodes() {
//!         ufg_core::profile_scope_dynamic!(pass.name());
//!     }
//!     ufg_core::frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{
    self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span,
};

// ============================================================================
// Enabled
// ============================================================================

/// Mark the end of an executed frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Open a span named by a string literal, closed at the end of the scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Open a span whose name is only known at runtime, such as a pass name.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Plot a numeric value over time.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Label the current thread.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        $crate::profiling::tracy_client::set_thread_name!($name)
    };
}

// ============================================================================
// Disabled
// ============================================================================

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value;
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {};
}

pub use frame_mark;
pub use profile_function;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;
pub use set_thread_name;

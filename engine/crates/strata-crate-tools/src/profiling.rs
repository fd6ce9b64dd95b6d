//! 可选的 tracy profiling
//!
//! 只有在开启 `profiling` feature 时，`profile_scope!` 才会生成 tracy span；
//! 否则宏展开为空，没有任何运行时开销。

#[cfg(feature = "profiling")]
pub use tracy_client;

/// 在当前作用域内创建一个 profiling span
///
/// ```ignore
/// strata_crate_tools::profile_scope!("RenderGraph::execute");
/// ```
#[cfg(feature = "profiling")]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

#[cfg(not(feature = "profiling"))]
#[macro_export]
macro_rules! profile_scope {
    ($name:expr) => {};
}

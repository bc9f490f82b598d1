//! Small declarative helpers shared by the Uppe HTTP binaries.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generates a `pub fn routes(cfg: &mut ServiceConfig)` for a routes module.
///
/// `route` registers an actix handler, `load` delegates to the `routes`
/// function of a submodule declared next to the invocation.
///
/// ```ignore
/// macros_utils::routes! {
///     load health,
///     route metrics_route,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($($kind:ident $item:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $( $crate::routes!(@register cfg, $kind $item); )*
        }
    };
    (@register $cfg:ident, route $handler:ident) => {
        $cfg.service($handler);
    };
    (@register $cfg:ident, load $module:ident) => {
        $module::routes($cfg);
    };
}

pub mod relay_services;
pub mod resolve_services;
pub mod upstream_services;

pub use relay_services::RelayServices;
pub use resolve_services::DynResolveService;
pub use upstream_services::DynUpstreamService;

pub mod health_controller;
pub mod hls_controller;
pub mod sources_controller;

pub use hls_controller::HlsController;
pub use sources_controller::SourcesController;

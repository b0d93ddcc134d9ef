//! Concrete handler implementations (§4.4). Each one is grounded on the
//! same shape: resolve credentials, call a provider, persist the output as
//! an artifact, record usage.

mod background_remove;
mod photo_to_3d;

pub use background_remove::BackgroundRemoveHandler;
pub use photo_to_3d::Photo3DHandler;

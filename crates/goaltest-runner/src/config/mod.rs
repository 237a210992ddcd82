pub mod devices;
pub mod schema;

pub use devices::{Device, DEFAULT_DEVICE, DEVICES};
pub use schema::{AgentConfig, BrowserConfig, Config, ModelConfig};

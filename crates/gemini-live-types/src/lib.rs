//now people using the types library can use these types
pub mod setup;
pub mod voice;
pub mod events;
mod content;

//re-export types for easier access
pub use setup::{Setup, SetupConfigurator};
pub use voice::Voice;
pub use content::{Blob, Content, Part};
pub use events::{ClientEvent, ServerEvent};

/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

pub mod preview;
pub mod render;
pub mod validate;
pub mod voices;

pub mod dir;
pub mod image;
pub mod styles;
pub mod video;

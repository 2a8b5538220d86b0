//! Pipeline step implementations.

mod generate;
mod publish;
mod render;

pub use generate::GenerateStep;
pub use publish::PublishStep;
pub use render::RenderStep;

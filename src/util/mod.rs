mod code;
mod log;
mod position;

pub use code::Code;
pub use log::Log;
pub use position::Position;

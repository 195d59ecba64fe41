pub mod cmd;
pub mod progress;
pub mod style;
pub mod util;

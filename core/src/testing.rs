pub mod batch;
pub mod meter;
pub mod result;
pub mod runner;
pub mod special_judge;
pub mod summary;
pub mod testcase;

pub use batch::*;
pub use meter::*;
pub use result::*;
pub use runner::*;
pub use special_judge::*;
pub use summary::*;
pub use testcase::*;

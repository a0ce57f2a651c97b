pub mod basin;
pub mod market;
pub mod plant;
pub mod scenario;
pub mod system;
pub mod time;

pub use basin::*;
pub use market::*;
pub use plant::*;
pub use scenario::*;
pub use system::*;
pub use time::*;

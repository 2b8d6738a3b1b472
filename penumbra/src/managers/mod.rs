mod camera;
mod caster;
mod light;
mod master;
mod slave;
mod slave_pool;

pub use camera::*;
pub use caster::*;
pub use light::*;
pub use master::*;
pub use slave::*;
pub use slave_pool::*;

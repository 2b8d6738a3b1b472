pub mod frustum;
pub mod math;

pub mod region;
pub mod spot_detector;
pub mod utils;

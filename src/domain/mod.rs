pub mod diagnostics;
pub mod energy;
pub mod models;
pub mod reading;
pub mod sample;
pub mod sensor;

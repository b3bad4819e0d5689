pub mod cpmm;
pub mod dpm;
pub mod fees;
pub mod pool;
pub mod weight;

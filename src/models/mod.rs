pub mod dispatch;
pub mod driver;
pub mod sos;

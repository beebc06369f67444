pub mod net;
pub mod session;
pub mod timer;

pub mod loopback;
pub mod protocol;

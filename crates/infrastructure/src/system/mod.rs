pub mod hosts;
pub mod resolv_conf;

pub use hosts::Hosts;
pub use resolv_conf::{parse_resolv_conf, SystemResolvConf, RESOLV_CONF};

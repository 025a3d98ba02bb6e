//! Child-process machinery: the namespaced init spawner and the tty
//! byte forwarder.

pub mod forwarder;
pub mod spawner;

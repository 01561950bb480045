//! Test modules for the json-rpc-mount-http crate

//! Application layer - Use cases, ports and orchestration services

pub mod dto;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub mod config;
pub mod error;
pub mod future;
pub mod merge;
pub mod telemetry;
pub mod test_utils;
pub mod vote;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod abi;
pub(crate) mod builder;

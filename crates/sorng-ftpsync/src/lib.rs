pub mod ftpsync;

pub use ftpsync::*;

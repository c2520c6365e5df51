pub mod codec;
pub mod hash;
pub mod mock;

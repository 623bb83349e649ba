//! Signal acquisition: frame decoding, windowed collection, window timing

pub mod collector;
pub mod decoder;
pub mod timing;

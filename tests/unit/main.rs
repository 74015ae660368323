//! Unit test suite

mod codec_test;
mod correlation_test;

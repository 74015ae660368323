//! Functional test suite


mod model_test;
mod plugin_test;
mod storage_test;
mod worker_test;

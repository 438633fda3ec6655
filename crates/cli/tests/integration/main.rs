mod build_tests;
mod common;
mod failure_tests;
mod mode_tests;

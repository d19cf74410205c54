mod batch_tests;
mod bitmap_container_tests;
mod container_tests;
mod directory_tests;
mod fixtures;
mod frozen_tests;
mod iter_tests;
mod run_container_tests;

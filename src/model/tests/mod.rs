mod discovery_tests;
mod update_tests;

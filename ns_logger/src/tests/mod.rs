//! Behavioral tests spanning several modules

mod cycle_tests;

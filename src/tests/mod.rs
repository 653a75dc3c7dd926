pub mod correlation_tests;

//! Test suites for the server bootstrap and process supervision.

mod support;

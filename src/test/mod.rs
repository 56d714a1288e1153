//! Crafted inputs shared by the unit tests.

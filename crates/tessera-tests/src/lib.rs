//! Integration tests spanning the kernel, engine and built-in algorithms.

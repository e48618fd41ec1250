//! Pline CLI Library
//!
//! This crate provides the command-line interface for pline. It loads plugin
//! descriptors, chains them into a pipeline, fills their inputs from the command line
//! and writes the assembled job payload.
//!
//! # Architecture
//!
//! - [`cli_args`]: Command-line argument parsing and validation
//! - [`arguments`]: Named and positional input values
//! - [`transport`]: Delivery of the payload to a file or standard output
//!
//! # Examples
//!
//! ```bash
//! # Print the command lines of a two-step pipeline
//! pline --dry-run grep wc -p e=foo -p 2:l=true
//!
//! # Fill positional arguments in order
//! pline sort -- input.txt
//!
//! # Restore a saved pipeline and write the payload to a file
//! pline -c saved.json -o job.json
//! ```

pub mod arguments;
pub mod cli_args;
pub mod transport;

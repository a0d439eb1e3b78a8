//! Infrastructure layer for the MHA control client.
//!
//! Contains the OS-facing adapters: TCP I/O, the configuration file and the
//! capture of child process output.
//!
//! **Dependency rule**: this layer may depend on `application` and `mha_core`,
//! but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – The blocking TCP [`Session`](network::Session) that frames
//!   server replies into responses and implements the `Parser` trait.
//!
//! - **`process_output`** – Background threads that drain the stdout and
//!   stderr of a locally started MHA so it never blocks on a full pipe.
//!
//! - **`storage`** – Reading and writing the TOML configuration file.

pub mod network;
pub mod process_output;
pub mod storage;

//! # picture-gen
//!
//! Responsive image variants for static sites: generate a ladder of resized
//! copies for every source image, and answer "which variants exist for this
//! image?" fast enough to call once per `<img>` while rendering a site.
//!
//! # Architecture: Two Paths Over One Layout
//!
//! Both halves share the on-disk (and in-bucket) layout:
//!
//! ```text
//! <output_dir>/<stem>.<hash>/<width>.<ext>
//! ```
//!
//! where `<hash>` is a short content hash of the source. A changed source
//! gets a new directory; the old one is simply no longer wanted.
//!
//! ```text
//! Generate   static/ → plan widths → reconcile vs output tree → resize pool → delete stale
//! Resolve    source  → hash → list <stem>.<hash>/ (local or S3) → parse → cached catalog
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`hashing`] | 7-char SHA-256 content hash and the `<stem>.<hash>` directory key |
//! | [`catalog`] | Directory listing → `Variant` records, MIME table, `srcset` grouping |
//! | [`source`] | `VariantSource` trait, local directory source, shared path layout |
//! | [`remote`] | Paginated S3 prefix listing behind a process-wide semaphore |
//! | [`resolver`] | Process-lifetime resolution cache with request coalescing |
//! | [`planner`] | Breakpoint ladder, source discovery, parallel planning |
//! | [`reconcile`] | Desired jobs vs existing files → create/delete changeset |
//! | [`generator`] | Rayon worker pool for resize jobs, stale-file cleanup |
//! | [`imaging`] | Pure-Rust decode, Lanczos3 resize, JPEG/PNG/WebP encode |
//! | [`config`] | `picture-gen.toml` loading, defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Hashes, Not Timestamps
//!
//! Variant directories are keyed by file contents, so checkouts, copies and
//! touched files never trigger regeneration, and reconciliation never needs
//! to compare file contents: path identity is enough.
//!
//! ## Resolve Once Per Source
//!
//! Rendering a site asks about the same image many times, often
//! concurrently. [`resolver::VariantResolver`] makes sure each source is
//! hashed and listed exactly once per process, with every concurrent caller
//! sharing the leader's result. Failures are not cached, so a transient
//! remote error is retried on the next call.
//!
//! ## Bounded Remote Calls
//!
//! Listings against the object store hold a semaphore permit for their
//! whole pagination, so the number of in-flight listings never exceeds
//! `remote.max_parallel_requests` however many renders are running.

pub mod catalog;
pub mod config;
pub mod generator;
pub mod hashing;
pub mod imaging;
pub mod output;
pub mod planner;
pub mod reconcile;
pub mod remote;
pub mod resolver;
pub mod source;

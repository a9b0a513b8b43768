//! odscache is a local, on-disk cache for downloaded datasets. Repeated
//! downloads of the same dataset can be served from disk instead of the
//! network, safely, from many threads at once.
//!
//! Cached files live at `<cache_root>/<platform_pseudo_id>/<dataset_id>.<format>`
//! and are always stored as UTF-8, whatever encoding the original response
//! used. Line terminators are kept byte for byte.
//!
//! ## Examples
//!
//! Entries are filled from whatever the HTTP layer hands over: decoded
//! text, a stream of byte chunks, or a file already on disk.
//!
//! ```no_run
//! use odscache::{Cache, Platform};
//!
//! fn main() -> odscache::Result<()> {
//!   let cache = Cache::new("./my-cache");
//!   let entry = cache.entry("abc", "csv", &Platform::Id("public".into()))?;
//!
//!   // Data goes in...
//!   entry.fill_from_iterable([b"a,b\n", b"1,2\n"], "utf-8", None)?;
//!
//!   // ...data comes out!
//!   assert_eq!(entry.read()?, "a,b\n1,2\n");
//!   Ok(())
//! }
//! ```
//!
//! ### Cache misses
//!
//! Reading an entry that was never filled fails with
//! [`Error::EntryNotFound`]; there is no silent empty result. The usual
//! pattern takes the entry lock once, reads, and fills on a miss:
//!
//! ```no_run
//! use odscache::{Cache, Platform};
//!
//! fn main() -> odscache::Result<()> {
//!   let cache = Cache::default();
//!   let platform = Platform::BaseUrl("https://data.exchange.se.com/ho".into());
//!   let entry = cache.entry("abc", "csv", &platform)?;
//!   let text = entry.read_or_fill_with(|guard| {
//!       // Download here, then store the response.
//!       guard.fill_from_str("iso-8859-1", "a;b\n")
//!   })?;
//!   println!("{}", text);
//!   Ok(())
//! }
//! ```
//!
//! ### Warnings
//!
//! Transcoding, overwriting an existing file and deleting a missing one are
//! never errors. They are reported as [`CacheWarning`]s to the
//! [`Diagnostics`] sink of the entry, by default [`TracingDiagnostics`].
#![warn(missing_docs)]

mod cache;
mod content;
mod diagnostics;
mod encoding;
mod entry;
mod errors;
mod key;

pub mod rm;

pub use cache::{Cache, CacheOpts};
pub use diagnostics::{CacheWarning, Diagnostics, TracingDiagnostics};
pub use encoding::{is_cache_encoding, CACHE_ENCODING};
pub use entry::{CacheEntry, EntryGuard, Progress};
pub use errors::{Error, Result};
pub use key::{derive_pseudo_id, entry_path, Platform, DEFAULT_CACHE_ROOT, PUBLIC_HOST_SUFFIX};

//! smk-catalog
//!
//! Catalog readers: turn migration artifacts into sorted `ChangeEntry` values.
//!
//! Artifact naming:
//! - `<id>.up.sql` or bare `<id>.sql` => forward body
//! - `<id>.down.sql`                  => reverse body
//!
//! Anything else is ignored. Artifacts sharing an identifier merge into one
//! entry; two artifacts for the same side of one identifier is an error.

mod dir;
mod embedded;
mod pairing;

pub use dir::DirCatalog;
pub use embedded::EmbeddedCatalog;
pub use pairing::{classify, ArtifactKind, Pairing};

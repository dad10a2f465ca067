//! This module implements parsing and serialization code for some basic
//! building blocks of the [ATerm][] format, which is used by Nix to
//! serialize derivations.
//!
//! Parsing is done with a recursive-descent [nom] parser over the restricted
//! grammar we actually need (quoted byte/string fields and bracketed lists of
//! them) — there is no generic ATerm evaluator here, and there never will be.
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html

mod escape;
mod parser;

pub use escape::escape_bytes;
pub use parser::parse_bytes_field;
pub use parser::parse_string_field;
pub use parser::parse_string_list;

//! Opaque id generation
//!
//! All entity ids are short, URL-safe strings (spec §3: "12-21 chars,
//! URL-safe"). `nanoid`'s default alphabet and length match that directly.

/// Generate a new opaque id.
pub fn new_id() -> String {
    nanoid::nanoid!()
}

//! Modifier Rule File Format
//!
//! This crate reads and writes `.mrf` rule files: a JSON array of rules with
//! their page URL stripped, encrypted with a static passphrase in the
//! OpenSSL "Salted__" envelope.

pub mod cipher;
pub mod portable;

pub use cipher::{decrypt, encrypt, CipherError};
pub use portable::{
    check_file_name, export_file_name, export_rules, import_rules, merge_import, select_for_export,
    RuleFileError, FILE_EXTENSION, PASSPHRASE,
};

//! Filesystem-level primitives: ciphertext file content, filenames, and symlinks.
//!
//! `directory` is the teacher's synchronous explorer, kept for its listing
//! helpers while the async `vault::directory`, `vault::openfile`, and
//! `vault::cache` components are built on top of the primitives in `file`
//! and `name`.

pub mod directory;
pub mod file;
pub mod name;
pub mod symlink;

pub use file::{
    decrypt_dir_id_backup, decrypt_file, decrypt_file_content, decrypt_file_header,
    encrypt_dir_id_backup, encrypt_file_content, encrypt_file_header, DecryptedFile, FileHeader,
};
pub use name::{decrypt_filename, decrypt_parent_dir_id, encrypt_filename, encrypt_parent_dir_id, hash_dir_id};
pub use symlink::{decrypt_symlink_target, encrypt_symlink_target, SymlinkError};
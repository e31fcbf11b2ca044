//! Password protection
//!
//! The same password opens the document and unlocks its permissions.

use crate::document::PdfHandle;
use crate::types::*;
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, StringFormat};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// RC4 key length for the standard security handler, in bits
const KEY_LENGTH: usize = 128;

pub fn protect(source: &SourceFile, password: &str) -> Result<OutputFile> {
    if password.is_empty() {
        return Err(PagesError::validation("Password cannot be empty"));
    }

    let mut handle = PdfHandle::load(source)?;
    let doc = handle.document_mut();
    if doc.is_encrypted() {
        return Err(PagesError::Encryption(format!(
            "{} is already encrypted",
            source.name
        )));
    }
    ensure_file_id(doc, &source.bytes);

    let version = EncryptionVersion::V2 {
        document: &*doc,
        owner_password: password,
        user_password: password,
        key_length: KEY_LENGTH,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).map_err(|e| PagesError::Encryption(e.to_string()))?;
    doc.encrypt(&state)
        .map_err(|e| PagesError::Encryption(e.to_string()))?;

    log::debug!("Encrypted {}", source.name);
    let name = format!("{}_protected.pdf", source.base_name());
    handle.into_output(name)
}

/// The key derivation needs a file identifier; derive one from the input when absent
fn ensure_file_id(doc: &mut Document, seed: &[u8]) {
    if doc.trailer.has(b"ID") {
        return;
    }
    let mut id = Vec::with_capacity(16);
    for salt in [0u8, 1] {
        let mut hasher = DefaultHasher::new();
        salt.hash(&mut hasher);
        seed.hash(&mut hasher);
        id.extend_from_slice(&hasher.finish().to_be_bytes());
    }
    let id = Object::String(id, StringFormat::Hexadecimal);
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
}

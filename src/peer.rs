// Peer identity resolution.

use anyhow::Result;
use sha1::{Digest, Sha1};

use crate::store::MessageStore;

/// Derive the stable peer identifier for a raw contact identifier: the
/// 20-byte SHA-1 digest of the string, encoded as lowercase hex. The
/// same input always yields the same identifier.
pub fn peer_id(contact: &str) -> String {
    hex::encode(Sha1::digest(contact.as_bytes()))
}

/// Resolve a raw contact identifier to its peer id and, if one exists,
/// the conversation already filed under it.
pub async fn thread_for_contact(store: &MessageStore, contact: &str) -> Result<(String, Option<i64>)> {
    let peer = peer_id(contact);
    let thread_id = store.thread_for_peer(&peer).await?;
    Ok((peer, thread_id))
}

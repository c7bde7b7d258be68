//! Canonical wire encoding for signed and hashed payloads.
//!
//! Every multi-field value that gets signed, hashed or fed into a KDF goes
//! through this encoding: a length-prefixed tag followed by length-prefixed
//! fields. Two distinct field tuples can never encode to the same bytes, so
//! a signature over one tuple can never be reinterpreted as a signature
//! over another. Naive concatenation does not have that property and is
//! not used anywhere in the workspace.

/// Builder for a tagged, length-prefixed payload.
///
/// # Example
/// ```
/// use latticeguard_core::wire::PayloadBuilder;
///
/// let payload = PayloadBuilder::new("example")
///     .field(b"alpha")
///     .field(b"beta")
///     .build();
/// assert_ne!(
///     payload,
///     PayloadBuilder::new("example").field(b"alphabeta").field(b"").build()
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    buf: Vec<u8>,
}

impl PayloadBuilder {
    /// Start a payload with a domain-separating tag.
    pub fn new(tag: &str) -> Self {
        let mut buf = Vec::with_capacity(64);
        push_prefixed(&mut buf, tag.as_bytes());
        Self { buf }
    }

    /// Append one length-prefixed field.
    pub fn field(mut self, bytes: &[u8]) -> Self {
        push_prefixed(&mut self.buf, bytes);
        self
    }

    /// Finish and return the encoded payload.
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

// u64 prefixes hold any usize, so field lengths never wrap and boundary
// injectivity holds for fields of every size.
fn push_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

//! Stateless base32 host codec.
//!
//! `scheme://host` is base32 encoded (RFC 4648 alphabet, uppercase letters and
//! digits 2-7) and the trailing `=` padding is dropped. Decoding restores the
//! padding to a multiple of 8 before inverting the transform.
//!
//! Origins longer than 39 bytes produce labels over 63 characters. Those are
//! still encoded and decoded but cannot be served through real DNS.

use async_trait::async_trait;
use data_encoding::BASE32;

use super::{AddressError, AddressingStrategy, DecodeError, Label, Origin};

const PADDING: char = '=';
const BLOCK_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct HostCodec;

impl HostCodec {
    pub fn encode_origin(&self, origin: &Origin) -> Label {
        let encoded = BASE32.encode(origin.to_string().as_bytes());
        Label::new(encoded.trim_end_matches(PADDING))
    }

    pub fn decode_label(&self, label: &str) -> Result<Origin, DecodeError> {
        let mut padded = label.to_ascii_uppercase();
        while padded.len() % BLOCK_LEN != 0 {
            padded.push(PADDING);
        }

        let bytes = BASE32
            .decode(padded.as_bytes())
            .map_err(|e| DecodeError::InvalidBase32(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
        text.parse()
    }
}

#[async_trait]
impl AddressingStrategy for HostCodec {
    fn name(&self) -> &'static str {
        "codec"
    }

    async fn encode(&self, origin: &Origin) -> Result<Label, AddressError> {
        let label = self.encode_origin(origin);
        if !label.fits_dns() {
            tracing::warn!(
                origin = %origin,
                label_len = label.as_str().len(),
                "Encoded label exceeds the DNS label length limit"
            );
        }
        Ok(label)
    }

    async fn decode(&self, label: &str) -> Result<Origin, AddressError> {
        Ok(self.decode_label(label)?)
    }
}

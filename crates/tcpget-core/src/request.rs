//! GET request template
//!
//! The request is prepared once from the endpoint path and host, then
//! rendered at every connect with the connected address substituted for
//! any `{ip}` / `{ip0}`..`{ip3}` placeholders.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Caller-prepared request text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    template: String,
}

impl RequestTemplate {
    /// Standard `GET <path> HTTP/1.1` request with a `Host:` header
    pub fn get(path: &str, host: &str) -> Self {
        Self {
            template: format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, host),
        }
    }

    /// Arbitrary caller template
    pub fn custom(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Template text before address substitution
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Whether rendering depends on the connected address
    pub fn has_address_placeholders(&self) -> bool {
        self.template.contains("{ip")
    }

    /// Render into a buffer of at most `capacity` bytes
    pub fn render(&self, address: Ipv4Addr, capacity: usize) -> Result<Vec<u8>> {
        let rendered = if self.has_address_placeholders() {
            let [a, b, c, d] = address.octets();
            self.template
                .replace("{ip}", &address.to_string())
                .replace("{ip0}", &a.to_string())
                .replace("{ip1}", &b.to_string())
                .replace("{ip2}", &c.to_string())
                .replace("{ip3}", &d.to_string())
        } else {
            self.template.clone()
        };

        if rendered.len() > capacity {
            return Err(Error::RequestTooLarge {
                len: rendered.len(),
                capacity,
            });
        }

        Ok(rendered.into_bytes())
    }
}

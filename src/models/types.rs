use derive_more::{AsRef, Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use url::{Host, Url};

/// Идентификатор записи контента в CMS
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display, AsRef, FromStr)]
#[from(String, &str)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where an image reference points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocation {
    /// Absolute URL on a host the platforms can reach.
    Public(Url),
    /// Absolute URL on a loopback, private or internal host.
    Internal(Url),
    /// Anything else is read from disk.
    LocalPath(String),
}

/// Image reference as stored on a content item: a URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display, AsRef)]
#[from(String, &str)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn location(&self) -> ImageLocation {
        let raw = self.0.trim();
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if is_internal_host(&url) {
                    ImageLocation::Internal(url)
                } else {
                    ImageLocation::Public(url)
                }
            }
            _ => ImageLocation::LocalPath(raw.to_string()),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self.location(), ImageLocation::Public(_))
    }

    /// Last path segment, used as the upload file name.
    pub fn file_name(&self) -> String {
        let raw = self.0.trim();
        let path = match Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => raw.to_string(),
        };
        path.rsplit(['/', '\\'])
            .find(|s| !s.is_empty())
            .unwrap_or("image.jpg")
            .to_string()
    }
}

fn is_internal_host(url: &Url) -> bool {
    match url.host() {
        None => true,
        Some(Host::Domain(d)) => {
            let d = d.to_ascii_lowercase();
            d == "localhost" || d.ends_with(".localhost") || d.ends_with(".local") || d.ends_with(".internal")
        }
        Some(Host::Ipv4(ip)) => is_internal_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_internal_ip(IpAddr::V6(ip)),
    }
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified() || v4 == Ipv4Addr::BROADCAST
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

//! Cache key derivation: where a dataset lives on disk.
use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::{Error, Result};

/// Directory used as cache root when none is configured.
pub const DEFAULT_CACHE_ROOT: &str = ".odsclient";

/// Host suffix of publicly hosted platforms. Hosts ending with it are
/// shortened to the platform name, e.g. `public.opendatasoft.com` becomes
/// `public`.
pub const PUBLIC_HOST_SUFFIX: &str = ".opendatasoft.com";

/// Identifies the platform a dataset is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// A short platform name, used verbatim as the pseudo id.
    Id(String),
    /// A base URL; the pseudo id is derived with [`derive_pseudo_id`].
    BaseUrl(String),
}

impl Platform {
    /// Filesystem-safe identifier of this platform.
    pub fn pseudo_id(&self) -> Result<String> {
        match self {
            Platform::Id(id) => Ok(id.clone()),
            Platform::BaseUrl(url) => derive_pseudo_id(url),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Id("public".into())
    }
}

/// Derives a platform pseudo id from a base URL.
///
/// The host (plus an explicit port, if any) and every non-empty path
/// segment are joined with `_`. Scheme and trailing slashes do not matter.
///
/// ```
/// # fn main() -> odscache::Result<()> {
/// assert_eq!(odscache::derive_pseudo_id("https://public.opendatasoft.com/")?, "public");
/// assert_eq!(
///     odscache::derive_pseudo_id("https://data.exchange.se.com/ho")?,
///     "data.exchange.se.com_ho"
/// );
/// # Ok(())
/// # }
/// ```
pub fn derive_pseudo_id(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url).map_err(|e| Error::InvalidUrl(e, base_url.into()))?;

    let host = url.host_str().unwrap_or("");
    let host = match host.strip_suffix(PUBLIC_HOST_SUFFIX) {
        Some(name) if !name.is_empty() => name,
        _ => host,
    };

    let mut parts: Vec<String> = Vec::new();
    if !host.is_empty() {
        parts.push(host.to_string());
    }
    if let Some(port) = url.port() {
        parts.push(port.to_string());
    }
    parts.extend(
        url.path()
            .split('/')
            .filter(|seg| !seg.is_empty())
            .map(String::from),
    );
    Ok(parts.join("_"))
}

/// On-disk location of a cached dataset:
/// `<cache_root>/<platform_pseudo_id>/<dataset_id>.<format>`.
pub fn entry_path(cache_root: &Path, platform_pseudo_id: &str, dataset_id: &str, format: &str) -> PathBuf {
    let mut path = PathBuf::new();
    path.push(cache_root);
    path.push(platform_pseudo_id);
    path.push(format!("{}.{}", dataset_id, format));
    path
}

/// Directory holding every cached dataset of one platform.
pub fn platform_dir(cache_root: &Path, platform_pseudo_id: &str) -> PathBuf {
    cache_root.join(platform_pseudo_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn public_platform() {
        assert_eq!(
            derive_pseudo_id("https://public.opendatasoft.com/").unwrap(),
            "public"
        );
        assert_eq!(
            derive_pseudo_id("https://public.opendatasoft.com").unwrap(),
            "public"
        );
    }

    #[test]
    fn custom_host_with_path() {
        assert_eq!(
            derive_pseudo_id("https://data.exchange.se.com/ho").unwrap(),
            "data.exchange.se.com_ho"
        );
        assert_eq!(
            derive_pseudo_id("https://data.exchange.se.com/ho/").unwrap(),
            "data.exchange.se.com_ho"
        );
    }

    #[test]
    fn nested_path_and_duplicate_slashes() {
        assert_eq!(
            derive_pseudo_id("http://example.org//explore/dataset//").unwrap(),
            "example.org_explore_dataset"
        );
        assert_eq!(
            derive_pseudo_id("https://acme.opendatasoft.com/explore/dataset/").unwrap(),
            "acme_explore_dataset"
        );
    }

    #[test]
    fn bare_suffix_domain_is_kept() {
        assert_eq!(
            derive_pseudo_id("https://opendatasoft.com/").unwrap(),
            "opendatasoft.com"
        );
    }

    #[test]
    fn explicit_port() {
        assert_eq!(
            derive_pseudo_id("http://localhost:8080/api").unwrap(),
            "localhost_8080_api"
        );
    }

    #[test]
    fn invalid_url() {
        let err = derive_pseudo_id("public.opendatasoft.com").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_, _)));
    }

    #[test]
    fn platform_pseudo_ids() {
        assert_eq!(Platform::default().pseudo_id().unwrap(), "public");
        assert_eq!(
            Platform::BaseUrl("https://data.exchange.se.com/ho".into())
                .pseudo_id()
                .unwrap(),
            "data.exchange.se.com_ho"
        );
    }

    #[test]
    fn entry_location() {
        let path = entry_path(Path::new(DEFAULT_CACHE_ROOT), "public", "abc", "csv");
        assert_eq!(
            path,
            PathBuf::from(".odsclient").join("public").join("abc.csv")
        );
        assert_eq!(
            platform_dir(Path::new(DEFAULT_CACHE_ROOT), "public"),
            PathBuf::from(".odsclient").join("public")
        );
    }

    proptest! {
        #[test]
        fn insensitive_to_scheme_and_trailing_slash(
            host in "[a-z]{1,10}(\\.[a-z]{2,5}){0,2}",
            segs in proptest::collection::vec("[a-z0-9]{1,8}", 0..4),
            slashes in 0usize..3,
        ) {
            let path = segs.join("/");
            let base = if path.is_empty() { host.clone() } else { format!("{}/{}", host, path) };
            let tail = "/".repeat(slashes);
            let https = derive_pseudo_id(&format!("https://{}{}", base, tail)).unwrap();
            let http = derive_pseudo_id(&format!("http://{}", base)).unwrap();
            let ftp = derive_pseudo_id(&format!("ftp://{}/", base)).unwrap();
            prop_assert_eq!(&https, &http);
            prop_assert_eq!(&https, &ftp);
            prop_assert_eq!(&https, &derive_pseudo_id(&format!("https://{}{}", base, tail)).unwrap());
            prop_assert!(!https.starts_with('_'));
            prop_assert!(!https.ends_with('_'));
        }
    }
}

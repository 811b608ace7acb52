use crate::error::SpecError;
use crate::store::is_url;
use reqwest::blocking::{Client, ClientBuilder};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Capability to read a document given its location
pub trait DocumentFetcher: Send + Sync {
    /// Return the raw bytes of the document at `location`
    fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError>;
}

/// Reads documents from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl DocumentFetcher for FsFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        std::fs::read(path).map_err(|e| SpecError::Fetch {
            location: location.to_string(),
            source: Box::new(e),
        })
    }
}

/// Create the HTTP client used to download API descriptions
pub fn create_fetch_client() -> Result<Client, SpecError> {
    ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| SpecError::Fetch {
            location: String::new(),
            source: Box::new(e),
        })
}

/// Downloads documents with a blocking HTTP client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default client settings
    pub fn new() -> Result<Self, SpecError> {
        Ok(HttpFetcher {
            client: create_fetch_client()?,
        })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        HttpFetcher { client }
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError> {
        let fetch_err = |e: reqwest::Error| SpecError::Fetch {
            location: location.to_string(),
            source: Box::new(e),
        };

        debug!(location, "fetching API description");
        let response = self
            .client
            .get(location)
            .header(
                reqwest::header::ACCEPT,
                "application/vnd.oai.openapi+json, application/json, application/yaml;q=0.9, */*;q=0.5",
            )
            .send()
            .map_err(fetch_err)?;

        let response = response.error_for_status().map_err(fetch_err)?;
        let bytes = response.bytes().map_err(fetch_err)?;
        Ok(bytes.to_vec())
    }
}

/// Dispatches on the location: URLs go over HTTP, everything else to disk
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    fs: FsFetcher,
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new() -> Result<Self, SpecError> {
        Ok(DefaultFetcher {
            fs: FsFetcher,
            http: HttpFetcher::new()?,
        })
    }
}

impl DocumentFetcher for DefaultFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError> {
        if is_url(location) {
            self.http.fetch(location)
        } else {
            self.fs.fetch(location)
        }
    }
}

/// Resolve `reference` against the location of the document that contains it.
///
/// URLs join as URLs; file paths are taken relative to the parent directory.
pub fn join_location(base: &str, reference: &str) -> Result<String, SpecError> {
    if is_url(reference) || Path::new(reference).is_absolute() {
        return Ok(reference.to_string());
    }

    if is_url(base) {
        let base_url = Url::parse(base).map_err(|source| SpecError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;
        let joined = base_url
            .join(reference)
            .map_err(|source| SpecError::InvalidUrl {
                url: reference.to_string(),
                source,
            })?;
        return Ok(joined.to_string());
    }

    let dir = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(reference).to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fs_fetcher() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"openapi: 3.0.3\n").unwrap();

        let location = file.path().to_string_lossy().into_owned();
        let data = FsFetcher.fetch(&location).unwrap();
        assert_eq!(data, b"openapi: 3.0.3\n");
    }

    #[test]
    fn test_fs_fetcher_missing_file() {
        let err = FsFetcher.fetch("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_join_location_url() {
        assert_eq!(
            join_location("https://api.example.com/v1/openapi.json", "schemas/pet.json").unwrap(),
            "https://api.example.com/v1/schemas/pet.json"
        );
        assert_eq!(
            join_location("https://api.example.com/v1/openapi.json", "../common.yaml").unwrap(),
            "https://api.example.com/common.yaml"
        );
    }

    #[test]
    fn test_join_location_path() {
        assert_eq!(
            join_location("/specs/api/openapi.yaml", "schemas/pet.yaml").unwrap(),
            "/specs/api/schemas/pet.yaml"
        );
        assert_eq!(
            join_location("/specs/openapi.yaml", "https://x.io/a.json").unwrap(),
            "https://x.io/a.json"
        );
        assert_eq!(
            join_location("/specs/openapi.yaml", "/abs/a.json").unwrap(),
            "/abs/a.json"
        );
    }
}

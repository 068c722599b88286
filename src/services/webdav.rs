use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::{Client, Method, RequestBuilder, StatusCode, header};
use url::Url;

use super::storage::{RemoteEntry, RemoteStore, StoreError, file_name, remote_join};

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client for Nextcloud-style file stores
pub struct WebDavStore {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl WebDavStore {
    pub fn new(client: Client, base_url: Url, username: String, password: String) -> Self {
        Self {
            client,
            base_url,
            username,
            password,
        }
    }

    fn url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            encoded.join("/")
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn propfind(&self, path: &str, depth: &'static str) -> Result<RequestBuilder, StoreError> {
        Ok(self
            .request(dav_method("PROPFIND")?, path)
            .header("Depth", depth)
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY))
    }

    /// Decoded path of an href relative to the store root
    fn relative_path(&self, href: &str) -> String {
        let href_path = match Url::parse(href) {
            Ok(url) => url.path().to_string(),
            Err(_) => href.to_string(),
        };
        let decoded = percent_decode_str(&href_path).decode_utf8_lossy().to_string();
        let root = percent_decode_str(self.base_url.path())
            .decode_utf8_lossy()
            .to_string();
        let relative = decoded
            .strip_prefix(root.trim_end_matches('/'))
            .unwrap_or(&decoded);
        remote_join("/", &[relative])
    }
}

fn dav_method(name: &str) -> Result<Method, StoreError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| StoreError::InvalidResponse(format!("invalid method {}: {}", name, e)))
}

fn status_error(status: StatusCode, path: &str) -> StoreError {
    StoreError::Status {
        status: status.as_u16(),
        path: path.to_string(),
    }
}

#[async_trait]
impl RemoteStore for WebDavStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let res = self.propfind(path, "0")?.send().await?;
        match res.status() {
            StatusCode::MULTI_STATUS | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error(status, path)),
        }
    }

    async fn create_directory(&self, path: &str) -> Result<(), StoreError> {
        let res = self.request(dav_method("MKCOL")?, path).send().await?;
        match res.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            StatusCode::METHOD_NOT_ALLOWED => Err(StoreError::AlreadyExists(path.to_string())),
            status => Err(status_error(status, path)),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        let res = self.propfind(path, "1")?.send().await?;
        match res.status() {
            StatusCode::MULTI_STATUS => {}
            StatusCode::NOT_FOUND => return Err(StoreError::NotFound(path.to_string())),
            status => return Err(status_error(status, path)),
        }

        let body = res.text().await?;
        let own_path = remote_join("/", &[path]);

        Ok(parse_multistatus(&body)?
            .into_iter()
            .filter_map(|entry| {
                let relative = self.relative_path(&entry.href);
                if relative == own_path {
                    return None;
                }
                let name = file_name(&relative).to_string();
                Some(RemoteEntry {
                    path: remote_join(&own_path, &[&name]),
                    name,
                    is_dir: entry.is_collection,
                    last_modified: entry.last_modified,
                    size: entry.content_length,
                })
            })
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Bytes, StoreError> {
        let res = self.request(Method::GET, path).send().await?;
        match res.status() {
            StatusCode::OK => Ok(res.bytes().await?),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(path.to_string())),
            status => Err(status_error(status, path)),
        }
    }

    async fn write_file(
        &self,
        path: &str,
        data: Bytes,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        let mut req = self
            .request(Method::PUT, path)
            .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
            .body(data);
        if !overwrite {
            req = req.header(header::IF_NONE_MATCH, "*");
        }

        let res = req.send().await?;
        match res.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::PRECONDITION_FAILED => Err(StoreError::AlreadyExists(path.to_string())),
            status => Err(status_error(status, path)),
        }
    }
}

/// One `<d:response>` element of a PROPFIND answer
#[derive(Debug, Default, PartialEq)]
pub struct DavEntry {
    pub href: String,
    pub is_collection: bool,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Parses a WebDAV multistatus document
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavEntry>, StoreError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<DavEntry> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match current_tag.as_str() {
                    "response" => current = Some(DavEntry::default()),
                    "collection" => {
                        if let Some(entry) = current.as_mut() {
                            entry.is_collection = true;
                        }
                    }
                    _ => (),
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    if let Some(entry) = current.as_mut() {
                        entry.is_collection = true;
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let txt = String::from_utf8_lossy(e.as_ref()).to_string();
                if let Some(entry) = current.as_mut() {
                    match current_tag.as_str() {
                        "href" => entry.href.push_str(txt.trim()),
                        "getcontentlength" => entry.content_length = txt.trim().parse().ok(),
                        "getlastmodified" => {
                            entry.last_modified = DateTime::parse_from_rfc2822(txt.trim())
                                .ok()
                                .map(|d| d.with_timezone(&Utc))
                        }
                        _ => (),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"response" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StoreError::InvalidResponse(e.to_string())),
            _ => (),
        }
        buf.clear();
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LISTING: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
  <d:response>
    <d:href>/remote.php/dav/files/wahl/Wahlen/Nord-1/042/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/></d:resourcetype>
        <d:getlastmodified>Mon, 19 Oct 2026 08:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/files/wahl/Wahlen/Nord-1/042/wahlausschreiben.pdf</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>10</d:getcontentlength>
        <d:getlastmodified>Mon, 19 Oct 2026 09:30:15 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/remote.php/dav/files/wahl/Wahlen/Nord-1/042/Stra%c3%9fe%20alt.pdf</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype/>
        <d:getcontentlength>2048</d:getcontentlength>
        <d:getlastmodified>Sun, 18 Oct 2026 12:00:00 GMT</d:getlastmodified>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    fn store() -> WebDavStore {
        WebDavStore::new(
            Client::new(),
            Url::parse("https://cloud.example.org/remote.php/dav/files/wahl/").unwrap(),
            "wahl".to_string(),
            "secret".to_string(),
        )
    }

    #[test]
    fn test_parse_multistatus() {
        let entries = parse_multistatus(LISTING).unwrap();
        assert_eq!(entries.len(), 3);

        assert!(entries[0].is_collection);
        assert_eq!(entries[0].content_length, None);

        assert!(!entries[1].is_collection);
        assert_eq!(entries[1].content_length, Some(10));
        assert_eq!(
            entries[1].last_modified,
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 15).unwrap())
        );
        assert!(entries[2].href.ends_with("Stra%c3%9fe%20alt.pdf"));
    }

    #[test]
    fn test_parse_multistatus_rejects_garbage() {
        assert!(parse_multistatus("<d:multistatus><d:response></d:multistatus>").is_err());
    }

    #[test]
    fn test_url_encodes_segments() {
        let store = store();
        assert_eq!(
            store.url("/Wahlen/Süd Ost/042/a#1.pdf"),
            "https://cloud.example.org/remote.php/dav/files/wahl/Wahlen/S%C3%BCd%20Ost/042/a%231.pdf"
        );
        assert_eq!(
            store.url("/"),
            "https://cloud.example.org/remote.php/dav/files/wahl/"
        );
    }

    #[test]
    fn test_relative_path_strips_store_root() {
        let store = store();
        assert_eq!(
            store.relative_path("/remote.php/dav/files/wahl/Wahlen/Stra%c3%9fe%20alt.pdf"),
            "/Wahlen/Straße alt.pdf"
        );
        assert_eq!(
            store.relative_path(
                "https://cloud.example.org/remote.php/dav/files/wahl/Wahlen/Nord-1/"
            ),
            "/Wahlen/Nord-1"
        );
        assert_eq!(store.relative_path("/remote.php/dav/files/wahl/"), "/");
    }
}

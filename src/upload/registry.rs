//! Plugin registry uploads over XML-RPC.
//!
//! The registry exposes a single `plugin.upload` method taking the archive
//! bytes as a base64 binary parameter and answering with the plugin and
//! version ids, or a `<fault>` structure on rejection.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::UploadError;

/// XML-RPC method invoked on the registry.
const UPLOAD_METHOD: &str = "plugin.upload";

/// Plugin registry XML-RPC client.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// XML-RPC endpoint URL
    endpoint: String,
    /// Registry user name
    username: String,
    /// Registry password
    password: String,
    /// HTTP client
    client: reqwest::blocking::Client,
}

impl RegistryClient {
    /// Create a new client for the given endpoint and credentials.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Upload a plugin archive; returns `(plugin_id, version_id)`.
    pub fn upload_plugin(&self, archive: &Path) -> Result<(i64, i64), UploadError> {
        let bytes = std::fs::read(archive)?;
        let body = build_upload_call(&bytes)?;

        tracing::debug!(
            "Uploading '{}' to plugin registry: {}",
            archive.display(),
            self.endpoint
        );
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "text/xml")
            .body(body)
            .send()?
            .error_for_status()?;

        let ids = parse_method_response(&response.text()?)?;
        let (plugin_id, version_id) = match (ids.first(), ids.get(1)) {
            (Some(plugin), Some(version)) => (parse_id(plugin)?, parse_id(version)?),
            _ => {
                return Err(UploadError::Protocol(
                    "expected plugin and version ids in the answer".to_string(),
                ))
            }
        };

        tracing::debug!("Plugin ID: {plugin_id} -- Version ID: {version_id}");
        Ok((plugin_id, version_id))
    }
}

fn parse_id(value: &str) -> Result<i64, UploadError> {
    value
        .parse()
        .map_err(|_| UploadError::Protocol(format!("'{value}' is not a numeric id")))
}

/// Build the `plugin.upload` request envelope.
fn build_upload_call(archive_bytes: &[u8]) -> Result<String, UploadError> {
    let encoded = BASE64.encode(archive_bytes);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    writer.write_event(Event::Start(BytesStart::new("methodCall")))?;
    writer.write_event(Event::Start(BytesStart::new("methodName")))?;
    writer.write_event(Event::Text(BytesText::new(UPLOAD_METHOD)))?;
    writer.write_event(Event::End(BytesEnd::new("methodName")))?;
    writer.write_event(Event::Start(BytesStart::new("params")))?;
    writer.write_event(Event::Start(BytesStart::new("param")))?;
    writer.write_event(Event::Start(BytesStart::new("value")))?;
    writer.write_event(Event::Start(BytesStart::new("base64")))?;
    writer.write_event(Event::Text(BytesText::new(&encoded)))?;
    writer.write_event(Event::End(BytesEnd::new("base64")))?;
    writer.write_event(Event::End(BytesEnd::new("value")))?;
    writer.write_event(Event::End(BytesEnd::new("param")))?;
    writer.write_event(Event::End(BytesEnd::new("params")))?;
    writer.write_event(Event::End(BytesEnd::new("methodCall")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| UploadError::Protocol(e.to_string()))
}

/// Parse a `methodResponse`, returning its scalar values in document order.
///
/// A `<fault>` answer is surfaced as [`UploadError::Fault`] with the
/// `faultCode`/`faultString` members.
fn parse_method_response(body: &str) -> Result<Vec<String>, UploadError> {
    let mut reader = Reader::from_str(body);

    let mut path: Vec<String> = Vec::new();
    let mut saw_fault = false;
    let mut in_fault = false;
    let mut member_name = String::new();
    let mut fault_code: Option<i64> = None;
    let mut fault_string: Option<String> = None;
    let mut scalars: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "fault" {
                    saw_fault = true;
                    in_fault = true;
                }
                path.push(name);
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"fault" {
                    in_fault = false;
                }
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .xml_content()
                    .map_err(|e| UploadError::Protocol(e.to_string()))?
                    .trim()
                    .to_string();
                if text.is_empty() {
                    continue;
                }

                match path.last().map(String::as_str) {
                    Some("name") => member_name = text,
                    // A bare <value> without a type element is a string
                    Some("int" | "i4" | "string" | "double" | "boolean" | "value") => {
                        if in_fault {
                            match member_name.as_str() {
                                "faultCode" => fault_code = text.parse().ok(),
                                "faultString" => fault_string = Some(text),
                                _ => {}
                            }
                        } else {
                            scalars.push(text);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(UploadError::Protocol(e.to_string())),
            _ => {}
        }
    }

    if saw_fault {
        return Err(UploadError::Fault {
            code: fault_code.unwrap_or(0),
            message: fault_string.unwrap_or_else(|| "unknown fault".to_string()),
        });
    }

    Ok(scalars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_upload_call_envelope() {
        let body = build_upload_call(b"archive-bytes").unwrap();
        assert!(body.starts_with("<?xml version=\"1.0\"?>"));
        assert!(body.contains("<methodName>plugin.upload</methodName>"));
        assert!(body.contains(&format!("<base64>{}</base64>", BASE64.encode(b"archive-bytes"))));
    }

    #[test]
    fn test_parse_success_response() {
        let body = "<?xml version=\"1.0\"?>\n\
            <methodResponse>\n\
              <params><param><value><array><data>\n\
                <value><int>2307</int></value>\n\
                <value><int>19</int></value>\n\
              </data></array></value></param></params>\n\
            </methodResponse>";
        assert_eq!(parse_method_response(body).unwrap(), vec!["2307", "19"]);
    }

    #[test]
    fn test_parse_untyped_string_value() {
        let body = "<methodResponse><params><param><value>ok</value></param></params></methodResponse>";
        assert_eq!(parse_method_response(body).unwrap(), vec!["ok"]);
    }

    #[test]
    fn test_parse_fault_response() {
        let body = "<?xml version=\"1.0\"?>\n\
            <methodResponse><fault><value><struct>\n\
              <member><name>faultCode</name><value><int>403</int></value></member>\n\
              <member><name>faultString</name><value><string>Not allowed</string></value></member>\n\
            </struct></value></fault></methodResponse>";

        match parse_method_response(body) {
            Err(UploadError::Fault { code, message }) => {
                assert_eq!(code, 403);
                assert_eq!(message, "Not allowed");
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage_is_a_protocol_error() {
        assert!(matches!(
            parse_method_response("<methodResponse><unclosed"),
            Err(UploadError::Protocol(_))
        ));
    }
}

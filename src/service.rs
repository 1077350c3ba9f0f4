//! The `GetCollectionData` exchange resolving a collection id to its json manifest and the
//! root url of its binary fragments.

use crate::error::ImportError;
use crate::resource::{request_with_timeout, Method, ResourceClient};
use std::collections::BTreeMap;
use std::time::Duration;

const SOAP_ACTION: &str = "http://labs.live.com/GetCollectionData";
const SYNTH_COLLECTION_TYPE: &str = "Synth";
const OK_RESULT: &str = "OK";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionInfo {
    pub collection_type: String,
    pub json_url: String,
    pub collection_root: String,
}

pub fn collection_data_request(collection_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetCollectionData xmlns="http://labs.live.com/">
      <collectionId>{collection_id}</collectionId>
      <incrementEditCount>false</incrementEditCount>
    </GetCollectionData>
  </soap:Body>
</soap:Envelope>"#
    )
}

fn soap_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "text/xml; charset=utf-8".to_string()),
        ("SOAPAction".to_string(), format!("\"{SOAP_ACTION}\"")),
    ])
}

pub async fn resolve_collection<C: ResourceClient + ?Sized>(
    client: &C,
    service_url: &str,
    collection_id: &str,
    timeout: Option<Duration>,
) -> Result<CollectionInfo, ImportError> {
    let body = collection_data_request(collection_id).into_bytes();
    let response = request_with_timeout(
        client,
        service_url,
        Method::Post,
        Some(body),
        Some(soap_headers()),
        timeout,
    )
    .await?;

    let text = std::str::from_utf8(&response)
        .map_err(|_| ImportError::UnexpectedResponse("response is not valid utf-8".to_string()))?;
    parse_collection_data(text)
}

pub fn parse_collection_data(xml: &str) -> Result<CollectionInfo, ImportError> {
    let required = |tag: &str| {
        element_text(xml, tag)
            .ok_or_else(|| ImportError::UnexpectedResponse(format!("missing <{tag}> element")))
    };

    let result = required("Result")?;
    if result != OK_RESULT {
        return Err(ImportError::NegativeResponse(result));
    }

    let collection_type = required("CollectionType")?;
    if collection_type != SYNTH_COLLECTION_TYPE {
        return Err(ImportError::WrongCollectionType(collection_type));
    }

    let json_url = required("JsonUrl")?;
    let collection_root = required("CollectionRoot")?;
    if json_url.is_empty() || collection_root.is_empty() {
        return Err(ImportError::UnexpectedResponse(
            "empty manifest url or collection root".to_string(),
        ));
    }

    Ok(CollectionInfo {
        collection_type,
        json_url,
        collection_root,
    })
}

const COMMENT: (&str, &str) = ("<!--", "-->");
const CDATA: (&str, &str) = ("<![CDATA[", "]]>");
const INSTRUCTION: (&str, &str) = ("<?", "?>");
const DECLARATION: (&str, &str) = ("<!", ">");

/// Text of the first `<tag>` element, whether or not it carries a namespace prefix.
fn element_text(xml: &str, tag: &str) -> Option<String> {
    let mut search = xml;
    while let Some(start) = search.find('<') {
        let markup = &search[start..];
        if let Some(len) = non_element_len(markup) {
            search = &markup[len..];
            continue;
        }

        let rest = &markup[1..];
        let end = rest.find('>')?;
        let header = &rest[..end];
        let name = header
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        let local = name.rsplit(':').next().unwrap_or(name);

        if local == tag && !header.starts_with('/') {
            if header.ends_with('/') {
                return Some(String::new());
            }
            return element_content(&rest[end + 1..], name);
        }
        search = &rest[end + 1..];
    }
    None
}

/// Length of the comment, CDATA section, processing instruction or declaration opening
/// `markup`, or `None` when `markup` opens an element tag.
fn non_element_len(markup: &str) -> Option<usize> {
    [COMMENT, CDATA, INSTRUCTION, DECLARATION]
        .into_iter()
        .find(|&(open, _)| markup.starts_with(open))
        .map(|(open, close)| {
            markup[open.len()..]
                .find(close)
                .map_or(markup.len(), |end| open.len() + end + close.len())
        })
}

/// Character data up to `</name>`. CDATA is kept verbatim; comments and nested tags are
/// dropped.
fn element_content(mut content: &str, name: &str) -> Option<String> {
    let close = format!("</{name}>");
    let mut text = String::new();
    loop {
        let start = content.find('<')?;
        text.push_str(&unescape(&content[..start]));
        let markup = &content[start..];

        if markup.starts_with(&close) {
            return Some(text.trim().to_string());
        }
        if let Some(section) = markup.strip_prefix(CDATA.0) {
            let end = section.find(CDATA.1)?;
            text.push_str(&section[..end]);
            content = &section[end + CDATA.1.len()..];
        } else if let Some(len) = non_element_len(markup) {
            content = &markup[len..];
        } else {
            let end = markup.find('>')?;
            content = &markup[end + 1..];
        }
    }
}

/// Decodes the predefined entities and numeric character references. Anything else is
/// left as written.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let reference = &rest[amp + 1..];
        let decoded = reference
            .find(';')
            .and_then(|end| Some((decode_reference(&reference[..end])?, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &reference[end + 1..];
            }
            None => {
                out.push('&');
                rest = reference;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

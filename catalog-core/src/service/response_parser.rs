//! CMS upstream response parsing (§4.A).
//!
//! Upstream sources answer `ac=list`/`ac=detail` requests in one of two shapes: a JSON
//! object or an XML document modeled on the long-standing "MacCMS" dialect. Both carry
//! the same fields under different names; this module produces one `ParsedVideoList`
//! regardless of wire format.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value as JsonValue;

use crate::models::Episode;

/// A parsing failure: malformed body, unrecognized shape, or a missing required field.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl From<ParseError> for crate::Error {
    fn from(e: ParseError) -> Self {
        crate::Error::Parse(e.0)
    }
}

/// One upstream play route, prior to cleaning (label/url pairs as transmitted).
#[derive(Debug, Clone, Default)]
pub struct ParsedRoute {
    pub name: String,
    pub episodes: Vec<Episode>,
}

/// A single upstream video record, fields verbatim except for CDATA/whitespace trimming.
#[derive(Debug, Clone, Default)]
pub struct ParsedVideo {
    pub upstream_id: String,
    pub name: String,
    pub upstream_type_id: Option<i32>,
    pub upstream_type_name: Option<String>,
    pub year: String,
    pub area: String,
    pub language: String,
    pub actors_raw: String,
    pub directors_raw: String,
    pub content_raw: String,
    pub pic: String,
    pub remarks: String,
    pub routes: Vec<ParsedRoute>,
}

/// One page of parsed results, plus the upstream's own pagination report.
#[derive(Debug, Clone, Default)]
pub struct ParsedVideoList {
    pub videos: Vec<ParsedVideo>,
    pub page: u32,
    pub pagecount: u32,
    pub total: i64,
}

/// Stateless dual-format (JSON/XML) response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parse a body of unknown shape, sniffing the format from its leading bytes.
    pub fn parse(body: &str) -> Result<ParsedVideoList, ParseError> {
        match Self::sniff(body) {
            Format::Xml => Self::parse_xml(body),
            Format::Json => Self::parse_json(body),
        }
    }

    /// Parse a body known in advance to be JSON.
    pub fn parse_json(body: &str) -> Result<ParsedVideoList, ParseError> {
        let root: JsonValue =
            serde_json::from_str(body).map_err(|e| ParseError(format!("invalid JSON body: {e}")))?;

        let page = json_u32(&root, "page").unwrap_or(1);
        let pagecount = json_u32(&root, "pagecount").unwrap_or(1);
        let total = root
            .get("total")
            .and_then(JsonValue::as_i64)
            .unwrap_or(0);

        let list = root
            .get("list")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| ParseError("JSON body missing `list` array".to_string()))?;

        let videos = list.iter().map(Self::json_to_video).collect();

        Ok(ParsedVideoList {
            videos,
            page,
            pagecount,
            total,
        })
    }

    fn json_to_video(item: &JsonValue) -> ParsedVideo {
        let get_str = |keys: &[&str]| -> String {
            for key in keys {
                if let Some(v) = item.get(key).and_then(JsonValue::as_str) {
                    if !v.is_empty() {
                        return v.to_string();
                    }
                }
            }
            String::new()
        };

        let play_from = get_str(&["vod_play_from", "play_from"]);
        let play_url = get_str(&["vod_play_url", "play_url"]);

        ParsedVideo {
            upstream_id: get_str(&["vod_id", "id"]),
            name: get_str(&["vod_name", "name"]),
            upstream_type_id: item
                .get("type_id")
                .and_then(JsonValue::as_i64)
                .map(|v| v as i32),
            upstream_type_name: {
                let s = get_str(&["type_name"]);
                if s.is_empty() { None } else { Some(s) }
            },
            year: get_str(&["vod_year", "year"]),
            area: get_str(&["vod_area", "area"]),
            language: get_str(&["vod_lang", "language"]),
            actors_raw: get_str(&["vod_actor", "actor"]),
            directors_raw: get_str(&["vod_director", "director"]),
            content_raw: get_str(&["vod_content", "content"]),
            pic: get_str(&["vod_pic", "pic"]),
            remarks: get_str(&["vod_remarks", "remarks"]),
            routes: split_routes(&play_from, &play_url),
        }
    }

    /// Parse a body known in advance to be XML.
    pub fn parse_xml(body: &str) -> Result<ParsedVideoList, ParseError> {
        let mut reader = Reader::from_str(body);

        let mut page = 1u32;
        let mut pagecount = 1u32;
        let mut total = 0i64;
        let mut videos = Vec::new();

        let mut buf = Vec::new();
        let mut field_stack: Vec<String> = Vec::new();
        let mut current: Option<VideoBuilder> = None;
        let mut in_list = false;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| ParseError(format!("XML parse error: {e}")))?
            {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match name.as_str() {
                        "list" | "rss" => {
                            in_list = true;
                            for attr in e.attributes().filter_map(|a| a.ok()) {
                                let value = String::from_utf8_lossy(&attr.value).to_string();
                                match attr.key.as_ref() {
                                    b"page" => page = value.parse().unwrap_or(page),
                                    b"pagecount" => pagecount = value.parse().unwrap_or(pagecount),
                                    b"recordcount" | b"total" => {
                                        total = value.parse().unwrap_or(total);
                                    }
                                    _ => {}
                                }
                            }
                        }
                        "video" | "item" => current = Some(VideoBuilder::default()),
                        "dl" if current.is_some() => {}
                        "dd" if current.is_some() => {
                            let flag = e
                                .attributes()
                                .filter_map(|a| a.ok())
                                .find(|a| a.key.as_ref() == b"flag")
                                .map(|a| String::from_utf8_lossy(&a.value).to_string())
                                .unwrap_or_else(|| "默认".to_string());
                            if let Some(v) = current.as_mut() {
                                v.start_route(flag);
                            }
                        }
                        _ => {}
                    }
                    field_stack.push(name);
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if name == "video" || name == "item" {
                        if let Some(v) = current.take() {
                            videos.push(v.finish());
                        }
                    }
                    if name == "list" || name == "rss" {
                        in_list = false;
                    }
                    field_stack.pop();
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                    Self::apply_text(&field_stack, &mut current, &mut page, &mut pagecount, &mut total, &text);
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map(|c| c.trim().to_string())
                        .unwrap_or_default();
                    if !text.is_empty() {
                        Self::apply_text(&field_stack, &mut current, &mut page, &mut pagecount, &mut total, &text);
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        if !in_list && videos.is_empty() {
            return Err(ParseError("XML body missing <list> element".to_string()));
        }

        Ok(ParsedVideoList {
            videos,
            page,
            pagecount,
            total,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_text(
        stack: &[String],
        current: &mut Option<VideoBuilder>,
        page: &mut u32,
        pagecount: &mut u32,
        total: &mut i64,
        text: &str,
    ) {
        let Some(tag) = stack.last() else { return };

        if let Some(v) = current.as_mut() {
            v.apply_field(tag, text);
            return;
        }

        match tag.as_str() {
            "page" => *page = text.parse().unwrap_or(1),
            "pagecount" => *pagecount = text.parse().unwrap_or(1),
            "total" => *total = text.parse().unwrap_or(0),
            _ => {}
        }
    }

    fn sniff(body: &str) -> Format {
        let trimmed = body.trim_start();
        if trimmed.starts_with("<?xml") || trimmed.starts_with("<rss") || trimmed.starts_with("<list") {
            Format::Xml
        } else {
            Format::Json
        }
    }
}

enum Format {
    Json,
    Xml,
}

/// Split MacCMS-style pipe-delimited `play_from`/`play_url` strings into routes.
///
/// `play_from` is `route1$$$route2` or `route1|route2` depending on dialect; each
/// route's episode list in `play_url` is `$$$`/`|`-delimited in lockstep, and each
/// episode within a route is `#`-delimited `label$url` pairs.
fn split_routes(play_from: &str, play_url: &str) -> Vec<ParsedRoute> {
    if play_from.is_empty() || play_url.is_empty() {
        return Vec::new();
    }

    let names: Vec<&str> = split_route_sep(play_from);
    let groups: Vec<&str> = split_route_sep(play_url);

    names
        .into_iter()
        .zip(groups)
        .map(|(name, group)| ParsedRoute {
            name: name.trim().to_string(),
            episodes: group
                .split('#')
                .filter(|s| !s.is_empty())
                .map(|pair| {
                    let mut parts = pair.splitn(2, '$');
                    let label = parts.next().unwrap_or_default().trim().to_string();
                    let url = parts.next().unwrap_or_default().trim().to_string();
                    Episode { label, url }
                })
                .collect(),
        })
        .collect()
}

fn split_route_sep(s: &str) -> Vec<&str> {
    if s.contains("$$$") {
        s.split("$$$").collect()
    } else {
        s.split('|').collect()
    }
}

#[derive(Default)]
struct VideoBuilder {
    video: ParsedVideo,
    current_route: Option<ParsedRoute>,
}

impl VideoBuilder {
    fn start_route(&mut self, flag: String) {
        self.flush_route();
        self.current_route = Some(ParsedRoute {
            name: flag,
            episodes: Vec::new(),
        });
    }

    fn flush_route(&mut self) {
        if let Some(route) = self.current_route.take() {
            if !route.episodes.is_empty() {
                self.video.routes.push(route);
            }
        }
    }

    fn apply_field(&mut self, tag: &str, text: &str) {
        match tag {
            "id" => self.video.upstream_id = text.to_string(),
            "name" => self.video.name = text.to_string(),
            "type" | "type_name" => self.video.upstream_type_name = Some(text.to_string()),
            "type_id" => self.video.upstream_type_id = text.parse().ok(),
            "year" => self.video.year = text.to_string(),
            "area" => self.video.area = text.to_string(),
            "lang" => self.video.language = text.to_string(),
            "actor" => self.video.actors_raw = text.to_string(),
            "director" => self.video.directors_raw = text.to_string(),
            "content" => self.video.content_raw = text.to_string(),
            "pic" => self.video.pic = text.to_string(),
            "note" | "remarks" => self.video.remarks = text.to_string(),
            "dd" => {
                if let Some(route) = self.current_route.as_mut() {
                    route.episodes.extend(
                        text.split('#')
                            .filter(|s| !s.is_empty())
                            .map(|pair| {
                                let mut parts = pair.splitn(2, '$');
                                let label = parts.next().unwrap_or_default().trim().to_string();
                                let url = parts.next().unwrap_or_default().trim().to_string();
                                Episode { label, url }
                            }),
                    );
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> ParsedVideo {
        self.flush_route();
        self.video
    }
}

fn json_u32(root: &JsonValue, key: &str) -> Option<u32> {
    root.get(key).and_then(|v| match v {
        JsonValue::Number(n) => n.as_u64().map(|v| v as u32),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_json_default() {
        let body = r#"{"list":[]}"#;
        let parsed = ResponseParser::parse(body).unwrap();
        assert_eq!(parsed.videos.len(), 0);
    }

    #[test]
    fn test_parse_json_list() {
        let body = r#"
        {
            "page": "1",
            "pagecount": 5,
            "total": 100,
            "list": [
                {
                    "vod_id": "1001",
                    "vod_name": "禁闭岛",
                    "type_id": 2,
                    "type_name": "剧情片",
                    "vod_year": "2010",
                    "vod_area": "美国",
                    "vod_actor": "莱昂纳多",
                    "vod_director": "马丁·斯科塞斯",
                    "vod_content": "<p>synopsis</p>",
                    "vod_pic": "https://x.com/a.jpg",
                    "vod_play_from": "m3u8",
                    "vod_play_url": "第1集$https://x.com/1.m3u8#第2集$https://x.com/2.m3u8"
                }
            ]
        }
        "#;
        let parsed = ResponseParser::parse(body).unwrap();
        assert_eq!(parsed.page, 1);
        assert_eq!(parsed.pagecount, 5);
        assert_eq!(parsed.total, 100);
        assert_eq!(parsed.videos.len(), 1);
        let v = &parsed.videos[0];
        assert_eq!(v.name, "禁闭岛");
        assert_eq!(v.routes.len(), 1);
        assert_eq!(v.routes[0].episodes.len(), 2);
        assert_eq!(v.routes[0].episodes[0].label, "第1集");
    }

    #[test]
    fn test_parse_json_missing_list_fails() {
        let err = ResponseParser::parse(r#"{"page":1}"#).unwrap_err();
        assert!(err.0.contains("list"));
    }

    #[test]
    fn test_parse_xml_list() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
        <rss>
        <list page="1" pagecount="3">
        <video>
            <id>2001</id>
            <name><![CDATA[禁闭岛]]></name>
            <type_id>2</type_id>
            <type>剧情片</type>
            <year>2010</year>
            <area>美国</area>
            <director><![CDATA[马丁·斯科塞斯]]></director>
            <content><![CDATA[<p>synopsis</p>]]></content>
            <dl>
                <dd flag="m3u8"><![CDATA[第1集$https://x.com/1.m3u8#第2集$https://x.com/2.m3u8]]></dd>
            </dl>
        </video>
        </list>
        </rss>"#;
        let parsed = ResponseParser::parse(body).unwrap();
        assert_eq!(parsed.videos.len(), 1);
        let v = &parsed.videos[0];
        assert_eq!(v.name, "禁闭岛");
        assert_eq!(v.routes.len(), 1);
        assert_eq!(v.routes[0].name, "m3u8");
        assert_eq!(v.routes[0].episodes.len(), 2);
    }

    #[test]
    fn test_parse_empty_body_fails() {
        assert!(ResponseParser::parse("").is_err());
    }

    #[test]
    fn test_split_routes_pipe_dialect() {
        let routes = split_routes("m3u8|mp4", "a$1#b$2|c$3");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name, "m3u8");
        assert_eq!(routes[0].episodes.len(), 2);
        assert_eq!(routes[1].episodes.len(), 1);
    }
}
